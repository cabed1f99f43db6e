use indicatif::{ProgressBar, ProgressStyle};

/// Returns a hidden bar counting `length` frames; it is drawn once
/// added to a `MultiProgress` with a visible target.
pub fn bar(header: String, length: u64) -> ProgressBar {
    let pb = ProgressBar::hidden();
    pb.set_prefix(header);
    pb.set_length(length);
    pb.set_style(
        ProgressStyle::with_template("{prefix}...\n[{wide_bar:.cyan/blue}] {pos}/{len} frames")
            .expect("incorrect progress bar format string")
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::bar;

    #[test]
    fn test_bar_is_hidden_until_added() {
        let pb = bar("Render out.gif".to_owned(), 12);
        assert!(pb.is_hidden());
        assert_eq!(pb.length(), Some(12));
        assert_eq!(pb.prefix(), "Render out.gif");
        pb.inc(12);
        assert_eq!(pb.position(), 12);
    }
}
