//! NASADEM elevation (`.hgt`) file format.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;

pub use crate::error::NasademError;
use byteorder::{BigEndian as BE, ByteOrder, ReadBytesExt};
use geo::geometry::{Coord, Rect};
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

/// Base floating point type used for all coordinates.
pub type C = f64;

/// Sample value HGT files use for missing data.
pub const VOID: i16 = i16::MIN;

const ARCSEC_PER_DEG: C = 3600.0;

pub struct Tile {
    /// Southwest corner of the tile.
    ///
    /// Specifically, the _center_ of the SW most sample of the tile.
    sw_corner_center: Coord<C>,

    /// Arcseconds per sample.
    resolution: u8,

    /// Number of (columns, rows) in this tile.
    dimensions: (usize, usize),

    /// Elevation samples, north row first.
    samples: SampleStore,
}

enum SampleStore {
    InMem(Box<[i16]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get_unchecked(&self, index: usize) -> i16 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<i16>();
                BE::read_i16(&raw[start..start + size_of::<i16>()])
            }
        }
    }
}

impl Tile {
    /// Returns a Tile read into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NasademError> {
        let (resolution, dimensions @ (cols, rows)) = extract_resolution(&path)?;
        let sw_corner_center = parse_sw_corner(&path)?;

        let mut file = BufReader::new(File::open(path)?);
        let mut samples = Vec::with_capacity(cols * rows);
        for _ in 0..(cols * rows) {
            samples.push(file.read_i16::<BE>()?);
        }

        Ok(Self {
            sw_corner_center,
            resolution,
            dimensions,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a Tile using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, NasademError> {
        let (resolution, dimensions) = extract_resolution(&path)?;
        let sw_corner_center = parse_sw_corner(&path)?;

        let samples = {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            SampleStore::MemMap(mmap)
        };

        Ok(Self {
            sw_corner_center,
            resolution,
            dimensions,
            samples,
        })
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let (x, y) = self.dimensions;
        x * y
    }

    /// Returns (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    /// Returns this tile's resolution in arcseconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Size of one sample in degrees.
    pub fn cell_size(&self) -> C {
        C::from(self.resolution) / ARCSEC_PER_DEG
    }

    /// Center of the southwest most sample.
    pub fn sw_corner_center(&self) -> Coord<C> {
        self.sw_corner_center
    }

    /// Center of the northeast most sample.
    #[allow(clippy::cast_precision_loss)]
    pub fn ne_corner_center(&self) -> Coord<C> {
        let (cols, rows) = self.dimensions;
        let res = C::from(self.resolution);
        Coord {
            x: self.sw_corner_center.x + (cols - 1) as C * res / ARCSEC_PER_DEG,
            y: self.sw_corner_center.y + (rows - 1) as C * res / ARCSEC_PER_DEG,
        }
    }

    /// Outer edges of the tile's samples, in degrees.
    pub fn extent(&self) -> Rect<C> {
        let half = self.cell_size() / 2.0;
        let sw = self.sw_corner_center;
        let ne = self.ne_corner_center();
        Rect::new(
            Coord {
                x: sw.x - half,
                y: sw.y - half,
            },
            Coord {
                x: ne.x + half,
                y: ne.y + half,
            },
        )
    }

    /// Returns the sample at `(x, y)` where `(0, 0)` is the SW most
    /// sample.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside of this tile's dimensions.
    pub fn get_xy(&self, (x, y): (usize, usize)) -> i16 {
        let idx_1d = self.xy_to_linear_index((x, y));
        self.samples.get_unchecked(idx_1d)
    }

    /// Returns the lowest non-void elevation sample in this tile.
    pub fn min_elevation(&self) -> Option<i16> {
        self.non_void_samples().min()
    }

    /// Returns the highest non-void elevation sample in this tile.
    pub fn max_elevation(&self) -> Option<i16> {
        self.non_void_samples().max()
    }
}

/// Private API
impl Tile {
    fn non_void_samples(&self) -> impl Iterator<Item = i16> + '_ {
        (0..self.len())
            .map(|idx| self.samples.get_unchecked(idx))
            .filter(|sample| *sample != VOID)
    }

    fn xy_to_linear_index(&self, (x, y): (usize, usize)) -> usize {
        self.dimensions.0 * (self.dimensions.1 - y - 1) + x
    }
}

fn extract_resolution<P: AsRef<Path>>(path: P) -> Result<(u8, (usize, usize)), NasademError> {
    const RES_1_ARCSECONDS_FILE_LEN: u64 = 3601 * 3601 * size_of::<u16>() as u64;
    const RES_3_ARCSECONDS_FILE_LEN: u64 = 1201 * 1201 * size_of::<u16>() as u64;
    match path.as_ref().metadata().map(|m| m.len())? {
        RES_1_ARCSECONDS_FILE_LEN => Ok((1, (3601, 3601))),
        RES_3_ARCSECONDS_FILE_LEN => Ok((3, (1201, 1201))),
        invalid_len => Err(NasademError::HgtLen(
            invalid_len,
            path.as_ref().to_owned(),
        )),
    }
}

fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<C>, NasademError> {
    let mk_err = || NasademError::HgtName(path.as_ref().to_owned());
    let name = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(mk_err)?;
    if name.len() != 7 || !name.is_ascii() {
        return Err(mk_err());
    }
    let lat_sign = match &name[0..1] {
        "N" | "n" => 1,
        "S" | "s" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" | "e" => 1,
        "W" | "w" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord {
        x: C::from(lon),
        y: C::from(lat),
    })
}

#[cfg(test)]
mod _3_arc_second {
    use super::{extract_resolution, parse_sw_corner, Coord, NasademError, Tile, VOID};
    use byteorder::{WriteBytesExt, BE};
    use std::{
        fs::File,
        io::{BufWriter, Write},
        path::PathBuf,
    };

    const DIM: usize = 1201;

    /// Elevation of the synthetic tile at file position `(col, row)`,
    /// where row 0 is the northern edge.
    fn synthetic_elevation(col: usize, row: usize) -> i16 {
        if (col, row) == (600, 600) {
            VOID
        } else {
            i16::try_from(col + (DIM - 1 - row)).unwrap()
        }
    }

    fn write_tile(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nasadem-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut wtr = BufWriter::new(File::create(&path).unwrap());
        for row in 0..DIM {
            for col in 0..DIM {
                wtr.write_i16::<BE>(synthetic_elevation(col, row)).unwrap();
            }
        }
        wtr.flush().unwrap();
        path
    }

    #[test]
    fn test_parse_hgt_name() {
        let path = write_tile("N56W006.hgt");
        let sw_corner = parse_sw_corner(&path).unwrap();
        let resolution = extract_resolution(&path).unwrap();
        assert_eq!(sw_corner, Coord { x: -6.0, y: 56.0 });
        assert_eq!(resolution, (3, (1201, 1201)));
    }

    #[test]
    fn test_bad_name_and_len() {
        assert!(matches!(
            parse_sw_corner("X56W006.hgt"),
            Err(NasademError::HgtName(_))
        ));
        let dir = std::env::temp_dir().join(format!("nasadem-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("N00E000.hgt");
        std::fs::write(&path, [0_u8; 10]).unwrap();
        assert!(matches!(
            Tile::load(&path),
            Err(NasademError::HgtLen(10, _))
        ));
    }

    #[test]
    fn test_tile_index() {
        let path = write_tile("S01E010.hgt");
        let parsed_tile = Tile::load(&path).unwrap();
        let mapped_tile = Tile::memmap(&path).unwrap();
        for row in (0..DIM).step_by(7) {
            for col in (0..DIM).step_by(11) {
                let expected = synthetic_elevation(col, row);
                let y = DIM - 1 - row;
                assert_eq!(expected, parsed_tile.get_xy((col, y)));
                assert_eq!(expected, mapped_tile.get_xy((col, y)));
            }
        }
    }

    #[test]
    fn test_corners_and_bounds() {
        let path = write_tile("N44W072.hgt");
        let tile = Tile::memmap(path).unwrap();
        assert_eq!(tile.resolution(), 3);
        assert_eq!(tile.get_xy((0, 0)), 0);
        assert_eq!(tile.get_xy((DIM - 1, DIM - 1)), 2400);
        assert_eq!(tile.sw_corner_center(), Coord { x: -72.0, y: 44.0 });
        assert_eq!(tile.ne_corner_center(), Coord { x: -71.0, y: 45.0 });
        let extent = tile.extent();
        let half = tile.cell_size() / 2.0;
        assert_eq!(extent.min(), Coord { x: -72.0 - half, y: 44.0 - half });
        assert_eq!(extent.max(), Coord { x: -71.0 + half, y: 45.0 + half });
    }

    #[test]
    fn test_min_max_skip_voids() {
        let path = write_tile("N10E010.hgt");
        let tile = Tile::load(path).unwrap();
        assert_eq!(tile.min_elevation(), Some(0));
        assert_eq!(tile.max_elevation(), Some(2400));
    }
}
