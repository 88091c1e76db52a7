//! Input probing and segmentation.

use std::fs;
use std::io;
use std::path::Path;

/// Contiguous byte range `[start, start + length)` of the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub length: u64,
}

impl Segment {
    /// End offset (exclusive).
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Number of whole records of `record_width` bytes covered by the segment.
    pub fn records(&self, record_width: usize) -> u64 {
        self.length / record_width as u64
    }
}

/// Returns total length of the file in bytes.
pub fn file_length(path: &Path) -> io::Result<u64> {
    let file = fs::File::open(path)?;
    let metadata = file.metadata()?;
    if metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a directory", path.display()),
        ));
    }

    return Ok(metadata.len());
}

/// Splits `[0, length)` into contiguous segments of at most `segment_size` bytes.
/// The last segment is shorter if `length` is not a multiple of `segment_size`.
pub struct Segmenter {
    length: u64,
    segment_size: u64,
    position: u64,
}

impl Segmenter {
    /// Creates a segmenter. `segment_size` must be greater than zero.
    pub fn new(length: u64, segment_size: u64) -> Self {
        assert!(segment_size > 0, "segment size must be positive");

        Segmenter {
            length,
            segment_size,
            position: 0,
        }
    }

    /// Number of segments covering the input.
    pub fn segment_count(length: u64, segment_size: u64) -> u64 {
        length / segment_size + (length % segment_size != 0) as u64
    }
}

impl Iterator for Segmenter {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.length {
            return None;
        }

        let length = std::cmp::min(self.segment_size, self.length - self.position);
        let segment = Segment {
            start: self.position,
            length,
        };
        self.position += length;

        return Some(segment);
    }
}
