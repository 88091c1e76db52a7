//! Fixed-width record codec.

use std::io;
use std::io::prelude::*;

/// Fixed-width unsigned integer record stored in native byte order.
pub trait Record: Copy + Ord + Send + Sync + 'static {
    /// Record width in bytes.
    const WIDTH: usize;

    /// Decodes a record from exactly [`Record::WIDTH`] bytes.
    fn decode(buf: &[u8]) -> Self;

    /// Encodes the record into exactly [`Record::WIDTH`] bytes.
    fn encode(self, buf: &mut [u8]);
}

macro_rules! impl_record {
    ($($t:ty),*) => {
        $(
            impl Record for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                #[inline]
                fn decode(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(buf);
                    <$t>::from_ne_bytes(bytes)
                }

                #[inline]
                fn encode(self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_record!(u8, u16, u32, u64);

/// Reads `count` records from the reader.
pub fn read_records<T: Record, R: Read + ?Sized>(reader: &mut R, count: usize) -> io::Result<Vec<T>> {
    let mut records = Vec::with_capacity(count);
    let mut buf = vec![0u8; T::WIDTH];

    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        records.push(T::decode(&buf));
    }

    return Ok(records);
}

/// Writes a single record to the writer.
#[inline]
pub fn write_record<T: Record>(writer: &mut impl Write, item: T, buf: &mut [u8]) -> io::Result<()> {
    item.encode(buf);
    writer.write_all(buf)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use rstest::*;

    use super::{read_records, write_record, Record};

    #[rstest]
    #[case(0u32)]
    #[case(1u32)]
    #[case(u32::MAX)]
    #[case(0xdead_beef_u32)]
    fn test_native_byte_order(#[case] value: u32) {
        let mut buf = [0u8; 4];
        value.encode(&mut buf);

        assert_eq!(buf, value.to_ne_bytes());
        assert_eq!(u32::decode(&buf), value);
    }

    #[test]
    fn test_widths() {
        assert_eq!(u8::WIDTH, 1);
        assert_eq!(u16::WIDTH, 2);
        assert_eq!(u32::WIDTH, 4);
        assert_eq!(u64::WIDTH, 8);
    }

    #[test]
    fn test_read_records() {
        let mut bytes = Vec::new();
        let mut buf = [0u8; 8];
        for value in [7u64, 1, u64::MAX] {
            write_record(&mut bytes, value, &mut buf).unwrap();
        }

        let records: Vec<u64> = read_records(&mut Cursor::new(bytes), 3).unwrap();
        assert_eq!(records, vec![7, 1, u64::MAX]);
    }

    #[test]
    fn test_read_records_truncated() {
        let bytes = vec![0u8; 6];
        let result: Result<Vec<u32>, _> = read_records(&mut Cursor::new(bytes), 2);

        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
