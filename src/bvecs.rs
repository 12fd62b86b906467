//! Reader for bvecs-style record streams.
//!
//! Each record is a little-endian `u32` dimension followed by that many
//! byte symbols, repeated until EOF. Only the first `length` symbols of
//! a record are kept, and every kept symbol is reduced modulo the
//! alphabet size before ingestion.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Read every record from `reader`, returning the flat key buffer and
/// the number of keys.
///
/// A record shorter than `length` or cut off mid-record is an
/// [`Error::InvalidInput`].
pub fn read_records<R: Read>(
    mut reader: R,
    length: u32,
    alphabet_size: u32,
) -> Result<(Vec<u32>, usize)> {
    if alphabet_size == 0 {
        return Err(Error::InvalidInput(
            "alphabet size must be at least 1".to_string(),
        ));
    }

    let mut keys = Vec::new();
    let mut buf = vec![0u8; 64];
    let mut count = 0usize;

    loop {
        let mut dim_bytes = [0u8; 4];
        let mut filled = 0usize;
        while filled < 4 {
            let n = reader.read(&mut dim_bytes[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break; // clean EOF between records
        }
        if filled < 4 {
            return Err(Error::InvalidInput(
                "record stream truncated inside a dimension header".to_string(),
            ));
        }

        let dim = u32::from_le_bytes(dim_bytes) as usize;
        if dim < length as usize {
            return Err(Error::InvalidInput(format!(
                "record dimension {dim} is smaller than the key length {length}"
            )));
        }
        if buf.len() < dim {
            buf.resize(dim, 0);
        }
        reader.read_exact(&mut buf[..dim]).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::InvalidInput("record stream truncated inside a record".to_string())
            } else {
                Error::Io(e)
            }
        })?;

        keys.extend(
            buf[..length as usize]
                .iter()
                .map(|&b| u32::from(b) % alphabet_size),
        );
        count += 1;
    }

    Ok((keys, count))
}

/// Read every record from the file at `path`.
pub fn read_file<P: AsRef<Path>>(
    path: P,
    length: u32,
    alphabet_size: u32,
) -> Result<(Vec<u32>, usize)> {
    let file = File::open(path)?;
    read_records(BufReader::new(file), length, alphabet_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(symbols: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(symbols.len() as u32).to_le_bytes());
        out.extend_from_slice(symbols);
        out
    }

    #[test]
    fn test_reads_and_truncates_records() {
        let mut stream = record(&[1, 2, 3, 4]);
        stream.extend(record(&[9, 8, 7, 6, 5])); // excess symbols dropped

        let (keys, count) = read_records(Cursor::new(stream), 4, 256).unwrap();
        assert_eq!(count, 2);
        assert_eq!(keys, vec![1, 2, 3, 4, 9, 8, 7, 6]);
    }

    #[test]
    fn test_reduces_symbols_modulo_alphabet() {
        let stream = record(&[0, 3, 4, 255]);
        let (keys, _) = read_records(Cursor::new(stream), 4, 4).unwrap();
        assert_eq!(keys, vec![0, 3, 0, 3]);
    }

    #[test]
    fn test_empty_stream() {
        let (keys, count) = read_records(Cursor::new(Vec::new()), 4, 256).unwrap();
        assert!(keys.is_empty());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_rejects_short_record() {
        let stream = record(&[1, 2]);
        assert!(read_records(Cursor::new(stream), 4, 256).is_err());
    }

    #[test]
    fn test_rejects_truncated_header() {
        let stream = vec![4u8, 0];
        assert!(read_records(Cursor::new(stream), 2, 256).is_err());
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let mut stream = (4u32).to_le_bytes().to_vec();
        stream.extend_from_slice(&[1, 2]); // promises 4 symbols, delivers 2
        assert!(read_records(Cursor::new(stream), 4, 256).is_err());
    }
}
