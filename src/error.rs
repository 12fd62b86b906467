//! Error types for index construction and search.

use thiserror::Error;

/// Error variants for index operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key length exceeds the 64-position limit of the vertical layout.
    #[error("key length {0} is not supported (must be 1..=64)")]
    UnsupportedLength(u32),

    /// Alphabet size leaves no room for the deletion marker, or is degenerate.
    #[error("alphabet size {0} is not supported (must be 2..=u32::MAX-1)")]
    AlphabetSize(u32),

    /// A key contains a symbol outside the declared alphabet.
    #[error("key symbol {symbol} is outside the alphabet [0, {alphabet_size})")]
    SymbolOutOfRange {
        /// The offending symbol value.
        symbol: u32,
        /// The alphabet size the index was built with.
        alphabet_size: u32,
    },

    /// A search radius that does not match the index's bucket count.
    #[error("radius {range} needs {proper} buckets, index was built with {buckets}")]
    RadiusMismatch {
        /// The requested Hamming radius.
        range: u32,
        /// The bucket count of the index.
        buckets: u32,
        /// The bucket count the radius requires.
        proper: u32,
    },

    /// An open-addressed probe visited every slot without finding a vacancy.
    #[error("signature table is corrupt: probe found no vacant slot")]
    TableCorrupt,

    /// Malformed caller input (key buffer shape, record stream, range string).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A byte stream that does not decode to a valid structure.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An I/O error occurred while reading records.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for index operations.
pub type Result<T> = std::result::Result<T, Error>;
