use std::io::Error as IoError;

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be opened or read at the OS level.
    #[error(display = "IO Error: {}", cause)]
    Io { cause: IoError },
    /// The input is not an MPQ archive, or its structure is damaged:
    /// bad magic, truncated tables, offsets outside the input.
    #[error(display = "Invalid or corrupted archive")]
    InvalidArchive,
    /// The archive is well-formed but the file's storage needs a feature
    /// this decoder does not implement.
    #[error(display = "Not implemented: {}", feature)]
    NotImplemented { feature: &'static str },
    /// A sector declares a compression codec this decoder cannot inflate.
    #[error(display = "Compression type unsupported: {}", kind)]
    UnsupportedCompression { kind: String },
}

impl From<IoError> for Error {
    fn from(other: IoError) -> Self {
        Error::Io { cause: other }
    }
}
