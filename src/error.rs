use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Unrecognised or self-inconsistent container header.
    #[error("header error: {0}")]
    Header(String),

    /// Data format known but not storable (or not decodable) here.
    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer samples arrived than a known sample count promised.
    #[error("unexpected end of file: expected {expected} samples, got {found}")]
    UnexpectedEof { expected: u64, found: u64 },

    /// Malformed value in a text audio file.
    #[error("invalid text sample {0:?}")]
    Decode(String),

    /// Invalid caller-supplied parameters.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn header<S: Into<String>>(msg: S) -> Self {
        Error::Header(msg.into())
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::UnsupportedFormat(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Truncated header reads surface as header errors, not I/O errors.
    pub(crate) fn from_header_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::Header("header truncated".to_string())
            }
            _ => Error::Io(err),
        }
    }
}
