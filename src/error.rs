use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block must be exactly {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("I/O error on device {device}: {source}")]
    Io {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("block {block} is out of range (limit {limit})")]
    OutOfRange { block: u64, limit: u64 },

    /// The translator could not place a logical block. Never expected for a
    /// correctly sized array.
    #[error("no physical location for logical block {0}")]
    InvalidAddress(u64),

    #[error("invalid array configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn io(device: &str, source: std::io::Error) -> Self {
        Error::Io {
            device: device.to_string(),
            source,
        }
    }
}
