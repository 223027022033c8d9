pub mod array;
pub mod config;
pub mod device;
pub mod error;
pub mod parity;
pub mod raid;
pub mod workload;

pub use array::Array;
pub use config::{ArrayConfig, ConfigError};
pub use device::{Block, BlockDevice, Disk, MemoryDisk, BLOCK_SIZE};
pub use error::{Error, Result};
pub use raid::{Location, Scheme};
