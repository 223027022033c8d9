use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::device::{Block, BlockDevice};
use crate::error::{Error, Result};

pub mod dedicated;
pub mod mirrored;
pub mod rotating;
pub mod stripe_lock;
pub mod striped;

pub use dedicated::DedicatedParity;
pub use mirrored::Mirrored;
pub use rotating::RotatingParity;
pub use striped::Striped;

pub type Devices = Vec<Box<dyn BlockDevice>>;

/// Where a logical block physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub device: usize,
    pub block: u64,
}

impl Location {
    pub fn new(device: usize, block: u64) -> Self {
        Self { device, block }
    }
}

pub trait RAID {
    fn write(&self, block: u64, data: &Block) -> Result<()>;
    fn read(&self, block: u64) -> Result<Box<Block>>;
    /// The physical location a read of `block` is served from.
    fn locate(&self, block: u64) -> Result<Location>;
    fn devices(&self) -> &[Box<dyn BlockDevice>];
}

/// Redundancy scheme selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    /// RAID 0
    #[value(alias = "raid0")]
    #[serde(alias = "raid0")]
    Striped,
    /// RAID 1
    #[value(alias = "raid1")]
    #[serde(alias = "raid1")]
    Mirrored,
    /// RAID 4
    #[value(alias = "raid4")]
    #[serde(alias = "raid4")]
    DedicatedParity,
    /// RAID 5
    #[value(alias = "raid5")]
    #[serde(alias = "raid5")]
    RotatingParity,
}

impl Scheme {
    pub const ALL: [Scheme; 4] = [
        Scheme::Striped,
        Scheme::Mirrored,
        Scheme::DedicatedParity,
        Scheme::RotatingParity,
    ];

    pub fn min_devices(self) -> usize {
        match self {
            Scheme::Striped | Scheme::Mirrored => 2,
            Scheme::DedicatedParity | Scheme::RotatingParity => 3,
        }
    }

    /// Fails with [`Error::Configuration`] when `count` devices are too few
    /// for this scheme.
    pub fn check_devices(self, count: usize) -> Result<()> {
        if count < self.min_devices() {
            return Err(Error::Configuration(format!(
                "{self} needs at least {} devices, got {count}",
                self.min_devices()
            )));
        }
        Ok(())
    }

    pub fn name(self) -> &'static str {
        match self {
            Scheme::Striped => "RAID 0",
            Scheme::Mirrored => "RAID 1",
            Scheme::DedicatedParity => "RAID 4",
            Scheme::RotatingParity => "RAID 5",
        }
    }

    /// Logical blocks exposed by `device_count` devices of `device_blocks`
    /// blocks each.
    pub fn capacity(self, device_count: usize, device_blocks: u64) -> u64 {
        match self {
            Scheme::Striped => device_count as u64 * device_blocks,
            Scheme::Mirrored => device_blocks,
            Scheme::DedicatedParity | Scheme::RotatingParity => {
                device_count.saturating_sub(1) as u64 * device_blocks
            }
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The four engines behind one interface.
pub enum Engine {
    Striped(Striped),
    Mirrored(Mirrored),
    DedicatedParity(DedicatedParity),
    RotatingParity(RotatingParity),
}

impl Engine {
    pub(crate) fn new(scheme: Scheme, devices: Devices, stripe_locks: usize) -> Result<Self> {
        scheme.check_devices(devices.len())?;
        Ok(match scheme {
            Scheme::Striped => Engine::Striped(Striped::new(devices)),
            Scheme::Mirrored => Engine::Mirrored(Mirrored::new(devices)),
            Scheme::DedicatedParity => {
                Engine::DedicatedParity(DedicatedParity::new(devices, stripe_locks))
            }
            Scheme::RotatingParity => {
                Engine::RotatingParity(RotatingParity::new(devices, stripe_locks))
            }
        })
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Engine::Striped(_) => Scheme::Striped,
            Engine::Mirrored(_) => Scheme::Mirrored,
            Engine::DedicatedParity(_) => Scheme::DedicatedParity,
            Engine::RotatingParity(_) => Scheme::RotatingParity,
        }
    }

    fn inner(&self) -> &dyn RAID {
        match self {
            Engine::Striped(r) => r,
            Engine::Mirrored(r) => r,
            Engine::DedicatedParity(r) => r,
            Engine::RotatingParity(r) => r,
        }
    }

    /// Checks the XOR invariant of the redundancy group stored at physical
    /// block `stripe`. Schemes without parity trivially pass.
    pub fn check_parity(&self, stripe: u64) -> Result<bool> {
        match self {
            Engine::DedicatedParity(r) => r.check_parity(stripe),
            Engine::RotatingParity(r) => r.check_parity(stripe),
            Engine::Striped(_) | Engine::Mirrored(_) => Ok(true),
        }
    }
}

impl RAID for Engine {
    fn write(&self, block: u64, data: &Block) -> Result<()> {
        self.inner().write(block, data)
    }

    fn read(&self, block: u64) -> Result<Box<Block>> {
        self.inner().read(block)
    }

    fn locate(&self, block: u64) -> Result<Location> {
        self.inner().locate(block)
    }

    fn devices(&self) -> &[Box<dyn BlockDevice>] {
        self.inner().devices()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Devices;
    use crate::device::{Block, BlockDevice, MemoryDisk};
    use crate::error::{Error, Result};

    pub fn memory_devices(count: usize, blocks: u64) -> Devices {
        (0..count)
            .map(|i| Box::new(MemoryDisk::new(format!("mem{i}"), blocks)) as Box<dyn BlockDevice>)
            .collect()
    }

    /// A device whose every operation fails.
    pub struct FailingDisk {
        blocks: u64,
    }

    impl FailingDisk {
        pub fn new(blocks: u64) -> Self {
            Self { blocks }
        }

        fn fail(&self) -> Error {
            Error::io(
                "failing",
                std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
            )
        }
    }

    impl BlockDevice for FailingDisk {
        fn name(&self) -> &str {
            "failing"
        }

        fn block_count(&self) -> u64 {
            self.blocks
        }

        fn read_block(&self, _block: u64) -> Result<Box<Block>> {
            Err(self.fail())
        }

        fn write_block(&self, _block: u64, _data: &[u8]) -> Result<()> {
            Err(self.fail())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_per_scheme() {
        assert_eq!(Scheme::Striped.capacity(5, 100), 500);
        assert_eq!(Scheme::Mirrored.capacity(5, 100), 100);
        assert_eq!(Scheme::DedicatedParity.capacity(5, 100), 400);
        assert_eq!(Scheme::RotatingParity.capacity(5, 100), 400);
    }

    #[test]
    fn minimum_devices() {
        assert_eq!(Scheme::Striped.min_devices(), 2);
        assert_eq!(Scheme::Mirrored.min_devices(), 2);
        assert_eq!(Scheme::DedicatedParity.min_devices(), 3);
        assert_eq!(Scheme::RotatingParity.min_devices(), 3);
    }

    #[test]
    fn scheme_names_on_the_command_line() {
        use clap::ValueEnum;
        assert_eq!(Scheme::from_str("raid5", true), Ok(Scheme::RotatingParity));
        assert_eq!(
            Scheme::from_str("Dedicated-Parity", true),
            Ok(Scheme::DedicatedParity)
        );
        assert_eq!(Scheme::from_str("striped", false), Ok(Scheme::Striped));
        assert!(Scheme::from_str("raid6", true).is_err());
    }

    #[test]
    fn engine_refuses_too_few_devices() {
        for scheme in Scheme::ALL {
            for count in 0..scheme.min_devices() {
                assert!(matches!(
                    Engine::new(scheme, testing::memory_devices(count, 4), 4),
                    Err(Error::Configuration(_))
                ));
            }
            let engine = Engine::new(scheme, testing::memory_devices(scheme.min_devices(), 4), 4);
            assert_eq!(engine.unwrap().scheme(), scheme);
        }
        assert!(Scheme::RotatingParity.check_devices(3).is_ok());
        assert!(Scheme::Mirrored.check_devices(1).is_err());
    }
}
