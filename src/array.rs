use tracing::info;

use crate::config::ArrayConfig;
use crate::device::{Block, BlockDevice, Disk, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::parity;
use crate::raid::stripe_lock::DEFAULT_STRIPE_LOCKS;
use crate::raid::{Devices, Engine, Location, Scheme, RAID};

/// A logical block device built from a fixed set of member devices.
///
/// The array owns its members for its whole lifetime. All methods take
/// `&self`, so an `Arc<Array>` can be shared between threads.
pub struct Array {
    engine: Engine,
    device_blocks: u64,
}

impl Array {
    pub fn new(devices: Devices, scheme: Scheme) -> Result<Self> {
        Self::with_stripe_locks(devices, scheme, DEFAULT_STRIPE_LOCKS)
    }

    pub fn with_stripe_locks(
        devices: Devices,
        scheme: Scheme,
        stripe_locks: usize,
    ) -> Result<Self> {
        let engine = Engine::new(scheme, devices, stripe_locks)?;
        let devices = engine.devices();
        let device_blocks = devices
            .iter()
            .map(|d| d.block_count())
            .min()
            .unwrap_or_default();
        info!(
            %scheme,
            devices = devices.len(),
            device_blocks,
            capacity = scheme.capacity(devices.len(), device_blocks),
            "assembled array"
        );

        Ok(Self {
            engine,
            device_blocks,
        })
    }

    /// Opens the file-backed array described by `config`, keeping whatever
    /// the device files already hold.
    pub fn open(config: &ArrayConfig) -> Result<Self> {
        Self::from_config(config, false)
    }

    /// Like [`Array::open`], but every device file starts out zeroed.
    pub fn create(config: &ArrayConfig) -> Result<Self> {
        Self::from_config(config, true)
    }

    fn from_config(config: &ArrayConfig, fresh: bool) -> Result<Self> {
        // too few devices is a construction error, not a config file error
        config.scheme.check_devices(config.devices)?;
        config.validate()?;
        let disks = if fresh {
            Disk::create_all(&config.data_dir, config.devices, config.device_blocks)?
        } else {
            Disk::open_all(&config.data_dir, config.devices, config.device_blocks)?
        };
        let devices = disks
            .into_iter()
            .map(|d| Box::new(d) as Box<dyn BlockDevice>)
            .collect();
        Self::with_stripe_locks(devices, config.scheme, config.stripe_locks)
    }

    pub fn write(&self, block: u64, data: &[u8]) -> Result<()> {
        let data = parity::as_block(data)?;
        self.check_range(block)?;
        self.engine.write(block, data)
    }

    pub fn read(&self, block: u64) -> Result<Box<Block>> {
        self.check_range(block)?;
        self.engine.read(block)
    }

    fn check_range(&self, block: u64) -> Result<()> {
        let limit = self.capacity_blocks();
        if block >= limit {
            return Err(Error::OutOfRange { block, limit });
        }
        Ok(())
    }

    pub fn scheme(&self) -> Scheme {
        self.engine.scheme()
    }

    pub fn device_count(&self) -> usize {
        self.engine.devices().len()
    }

    pub fn device(&self, idx: usize) -> Option<&dyn BlockDevice> {
        self.engine.devices().get(idx).map(|d| d.as_ref())
    }

    /// Blocks per member device; the smallest member decides.
    pub fn device_blocks(&self) -> u64 {
        self.device_blocks
    }

    pub fn capacity_blocks(&self) -> u64 {
        self.scheme().capacity(self.device_count(), self.device_blocks)
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_blocks() * BLOCK_SIZE as u64
    }

    pub fn locate(&self, block: u64) -> Result<Location> {
        self.check_range(block)?;
        self.engine.locate(block)
    }

    /// See [`Engine::check_parity`].
    pub fn check_parity(&self, stripe: u64) -> Result<bool> {
        if stripe >= self.device_blocks {
            return Err(Error::OutOfRange {
                block: stripe,
                limit: self.device_blocks,
            });
        }
        self.engine.check_parity(stripe)
    }
}
