use tracing::{debug, warn};

use crate::device::{Block, BlockDevice};
use crate::error::Result;
use crate::raid::{Devices, Location, RAID};

/// Every device holds a full copy. Reads are served by device 0 alone.
pub struct Mirrored {
    devices: Devices,
}

impl Mirrored {
    pub(crate) fn new(devices: Devices) -> Self {
        Self { devices }
    }
}

impl RAID for Mirrored {
    /// Writes the replicas in device order. A failure stops the loop, so
    /// earlier replicas keep the new data.
    fn write(&self, block: u64, data: &Block) -> Result<()> {
        debug!(block, replicas = self.devices.len(), "mirrored write");
        for (idx, device) in self.devices.iter().enumerate() {
            if let Err(err) = device.write_block(block, data) {
                warn!(block, device = idx, %err, "replica write failed");
                return Err(err);
            }
        }
        Ok(())
    }

    fn read(&self, block: u64) -> Result<Box<Block>> {
        self.devices[0].read_block(block)
    }

    fn locate(&self, block: u64) -> Result<Location> {
        Ok(Location::new(0, block))
    }

    fn devices(&self) -> &[Box<dyn BlockDevice>] {
        &self.devices
    }
}
