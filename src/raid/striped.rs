use tracing::debug;

use crate::device::{Block, BlockDevice};
use crate::error::Result;
use crate::raid::{Devices, Location, RAID};

/// Round-robin placement across every device, no redundancy.
pub struct Striped {
    devices: Devices,
}

impl Striped {
    pub(crate) fn new(devices: Devices) -> Self {
        Self { devices }
    }

    fn location(&self, block: u64) -> Location {
        let count = self.devices.len() as u64;
        Location::new((block % count) as usize, block / count)
    }
}

impl RAID for Striped {
    fn write(&self, block: u64, data: &Block) -> Result<()> {
        let loc = self.location(block);
        debug!(block, device = loc.device, physical = loc.block, "striped write");
        self.devices[loc.device].write_block(loc.block, data)
    }

    fn read(&self, block: u64) -> Result<Box<Block>> {
        let loc = self.location(block);
        self.devices[loc.device].read_block(loc.block)
    }

    fn locate(&self, block: u64) -> Result<Location> {
        Ok(self.location(block))
    }

    fn devices(&self) -> &[Box<dyn BlockDevice>] {
        &self.devices
    }
}
