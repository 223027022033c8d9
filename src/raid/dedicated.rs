use tracing::{debug, warn};

use crate::device::{Block, BlockDevice};
use crate::error::Result;
use crate::parity::Accumulator;
use crate::raid::stripe_lock::StripeLocks;
use crate::raid::{Devices, Location, RAID};

/// Striping over the first `n - 1` devices with all parity on the last one.
pub struct DedicatedParity {
    devices: Devices,
    locks: StripeLocks,
}

impl DedicatedParity {
    pub(crate) fn new(devices: Devices, stripe_locks: usize) -> Self {
        Self {
            devices,
            locks: StripeLocks::new(stripe_locks),
        }
    }

    fn data_devices(&self) -> usize {
        self.devices.len() - 1
    }

    fn parity_device(&self) -> usize {
        self.devices.len() - 1
    }

    fn location(&self, block: u64) -> Location {
        let data_devices = self.data_devices() as u64;
        Location::new((block % data_devices) as usize, block / data_devices)
    }

    pub fn parity_location(&self, block: u64) -> Location {
        Location::new(self.parity_device(), self.location(block).block)
    }

    /// True when the parity block at `stripe` equals the XOR of the data
    /// blocks at the same position.
    pub fn check_parity(&self, stripe: u64) -> Result<bool> {
        let _guard = self.locks.lock(stripe);
        let mut acc = Accumulator::new();
        for device in &self.devices[..self.data_devices()] {
            let block = device.read_block(stripe)?;
            acc.absorb(&block);
        }
        let parity = self.devices[self.parity_device()].read_block(stripe)?;
        Ok(acc.finish() == parity)
    }
}

impl RAID for DedicatedParity {
    fn write(&self, block: u64, data: &Block) -> Result<()> {
        let loc = self.location(block);
        debug!(
            block,
            device = loc.device,
            physical = loc.block,
            parity = self.parity_device(),
            "dedicated parity write"
        );

        let _guard = self.locks.lock(loc.block);
        let mut acc = Accumulator::new();
        for (idx, device) in self.devices[..self.data_devices()].iter().enumerate() {
            if idx == loc.device {
                continue;
            }
            match device.read_block(loc.block) {
                Ok(sibling) => acc.absorb(&sibling),
                Err(err) => {
                    warn!(block, device = idx, %err, "sibling read failed, write aborted");
                    return Err(err);
                }
            }
        }
        acc.absorb(data);

        self.devices[loc.device].write_block(loc.block, data)?;
        self.devices[self.parity_device()].write_block(loc.block, &acc.finish()[..])
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BLOCK_SIZE;
    use crate::error::Error;
    use crate::parity;
    use crate::raid::testing::{memory_devices, FailingDisk};

    #[test]
    fn translation() {
        let raid = DedicatedParity::new(memory_devices(4, 8), 4);
        assert_eq!(raid.locate(0).unwrap(), Location::new(0, 0));
        assert_eq!(raid.locate(4).unwrap(), Location::new(1, 1));
        assert_eq!(raid.locate(8).unwrap(), Location::new(2, 2));
        assert_eq!(raid.parity_location(8), Location::new(3, 2));
    }

    #[test]
    fn parity_tracks_every_write() {
        let raid = DedicatedParity::new(memory_devices(4, 4), 4);
        let blocks: Vec<_> = (0..3u8)
            .map(|k| parity::from_fn(|i| (i as u8).wrapping_add(k * 40)))
            .collect();
        // logical 3, 4, 5 fill stripe 1
        for (k, data) in blocks.iter().enumerate() {
            raid.write(3 + k as u64, data).unwrap();
            assert!(raid.check_parity(1).unwrap());
        }
        let expected = parity::from_fn(|i| blocks.iter().fold(0, |p, b| p ^ b[i]));
        assert_eq!(raid.devices()[3].read_block(1).unwrap(), expected);

        for (k, data) in blocks.iter().enumerate() {
            assert_eq!(&raid.read(3 + k as u64).unwrap(), data);
        }
    }

    #[test]
    fn overwrite_keeps_parity() {
        let raid = DedicatedParity::new(memory_devices(3, 2), 1);
        raid.write(0, &[1; BLOCK_SIZE]).unwrap();
        raid.write(1, &[2; BLOCK_SIZE]).unwrap();
        raid.write(0, &[4; BLOCK_SIZE]).unwrap();
        assert_eq!(raid.devices()[2].read_block(0).unwrap()[..], [6; BLOCK_SIZE][..]);
        assert!(raid.check_parity(0).unwrap());
    }

    #[test]
    fn check_parity_spots_corrupted_data() {
        let raid = DedicatedParity::new(memory_devices(4, 2), 1);
        for n in 0..6 {
            raid.write(n, &[n as u8 + 1; BLOCK_SIZE]).unwrap();
        }
        assert!(raid.check_parity(0).unwrap());
        assert!(raid.check_parity(1).unwrap());
        // bypass the engine so parity goes stale
        raid.devices()[1].write_block(1, &[0xFF; BLOCK_SIZE]).unwrap();
        assert!(!raid.check_parity(1).unwrap());
        assert!(raid.check_parity(0).unwrap());
    }

    #[test]
    fn failed_sibling_read_changes_nothing() {
        let mut devices = memory_devices(3, 2);
        devices[1] = Box::new(FailingDisk::new(2));
        let raid = DedicatedParity::new(devices, 1);
        assert!(matches!(
            raid.write(0, &[3; BLOCK_SIZE]),
            Err(Error::Io { .. })
        ));
        assert_eq!(raid.devices()[0].read_block(0).unwrap(), parity::zeros());
        assert_eq!(raid.devices()[2].read_block(0).unwrap(), parity::zeros());
    }
}
