use tracing::{debug, warn};

use crate::device::{Block, BlockDevice};
use crate::error::{Error, Result};
use crate::parity::Accumulator;
use crate::raid::stripe_lock::StripeLocks;
use crate::raid::{Devices, Location, RAID};

/// Placement of one logical block: the stripe it belongs to, the device
/// holding that stripe's parity and the device holding the block itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeSlot {
    pub stripe: u64,
    pub parity_device: usize,
    pub data_device: usize,
}

/// Striping with the parity block rotating across all devices, one step per
/// stripe.
pub struct RotatingParity {
    devices: Devices,
    locks: StripeLocks,
}

impl RotatingParity {
    pub(crate) fn new(devices: Devices, stripe_locks: usize) -> Self {
        Self {
            devices,
            locks: StripeLocks::new(stripe_locks),
        }
    }

    pub fn parity_device(&self, stripe: u64) -> usize {
        (stripe % self.devices.len() as u64) as usize
    }

    /// Resolves `block` to its slot. Data blocks take the non-parity devices
    /// in ascending order.
    pub fn slot(&self, block: u64) -> Result<StripeSlot> {
        let data_devices = (self.devices.len() - 1) as u64;
        let stripe = block / data_devices;
        let index_in_stripe = (block % data_devices) as usize;
        let parity_device = self.parity_device(stripe);

        let data_device = (0..self.devices.len())
            .filter(|&i| i != parity_device)
            .nth(index_in_stripe)
            .ok_or(Error::InvalidAddress(block))?;

        Ok(StripeSlot {
            stripe,
            parity_device,
            data_device,
        })
    }

    pub fn parity_location(&self, block: u64) -> Result<Location> {
        let slot = self.slot(block)?;
        Ok(Location::new(slot.parity_device, slot.stripe))
    }

    /// True when the parity block of `stripe` equals the XOR of the other
    /// blocks at that position.
    pub fn check_parity(&self, stripe: u64) -> Result<bool> {
        let _guard = self.locks.lock(stripe);
        let parity_device = self.parity_device(stripe);
        let mut acc = Accumulator::new();
        for (idx, device) in self.devices.iter().enumerate() {
            if idx != parity_device {
                let block = device.read_block(stripe)?;
                acc.absorb(&block);
            }
        }
        let parity = self.devices[parity_device].read_block(stripe)?;
        Ok(acc.finish() == parity)
    }

    fn write_stripe(&self, slot: StripeSlot, data: &Block) -> Result<()> {
        let StripeSlot {
            stripe,
            parity_device,
            data_device,
        } = slot;

        let _guard = self.locks.lock(stripe);
        let mut acc = Accumulator::new();
        for (idx, device) in self.devices.iter().enumerate() {
            if idx == parity_device || idx == data_device {
                continue;
            }
            match device.read_block(stripe) {
                Ok(sibling) => acc.absorb(&sibling),
                Err(err) => {
                    warn!(stripe, device = idx, %err, "sibling read failed, write aborted");
                    return Err(err);
                }
            }
        }
        acc.absorb(data);

        self.devices[data_device].write_block(stripe, data)?;
        self.devices[parity_device].write_block(stripe, &acc.finish()[..])
    }
}

impl RAID for RotatingParity {
    fn write(&self, block: u64, data: &Block) -> Result<()> {
        let slot = self.slot(block)?;
        debug!(
            block,
            stripe = slot.stripe,
            device = slot.data_device,
            parity = slot.parity_device,
            "rotating parity write"
        );
        self.write_stripe(slot, data)
    }

    fn read(&self, block: u64) -> Result<Box<Block>> {
        let slot = self.slot(block)?;
        self.devices[slot.data_device].read_block(slot.stripe)
    }

    fn locate(&self, block: u64) -> Result<Location> {
        let slot = self.slot(block)?;
        Ok(Location::new(slot.data_device, slot.stripe))
    }

    fn devices(&self) -> &[Box<dyn BlockDevice>] {
        &self.devices
    }
}
