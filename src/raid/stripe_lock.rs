use parking_lot::{Mutex, MutexGuard};

pub const DEFAULT_STRIPE_LOCKS: usize = 64;

/// Fixed table of mutexes covering redundancy groups.
///
/// A parity write holds the shard for its stripe from the first sibling read
/// until the parity block is written, so two writers in the same group can
/// not interleave their read and write phases. Unrelated stripes may share a
/// shard; that only costs concurrency.
pub struct StripeLocks {
    shards: Vec<Mutex<()>>,
}

impl StripeLocks {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn lock(&self, stripe: u64) -> MutexGuard<'_, ()> {
        let idx = (stripe % self.shards.len() as u64) as usize;
        self.shards[idx].lock()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for StripeLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPE_LOCKS)
    }
}
