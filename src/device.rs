//! Physical block devices.
//!
//! A device is a flat run of `BLOCK_SIZE` blocks with no header: block `i`
//! lives at byte offset `i * BLOCK_SIZE`. Every device serializes its own I/O
//! behind a mutex, so concurrent callers never observe a half-written block.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, trace};

use crate::error::{Error, Result};
use crate::parity;

pub const BLOCK_SIZE: usize = 4096;

pub type Block = [u8; BLOCK_SIZE];

pub trait BlockDevice: Send + Sync {
    /// Human readable name used in errors and logs.
    fn name(&self) -> &str;

    /// Number of addressable blocks.
    fn block_count(&self) -> u64;

    fn read_block(&self, block: u64) -> Result<Box<Block>>;

    /// Writes exactly one block. Returns once the data is durable.
    fn write_block(&self, block: u64, data: &[u8]) -> Result<()>;
}

fn check_range(block: u64, limit: u64) -> Result<()> {
    if block >= limit {
        return Err(Error::OutOfRange { block, limit });
    }
    Ok(())
}

/// A device backed by a regular file.
#[derive(Debug)]
pub struct Disk {
    name: String,
    blocks: u64,
    file: Mutex<File>,
}

impl Disk {
    /// Opens (or creates) the file at `path` and makes sure it spans `blocks`
    /// blocks. Growing the file leaves a hole, so unwritten blocks read as
    /// zeroes.
    pub fn open(path: impl AsRef<Path>, blocks: u64) -> Result<Self> {
        Self::with_options(path.as_ref(), blocks, false)
    }

    /// Creates the file at `path`, discarding anything it held before.
    pub fn create(path: impl AsRef<Path>, blocks: u64) -> Result<Self> {
        Self::with_options(path.as_ref(), blocks, true)
    }

    fn with_options(path: &Path, blocks: u64, truncate: bool) -> Result<Self> {
        let name = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)
            .map_err(|e| Error::io(&name, e))?;

        let size = blocks * BLOCK_SIZE as u64;
        let current = file.metadata().map_err(|e| Error::io(&name, e))?.len();
        if current < size {
            file.set_len(size).map_err(|e| Error::io(&name, e))?;
        }
        info!(device = %name, blocks, truncate, "opened disk");

        Ok(Self {
            name,
            blocks,
            file: Mutex::new(file),
        })
    }

    /// Opens `count` disks named `device{i}.img` inside `dir`.
    pub fn open_all(dir: impl AsRef<Path>, count: usize, blocks: u64) -> Result<Vec<Self>> {
        Self::all_in(dir.as_ref(), count, blocks, Self::open)
    }

    /// Creates `count` empty disks named `device{i}.img` inside `dir`.
    pub fn create_all(dir: impl AsRef<Path>, count: usize, blocks: u64) -> Result<Vec<Self>> {
        Self::all_in(dir.as_ref(), count, blocks, Self::create)
    }

    fn all_in(
        dir: &Path,
        count: usize,
        blocks: u64,
        disk: fn(PathBuf, u64) -> Result<Self>,
    ) -> Result<Vec<Self>> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(&dir.display().to_string(), e))?;
        (0..count)
            .map(|i| disk(Self::path_in(dir, i), blocks))
            .collect()
    }

    pub fn path_in(dir: &Path, idx: usize) -> PathBuf {
        dir.join(format!("device{idx}.img"))
    }
}

impl BlockDevice for Disk {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_count(&self) -> u64 {
        self.blocks
    }

    fn read_block(&self, block: u64) -> Result<Box<Block>> {
        check_range(block, self.blocks)?;
        let mut buf = parity::zeros();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))
            .and_then(|_| file.read_exact(&mut buf[..]))
            .map_err(|e| Error::io(&self.name, e))?;
        trace!(device = %self.name, block, "read block");
        Ok(buf)
    }

    fn write_block(&self, block: u64, data: &[u8]) -> Result<()> {
        let data = parity::as_block(data)?;
        check_range(block, self.blocks)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))
            .and_then(|_| file.write_all(data))
            .and_then(|_| file.sync_data())
            .map_err(|e| Error::io(&self.name, e))?;
        trace!(device = %self.name, block, "wrote block");
        Ok(())
    }
}

/// A device held entirely in memory.
#[derive(Debug)]
pub struct MemoryDisk {
    name: String,
    blocks: u64,
    data: Mutex<Vec<u8>>,
}

impl MemoryDisk {
    pub fn new(name: impl Into<String>, blocks: u64) -> Self {
        Self {
            name: name.into(),
            blocks,
            data: Mutex::new(vec![0u8; blocks as usize * BLOCK_SIZE]),
        }
    }

    fn range(&self, block: u64) -> Result<std::ops::Range<usize>> {
        check_range(block, self.blocks)?;
        let start = block as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for MemoryDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_count(&self) -> u64 {
        self.blocks
    }

    fn read_block(&self, block: u64) -> Result<Box<Block>> {
        let range = self.range(block)?;
        let mut buf = parity::zeros();
        buf.copy_from_slice(&self.data.lock()[range]);
        Ok(buf)
    }

    fn write_block(&self, block: u64, data: &[u8]) -> Result<()> {
        let data = parity::as_block(data)?;
        let range = self.range(block)?;
        self.data.lock()[range].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn disk_round_trip() {
        let dir = TempDir::new().unwrap();
        let disk = Disk::open(dir.path().join("d.img"), 8).unwrap();
        let data = parity::from_fn(|i| (i % 13) as u8);
        disk.write_block(5, &data[..]).unwrap();
        assert_eq!(disk.read_block(5).unwrap(), data);
        assert_eq!(disk.read_block(4).unwrap(), parity::zeros());
    }

    #[test]
    fn disk_uses_flat_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.img");
        let disk = Disk::open(&path, 4).unwrap();
        disk.write_block(2, &[0xAB; BLOCK_SIZE]).unwrap();
        drop(disk);

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 4 * BLOCK_SIZE);
        assert!(raw[..2 * BLOCK_SIZE].iter().all(|&b| b == 0));
        assert!(raw[2 * BLOCK_SIZE..3 * BLOCK_SIZE].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn disk_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.img");
        Disk::open(&path, 4)
            .unwrap()
            .write_block(3, &[7; BLOCK_SIZE])
            .unwrap();
        let disk = Disk::open(&path, 4).unwrap();
        assert_eq!(disk.read_block(3).unwrap()[..], [7; BLOCK_SIZE][..]);
    }

    #[test]
    fn create_discards_old_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.img");
        Disk::open(&path, 8)
            .unwrap()
            .write_block(6, &[9; BLOCK_SIZE])
            .unwrap();
        let disk = Disk::create(&path, 4).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 * BLOCK_SIZE as u64);
        for block in 0..4 {
            assert_eq!(disk.read_block(block).unwrap(), parity::zeros());
        }

        let disks = Disk::create_all(dir.path(), 2, 2).unwrap();
        assert_eq!(disks.len(), 2);
        assert!(Disk::path_in(dir.path(), 1).exists());
    }

    #[test]
    fn rejects_wrong_size() {
        let dir = TempDir::new().unwrap();
        let disk = Disk::open(dir.path().join("d.img"), 2).unwrap();
        assert!(matches!(
            disk.write_block(0, &[1; 10]),
            Err(Error::SizeMismatch { actual: 10, .. })
        ));
        assert_eq!(disk.read_block(0).unwrap(), parity::zeros());

        let mem = MemoryDisk::new("m", 2);
        assert!(matches!(
            mem.write_block(0, &[1; BLOCK_SIZE + 1]),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range() {
        let mem = MemoryDisk::new("m", 2);
        assert!(matches!(
            mem.read_block(2),
            Err(Error::OutOfRange { block: 2, limit: 2 })
        ));
        let dir = TempDir::new().unwrap();
        let disk = Disk::open(dir.path().join("d.img"), 2).unwrap();
        assert!(matches!(
            disk.write_block(9, &[0; BLOCK_SIZE]),
            Err(Error::OutOfRange { block: 9, limit: 2 })
        ));
    }

    #[test]
    fn concurrent_writes_never_tear() {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(Disk::open(dir.path().join("d.img"), 1).unwrap());
        let handles: Vec<_> = (1..=8u8)
            .map(|fill| {
                let disk = disk.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        disk.write_block(0, &[fill; BLOCK_SIZE]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let block = disk.read_block(0).unwrap();
        assert!((1..=8).contains(&block[0]));
        assert!(block.iter().all(|&b| b == block[0]));
    }
}
