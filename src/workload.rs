//! Benchmark workload: fill an array with random blocks, then read them back.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::array::Array;
use crate::device::Block;
use crate::error::Result;
use crate::parity;
use crate::raid::Scheme;

pub fn generate<R: RngCore>(blocks: usize, rng: &mut R) -> Vec<Box<Block>> {
    (0..blocks)
        .map(|_| {
            let mut block = parity::zeros();
            rng.fill_bytes(&mut block[..]);
            block
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Report {
    pub scheme: Scheme,
    pub blocks: usize,
    pub write: Duration,
    pub read: Duration,
    /// Blocks whose read-back differed from what was written.
    pub mismatches: usize,
}

impl Report {
    fn per_block(&self, total: Duration) -> f64 {
        if self.blocks == 0 {
            return 0.0;
        }
        total.as_micros() as f64 / self.blocks as f64
    }

    pub fn write_us_per_block(&self) -> f64 {
        self.per_block(self.write)
    }

    pub fn read_us_per_block(&self) -> f64 {
        self.per_block(self.read)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Benchmarking {}:", self.scheme)?;
        writeln!(f, "Data length: {}", self.blocks)?;
        writeln!(
            f,
            "Write time: {:?} ({:.2} µs/block)",
            self.write,
            self.write_us_per_block()
        )?;
        write!(
            f,
            "Read time:  {:?} ({:.2} µs/block)",
            self.read,
            self.read_us_per_block()
        )?;
        if self.mismatches > 0 {
            write!(f, "\nMismatched blocks: {}", self.mismatches)?;
        }
        Ok(())
    }
}

/// Writes `payloads[i]` to logical block `i`, then reads every block back,
/// spreading the blocks over `workers` threads. The first I/O error aborts the
/// run.
pub fn run(array: &Array, payloads: &[Box<Block>], workers: usize) -> Result<Report> {
    let workers = workers.max(1);
    info!(scheme = %array.scheme(), blocks = payloads.len(), workers, "starting workload");

    let start = Instant::now();
    dispatch(workers, payloads.len(), |i| {
        array.write(i as u64, &payloads[i][..])?;
        Ok(true)
    })?;
    let write = start.elapsed();
    debug!(?write, "write phase done");

    let start = Instant::now();
    let matched = dispatch(workers, payloads.len(), |i| {
        Ok(array.read(i as u64)? == payloads[i])
    })?;
    let read = start.elapsed();
    debug!(?read, "read phase done");

    Ok(Report {
        scheme: array.scheme(),
        blocks: payloads.len(),
        write,
        read,
        mismatches: payloads.len() - matched,
    })
}

/// Feeds the indexes `0..count` to `workers` threads running `job` and
/// returns how many jobs reported `true`. The first failing job cancels the
/// rest: no worker starts another job and no further index is sent.
fn dispatch<F>(workers: usize, count: usize, job: F) -> Result<usize>
where
    F: Fn(usize) -> Result<bool> + Sync,
{
    let (sender, receiver) = bounded::<usize>(workers * 4);
    let cancelled = AtomicBool::new(false);
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let receiver = receiver.clone();
                let job = &job;
                let cancelled = &cancelled;
                s.spawn(move || -> Result<usize> {
                    let mut hits = 0;
                    for i in receiver {
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        match job(i) {
                            Ok(true) => hits += 1,
                            Ok(false) => {}
                            Err(err) => {
                                cancelled.store(true, Ordering::Release);
                                warn!(job = i, %err, "cancelling workload");
                                return Err(err);
                            }
                        }
                    }
                    Ok(hits)
                })
            })
            .collect();
        drop(receiver);

        for i in 0..count {
            // send fails once every worker has dropped its receiver
            if cancelled.load(Ordering::Acquire) || sender.send(i).is_err() {
                break;
            }
        }
        drop(sender);

        let mut total = 0;
        let mut first_err = None;
        for handle in handles {
            match handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            {
                Ok(hits) => total += hits,
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(total),
        }
    })
}
