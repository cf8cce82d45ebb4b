//! Deterministic payloads for write probes and stress workers.
//!
//! Payloads are generated from a fixed seed, so the cost of producing them is identical across
//! runs and throughput numbers stay comparable.

use std::io;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Size of a payload block, which is also the unit of sequential writes.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Seed of the benchmark write probe.
pub const WRITE_PROBE_SEED: u64 = 42;

/// Seed of the single-block latency probe.
pub const LATENCY_PROBE_SEED: u64 = 4096;

/// Returns the seed for the stress worker with the given index.
pub fn worker_seed(worker: usize) -> u64 {
    (worker as u64).wrapping_mul(17).wrapping_add(42)
}

/// Generates `len` pseudo-random bytes from `seed`.
pub fn seeded_block(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut block = vec![0; len];
    rng.fill_bytes(&mut block);
    block
}

/// Writes `block` repeatedly until `total` bytes have been written.
///
/// The last write is truncated to hit `total` exactly. The writer is flushed before returning.
pub async fn write_repeated<W>(writer: &mut W, block: &[u8], total: u64) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    if block.is_empty() {
        return Ok(0);
    }

    let mut written = 0;
    while written < total {
        let len = (total - written).min(block.len() as u64) as usize;
        writer.write_all(&block[..len]).await?;
        written += len as u64;
    }

    writer.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_deterministic() {
        assert_eq!(seeded_block(7, 256), seeded_block(7, 256));
        assert_ne!(seeded_block(7, 256), seeded_block(8, 256));
        assert_ne!(worker_seed(0), worker_seed(1));
    }

    #[tokio::test]
    async fn writes_exact_total() {
        let block = seeded_block(WRITE_PROBE_SEED, 1000);
        let mut sink = Vec::new();

        let written = write_repeated(&mut sink, &block, 2500).await.unwrap();

        assert_eq!(written, 2500);
        assert_eq!(sink.len(), 2500);
        assert_eq!(&sink[..1000], &block[..]);
        assert_eq!(&sink[2000..], &block[..500]);
    }
}
