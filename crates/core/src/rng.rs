//! Deterministic random-stream derivation.
//!
//! The sampling and propagation stages are parallel across realizations,
//! so random state must never be shared: each realization gets its own
//! `StdRng` seeded from the master seed and its index. Substreams are
//! derived by hashing `(master_seed, substream_id)` with SipHash-1-3
//! using fixed zero keys, a rule that is stable across platforms and
//! independent of the worker count.

use rand::rngs::StdRng;
use rand::SeedableRng;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Derives the deterministic seed for a specific substream.
pub fn substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// RNG for realization `index` under `master_seed`.
pub fn realization_rng(master_seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(substream_seed(master_seed, index as u64))
}

/// RNG for a per-cell substream under `master_seed`.
///
/// Cell substreams live in their own branch of the seed tree so they can
/// never collide with realization substreams.
pub fn cell_rng(master_seed: u64, cell: usize) -> StdRng {
    let branch = substream_seed(master_seed, u64::MAX);
    StdRng::seed_from_u64(substream_seed(branch, cell as u64))
}
