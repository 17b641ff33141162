use std::sync::{
    Mutex, OnceLock,
    atomic::{AtomicUsize, Ordering},
};

use cached::{Cached, UnboundCache};
use log::debug;
use num::{BigInt, BigUint, One, Zero};

use crate::{arb::Arb, arf::Arf, mag::Mag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A constant held by a [`ConstantCache`].
pub enum ConstantId {
    /// The natural logarithm of 2.
    Log2,

    /// The natural logarithm of 3.
    Log3,
}

#[derive(Debug, Clone)]
struct CachedConstant {
    prec: u64,
    value: Arb,
}

/// A thread-safe memo of mathematical constants.
///
/// # Remarks
/// Each constant is stored at the highest precision requested so far.
/// Requests at or below that precision reuse the stored ball; a higher
/// request recomputes under the lock, so concurrent callers never compute the
/// same precision tier twice.
///
/// The engine takes the cache as an explicit collaborator. Callers that don't
/// care share [`ConstantCache::global`].
pub struct ConstantCache {
    entries: Mutex<UnboundCache<ConstantId, CachedConstant>>,
    computations: AtomicUsize,
}

impl Default for ConstantCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_CACHE: OnceLock<ConstantCache> = OnceLock::new();

impl ConstantCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(UnboundCache::new()),
            computations: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static Self {
        GLOBAL_CACHE.get_or_init(Self::new)
    }

    /// A ball containing the constant, accurate to about `prec` bits.
    pub fn get(&self, id: ConstantId, prec: u64) -> Arb {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let old_prec = match entries.cache_get(&id) {
            Some(c) if c.prec >= prec => return c.value.set_round(prec),
            Some(c) => c.prec,
            None => 0,
        };

        let target = (prec + 64).next_multiple_of(64).max(old_prec + old_prec / 4);

        debug!("computing {id:?} to {target} bits");

        let value = match id {
            ConstantId::Log2 => log2_series(target),
            ConstantId::Log3 => log3_series(target),
        };

        self.computations.fetch_add(1, Ordering::Relaxed);

        let ret = value.set_round(prec);

        entries.cache_set(
            id,
            CachedConstant {
                prec: target,
                value,
            },
        );

        ret
    }

    /// `log(2)` to `prec` bits.
    pub fn log2(&self, prec: u64) -> Arb {
        self.get(ConstantId::Log2, prec)
    }

    /// `log(3)` to `prec` bits.
    pub fn log3(&self, prec: u64) -> Arb {
        self.get(ConstantId::Log3, prec)
    }

    /// The precision at which `id` is currently stored.
    pub fn cached_prec(&self, id: ConstantId) -> Option<u64> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries.cache_get(&id).map(|c| c.prec)
    }

    /// How many series evaluations this cache has performed.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}

/// `2 * atanh(1/k)` to `p` fractional bits as a ball.
///
/// # Remarks
/// The terms `floor(2^p / k^(2j+1)) / (2j+1)` are summed exactly in fixed
/// point. Each term loses less than 2 units and the omitted tail is below 2
/// units, so with `K` terms the sum `S` satisfies
/// `S <= atanh(1/k) 2^p <= S + 2K + 2`.
fn twice_atanh_inv(k: u64, p: u64) -> Arb {
    let k2 = BigUint::from(k * k);
    let mut pow = (BigUint::one() << p) / BigUint::from(k);
    let mut sum = BigUint::zero();
    let mut terms = 0u64;

    while !pow.is_zero() {
        sum += &pow / BigUint::from(2 * terms + 1);
        pow /= &k2;
        terms += 1;
    }

    let err = 2 * terms + 2;
    let mid = (sum << 1u32) + BigUint::from(err);
    let scale = -BigInt::from(p);

    Arb::new(
        Arf::from_int_2exp(&BigInt::from(mid), &scale),
        Mag::from_u64_2exp(err, &scale),
    )
}

fn log2_series(prec: u64) -> Arb {
    // log(2) = 2 atanh(1/3)
    twice_atanh_inv(3, prec + 16)
}

fn log3_series(prec: u64) -> Arb {
    // log(3) = log(2) + 2 atanh(1/5)
    log2_series(prec).add(&twice_atanh_inv(5, prec + 16), prec + 16)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn log2_is_accurate() {
        let cache = ConstantCache::new();
        let ln2 = cache.log2(200);

        assert_eq!(ln2.mid().to_f64(), std::f64::consts::LN_2);
        assert!(ln2.rel_accuracy_bits() >= 195);
    }

    #[test]
    fn log3_is_accurate() {
        let cache = ConstantCache::new();
        let ln3 = cache.log3(300);

        assert_eq!(ln3.mid().to_f64(), 3f64.ln());
        assert!(ln3.rel_accuracy_bits() >= 295);
    }

    #[test]
    fn precisions_are_consistent() {
        let cache = ConstantCache::new();
        let lo = cache.log2(64);
        let hi = cache.log2(2000);

        assert!(lo.overlaps(&hi));
        assert!(lo.rad() > hi.rad());
    }

    #[test]
    fn cache_reuses_stored_precision() {
        let cache = ConstantCache::new();

        cache.log2(1000);
        assert_eq!(cache.computations(), 1);

        cache.log2(500);
        cache.log2(1000);
        assert_eq!(cache.computations(), 1);
        assert!(cache.cached_prec(ConstantId::Log2).unwrap() >= 1000);

        cache.log2(5000);
        assert_eq!(cache.computations(), 2);
        assert_eq!(cache.cached_prec(ConstantId::Log3), None);
    }

    #[test]
    fn concurrent_readers_compute_once() {
        let cache = Arc::new(ConstantCache::new());

        let handles = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.log2(4000))
            })
            .collect::<Vec<_>>();

        let results = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(cache.computations(), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
