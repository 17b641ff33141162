//! Exponential algorithms that work in ball arithmetic at any precision.
//!
//! These don't rely on the precomputed tables, so they are the fallback
//! whenever the table path can't certify the requested accuracy.

use log::trace;
use num::{BigInt, BigUint, One, Signed, Zero};
use rayon::prelude::*;

use crate::{
    ExpEvaluator,
    arb::Arb,
    arf::{Arf, Round},
    mag::Mag,
    strategy::{GenericAlgorithm, choose_generic},
    taylor::{exp_taylor_bound, exp_truncation_bound},
};

/// Binary splitting hands sub-ranges with more terms than this to rayon.
pub const BSPLIT_PARALLEL_TERMS: u64 = 256;

/// Bits in the first chunk of binary splitting. Later chunks double.
pub const BB_FIRST_CHUNK_BITS: u64 = 16;

fn trivial(minus_one: bool) -> Arb {
    if minus_one { Arb::zero() } else { Arb::one() }
}

impl ExpEvaluator<'_> {
    /// `exp(x)` (or `exp(x) - 1`) by one of the generic algorithms.
    ///
    /// # Remarks
    /// Large arguments are first reduced by a multiple of log 2. Otherwise
    /// the choice between rectangular splitting and binary splitting depends
    /// on the precision, the size of `x` and the number of available workers.
    pub fn exp_arf_generic(&self, x: &Arf, prec: u64, minus_one: bool) -> Arb {
        if x.is_zero() {
            return trivial(minus_one);
        }

        let threads = self.params().num_threads();
        let algorithm = choose_generic(x, prec, threads, self.params());

        trace!("exp generic: {algorithm:?} at {prec} bits with {threads} threads");

        match algorithm {
            GenericAlgorithm::Huge => self.exp_huge(x, prec, minus_one),
            GenericAlgorithm::RectangularSplitting => exp_rs(x, prec, minus_one),
            GenericAlgorithm::BinarySplitting => exp_bb(x, prec, minus_one, threads),
        }
    }

    /// Writes `x = q log(2) + t` with `|t| < log(2)` and returns
    /// `2^q exp(t)`.
    fn exp_huge(&self, x: &Arf, prec: u64, minus_one: bool) -> Arb {
        let mag = x.abs_bound_lt_2exp().max(0) as u64;
        let wp = prec + mag + 10;

        let ln2 = self.constants().log2(wp);
        let t = Arb::from_arf(x.clone());
        let u = t.div(&ln2, mag + 10);
        let q = u.mid().to_bigint(Round::Down);
        let t = t.sub(&ln2.mul_bigint(&q, wp), wp);

        if minus_one {
            self.exp(&t, prec + 10).mul_2exp(&q).sub_u64(1, prec)
        } else {
            self.exp(&t, prec).mul_2exp(&q)
        }
    }
}

/// `sum_{k < n} x^k / k!` by rectangular splitting in ball arithmetic.
///
/// # Remarks
/// Block `j` of `m` terms is folded as
/// `T_j = (sum_i c_i x^i + x^m T_{j+1} / (jm + m)) / D_j` with
/// `D_j = (jm + 1) ... (jm + m - 1)` and integer `c_i = D_j / ((jm + 1) ...
/// (jm + i))`, so the powers `x^1 .. x^m` are shared by every block.
fn taylor_sum_rs(x: &Arb, n: usize, wp: u64) -> Arb {
    if n <= 1 {
        return Arb::one();
    }

    let mut m = n.isqrt();

    if m * m < n {
        m += 1;
    }

    let mut powers = vec![Arb::one(), x.clone()];

    for i in 2..=m {
        let next = powers[i - 1].mul(x, wp);
        powers.push(next);
    }

    let blocks = n.div_ceil(m);
    let mut t = Arb::zero();

    for j in (0..blocks).rev() {
        let base = (j * m) as u64;
        let terms = m.min(n - j * m);

        let mut acc = if j + 1 < blocks {
            t.mul(&powers[m], wp).div_u64(base + m as u64, wp)
        } else {
            Arb::zero()
        };

        let mut coef = BigInt::one();

        for i in (0..m).rev() {
            if i < terms {
                acc = acc.add(&powers[i].mul_bigint(&coef, wp), wp);
            }

            coef *= base + i as u64;
        }

        let den = (base + 1..base + m as u64).fold(BigInt::one(), |d, l| d * l);

        t = acc.div(&Arb::from_arf(Arf::from_bigint(&den)), wp);
    }

    t
}

/// `exp(x)` (or `exp(x) - 1`) by rectangular splitting of the Taylor series
/// of `exp(x / 2^r)` followed by `r` squarings.
///
/// # Panics
/// If `x` is not finite.
pub fn exp_rs(x: &Arf, prec: u64, minus_one: bool) -> Arb {
    assert!(x.is_finite(), "exp_rs requires a finite argument");

    if x.is_zero() {
        return trivial(minus_one);
    }

    let mag = x.abs_bound_lt_2exp();
    let r = (mag + prec.isqrt() as i64 / 2).max(0);

    let mut wp = prec + r as u64 + 10;

    if minus_one && mag < 0 {
        wp += mag.unsigned_abs();
    }

    let xr = Arb::from_arf(x.mul_2exp_si(-r));
    let n = exp_taylor_bound(mag - r, wp);

    let mut s = taylor_sum_rs(&xr, n, wp);
    s.add_error(&exp_truncation_bound(&Mag::from_arf(xr.mid()), n));

    for _ in 0..r {
        s = s.mul(&s, wp);
    }

    if minus_one {
        s = s.sub_u64(1, wp);
    }

    s.set_round(prec)
}

/// `(P, Q, T)` for the terms `a <= k < b` of the series of `exp(p / 2^q)`:
/// `P = p^(b - a)`, `Q = (a ... (b - 1)) 2^(q (b - a))` and
/// `T / Q = sum_{k = a}^{b - 1} prod_{l = a}^{k} p / (l 2^q)`.
fn bsplit(p: &BigInt, q: u64, a: u64, b: u64, threads: usize) -> (BigInt, BigInt, BigInt) {
    if b - a == 1 {
        return (p.clone(), BigInt::from(a) << q, p.clone());
    }

    let m = a + (b - a) / 2;

    let ((p1, q1, t1), (p2, q2, t2)) = if threads > 1 && b - a > BSPLIT_PARALLEL_TERMS {
        rayon::join(
            || bsplit(p, q, a, m, threads),
            || bsplit(p, q, m, b, threads),
        )
    } else {
        (bsplit(p, q, a, m, threads), bsplit(p, q, m, b, threads))
    };

    let t = t1 * &q2 + &p1 * t2;

    (p1 * p2, q1 * q2, t)
}

/// `exp(p / 2^q)` for `|p / 2^q| < 2^mag <= 1`.
fn exp_chunk(p: &BigInt, q: u64, mag: i64, wp: u64, threads: usize) -> Arb {
    let n = exp_taylor_bound(mag, wp).max(2);
    let (_, den, num) = bsplit(p, q, 1, n as u64, threads);

    let mut s = Arb::from_arf(Arf::from_bigint(&num))
        .div(&Arb::from_arf(Arf::from_bigint(&den)), wp)
        .add(&Arb::one(), wp);

    let r = Mag::from_arf(&Arf::from_int_2exp(p, &-BigInt::from(q)));
    s.add_error(&exp_truncation_bound(&r, n));

    s
}

/// `exp(x)` (or `exp(x) - 1`) by binary splitting.
///
/// # Remarks
/// After scaling by `2^-s`, `x` is truncated to a `wp`-bit fixed-point number
/// and cut into chunks `p_i / 2^(q_i)` whose bit lengths double. Each chunk
/// has few significant bits relative to its size, so its exponential is
/// cheap to evaluate exactly as a rational by binary splitting. The chunk
/// exponentials are multiplied together and squared `s` times.
///
/// With more than one thread the chunks and the large splitting ranges run
/// on rayon.
///
/// # Panics
/// If `x` is not finite.
pub fn exp_bb(x: &Arf, prec: u64, minus_one: bool, threads: usize) -> Arb {
    assert!(x.is_finite(), "exp_bb requires a finite argument");

    if x.is_zero() {
        return trivial(minus_one);
    }

    let mag = x.abs_bound_lt_2exp();
    let s = if mag > -10 { (mag + 10) as u64 } else { 0 };

    let mut wp = prec + 10 + 2 * s + 2 * (64 - prec.leading_zeros() as u64);

    if minus_one && mag < 0 {
        wp += mag.unsigned_abs();
    }

    let xr = x.mul_2exp_si(-(s as i64));
    let fixed = xr.to_fixed_floor(wp);
    let negative = fixed.is_negative();
    let total = fixed.magnitude();

    let mut chunks = vec![];
    let mut lo = 0u64;
    let mut hi = BB_FIRST_CHUNK_BITS.min(wp);

    while lo < wp {
        // bits of |X| at fractional positions (lo, hi]
        let top = total >> (wp - hi);
        let p: BigUint = if lo == 0 {
            top
        } else {
            top - ((total >> (wp - lo)) << (hi - lo))
        };

        if !p.is_zero() {
            let bound = if lo == 0 {
                (mag - s as i64).min(0)
            } else {
                -(lo as i64)
            };

            let p = if negative {
                -BigInt::from(p)
            } else {
                BigInt::from(p)
            };

            chunks.push((p, hi, bound));
        }

        lo = hi;
        hi = (2 * hi).min(wp);
    }

    trace!("exp bb: {} chunks at {wp} bits, {s} squarings", chunks.len());

    let eval = |(p, q, bound): &(BigInt, u64, i64)| exp_chunk(p, *q, *bound, wp, threads);

    let factors: Vec<Arb> = if threads > 1 {
        chunks.par_iter().map(eval).collect()
    } else {
        chunks.iter().map(eval).collect()
    };

    let mut v = factors
        .iter()
        .fold(Arb::one(), |acc, f| acc.mul(f, wp));

    // x - X 2^-wp lies in [0, 2^-wp), so exp(x) / exp(X 2^-wp) - 1 < 2^(1 - wp).
    let trunc = v.mag_upper().mul_2exp_si(1 - wp as i64);
    v.add_error(&trunc);

    for _ in 0..s {
        v = v.mul(&v, wp);
    }

    if minus_one {
        v = v.sub_u64(1, wp);
    }

    v.set_round(prec)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, thread_rng};

    use super::*;

    fn e_53() -> Arf {
        Arf::from_f64(std::f64::consts::E)
    }

    #[test]
    fn rs_and_bb_agree_on_one() {
        let rs = exp_rs(&Arf::one(), 200, false);
        let bb = exp_bb(&Arf::one(), 200, false, 1);

        assert!(rs.overlaps(&bb));
        assert_eq!(rs.mid().round(53, Round::Near).0, e_53());
        assert!(rs.rel_accuracy_bits() >= 190);
        assert!(bb.rel_accuracy_bits() >= 190);
    }

    #[test]
    fn zero_is_exact() {
        assert_eq!(exp_rs(&Arf::zero(), 100, false), Arb::one());
        assert_eq!(exp_bb(&Arf::zero(), 100, true, 4), Arb::zero());
    }

    #[test]
    fn random_arguments_agree() {
        let mut rng = thread_rng();

        for _ in 0..40 {
            let prec = rng.gen_range(2..600);
            let m = rng.gen_range(-(1i64 << 40)..(1i64 << 40));
            let e = rng.gen_range(-60..5);
            let x = Arf::from_i64(m).mul_2exp_si(e - 40);
            let minus_one = rng.gen_bool(0.5);
            let threads = rng.gen_range(1..4);

            let rs = exp_rs(&x, prec, minus_one);
            let bb = exp_bb(&x, prec, minus_one, threads);

            assert!(rs.overlaps(&bb), "x = {x}, prec = {prec}");
            assert!(rs.is_finite() && bb.is_finite());

            let f = if minus_one { x.to_f64().exp_m1() } else { x.to_f64().exp() };
            let tol = f.abs() * 1e-12 + 1e-300;

            if prec >= 64 {
                assert!((rs.mid().to_f64() - f).abs() <= tol, "x = {x}");
                assert!((bb.mid().to_f64() - f).abs() <= tol, "x = {x}");
            }
        }
    }

    #[test]
    fn minus_one_keeps_relative_accuracy() {
        let x = Arf::one().mul_2exp_si(-100);

        for y in [exp_rs(&x, 128, true), exp_bb(&x, 128, true, 1)] {
            assert_eq!(y.mid().to_f64(), x.to_f64());
            assert!(y.rel_accuracy_bits() >= 120, "{y}");
        }
    }

    #[test]
    fn parallel_splitting_is_deterministic() {
        let x = Arf::from_f64(0.1234567);

        let serial = exp_bb(&x, 5000, false, 1);
        let parallel = exp_bb(&x, 5000, false, 8);

        assert_eq!(serial, parallel);
    }

    #[test]
    fn huge_reduction() {
        let ev = ExpEvaluator::default();
        let x = Arf::from_f64(1000.25);
        let y = ev.exp_arf_generic(&x, 300, false);

        assert!(y.rel_accuracy_bits() >= 280);

        let direct = exp_rs(&x, 300, false);
        assert!(y.overlaps(&direct));

        let y = ev.exp_arf_generic(&x.neg(), 300, true);
        assert!(y.overlaps(&Arb::from_i64(-1)));
        assert!(y.mid_is_negative());
    }
}
