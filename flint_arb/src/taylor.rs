//! Fixed-point Taylor kernels for exp, sin and cos.
//!
//! Inputs are `wn`-limb fractions `x = X * 2^(-64 wn)` with `0 <= x < 1`.
//! Outputs have `wn + 1` limbs: `wn` fractional limbs and one integer limb.
//! Every kernel returns a bound, in units of `2^(-64 wn)`, on its own
//! arithmetic error. Truncation error is the caller's responsibility; see
//! [`exp_taylor_bound`] and [`exp_truncation_bound`].

use crate::{mag::Mag, mpn, scratch::allocate_scratch};

/// Rectangular splitting keeps each block denominator below this so that
/// coefficients fit a limb with room for the block sum.
const MAX_BLOCK_DENOMINATOR: u64 = 1 << 60;

/// Term denominators of a hypergeometric series
/// `sum_k (+-y)^k / (q(1) q(2) ... q(k))`.
#[derive(Debug, Clone, Copy)]
enum Series {
    /// `q(l) = l`, the exponential series.
    Exp,

    /// `q(l) = 2l (2l + 1)`, `sin(x) / x` in `y = x^2`.
    Sin,

    /// `q(l) = (2l - 1) 2l`, `cos(x)` in `y = x^2`.
    Cos,
}

impl Series {
    fn q(self, l: u64) -> u64 {
        match self {
            Self::Exp => l,
            Self::Sin => (2 * l) * (2 * l + 1),
            Self::Cos => (2 * l - 1) * (2 * l),
        }
    }
}

fn set_one(out: &mut [u64]) {
    out.fill(0);

    if let Some(top) = out.last_mut() {
        *top = 1;
    }
}

/// Largest block size `m <= ceil(sqrt(n))` whose top block denominator fits
/// [`MAX_BLOCK_DENOMINATOR`].
fn block_size(n: usize, series: Series) -> usize {
    let mut m = n.isqrt();

    if m * m < n {
        m += 1;
    }

    while m > 1 {
        let base = ((n - 1) / m * m) as u64;

        let den = (base + 1..base + m as u64)
            .try_fold(1u64, |acc, l| acc.checked_mul(series.q(l)))
            .filter(|d| *d <= MAX_BLOCK_DENOMINATOR);

        if den.is_some() {
            break;
        }

        m -= 1;
    }

    m.max(1)
}

/// Evaluate the first `n` terms of `series` at `y` by rectangular splitting.
///
/// # Remarks
/// With block size `m`, powers `y^1 .. y^m` are computed once. Block `j`
/// covers terms `jm .. jm + m - 1` and is evaluated as
///
/// `T_j = (sum_i (+-1)^i c_i y^i + (+-1)^m y^m T_{j+1} / q(jm + m)) / D_j`
///
/// where `D_j = q(jm + 1) ... q(jm + m - 1)` and `c_i = D_j / (q(jm + 1) ...
/// q(jm + i))` are integers, so each block costs one division by a limb.
/// The result is `T_0`.
///
/// `y` is known to within `y_err` units.
fn series_rs(out: &mut [u64], y: &[u64], y_err: u64, n: usize, alternating: bool, series: Series) -> u64 {
    let wn = y.len();

    assert_eq!(out.len(), wn + 1);

    if n <= 1 {
        set_one(out);
        return 0;
    }

    let m = block_size(n, series);
    let blocks = n.div_ceil(m);

    // powers[i - 1] holds y^i for i in 1..=m.
    let mut powers = allocate_scratch(m * wn);
    let mut power_err = allocate_scratch(m + 1);
    let mut prod = allocate_scratch(2 * wn + 1);
    let mut pos = allocate_scratch(wn + 1);
    let mut neg = allocate_scratch(wn + 1);
    let mut t = allocate_scratch(wn + 1);

    powers[..wn].copy_from_slice(y);
    power_err[1] = y_err;

    for i in 2..=m {
        let (lo, hi) = powers.split_at_mut((i - 1) * wn);

        mpn::mul(&mut prod[..2 * wn], &lo[(i - 2) * wn..], y);
        hi[..wn].copy_from_slice(&prod[wn..2 * wn]);

        power_err[i] = power_err[i - 1] + y_err + 1;
    }

    let mut t_err = 0u64;

    for j in (0..blocks).rev() {
        let base = j * m;

        pos.fill(0);
        neg.fill(0);

        let mut coef = 1u64;
        let mut err_acc = 0u128;

        for i in (0..m).rev() {
            if base + i < n {
                let acc = if alternating && i % 2 == 1 {
                    &mut neg
                } else {
                    &mut pos
                };

                if i == 0 {
                    mpn::add_1(&mut acc[wn..], coef);
                } else {
                    let power = &powers[(i - 1) * wn..i * wn];
                    let carry = mpn::addmul_1(&mut acc[..wn], power, coef);
                    mpn::add_1(&mut acc[wn..], carry);
                }

                err_acc += coef as u128 * power_err[i] as u128;
            }

            if i > 0 {
                coef *= series.q((base + i) as u64);
            }
        }

        let den = coef;

        if j + 1 < blocks {
            let q = series.q((base + m) as u64);
            let y_m = &powers[(m - 1) * wn..m * wn];

            // trunc(y^m T_{j+1}) / q
            mpn::mul(&mut prod, y_m, &t);
            let carry = &mut prod[wn..];
            mpn::divrem_1(carry, q);

            let acc = if alternating && m % 2 == 1 {
                &mut neg
            } else {
                &mut pos
            };

            mpn::add_n(acc, carry);

            // |T| < 3
            let carry_err = (t_err as u128 + 3 * power_err[m] as u128 + 1).div_ceil(q as u128) + 1;
            err_acc += carry_err;
        }

        t.copy_from_slice(&pos);
        let borrow = mpn::sub_n(&mut t, &neg);
        debug_assert_eq!(borrow, 0);

        mpn::divrem_1(&mut t, den);

        t_err = (err_acc.div_ceil(den as u128) + 1) as u64;
    }

    out.copy_from_slice(&t);

    t_err
}

/// Reference evaluation of the same series by Horner's rule, one division
/// per term.
fn series_naive(out: &mut [u64], y: &[u64], y_err: u64, n: usize, alternating: bool, series: Series) -> u64 {
    let wn = y.len();

    assert_eq!(out.len(), wn + 1);

    set_one(out);

    if n <= 1 {
        return 0;
    }

    let mut prod = allocate_scratch(2 * wn + 1);
    let mut err = 0u64;

    for k in (1..n).rev() {
        let q = series.q(k as u64);

        mpn::mul(&mut prod, y, out);
        let term = &mut prod[wn..];
        mpn::divrem_1(term, q);

        set_one(out);

        if alternating {
            mpn::sub_n(out, term);
        } else {
            mpn::add_n(out, term);
        }

        err = (err + 3 * y_err + 1).div_ceil(q) + 1;
    }

    err
}

/// `y = sum_{k < n} x^k / k!`.
///
/// Returns the arithmetic error of `y` in units of `2^(-64 wn)`. `n <= 1`
/// gives exactly 1.
///
/// # Panics
/// If `y.len() != x.len() + 1`.
pub fn exp_taylor_rs(y: &mut [u64], x: &[u64], n: usize) -> u64 {
    series_rs(y, x, 0, n, false, Series::Exp)
}

/// Reference implementation of [`exp_taylor_rs`].
pub fn exp_taylor_naive(y: &mut [u64], x: &[u64], n: usize) -> u64 {
    series_naive(y, x, 0, n, false, Series::Exp)
}

fn sin_cos_taylor(
    sin: &mut [u64],
    cos: &mut [u64],
    x: &[u64],
    n: usize,
    alternating: bool,
    eval: fn(&mut [u64], &[u64], u64, usize, bool, Series) -> u64,
) -> u64 {
    let wn = x.len();

    assert_eq!(sin.len(), wn + 1);
    assert_eq!(cos.len(), wn + 1);

    if n == 0 {
        sin.fill(0);
        set_one(cos);
        return 0;
    }

    let mut prod = allocate_scratch(2 * wn + 1);
    let mut sinc = allocate_scratch(wn + 1);

    // y = trunc(x^2), off by less than one unit
    mpn::sqr(&mut prod[..2 * wn], x);
    let y = &prod[wn..2 * wn];

    let cos_err = eval(cos, y, 1, n, alternating, Series::Cos);
    let sinc_err = eval(&mut sinc, y, 1, n, alternating, Series::Sin);

    // sin = trunc(x * sinc(x))
    let mut full = allocate_scratch(2 * wn + 1);
    mpn::mul(&mut full, x, &sinc);
    sin.copy_from_slice(&full[wn..]);

    cos_err.max(sinc_err + 1)
}

/// `sin = sum_{k < n} (-1)^k x^(2k+1) / (2k+1)!` and
/// `cos = sum_{k < n} (-1)^k x^(2k) / (2k)!`, or the hyperbolic versions
/// when `alternating` is false.
///
/// Returns one error bound covering both outputs, in units of
/// `2^(-64 wn)`. `n == 0` gives `sin = 0`, `cos = 1` exactly.
pub fn sin_cos_taylor_rs(
    sin: &mut [u64],
    cos: &mut [u64],
    x: &[u64],
    n: usize,
    alternating: bool,
) -> u64 {
    sin_cos_taylor(sin, cos, x, n, alternating, series_rs)
}

/// Reference implementation of [`sin_cos_taylor_rs`].
pub fn sin_cos_taylor_naive(
    sin: &mut [u64],
    cos: &mut [u64],
    x: &[u64],
    n: usize,
    alternating: bool,
) -> u64 {
    sin_cos_taylor(sin, cos, x, n, alternating, series_naive)
}

/// The number of terms `N` such that for `|x| < 2^mag` the exponential series
/// truncated after `N` terms is within `2^-wp` of `exp(x)`.
///
/// # Remarks
/// Uses `|x|^N / N! <= 2^(mag N - sum_{k=2}^{N} floor(log2 k))` and a tail
/// factor of 2.
///
/// # Panics
/// If `mag > 0`.
pub fn exp_taylor_bound(mag: i64, wp: u64) -> usize {
    assert!(mag <= 0, "argument must be reduced below 1");

    let target = -(wp as i64) - 1;
    let mut n = 1usize;
    let mut log_fact = 0i64;

    while mag * n as i64 - log_fact > target {
        n += 1;
        log_fact += n.ilog2() as i64;
    }

    n
}

/// Upper bound on the tail `sum_{k >= n} x^k / k!` for `|x| <= r <= 1`.
pub fn exp_truncation_bound(r: &Mag, n: usize) -> Mag {
    let mut t = Mag::one();

    for k in 1..=n as u64 {
        t = t.mul(r).div(&Mag::from_u64_2exp_si(k, 0));
    }

    t.mul_2exp_si(1)
}

#[cfg(test)]
mod tests {
    use num::{BigUint, ToPrimitive};
    use rand::{Rng, RngCore, thread_rng};

    use super::*;

    fn random_fraction(wn: usize, zero_bits: u32) -> Vec<u64> {
        let mut x = (0..wn).map(|_| thread_rng().next_u64()).collect::<Vec<_>>();
        x[wn - 1] >>= zero_bits;
        x
    }

    fn dist(a: &[u64], b: &[u64]) -> BigUint {
        let (a, b) = (mpn::to_biguint(a), mpn::to_biguint(b));

        if a > b { a - b } else { b - a }
    }

    fn f64_of(a: &[u64]) -> f64 {
        let wn = a.len() - 1;
        let v = mpn::to_biguint(a).to_f64().unwrap();

        v * 2f64.powi(-64 * wn as i32)
    }

    #[test]
    fn rs_exp_agrees_with_naive() {
        for _ in 0..300 {
            let wn = thread_rng().gen_range(1..10);
            let n = thread_rng().gen_range(0..150);
            let x = random_fraction(wn, thread_rng().gen_range(1..20));

            let mut a = vec![0; wn + 1];
            let mut b = vec![0; wn + 1];

            let ea = exp_taylor_rs(&mut a, &x, n);
            let eb = exp_taylor_naive(&mut b, &x, n);

            assert!(dist(&a, &b) <= BigUint::from(ea + eb), "n={n} wn={wn}");
        }
    }

    #[test]
    fn rs_sin_cos_agrees_with_naive() {
        for _ in 0..300 {
            let wn = thread_rng().gen_range(1..10);
            let n = thread_rng().gen_range(0..144);
            let alternating = thread_rng().gen_bool(0.5);
            let x = random_fraction(wn, 4);

            let mut s1 = vec![0; wn + 1];
            let mut c1 = vec![0; wn + 1];
            let mut s2 = vec![0; wn + 1];
            let mut c2 = vec![0; wn + 1];

            let e1 = sin_cos_taylor_naive(&mut s1, &mut c1, &x, n, alternating);
            let e2 = sin_cos_taylor_rs(&mut s2, &mut c2, &x, n, alternating);

            assert!(dist(&s1, &s2) <= BigUint::from(e1 + e2));
            assert!(dist(&c1, &c2) <= BigUint::from(e1 + e2));
        }
    }

    #[test]
    fn zero_terms_is_trivial_series() {
        let x = random_fraction(3, 1);
        let mut s = vec![7; 4];
        let mut c = vec![7; 4];
        let mut e = vec![7; 4];

        assert_eq!(sin_cos_taylor_rs(&mut s, &mut c, &x, 0, true), 0);
        assert_eq!(s, vec![0, 0, 0, 0]);
        assert_eq!(c, vec![0, 0, 0, 1]);

        assert_eq!(exp_taylor_rs(&mut e, &x, 0), 0);
        assert_eq!(e, vec![0, 0, 0, 1]);
    }

    #[test]
    fn kernels_match_double_precision() {
        // x = 1/8
        let x = [0, 1 << 61];
        let mut y = vec![0; 3];
        let mut s = vec![0; 3];
        let mut c = vec![0; 3];

        exp_taylor_rs(&mut y, &x, 40);
        sin_cos_taylor_rs(&mut s, &mut c, &x, 20, true);

        assert!((f64_of(&y) - 0.125f64.exp()).abs() < 1e-15);
        assert!((f64_of(&s) - 0.125f64.sin()).abs() < 1e-15);
        assert!((f64_of(&c) - 0.125f64.cos()).abs() < 1e-15);

        sin_cos_taylor_rs(&mut s, &mut c, &x, 20, false);

        assert!((f64_of(&s) - 0.125f64.sinh()).abs() < 1e-15);
        assert!((f64_of(&c) - 0.125f64.cosh()).abs() < 1e-15);
    }

    #[test]
    fn taylor_bound_is_sufficient() {
        for (mag, wp) in [(-1, 64), (-8, 512), (-20, 4000), (0, 100)] {
            let n = exp_taylor_bound(mag, wp);
            let r = Mag::from_u64_2exp_si(1, mag);
            let tail = exp_truncation_bound(&r, n);

            assert!(n >= 1);
            assert!(tail.lt_2exp(&num::BigInt::from(-(wp as i64) + 2)));
        }

        assert_eq!(exp_taylor_bound(-100, 64), 1);
    }

    #[test]
    fn block_size_respects_denominator_limit() {
        for n in [2, 10, 100, 1000] {
            for series in [Series::Exp, Series::Sin, Series::Cos] {
                let m = block_size(n, series);
                let base = ((n - 1) / m * m) as u64;
                let den = (base + 1..base + m as u64).map(|l| series.q(l) as u128).product::<u128>();

                assert!(m >= 1);
                assert!(den <= MAX_BLOCK_DENOMINATOR as u128);
            }
        }
    }
}
