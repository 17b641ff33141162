//! The exponential engine.
//!
//! [`ExpEvaluator::exp_arf`] computes a ball containing `exp(x)` or
//! `exp(x) - 1` for a floating-point `x`. It first picks a
//! [`ExpStrategy`](crate::ExpStrategy), then runs one of:
//!
//! * closed-form answers for special, tiny and overflowing inputs,
//! * reduction modulo log 2 plus one or two table lookups followed by a
//!   fixed-point Taylor series (low to medium precision),
//! * reduction by log 2 and log 3 (medium precision),
//! * the [`generic`] algorithms (everything else).
//!
//! Every path accounts for its truncation, rounding and reduction errors in
//! the radius of the returned ball.

use log::trace;
use num::{BigInt, One};

use crate::{
    ConstantCache, DEFAULT_PARAMS, Error, ExpParams, MAX_PREC, Result,
    arb::Arb,
    arf::{Arf, BALL_ROUND, PREC_EXACT},
    mag::Mag,
    mpn,
    reduction::get_mpn_fixed_mod_log2,
    scratch::allocate_scratch,
    strategy::{ExpStrategy, TableLevel, TablePlan, choose_strategy},
    tables::{TAB1_BITS, TAB21_BITS, TAB22_BITS, TableLookup, tab1, tab21, tab22},
    taylor::{exp_taylor_bound, exp_taylor_rs, sin_cos_taylor_rs},
};

pub mod generic;
mod log_reduction;

pub use log_reduction::LOG_REDUCTION_MAX_B;

/// Series needing at least this many terms are evaluated as
/// `sinh + sqrt(1 + sinh^2)`, which halves the number of terms.
pub const SINH_MIN_TERMS: usize = 60;

/// The smallest exponent limit used by the ball functions.
pub const MIN_EXP_MAGLIM: i64 = 128;

#[derive(Clone, Copy)]
/// Evaluates exponentials using a given constant cache and tuning
/// parameters.
///
/// # Remarks
/// The evaluator is cheap to copy and holds no mutable state of its own.
/// Constants such as log 2 are read from (and memoized in) the borrowed
/// [`ConstantCache`]. [`ExpEvaluator::default`] uses
/// [`ConstantCache::global`] and [`DEFAULT_PARAMS`].
pub struct ExpEvaluator<'a> {
    constants: &'a ConstantCache,
    params: ExpParams,
}

impl Default for ExpEvaluator<'static> {
    fn default() -> Self {
        Self::new(ConstantCache::global(), DEFAULT_PARAMS)
    }
}

fn special(x: &Arf, minus_one: bool) -> Arb {
    if x.is_zero() {
        if minus_one { Arb::zero() } else { Arb::one() }
    } else if x.is_pos_inf() {
        Arb::pos_inf()
    } else if x.is_neg_inf() {
        if minus_one { Arb::from_i64(-1) } else { Arb::zero() }
    } else {
        Arb::indeterminate()
    }
}

/// `|x| >= 2^maglim`.
fn overflow(x: &Arf, maglim: i64, minus_one: bool, prec: u64) -> Arb {
    if !x.is_negative() {
        return Arb::zero_pm_inf();
    }

    // x <= -2^maglim gives 0 < exp(x) <= 2^(-2^maglim)
    let e = -(BigInt::one() << maglim.max(0) as u64);
    let z = Arb::new(Arf::one(), Mag::one()).mul_2exp(&e);

    if minus_one { z.sub_u64(1, prec) } else { z }
}

/// `exp(x)` for `|x|` below the working precision.
fn tiny(x: &Arf, prec: u64, minus_one: bool, constant_only: bool) -> Arb {
    let Some(exp) = x.exp() else {
        return Arb::indeterminate();
    };

    if constant_only {
        // |exp(x) - 1| <= 2|x|
        return Arb::new(Arf::one(), Mag::from_u64_2exp(1, &(exp + 1)));
    }

    // |exp(x) - (1 + x)| <= x^2
    let (mid, inexact) = if minus_one {
        x.round(prec, BALL_ROUND)
    } else {
        x.add(&Arf::one(), prec, BALL_ROUND)
    };

    let rad = Mag::from_u64_2exp(1, &(exp * 2));
    let rad = if inexact { rad.add_ulp(&mid, prec) } else { rad };

    Arb::new(mid, rad)
}

impl<'a> ExpEvaluator<'a> {
    /// An evaluator reading constants from `constants`.
    pub fn new(constants: &'a ConstantCache, params: ExpParams) -> Self {
        Self { constants, params }
    }

    /// Like [`ExpEvaluator::new`] but rejects unusable parameters.
    pub fn try_new(constants: &'a ConstantCache, params: ExpParams) -> Result<Self> {
        params.validate()?;

        Ok(Self::new(constants, params))
    }

    /// The constant cache this evaluator uses.
    pub fn constants(&self) -> &'a ConstantCache {
        self.constants
    }

    /// The tuning parameters.
    pub fn params(&self) -> &ExpParams {
        &self.params
    }

    /// A ball containing `exp(x)`, or `exp(x) - 1` when `minus_one` is set,
    /// with about `prec` bits of accuracy.
    ///
    /// # Remarks
    /// Inputs with `|x| >= 2^maglim` are not evaluated: positive ones give
    /// [`Arb::zero_pm_inf`], negative ones a ball bounding
    /// `2^(-2^maglim)` (minus one if requested).
    ///
    /// `prec` is clamped to `2..=MAX_PREC`.
    pub fn exp_arf(&self, x: &Arf, prec: u64, minus_one: bool, maglim: i64) -> Arb {
        let prec = prec.clamp(2, MAX_PREC);
        let strategy = choose_strategy(x, prec, minus_one, maglim, &self.params);

        trace!("exp_arf: {strategy:?} at {prec} bits, minus_one = {minus_one}");

        match strategy {
            ExpStrategy::Special => special(x, minus_one),
            ExpStrategy::Overflow => overflow(x, maglim, minus_one, prec),
            ExpStrategy::TinyLinear { constant_only } => tiny(x, prec, minus_one, constant_only),
            ExpStrategy::LogReduction => self.exp_arf_log_reduction(x, prec, minus_one),
            ExpStrategy::TableReduction(plan) => self.exp_arf_table(x, prec, minus_one, plan),
            ExpStrategy::Generic => self.exp_arf_generic(x, prec, minus_one),
        }
    }

    /// Reduction modulo log 2, table lookups and a fixed-point Taylor
    /// series.
    ///
    /// # Remarks
    /// All arithmetic is on `wn`-limb fractions. `error` counts units of
    /// `2^-wprounded`.
    fn exp_arf_table(&self, x: &Arf, prec: u64, minus_one: bool, plan: TablePlan) -> Arb {
        let TablePlan {
            level,
            wp,
            wn,
            wprounded,
        } = plan;

        let mut w = allocate_scratch(wn + 1);
        let mut t = allocate_scratch(wn + 1);
        let mut u = allocate_scratch(2 * wn + 1);

        let Some((mut n, error)) = get_mpn_fixed_mod_log2(&mut w[..wn], x, self.constants) else {
            trace!("log 2 reduction out of range at {wp} bits; falling back");
            return self.exp_arf_generic(x, prec, minus_one);
        };

        // An error e in w changes exp(w) by at most e exp(log 2) < 3e.
        let mut error = 3 * error;

        let top = &mut w[wn - 1];

        let (p1, p2) = match level {
            TableLevel::One => {
                let p1 = *top >> (64 - TAB1_BITS);
                *top -= p1 << (64 - TAB1_BITS);

                (p1 as usize, 0)
            }
            TableLevel::Two => {
                let q2 = TAB21_BITS + TAB22_BITS;
                let p1 = *top >> (64 - TAB21_BITS);
                *top -= p1 << (64 - TAB21_BITS);
                let p2 = *top >> (64 - q2);
                *top -= p2 << (64 - q2);

                (p1 as usize, p2 as usize)
            }
        };

        // w < 2^-r
        let r = mpn::leading_zeros(&w[..wn]);
        let terms = exp_taylor_bound(-(r as i64), wp);
        let truncation = 1u64 << (wprounded - wp);

        if terms < SINH_MIN_TERMS {
            error += exp_taylor_rs(&mut t, &w[..wn], terms);
            error += truncation;
        } else {
            // sinh needs terms up to the (2N - 1)th power
            let terms = terms.div_ceil(2);
            let mut cosh = allocate_scratch(wn + 1);

            error += sin_cos_taylor_rs(&mut t, &mut cosh, &w[..wn], terms, false);
            error += truncation;

            // 1 + sinh^2
            mpn::sqr(&mut u[..2 * wn], &t[..wn]);
            u[2 * wn] = 1;

            // cosh, with wn + 1 limbs
            mpn::sqrtrem(&mut w, &u);

            let carry = mpn::add_n(&mut t[..wn], &w[..wn]);
            t[wn] = w[wn] + carry;

            // cosh is no worse than sinh plus one unit for the root
            error = 2 * error + 1;
        }

        let mut value = allocate_scratch(wn + 1);

        if p1 == 0 && p2 == 0 {
            value.copy_from_slice(&t);
        } else {
            // exp(w) / 2 < 1
            mpn::rshift(&mut t, 1);
            error = (error >> 1) + 2;

            let fallback = |ev: &Self| {
                trace!("exp table lookup out of range at {wn} limbs; falling back");
                ev.exp_arf_generic(x, prec, minus_one)
            };

            match level {
                TableLevel::One => {
                    let TableLookup::Hit(e) = tab1().lookup(p1, wn) else {
                        return fallback(self);
                    };

                    mpn::mul(&mut u[..2 * wn], &t[..wn], e);

                    // (t + e1) (u + e2) + 1 with t, u <= 1 and e2 < 2
                    error += 4;
                    n += 2u32;
                }
                TableLevel::Two => {
                    let (TableLookup::Hit(e1), TableLookup::Hit(e2)) =
                        (tab21().lookup(p1, wn), tab22().lookup(p2, wn))
                    else {
                        return fallback(self);
                    };

                    let mut entry = allocate_scratch(wn);

                    mpn::mul(&mut u[..2 * wn], e1, e2);
                    entry.copy_from_slice(&u[wn..2 * wn]);
                    mpn::mul(&mut u[..2 * wn], &t[..wn], &entry);

                    // the product entry is within 6 units; one more for the
                    // final product and the cross term
                    error += 9;
                    n += 3u32;
                }
            }

            value[..wn].copy_from_slice(&u[wn..2 * wn]);
            value[wn] = 0;
        }

        let mut rad = Mag::from_u64_2exp_si(error, -(wprounded as i64));

        let mid = if minus_one {
            Arf::from_fixed(&value, wn, false, PREC_EXACT, BALL_ROUND).0
        } else {
            let (mid, inexact) = Arf::from_fixed(&value, wn, false, prec, BALL_ROUND);

            if inexact {
                rad = rad.add_ulp(&mid, prec);
            }

            mid
        };

        let z = Arb::new(mid, rad).mul_2exp(&n);

        if minus_one { z.sub_u64(1, prec) } else { z }
    }

    fn exp_ball(&self, x: &Arb, prec: u64, minus_one: bool) -> Arb {
        let prec = prec.clamp(2, MAX_PREC);
        let maglim = MIN_EXP_MAGLIM.max(2 * prec as i64);

        if x.is_exact() {
            return self.exp_arf(x.mid(), prec, minus_one, maglim);
        }

        if x.mid().is_nan() {
            return Arb::indeterminate();
        }

        if x.rad().is_inf() {
            return Arb::zero_pm_inf();
        }

        let mut z = self.exp_arf(x.mid(), prec, minus_one, maglim);

        // exp(m + d) - exp(m) = exp(m) (exp(d) - 1)
        let scale = if minus_one {
            z.mag_upper().add(&Mag::one())
        } else {
            z.mag_upper()
        };

        z.add_error(&scale.mul(&x.rad().expm1()));

        z
    }

    /// A ball containing `exp(y)` for every `y` in `x`.
    pub fn exp(&self, x: &Arb, prec: u64) -> Arb {
        self.exp_ball(x, prec, false)
    }

    /// A ball containing `exp(y) - 1` for every `y` in `x`, accurate also
    /// when `x` is close to zero.
    pub fn expm1(&self, x: &Arb, prec: u64) -> Arb {
        self.exp_ball(x, prec, true)
    }

    /// Balls containing `sinh(y)` and `cosh(y)` for every `y` in `x`.
    ///
    /// # Remarks
    /// Small arguments go through `exp(x) - 1` to avoid cancellation in
    /// `sinh`. Larger ones use `exp(x)` and its reciprocal.
    pub fn sinh_cosh(&self, x: &Arb, prec: u64) -> (Arb, Arb) {
        if x.mid().is_nan() {
            return (Arb::indeterminate(), Arb::indeterminate());
        }

        if !x.is_finite() {
            return (Arb::zero_pm_inf(), Arb::zero_pm_inf());
        }

        let wp = prec + 8;

        let (s, c) = if x.mid_abs_lt_2exp(&BigInt::from(0)) {
            // e = exp(x) - 1, u = 1 - exp(-x) = e / (e + 1)
            let e = self.expm1(x, wp);
            let u = e.div(&e.add_i64(1, wp), wp);

            let s = e.add(&u, wp).mul_2exp_si(-1);
            let c = e.mul(&u, wp).mul_2exp_si(-1).add_i64(1, wp);

            (s, c)
        } else {
            let e = self.exp(x, wp);
            let inv = Arb::one().div(&e, wp);

            let s = e.sub(&inv, wp).mul_2exp_si(-1);
            let c = e.add(&inv, wp).mul_2exp_si(-1);

            (s, c)
        };

        if !s.is_finite() || !c.is_finite() {
            return (Arb::zero_pm_inf(), Arb::zero_pm_inf());
        }

        (s.set_round(prec), c.set_round(prec))
    }
}

/// `exp(x)` (or `exp(x) - 1`) using the global constant cache and default
/// parameters. See [`ExpEvaluator::exp_arf`].
pub fn exp_arf(x: &Arf, prec: u64, minus_one: bool, maglim: i64) -> Arb {
    ExpEvaluator::default().exp_arf(x, prec, minus_one, maglim)
}

/// Like [`exp_arf`] but rejects precisions outside `2..=MAX_PREC` instead of
/// clamping them.
pub fn try_exp_arf(x: &Arf, prec: u64, minus_one: bool, maglim: i64) -> Result<Arb> {
    if !(2..=MAX_PREC).contains(&prec) {
        return Err(Error::InvalidPrecision(prec));
    }

    Ok(exp_arf(x, prec, minus_one, maglim))
}

impl Arb {
    /// `exp(x)` to `prec` bits.
    pub fn exp(&self, prec: u64) -> Self {
        ExpEvaluator::default().exp(self, prec)
    }

    /// `exp(x) - 1` to `prec` bits.
    pub fn expm1(&self, prec: u64) -> Self {
        ExpEvaluator::default().expm1(self, prec)
    }

    /// Replace `x` with `exp(x)`.
    pub fn exp_assign(&mut self, prec: u64) {
        *self = self.exp(prec);
    }

    /// `(sinh(x), cosh(x))` to `prec` bits.
    pub fn sinh_cosh(&self, prec: u64) -> (Self, Self) {
        ExpEvaluator::default().sinh_cosh(self, prec)
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, thread_rng};

    use super::*;
    use crate::{arf::Round, exp::generic::exp_bb};

    fn random_arf(rng: &mut impl Rng, max_exp: i64) -> Arf {
        let m = rng.gen_range(-(1i64 << 60)..(1i64 << 60));
        let e = rng.gen_range(-max_exp..max_exp);

        Arf::from_i64(m).mul_2exp_si(e - 60)
    }

    #[test]
    fn e_to_double_precision() {
        let y = exp_arf(&Arf::one(), 53, false, 128);

        assert_eq!(y.mid().round(53, Round::Near).0.to_f64(), std::f64::consts::E);
        assert!(y.rad().to_f64() / y.mid().to_f64() < 2f64.powi(-52));
        assert!(y.rel_accuracy_bits() >= 52);
    }

    #[test]
    fn special_values() {
        let ev = ExpEvaluator::default();

        assert_eq!(ev.exp_arf(&Arf::zero(), 64, false, 128), Arb::one());
        assert_eq!(ev.exp_arf(&Arf::zero(), 64, true, 128), Arb::zero());
        assert_eq!(ev.exp_arf(&Arf::pos_inf(), 64, false, 128), Arb::pos_inf());
        assert_eq!(ev.exp_arf(&Arf::neg_inf(), 64, false, 128), Arb::zero());
        assert_eq!(ev.exp_arf(&Arf::neg_inf(), 64, true, 128), Arb::from_i64(-1));
        assert!(ev.exp_arf(&Arf::nan(), 64, false, 128).is_indeterminate());
        assert!(ev.exp_arf(&Arf::nan(), 64, true, 128).is_indeterminate());
    }

    #[test]
    fn overflow_and_underflow() {
        let ev = ExpEvaluator::default();
        let big = Arf::one().mul_2exp_si(200);

        assert_eq!(ev.exp_arf(&big, 64, false, 128), Arb::zero_pm_inf());

        let tiny = ev.exp_arf(&big.neg(), 64, false, 128);
        let bound = Arf::one().mul_2exp(&-(BigInt::one() << 128u32));

        assert!(tiny.contains_arf(&Arf::zero()));
        assert!(tiny.contains_arf(&bound));
        assert!(!tiny.contains_arf(&bound.mul_2exp_si(2)));

        let m1 = ev.exp_arf(&big.neg(), 64, true, 128);
        assert!(m1.contains_arf(&Arf::from_i64(-1)));
        assert!(m1.rel_accuracy_bits() >= 60);
    }

    #[test]
    fn tiny_arguments() {
        let ev = ExpEvaluator::default();
        let x = Arf::from_f64(3.0).mul_2exp_si(-100);

        let y = ev.exp_arf(&x, 64, false, 128);
        assert_eq!(y.mid(), &Arf::one());
        assert!(y.rad().lt_2exp(&BigInt::from(-96)));

        let y = ev.exp_arf(&x, 64, true, 128);
        assert_eq!(y.mid(), &x);
        assert!(y.rel_accuracy_bits() >= 60);

        let x = Arf::one().mul_2exp(&-(BigInt::one() << 80u32));
        let y = ev.exp_arf(&x, 64, true, 128);
        assert!(y.contains_arf(&x));
    }

    #[test]
    fn table_path_matches_binary_splitting() {
        let ev = ExpEvaluator::default();
        let mut rng = thread_rng();

        for _ in 0..200 {
            let prec = rng.gen_range(2..2200);
            let x = random_arf(&mut rng, 8);
            let minus_one = rng.gen_bool(0.3);

            let y = ev.exp_arf(&x, prec, minus_one, 128.max(2 * prec as i64));
            let z = exp_bb(&x, prec + 20, minus_one, 1);

            assert!(y.overlaps(&z), "x = {x}, prec = {prec}, minus_one = {minus_one}");
            assert!(
                y.rel_accuracy_bits() >= prec as i64 - 6,
                "x = {x}, prec = {prec}: {}",
                y.rel_accuracy_bits()
            );
        }
    }

    #[test]
    fn long_series_use_sinh() {
        // x just below 2^-10 at high precision needs more than 60 terms
        let ev = ExpEvaluator::new(ConstantCache::global(), DEFAULT_PARAMS.without_log_reduction());
        let x = Arf::from_f64(0.000_976_5);
        let y = ev.exp_arf(&x, 4000, false, 8000);
        let z = exp_bb(&x, 4100, false, 1);

        assert!(y.overlaps(&z));
        assert!(y.rel_accuracy_bits() >= 3990);
    }

    #[test]
    fn ball_exp_propagates_radius() {
        let x = Arb::new(Arf::from_f64(0.5), Mag::from_u64_2exp_si(1, -30));
        let y = x.exp(100);

        for v in [0.5 - 2f64.powi(-30), 0.5, 0.5 + 2f64.powi(-30)] {
            let z = exp_arf(&Arf::from_f64(v), 100, false, 200);
            assert!(y.contains(&z), "v = {v}");
        }

        assert!(Arb::zero_pm_inf().exp(64).rad().is_inf());
        assert!(Arb::indeterminate().exp(64).is_indeterminate());
    }

    #[test]
    fn sinh_cosh_identity() {
        let (s, c) = Arb::from_f64(0.75).sinh_cosh(200);

        // cosh^2 - sinh^2 = 1
        let one = c.mul(&c, 200).sub(&s.mul(&s, 200), 200);
        assert!(one.contains_arf(&Arf::one()));
        assert!(s.rel_accuracy_bits() >= 190);

        let x = Arb::from_f64(-20.0);
        let (s, c) = x.sinh_cosh(100);

        // cosh + sinh = exp
        assert!(s.mid_is_negative());
        assert!(c.add(&s, 100).overlaps(&x.exp(100)));
    }

    #[test]
    fn try_exp_arf_checks_precision() {
        assert_eq!(
            try_exp_arf(&Arf::one(), 1, false, 128),
            Err(Error::InvalidPrecision(1))
        );
        assert!(try_exp_arf(&Arf::one(), 2, false, 128).is_ok());
    }

    #[test]
    fn exp_assign_matches_exp() {
        let x = Arb::from_f64(-1.25);
        let mut y = x.clone();
        y.exp_assign(80);

        assert_eq!(y, x.exp(80));
    }
}
