//! Argument reduction by log 2 and log 3.
//!
//! Writes `x = (n - a) log(2) + b log(3) + r` with `|b| <= 512` chosen so
//! that `|r|` is about `2^-10`, then evaluates `exp(r)` with a generic
//! algorithm and multiplies by the exact power `3^b`.

use log::trace;
use num::BigInt;

use crate::{
    ExpEvaluator,
    arb::Arb,
    arf::{Arf, Round},
};

/// Largest `|b|` considered in `b log(3)`.
pub const LOG_REDUCTION_MAX_B: i64 = 512;

/// Find `(a, b)` with `|b| <= LOG_REDUCTION_MAX_B` minimizing
/// `|tau + a - b log2(3)|`. Ties go to the smaller `|b|`.
fn log_multipliers(tau: f64) -> (i64, i64) {
    let theta = 3f64.log2();
    let mut best = (0, 0);
    let mut best_dist = f64::INFINITY;

    for k in 0..=2 * LOG_REDUCTION_MAX_B {
        // 0, 1, -1, 2, -2, ...
        let b = if k % 2 == 1 { (k + 1) / 2 } else { -(k / 2) };
        let v = tau - b as f64 * theta;
        let a = -v.round();
        let dist = (v + a).abs();

        if dist < best_dist {
            best_dist = dist;
            best = (a as i64, b);
        }
    }

    best
}

impl ExpEvaluator<'_> {
    /// `exp(x)` (or `exp(x) - 1`) by reduction modulo log 2 and log 3.
    pub fn exp_arf_log_reduction(&self, x: &Arf, prec: u64, minus_one: bool) -> Arb {
        if x.is_zero() {
            return if minus_one { Arb::zero() } else { Arb::one() };
        }

        let mag = x.abs_bound_lt_2exp();
        let mut wp = prec + 30;

        if minus_one && mag < 0 {
            wp += mag.unsigned_abs();
        }

        let int_bits = mag.max(0) as u64;
        let cprec = wp + int_bits + 20;

        let ln2 = self.constants().log2(cprec);
        let ln3 = self.constants().log3(cprec);

        let xb = Arb::from_arf(x.clone());
        let n = xb.div(&ln2, int_bits + 64).mid().to_bigint(Round::Floor);
        let w = xb.sub(&ln2.mul_bigint(&n, cprec), cprec);

        let tau = w.mid().to_f64() / std::f64::consts::LN_2;
        let (a, b) = log_multipliers(tau);

        let r = w
            .add(&ln2.mul_bigint(&BigInt::from(a), cprec), cprec)
            .sub(&ln3.mul_bigint(&BigInt::from(b), cprec), cprec);

        trace!("exp log reduction: n = {n}, a = {a}, b = {b}, r ~ {}", r.mid().to_f64());

        let mut y = self.exp_arf_generic(r.mid(), wp, false);
        let err = y.mag_upper().mul(&r.rad().expm1());
        y.add_error(&err);

        let pow3 = BigInt::from(3).pow(b.unsigned_abs() as u32);

        let y = if b >= 0 {
            y.mul_bigint(&pow3, wp)
        } else {
            y.div(&Arb::from_arf(Arf::from_bigint(&pow3)), wp)
        };

        let y = y.mul_2exp(&(n - a));

        if minus_one {
            y.sub_u64(1, prec)
        } else {
            y.set_round(prec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp::generic::exp_rs;

    #[test]
    fn multipliers_shrink_the_argument() {
        let theta = 3f64.log2();

        for i in 0..100 {
            let tau = i as f64 / 100.0 * std::f64::consts::LN_2;
            let (a, b) = log_multipliers(tau);

            assert!(b.abs() <= LOG_REDUCTION_MAX_B);
            assert!((tau + a as f64 - b as f64 * theta).abs() < 2f64.powi(-9));
        }

        assert_eq!(log_multipliers(0.0), (0, 0));
    }

    #[test]
    fn agrees_with_rectangular_splitting() {
        let ev = ExpEvaluator::default();

        for v in [0.5, -3.75, 12.125, 1e-5, -200.0] {
            let x = Arf::from_f64(v);
            let y = ev.exp_arf_log_reduction(&x, 3000, false);
            let z = exp_rs(&x, 3000, false);

            assert!(y.overlaps(&z), "x = {v}");
            assert!(y.rel_accuracy_bits() >= 2980, "x = {v}: {}", y.rel_accuracy_bits());
        }
    }

    #[test]
    fn minus_one_of_small_argument() {
        let ev = ExpEvaluator::default();
        let x = Arf::one().mul_2exp_si(-500);
        let y = ev.exp_arf_log_reduction(&x, 2500, true);

        assert!(y.rel_accuracy_bits() >= 2480);
        assert_eq!(y.mid().to_f64(), x.to_f64());
    }
}
