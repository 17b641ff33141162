use std::fmt;

use num::{BigInt, ToPrimitive};

use crate::{
    arf::{Arf, BALL_ROUND, Round},
    mag::Mag,
};

/// Extra bits kept beyond the accuracy of a ball when trimming.
pub const TRIM_PADDING: i64 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
/// A real number known to lie in `[mid - rad, mid + rad]`.
///
/// # Remarks
/// Every operation returns a ball containing the exact result of the same
/// operation applied to any points of its operands. Midpoints are rounded to
/// the requested precision and the rounding error is added to the radius.
///
/// A ball with an infinite radius and zero midpoint is the "top" ball: the
/// value is unknown. A NaN midpoint marks an indeterminate result, which every
/// predicate treats as possibly containing anything.
///
/// Equality (`==`) compares representations, not intervals. Use
/// [`Arb::overlaps`] or [`Arb::contains`] to compare values.
pub struct Arb {
    mid: Arf,
    rad: Mag,
}

impl Arb {
    /// A ball from a midpoint and radius.
    pub fn new(mid: Arf, rad: Mag) -> Self {
        Self { mid, rad }
    }

    /// Exactly zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Exactly one.
    pub fn one() -> Self {
        Self::from_arf(Arf::one())
    }

    /// Exactly `+inf`.
    pub fn pos_inf() -> Self {
        Self::from_arf(Arf::pos_inf())
    }

    /// Exactly `-inf`.
    pub fn neg_inf() -> Self {
        Self::from_arf(Arf::neg_inf())
    }

    /// The indeterminate ball `NaN +/- inf`.
    pub fn indeterminate() -> Self {
        Self::new(Arf::nan(), Mag::Inf)
    }

    /// The top ball `0 +/- inf`.
    pub fn zero_pm_inf() -> Self {
        Self::new(Arf::zero(), Mag::Inf)
    }

    /// An exact ball.
    pub fn from_arf(mid: Arf) -> Self {
        Self::new(mid, Mag::Zero)
    }

    /// An exact integer ball.
    pub fn from_i64(v: i64) -> Self {
        Self::from_arf(Arf::from_i64(v))
    }

    /// An exact integer ball.
    pub fn from_u64(v: u64) -> Self {
        Self::from_arf(Arf::from_u64(v))
    }

    /// An exact ball holding the value of a double.
    pub fn from_f64(v: f64) -> Self {
        Self::from_arf(Arf::from_f64(v))
    }

    /// The midpoint.
    pub fn mid(&self) -> &Arf {
        &self.mid
    }

    /// The radius.
    pub fn rad(&self) -> &Mag {
        &self.rad
    }

    /// Split into midpoint and radius.
    pub fn into_parts(self) -> (Arf, Mag) {
        (self.mid, self.rad)
    }

    /// Whether the midpoint and the radius are finite.
    pub fn is_finite(&self) -> bool {
        self.mid.is_finite() && self.rad.is_finite()
    }

    /// Whether the radius is zero.
    pub fn is_exact(&self) -> bool {
        self.rad.is_zero()
    }

    /// Whether this is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.mid.is_zero() && self.rad.is_zero()
    }

    /// Whether the midpoint is NaN.
    pub fn is_indeterminate(&self) -> bool {
        self.mid.is_nan()
    }

    /// Add `err` to the radius.
    pub fn add_error(&mut self, err: &Mag) {
        self.rad = self.rad.add(err);
    }

    /// Add `2^e` to the radius.
    pub fn add_error_2exp(&mut self, e: &BigInt) {
        self.add_error(&Mag::from_u64_2exp(1, e));
    }

    /// Upper bound on `|x|` for every `x` in the ball.
    pub fn mag_upper(&self) -> Mag {
        Mag::from_arf(&self.mid).add(&self.rad)
    }

    fn rounded(mid: Arf, rad: Mag, inexact: bool, prec: u64) -> Self {
        let rad = if inexact { rad.add_ulp(&mid, prec) } else { rad };

        Self { mid, rad }
    }

    /// Round the midpoint to `prec` bits.
    pub fn set_round(&self, prec: u64) -> Self {
        let (mid, inexact) = self.mid.round(prec, BALL_ROUND);

        Self::rounded(mid, self.rad.clone(), inexact, prec)
    }

    /// `-x`.
    pub fn neg(&self) -> Self {
        Self::new(self.mid.neg(), self.rad.clone())
    }

    /// `x + y`.
    pub fn add(&self, other: &Self, prec: u64) -> Self {
        let (mid, inexact) = self.mid.add(&other.mid, prec, BALL_ROUND);

        Self::rounded(mid, self.rad.add(&other.rad), inexact, prec)
    }

    /// `x - y`.
    pub fn sub(&self, other: &Self, prec: u64) -> Self {
        let (mid, inexact) = self.mid.sub(&other.mid, prec, BALL_ROUND);

        Self::rounded(mid, self.rad.add(&other.rad), inexact, prec)
    }

    /// `x + v`.
    pub fn add_i64(&self, v: i64, prec: u64) -> Self {
        self.add(&Self::from_i64(v), prec)
    }

    /// `x - v`.
    pub fn sub_u64(&self, v: u64, prec: u64) -> Self {
        self.sub(&Self::from_u64(v), prec)
    }

    /// `x * y`.
    pub fn mul(&self, other: &Self, prec: u64) -> Self {
        let (mid, inexact) = self.mid.mul(&other.mid, prec, BALL_ROUND);

        let rad = Mag::from_arf(&self.mid)
            .mul(&other.rad)
            .add(&Mag::from_arf(&other.mid).mul(&self.rad))
            .add(&self.rad.mul(&other.rad));

        Self::rounded(mid, rad, inexact, prec)
    }

    /// `x * n`.
    pub fn mul_bigint(&self, n: &BigInt, prec: u64) -> Self {
        let n = Arf::from_bigint(n);
        let (mid, inexact) = self.mid.mul(&n, prec, BALL_ROUND);
        let rad = self.rad.mul(&Mag::from_arf(&n));

        Self::rounded(mid, rad, inexact, prec)
    }

    /// `x / y`. Division by a ball containing zero is indeterminate.
    pub fn div(&self, other: &Self, prec: u64) -> Self {
        if !self.is_finite() || !other.is_finite() {
            return Self::indeterminate();
        }

        let ylow = Mag::from_arf_lower(&other.mid);

        if ylow <= other.rad {
            return Self::indeterminate();
        }

        let (mid, inexact) = self.mid.div(&other.mid, prec, BALL_ROUND);

        let rad = if self.rad.is_zero() && other.rad.is_zero() {
            Mag::Zero
        } else {
            // (|mx| ry + |my| rx) / (|my| (|my| - ry))
            let num = Mag::from_arf(&self.mid)
                .mul(&other.rad)
                .add(&Mag::from_arf(&other.mid).mul(&self.rad));

            let ymid = other.mid.abs();
            let (gap, _) = ymid.sub(&other.rad.to_arf(), 64, Round::Floor);
            let (den, _) = gap.mul(&ymid, 64, Round::Floor);

            num.div(&Mag::from_arf_lower(&den))
        };

        Self::rounded(mid, rad, inexact, prec)
    }

    /// `x / n`.
    pub fn div_u64(&self, n: u64, prec: u64) -> Self {
        self.div(&Self::from_u64(n), prec)
    }

    /// `x * 2^e`, exactly.
    pub fn mul_2exp(&self, e: &BigInt) -> Self {
        Self::new(self.mid.mul_2exp(e), self.rad.mul_2exp(e))
    }

    /// `x * 2^e`, exactly.
    pub fn mul_2exp_si(&self, e: i64) -> Self {
        self.mul_2exp(&BigInt::from(e))
    }

    /// The exact endpoints `[mid - rad, mid + rad]`, or `None` for an
    /// indeterminate ball.
    pub fn bounds(&self) -> Option<(Arf, Arf)> {
        if self.mid.is_nan() {
            return None;
        }

        if self.rad.is_inf() {
            return Some((Arf::neg_inf(), Arf::pos_inf()));
        }

        let r = self.rad.to_arf();

        Some((self.mid.sub_exact(&r), self.mid.add_exact(&r)))
    }

    /// Whether `x` lies in the ball.
    pub fn contains_arf(&self, x: &Arf) -> bool {
        if x.is_nan() {
            return self.mid.is_nan();
        }

        match self.bounds() {
            None => true,
            Some((lo, hi)) => lo <= *x && *x <= hi,
        }
    }

    /// Whether `other` is a subset of this ball.
    pub fn contains(&self, other: &Self) -> bool {
        let Some((lo, hi)) = self.bounds() else {
            return true;
        };

        let Some((olo, ohi)) = other.bounds() else {
            return false;
        };

        lo <= olo && ohi <= hi
    }

    /// Whether the two balls intersect.
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self.bounds(), other.bounds()) {
            (Some((lo, hi)), Some((olo, ohi))) => lo <= ohi && olo <= hi,
            _ => true,
        }
    }

    /// `log2(rad / |mid|)` rounded up, saturated to `i64`. An exact ball gives
    /// `i64::MIN`; an infinite radius or a special midpoint gives `i64::MAX`.
    pub fn rel_error_bits(&self) -> i64 {
        if self.rad.is_zero() {
            return i64::MIN;
        }

        match (self.rad.exp(), self.mid.exp()) {
            (Some(re), Some(me)) => (re + 1i32 - me).to_i64().unwrap_or_else(|| {
                if re > me {
                    i64::MAX
                } else {
                    i64::MIN
                }
            }),
            _ => i64::MAX,
        }
    }

    /// The number of accurate bits relative to the midpoint.
    pub fn rel_accuracy_bits(&self) -> i64 {
        self.rel_error_bits().saturating_neg()
    }

    /// Number of significant bits in the midpoint.
    pub fn bits(&self) -> u64 {
        self.mid.bits()
    }

    fn trim_step(&self) -> Self {
        if self.rad.is_zero() || self.mid.is_special() {
            return self.clone();
        }

        if self.rad.is_inf() {
            return Self::zero_pm_inf();
        }

        let accuracy = self.rel_accuracy_bits();
        let bits = self.bits() as i64;

        if accuracy < -TRIM_PADDING {
            Self::new(Arf::zero(), self.rad.add(&Mag::from_arf(&self.mid)))
        } else if accuracy < bits - 2 * TRIM_PADDING {
            self.set_round((accuracy.max(0) + TRIM_PADDING) as u64)
        } else {
            self.clone()
        }
    }

    /// Drop midpoint bits that carry no information relative to the radius.
    ///
    /// # Remarks
    /// The result contains this ball, loses at most about one bit of relative
    /// accuracy, and trimming it again changes nothing.
    pub fn trim(&self) -> Self {
        let mut cur = self.trim_step();

        loop {
            let next = cur.trim_step();

            if next == cur {
                return cur;
            }

            cur = next;
        }
    }

    /// In-place [`Arb::trim`].
    pub fn trim_assign(&mut self) {
        *self = self.trim();
    }

    /// Whether every point of the ball is positive.
    pub fn is_positive(&self) -> bool {
        match self.bounds() {
            Some((lo, _)) => lo > Arf::zero(),
            None => false,
        }
    }

    /// Whether the midpoint is negative.
    pub fn mid_is_negative(&self) -> bool {
        self.mid.is_negative()
    }

    /// Whether the radius is below `2^e`.
    pub fn rad_lt_2exp(&self, e: &BigInt) -> bool {
        self.rad.lt_2exp(e)
    }

    /// Whether `|mid|` is below `2^e`.
    pub fn mid_abs_lt_2exp(&self, e: &BigInt) -> bool {
        self.mid.is_zero() || self.mid.exp().map(|me| me <= e).unwrap_or(false)
    }
}

impl fmt::Display for Arb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} +/- {}]", self.mid, self.rad.to_arf())
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, thread_rng};

    use super::*;

    fn random_ball() -> Arb {
        let mut rng = thread_rng();

        let mid = Arf::from_i64(rng.gen_range(-1_000_000..1_000_000))
            .mul_2exp_si(rng.gen_range(-40..40));
        let rad = Mag::from_u64_2exp_si(rng.gen_range(0..1000), rng.gen_range(-60..0));

        Arb::new(mid, rad)
    }

    fn random_point(x: &Arb) -> Arf {
        let (lo, hi) = x.bounds().unwrap();
        let t = thread_rng().gen_range(0..=16u64);

        // lo + (hi - lo) * t / 16
        lo.add_exact(&hi.sub_exact(&lo).mul_exact(&Arf::from_u64(t)).mul_2exp_si(-4))
    }

    #[test]
    fn arithmetic_contains_pointwise_results() {
        for _ in 0..200 {
            let x = random_ball();
            let y = random_ball();
            let a = random_point(&x);
            let b = random_point(&y);
            let prec = thread_rng().gen_range(2..100);

            assert!(x.add(&y, prec).contains_arf(&a.add_exact(&b)));
            assert!(x.sub(&y, prec).contains_arf(&a.sub_exact(&b)));
            assert!(x.mul(&y, prec).contains_arf(&a.mul_exact(&b)));

            let q = x.div(&y, prec);

            if !q.is_indeterminate() {
                // q contains a / b iff q * b contains a within the rounding
                // of the check itself.
                let (lo, hi) = q.bounds().unwrap();
                let (l, h) = if b.is_negative() {
                    (hi.mul_exact(&b), lo.mul_exact(&b))
                } else {
                    (lo.mul_exact(&b), hi.mul_exact(&b))
                };

                assert!(l <= a && a <= h);
            }
        }
    }

    #[test]
    fn division_by_ball_containing_zero_is_indeterminate() {
        let y = Arb::new(Arf::from_f64(0.5), Mag::one());

        assert!(Arb::one().div(&y, 53).is_indeterminate());
        assert!(Arb::one().div(&Arb::zero(), 53).is_indeterminate());
    }

    #[test]
    fn predicates_handle_nan() {
        let nan = Arb::indeterminate();
        let one = Arb::one();

        assert!(nan.contains(&one));
        assert!(!one.contains(&nan));
        assert!(nan.overlaps(&one));
        assert!(!one.contains_arf(&Arf::nan()));
        assert!(nan.contains_arf(&Arf::nan()));
    }

    #[test]
    fn top_ball_contains_everything_finite() {
        let top = Arb::zero_pm_inf();

        assert!(top.contains(&random_ball()));
        assert!(top.contains_arf(&Arf::from_f64(-1e300)));
        assert!(!Arb::one().contains(&top));
    }

    #[test]
    fn rel_accuracy_reflects_radius() {
        let x = Arb::new(Arf::one(), Mag::from_u64_2exp_si(1, -20));

        assert_eq!(x.rel_error_bits(), -19);
        assert_eq!(x.rel_accuracy_bits(), 19);
        assert_eq!(Arb::one().rel_accuracy_bits(), i64::MAX);
        assert_eq!(Arb::zero_pm_inf().rel_accuracy_bits(), -i64::MAX);
    }

    #[test]
    fn trim_drops_noise_bits() {
        let mid = Arf::one().add_exact(&Arf::one().mul_2exp_si(-200));
        let x = Arb::new(mid, Mag::from_u64_2exp_si(1, -30));
        let t = x.trim();

        assert!(t.contains(&x));
        assert!(t.bits() <= 64);
        assert!(t.rel_accuracy_bits() >= x.rel_accuracy_bits() - 1);
        assert_eq!(t.trim(), t);
    }

    #[test]
    fn trim_keeps_accurate_balls() {
        let x = Arb::new(Arf::from_u64(12345), Mag::from_u64_2exp_si(1, -100));

        assert_eq!(x.trim(), x);
    }

    #[test]
    fn trim_of_inaccurate_ball_centers_on_zero() {
        let x = Arb::new(Arf::from_u64(3), Mag::from_u64_2exp_si(1, 40));
        let t = x.trim();

        assert!(t.mid().is_zero());
        assert!(t.contains(&x));
    }

    #[test]
    fn trim_is_idempotent_on_random_balls() {
        for _ in 0..200 {
            let mut x = random_ball();
            x = x.mul(&random_ball(), 200);

            let t = x.trim();

            assert!(t.contains(&x));
            assert_eq!(t.trim(), t);

            if x.rel_accuracy_bits() > 0 {
                assert!(t.rel_accuracy_bits() >= x.rel_accuracy_bits() - 1);
            }
        }
    }
}
