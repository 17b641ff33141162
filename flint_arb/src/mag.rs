use std::cmp::Ordering;

use num::{BigInt, BigUint, One, Signed, ToPrimitive};

use crate::arf::Arf;

/// Number of mantissa bits in a [`Mag`].
pub const MAG_BITS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A nonnegative upper bound used as the radius of a ball.
///
/// # Remarks
/// A finite nonzero value is `man * 2^(exp - 30)` with
/// `2^29 <= man < 2^30`, so `2^(exp-1) <= v < 2^exp`. Every operation rounds
/// its result up: a `Mag` may overestimate but never underestimate the
/// quantity it bounds.
pub enum Mag {
    /// Zero.
    Zero,

    /// Positive infinity.
    Inf,

    /// `man * 2^(exp - 30)`.
    Finite {
        /// 30-bit mantissa with the top bit set.
        man: u32,

        /// Exponent.
        exp: BigInt,
    },
}

impl Default for Mag {
    fn default() -> Self {
        Self::Zero
    }
}

/// Upper bound on `m * 2^e` with a 30-bit mantissa.
fn set_u128_2exp(m: u128, e: BigInt) -> Mag {
    set_u128_2exp_rnd(m, e, true)
}

fn set_u128_2exp_rnd(m: u128, e: BigInt, up: bool) -> Mag {
    if m == 0 {
        return Mag::Zero;
    }

    let bits = 128 - m.leading_zeros();

    if bits <= MAG_BITS {
        return Mag::Finite {
            man: (m << (MAG_BITS - bits)) as u32,
            exp: e + bits,
        };
    }

    let shift = bits - MAG_BITS;
    let mut q = m >> shift;
    let mut exp = e + bits;

    if up && (q << shift) != m {
        q += 1;

        if q == 1 << MAG_BITS {
            q = 1 << (MAG_BITS - 1);
            exp += 1;
        }
    }

    Mag::Finite {
        man: q as u32,
        exp,
    }
}

/// Leading bits of a mantissa together with the exponent of its lowest kept
/// bit, and whether any bits were dropped.
fn top_bits(mant: &BigUint, exp: &BigInt) -> (u128, BigInt, bool) {
    let bits = mant.bits();

    if bits <= 64 {
        let m = mant.to_u64().unwrap_or(0) as u128;

        return (m, exp - BigInt::from(bits), false);
    }

    let shift = bits - 64;
    let top = mant >> shift;
    let dropped = (&top << shift) != *mant;

    (
        top.to_u64().unwrap_or(u64::MAX) as u128,
        exp - BigInt::from(64),
        dropped,
    )
}

impl Mag {
    /// Zero.
    pub fn zero() -> Self {
        Self::Zero
    }

    /// One.
    pub fn one() -> Self {
        Self::from_u64_2exp_si(1, 0)
    }

    /// Infinity.
    pub fn inf() -> Self {
        Self::Inf
    }

    /// Upper bound on `m * 2^e`.
    pub fn from_u64_2exp(m: u64, e: &BigInt) -> Self {
        set_u128_2exp(m as u128, e.clone())
    }

    /// Upper bound on `m * 2^e`.
    pub fn from_u64_2exp_si(m: u64, e: i64) -> Self {
        set_u128_2exp(m as u128, BigInt::from(e))
    }

    /// Upper bound on `|x|`. NaN and infinities give [`Mag::Inf`].
    pub fn from_arf(x: &Arf) -> Self {
        if x.is_zero() {
            return Self::Zero;
        }

        match (x.mant(), x.exp()) {
            (Some(mant), Some(exp)) => {
                let (m, e, dropped) = top_bits(mant, exp);

                set_u128_2exp(m + dropped as u128, e)
            }
            _ => Self::Inf,
        }
    }

    /// Lower bound on `|x|`. NaN and infinities give [`Mag::Inf`].
    pub fn from_arf_lower(x: &Arf) -> Self {
        if x.is_zero() {
            return Self::Zero;
        }

        match (x.mant(), x.exp()) {
            (Some(mant), Some(exp)) => {
                let (m, e, _) = top_bits(mant, exp);

                set_u128_2exp_rnd(m, e, false)
            }
            _ => Self::Inf,
        }
    }

    /// The exact value as an [`Arf`].
    pub fn to_arf(&self) -> Arf {
        match self {
            Self::Zero => Arf::zero(),
            Self::Inf => Arf::pos_inf(),
            Self::Finite { man, exp } => {
                Arf::from_int_2exp(&BigInt::from(*man), &(exp - BigInt::from(MAG_BITS)))
            }
        }
    }

    /// Approximate value as a double.
    pub fn to_f64(&self) -> f64 {
        self.to_arf().to_f64()
    }

    /// Whether this is zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Zero)
    }

    /// Whether this is infinite.
    pub fn is_inf(&self) -> bool {
        matches!(self, Self::Inf)
    }

    /// Whether this is finite (including zero).
    pub fn is_finite(&self) -> bool {
        !self.is_inf()
    }

    /// The exponent `e` with `2^(e-1) <= v < 2^e` of a finite nonzero value.
    pub fn exp(&self) -> Option<&BigInt> {
        match self {
            Self::Finite { exp, .. } => Some(exp),
            _ => None,
        }
    }

    /// Upper bound on `a + b`.
    pub fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Inf, _) | (_, Self::Inf) => Self::Inf,
            (Self::Zero, x) | (x, Self::Zero) => x.clone(),
            (Self::Finite { man: ma, exp: ea }, Self::Finite { man: mb, exp: eb }) => {
                let ((ma, ea), (mb, eb)) = if ea >= eb {
                    ((*ma, ea), (*mb, eb))
                } else {
                    ((*mb, eb), (*ma, ea))
                };

                let low = eb - BigInt::from(MAG_BITS);

                match (ea - eb).to_u32().filter(|d| *d < MAG_BITS) {
                    Some(d) => set_u128_2exp(((ma as u128) << d) + mb as u128, low),
                    // b < 2^eb <= 2^(ea - 30), one unit of a's mantissa.
                    None => set_u128_2exp(ma as u128 + 1, ea - BigInt::from(MAG_BITS)),
                }
            }
        }
    }

    /// Upper bound on `a * b`.
    pub fn mul(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Zero, _) | (_, Self::Zero) => Self::Zero,
            (Self::Inf, _) | (_, Self::Inf) => Self::Inf,
            (Self::Finite { man: ma, exp: ea }, Self::Finite { man: mb, exp: eb }) => {
                set_u128_2exp(
                    *ma as u128 * *mb as u128,
                    ea + eb - BigInt::from(2 * MAG_BITS),
                )
            }
        }
    }

    /// Upper bound on `a / b`. Division by zero gives infinity.
    pub fn div(&self, other: &Self) -> Self {
        match (self, other) {
            (_, Self::Zero) | (Self::Inf, _) => Self::Inf,
            (Self::Zero, _) | (_, Self::Inf) => Self::Zero,
            (Self::Finite { man: ma, exp: ea }, Self::Finite { man: mb, exp: eb }) => {
                let num = (*ma as u128) << 34;
                let den = *mb as u128;
                let q = num.div_ceil(den);

                set_u128_2exp(q, ea - eb - BigInt::from(34))
            }
        }
    }

    /// `a * 2^e`, exactly.
    pub fn mul_2exp(&self, e: &BigInt) -> Self {
        match self {
            Self::Finite { man, exp } => Self::Finite {
                man: *man,
                exp: exp + e,
            },
            x => x.clone(),
        }
    }

    /// `a * 2^e`, exactly.
    pub fn mul_2exp_si(&self, e: i64) -> Self {
        self.mul_2exp(&BigInt::from(e))
    }

    /// Upper bound on `a + 2^(exp(mid) - prec)`, one unit in the last place
    /// of a midpoint rounded to `prec` bits.
    pub fn add_ulp(&self, mid: &Arf, prec: u64) -> Self {
        match mid.exp() {
            Some(e) => self.add(&Self::from_u64_2exp(1, &(e - BigInt::from(prec)))),
            None if mid.is_zero() => self.clone(),
            None => Self::Inf,
        }
    }

    /// Upper bound on `exp(a) - 1`.
    pub fn expm1(&self) -> Self {
        match self {
            Self::Zero => Self::Zero,
            Self::Inf => Self::Inf,
            Self::Finite { man, exp } => {
                if !exp.is_positive() {
                    // a <= 1: exp(a) - 1 <= a + a^2
                    return self.add(&self.mul(self));
                }

                let e = match exp.to_i64() {
                    Some(e) if e <= 64 => e,
                    _ => return Self::Inf,
                };

                // exp(a) <= 2^(3a/2)
                let three_man = BigUint::from(3 * *man as u64);
                let k = if e >= 31 {
                    three_man << (e - 31) as u64
                } else {
                    let d = BigUint::one() << (31 - e) as u64;
                    (&three_man + &d - 1u32) / d
                };

                Self::from_u64_2exp(1, &BigInt::from(k))
            }
        }
    }

    /// The larger of two bounds.
    pub fn max(&self, other: &Self) -> Self {
        if self >= other {
            self.clone()
        } else {
            other.clone()
        }
    }

    /// Whether `a < 2^e`.
    pub fn lt_2exp(&self, e: &BigInt) -> bool {
        match self {
            Self::Zero => true,
            Self::Inf => false,
            Self::Finite { exp, .. } => exp <= e,
        }
    }
}

impl PartialOrd for Mag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Mag {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Zero, Self::Zero) | (Self::Inf, Self::Inf) => Ordering::Equal,
            (Self::Zero, _) | (_, Self::Inf) => Ordering::Less,
            (_, Self::Zero) | (Self::Inf, _) => Ordering::Greater,
            (Self::Finite { man: ma, exp: ea }, Self::Finite { man: mb, exp: eb }) => {
                ea.cmp(eb).then(ma.cmp(mb))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, thread_rng};

    use super::*;

    fn exact(m: &Mag) -> Arf {
        m.to_arf()
    }

    #[test]
    fn from_u64_rounds_up() {
        let m = Mag::from_u64_2exp_si(u64::MAX, 0);

        assert!(exact(&m) >= Arf::from_u64(u64::MAX));
        assert_eq!(m.exp(), Some(&BigInt::from(65)));

        let m = Mag::from_u64_2exp_si(3, -2);
        assert_eq!(exact(&m), Arf::from_f64(0.75));
    }

    #[test]
    fn arithmetic_rounds_up() {
        for _ in 0..200 {
            let a = thread_rng().next_u64() >> (thread_rng().next_u32() % 64);
            let b = thread_rng().next_u64() >> (thread_rng().next_u32() % 64);
            let sa = (thread_rng().next_u32() % 200) as i64 - 100;
            let sb = (thread_rng().next_u32() % 200) as i64 - 100;

            let x = Arf::from_u64(a).mul_2exp_si(sa);
            let y = Arf::from_u64(b).mul_2exp_si(sb);
            let ma = Mag::from_arf(&x);
            let mb = Mag::from_arf(&y);

            assert!(exact(&ma) >= x);
            assert!(exact(&Mag::from_arf_lower(&x)) <= x);
            assert!(exact(&ma.add(&mb)) >= x.add_exact(&y));
            assert!(exact(&ma.mul(&mb)) >= x.mul_exact(&y));

            if b != 0 {
                let q = exact(&ma.div(&mb));
                assert!(q.mul_exact(&y) >= x);
            }
        }
    }

    #[test]
    fn add_with_distant_exponents() {
        let a = Mag::one();
        let b = Mag::from_u64_2exp_si(1, -1000);
        let s = a.add(&b);

        assert!(s > a);
        assert!(exact(&s) <= Arf::from_f64(1.0 + 1e-8));
    }

    #[test]
    fn expm1_is_upper_bound() {
        for v in [1e-10, 0.25, 0.5, 1.0, 2.0, 10.0, 100.0] {
            let m = Mag::from_arf(&Arf::from_f64(v));
            let bound = m.expm1().to_f64();

            assert!(bound >= v.exp_m1(), "{v}: {bound}");
        }

        assert!(Mag::from_u64_2exp_si(1, 1 << 40).expm1().is_inf());
    }

    #[test]
    fn ordering_matches_value() {
        let vals = [
            Mag::Zero,
            Mag::from_u64_2exp_si(1, -10),
            Mag::from_u64_2exp_si(3, -10),
            Mag::one(),
            Mag::from_u64_2exp_si(5, 100),
            Mag::Inf,
        ];

        for (i, a) in vals.iter().enumerate() {
            for (j, b) in vals.iter().enumerate() {
                assert_eq!(a.cmp(b), i.cmp(&j));
            }
        }
    }

    #[test]
    fn add_ulp_uses_midpoint_exponent() {
        let mid = Arf::from_f64(1.5);
        let r = Mag::Zero.add_ulp(&mid, 10);

        assert_eq!(exact(&r), Arf::one().mul_2exp_si(-9));
    }
}
