use std::{cmp::Ordering, fmt, str::FromStr};

use num::{BigInt, BigUint, Integer, One, Signed, ToPrimitive, Zero, bigint::Sign};

use crate::{Error, Result};

/// Passing this as a precision requests an exact (unrounded) result.
pub const PREC_EXACT: u64 = u64::MAX;

/// Exponents with magnitude beyond this are "huge": the exponential engine
/// treats such inputs as overflow or as negligibly small.
pub const SMALL_EXP_LIMIT: i64 = 1 << 62;

/// Rounding direction for [`Arf`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    /// Toward zero.
    Down,

    /// Away from zero.
    Up,

    /// Toward negative infinity.
    Floor,

    /// Toward positive infinity.
    Ceil,

    /// To nearest, ties to even.
    Near,
}

/// The rounding mode used for ball midpoints. Any mode is sound since the
/// rounding error is always added to the radius.
pub const BALL_ROUND: Round = Round::Down;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ArfKind {
    Zero,
    PosInf,
    NegInf,
    Nan,
    /// `(-1)^negative * mant * 2^(exp - bits(mant))`, `mant` odd.
    Finite {
        negative: bool,
        mant: BigUint,
        exp: BigInt,
    },
}

/// An arbitrary-precision binary floating-point number with an unbounded
/// exponent.
///
/// # Remarks
/// A finite nonzero value is stored as a sign, an odd mantissa and an exponent
/// `exp` such that `2^(exp-1) <= |x| < 2^exp`. Stripping trailing zero bits
/// from the mantissa makes the representation unique, so structural equality
/// is value equality (with all NaNs equal to each other).
///
/// Operations that can round take a precision in bits and a [`Round`] mode and
/// return the result together with a flag telling whether rounding occurred.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arf(ArfKind);

impl Default for Arf {
    fn default() -> Self {
        Self::zero()
    }
}

impl Arf {
    /// Zero.
    pub fn zero() -> Self {
        Self(ArfKind::Zero)
    }

    /// One.
    pub fn one() -> Self {
        Self::from_u64(1)
    }

    /// Positive infinity.
    pub fn pos_inf() -> Self {
        Self(ArfKind::PosInf)
    }

    /// Negative infinity.
    pub fn neg_inf() -> Self {
        Self(ArfKind::NegInf)
    }

    /// The indeterminate value (NaN).
    pub fn nan() -> Self {
        Self(ArfKind::Nan)
    }

    /// `±mant * 2^low_exp`, exactly.
    fn finite(negative: bool, mant: BigUint, low_exp: BigInt) -> Self {
        if mant.is_zero() {
            return Self::zero();
        }

        let tz = mant.trailing_zeros().unwrap_or(0);
        let mant = mant >> tz;
        let exp = low_exp + BigInt::from(tz) + BigInt::from(mant.bits());

        Self(ArfKind::Finite {
            negative,
            mant,
            exp,
        })
    }

    /// Round `±mant * 2^low_exp` to `prec` bits.
    fn round_finite(
        negative: bool,
        mant: BigUint,
        low_exp: BigInt,
        prec: u64,
        rnd: Round,
    ) -> (Self, bool) {
        if mant.is_zero() {
            return (Self::zero(), false);
        }

        let bits = mant.bits();

        if prec == PREC_EXACT || bits <= prec {
            return (Self::finite(negative, mant, low_exp), false);
        }

        let shift = bits - prec;
        let mut q = &mant >> shift;
        let rem = mant - (&q << shift);

        if rem.is_zero() {
            return (Self::finite(negative, q, low_exp + BigInt::from(shift)), false);
        }

        let up = match rnd {
            Round::Down => false,
            Round::Up => true,
            Round::Floor => negative,
            Round::Ceil => !negative,
            Round::Near => {
                let half = BigUint::one() << (shift - 1);

                match rem.cmp(&half) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => q.is_odd(),
                }
            }
        };

        if up {
            q += 1u32;
        }

        (Self::finite(negative, q, low_exp + BigInt::from(shift)), true)
    }

    /// `m * 2^e`, exactly.
    pub fn from_int_2exp(m: &BigInt, e: &BigInt) -> Self {
        Self::finite(m.is_negative(), m.magnitude().clone(), e.clone())
    }

    /// Convert an integer exactly.
    pub fn from_bigint(m: &BigInt) -> Self {
        Self::from_int_2exp(m, &BigInt::zero())
    }

    /// Convert an integer exactly.
    pub fn from_i64(v: i64) -> Self {
        Self::from_bigint(&BigInt::from(v))
    }

    /// Convert an integer exactly.
    pub fn from_u64(v: u64) -> Self {
        Self::finite(false, BigUint::from(v), BigInt::zero())
    }

    /// Convert a double exactly.
    pub fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            return Self::nan();
        }

        if v.is_infinite() {
            return if v > 0.0 {
                Self::pos_inf()
            } else {
                Self::neg_inf()
            };
        }

        if v == 0.0 {
            return Self::zero();
        }

        let bits = v.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7ff) as i64;
        let frac = bits & ((1u64 << 52) - 1);

        let (mant, e) = if biased == 0 {
            (frac, -1074)
        } else {
            (frac | (1u64 << 52), biased - 1075)
        };

        Self::finite(negative, BigUint::from(mant), BigInt::from(e))
    }

    /// Round to the nearest double. Values outside the double range overflow
    /// to infinity or flush to zero.
    pub fn to_f64(&self) -> f64 {
        match &self.0 {
            ArfKind::Zero => 0.0,
            ArfKind::PosInf => f64::INFINITY,
            ArfKind::NegInf => f64::NEG_INFINITY,
            ArfKind::Nan => f64::NAN,
            ArfKind::Finite { negative, exp, .. } => {
                let sign = if *negative { -1.0 } else { 1.0 };

                match exp.to_i64() {
                    Some(e) if e > 1024 => sign * f64::INFINITY,
                    Some(e) if e < -1080 => 0.0,
                    None if exp.is_positive() => sign * f64::INFINITY,
                    None => 0.0,
                    Some(_) => {
                        let (r, _) = self.round(53, Round::Near);

                        match &r.0 {
                            ArfKind::Finite { mant, exp, .. } => {
                                let m = mant.to_f64().unwrap_or(0.0);
                                let low = exp.to_i64().unwrap_or(0) - mant.bits() as i64;

                                sign * ldexp(m, low)
                            }
                            _ => 0.0,
                        }
                    }
                }
            }
        }
    }

    /// `m * 2^-(64 * frac_limbs)` where `m` is the unsigned integer held in
    /// `limbs`, negated if `negative`, rounded to `prec` bits.
    pub fn from_fixed(
        limbs: &[u64],
        frac_limbs: usize,
        negative: bool,
        prec: u64,
        rnd: Round,
    ) -> (Self, bool) {
        let mant = crate::mpn::to_biguint(limbs);
        let low = -BigInt::from(64 * frac_limbs as u64);

        Self::round_finite(negative, mant, low, prec, rnd)
    }

    /// Whether this is zero.
    pub fn is_zero(&self) -> bool {
        matches!(self.0, ArfKind::Zero)
    }

    /// Whether this is zero, an infinity or NaN.
    pub fn is_special(&self) -> bool {
        !matches!(self.0, ArfKind::Finite { .. })
    }

    /// Whether this is zero or a finite nonzero number.
    pub fn is_finite(&self) -> bool {
        matches!(self.0, ArfKind::Zero | ArfKind::Finite { .. })
    }

    /// Whether this is NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self.0, ArfKind::Nan)
    }

    /// Whether this is `+inf`.
    pub fn is_pos_inf(&self) -> bool {
        matches!(self.0, ArfKind::PosInf)
    }

    /// Whether this is `-inf`.
    pub fn is_neg_inf(&self) -> bool {
        matches!(self.0, ArfKind::NegInf)
    }

    /// Whether this is `+inf` or `-inf`.
    pub fn is_inf(&self) -> bool {
        self.is_pos_inf() || self.is_neg_inf()
    }

    /// Whether the sign bit is set (finite negative numbers and `-inf`).
    pub fn is_negative(&self) -> bool {
        match &self.0 {
            ArfKind::NegInf => true,
            ArfKind::Finite { negative, .. } => *negative,
            _ => false,
        }
    }

    /// -1, 0 or 1. NaN gives 0.
    pub fn sgn(&self) -> i32 {
        match &self.0 {
            ArfKind::Zero | ArfKind::Nan => 0,
            ArfKind::PosInf => 1,
            ArfKind::NegInf => -1,
            ArfKind::Finite { negative, .. } => {
                if *negative {
                    -1
                } else {
                    1
                }
            }
        }
    }

    /// The exponent `e` with `2^(e-1) <= |x| < 2^e`, for finite nonzero `x`.
    pub fn exp(&self) -> Option<&BigInt> {
        match &self.0 {
            ArfKind::Finite { exp, .. } => Some(exp),
            _ => None,
        }
    }

    /// The exponent if it is finite and within [`SMALL_EXP_LIMIT`].
    pub fn small_exp(&self) -> Option<i64> {
        self.exp()
            .and_then(|e| e.to_i64())
            .filter(|e| e.abs() <= SMALL_EXP_LIMIT)
    }

    /// The odd mantissa of a finite nonzero value.
    pub fn mant(&self) -> Option<&BigUint> {
        match &self.0 {
            ArfKind::Finite { mant, .. } => Some(mant),
            _ => None,
        }
    }

    /// Number of significant bits; zero for special values.
    pub fn bits(&self) -> u64 {
        self.mant().map(|m| m.bits()).unwrap_or(0)
    }

    /// The smallest `e` with `|x| < 2^e`, saturated to `i64`. Zero gives
    /// `i64::MIN`, infinities and NaN give `i64::MAX`.
    pub fn abs_bound_lt_2exp(&self) -> i64 {
        match &self.0 {
            ArfKind::Zero => i64::MIN,
            ArfKind::Finite { exp, .. } => exp.to_i64().unwrap_or(if exp.is_positive() {
                i64::MAX
            } else {
                i64::MIN
            }),
            _ => i64::MAX,
        }
    }

    /// `-x`.
    pub fn neg(&self) -> Self {
        Self(match &self.0 {
            ArfKind::PosInf => ArfKind::NegInf,
            ArfKind::NegInf => ArfKind::PosInf,
            ArfKind::Finite {
                negative,
                mant,
                exp,
            } => ArfKind::Finite {
                negative: !negative,
                mant: mant.clone(),
                exp: exp.clone(),
            },
            k => k.clone(),
        })
    }

    /// `|x|`.
    pub fn abs(&self) -> Self {
        if self.is_negative() {
            self.neg()
        } else {
            self.clone()
        }
    }

    /// `x * 2^e`, exactly.
    pub fn mul_2exp(&self, e: &BigInt) -> Self {
        match &self.0 {
            ArfKind::Finite {
                negative,
                mant,
                exp,
            } => Self(ArfKind::Finite {
                negative: *negative,
                mant: mant.clone(),
                exp: exp + e,
            }),
            _ => self.clone(),
        }
    }

    /// `x * 2^e`, exactly.
    pub fn mul_2exp_si(&self, e: i64) -> Self {
        self.mul_2exp(&BigInt::from(e))
    }

    /// Round to `prec` bits.
    pub fn round(&self, prec: u64, rnd: Round) -> (Self, bool) {
        match &self.0 {
            ArfKind::Finite {
                negative,
                mant,
                exp,
            } => {
                let low = exp - BigInt::from(mant.bits());

                Self::round_finite(*negative, mant.clone(), low, prec, rnd)
            }
            _ => (self.clone(), false),
        }
    }

    fn low_exp(mant: &BigUint, exp: &BigInt) -> BigInt {
        exp - BigInt::from(mant.bits())
    }

    /// `x + y` rounded to `prec` bits.
    ///
    /// # Remarks
    /// The operands may have arbitrarily distant exponents: an operand far
    /// below the rounding position of the other is replaced by a sticky bit of
    /// the same sign, which rounds identically.
    pub fn add(&self, other: &Self, prec: u64, rnd: Round) -> (Self, bool) {
        use ArfKind::*;

        match (&self.0, &other.0) {
            (Nan, _) | (_, Nan) => (Self::nan(), false),
            (PosInf, NegInf) | (NegInf, PosInf) => (Self::nan(), false),
            (PosInf, _) | (_, PosInf) => (Self::pos_inf(), false),
            (NegInf, _) | (_, NegInf) => (Self::neg_inf(), false),
            (Zero, _) => other.round(prec, rnd),
            (_, Zero) => self.round(prec, rnd),
            (
                Finite {
                    negative: na,
                    mant: ma,
                    exp: ea,
                },
                Finite {
                    negative: nb,
                    mant: mb,
                    exp: eb,
                },
            ) => {
                // Order so that `a` has the larger top exponent.
                let ((na, ma, ea), (nb, mb, eb)) = if ea >= eb {
                    ((*na, ma, ea), (*nb, mb, eb))
                } else {
                    ((*nb, mb, eb), (*na, ma, ea))
                };

                let a_low = Self::low_exp(ma, ea);
                let mut b_low = Self::low_exp(mb, eb);
                let mut mb = mb.clone();

                if prec != PREC_EXACT {
                    let window = ea - BigInt::from(prec) - BigInt::from(2);
                    let pos = if a_low < window { a_low.clone() } else { window };

                    if *eb < pos {
                        mb = BigUint::one();
                        b_low = pos - BigInt::from(2);
                    }
                }

                let low = if a_low < b_low {
                    a_low.clone()
                } else {
                    b_low.clone()
                };

                let shift_a = (&a_low - &low).to_u64().unwrap_or(0);
                let shift_b = (&b_low - &low).to_u64().unwrap_or(0);

                let a = BigInt::from_biguint(
                    if na { Sign::Minus } else { Sign::Plus },
                    ma << shift_a,
                );
                let b = BigInt::from_biguint(
                    if nb { Sign::Minus } else { Sign::Plus },
                    mb << shift_b,
                );

                let s = a + b;

                Self::round_finite(s.is_negative(), s.magnitude().clone(), low, prec, rnd)
            }
        }
    }

    /// `x - y` rounded to `prec` bits.
    pub fn sub(&self, other: &Self, prec: u64, rnd: Round) -> (Self, bool) {
        self.add(&other.neg(), prec, rnd)
    }

    /// `x + y`, exactly.
    pub fn add_exact(&self, other: &Self) -> Self {
        self.add(other, PREC_EXACT, Round::Down).0
    }

    /// `x - y`, exactly.
    pub fn sub_exact(&self, other: &Self) -> Self {
        self.sub(other, PREC_EXACT, Round::Down).0
    }

    /// `x * y` rounded to `prec` bits.
    pub fn mul(&self, other: &Self, prec: u64, rnd: Round) -> (Self, bool) {
        use ArfKind::*;

        match (&self.0, &other.0) {
            (Nan, _) | (_, Nan) => (Self::nan(), false),
            (Zero, PosInf | NegInf) | (PosInf | NegInf, Zero) => (Self::nan(), false),
            (Zero, _) | (_, Zero) => (Self::zero(), false),
            (PosInf | NegInf, _) | (_, PosInf | NegInf) => {
                if self.is_negative() != other.is_negative() {
                    (Self::neg_inf(), false)
                } else {
                    (Self::pos_inf(), false)
                }
            }
            (
                Finite {
                    negative: na,
                    mant: ma,
                    exp: ea,
                },
                Finite {
                    negative: nb,
                    mant: mb,
                    exp: eb,
                },
            ) => {
                let low = Self::low_exp(ma, ea) + Self::low_exp(mb, eb);

                Self::round_finite(na != nb, ma * mb, low, prec, rnd)
            }
        }
    }

    /// `x * y`, exactly.
    pub fn mul_exact(&self, other: &Self) -> Self {
        self.mul(other, PREC_EXACT, Round::Down).0
    }

    /// `x / y` rounded to `prec` bits.
    ///
    /// # Panics
    /// If `prec` is [`PREC_EXACT`]; quotients are generally not representable.
    pub fn div(&self, other: &Self, prec: u64, rnd: Round) -> (Self, bool) {
        use ArfKind::*;

        assert_ne!(prec, PREC_EXACT, "division requires a finite precision");

        match (&self.0, &other.0) {
            (Nan, _) | (_, Nan) => (Self::nan(), false),
            (PosInf | NegInf, PosInf | NegInf) => (Self::nan(), false),
            (Zero, Zero) => (Self::nan(), false),
            (_, Zero) => {
                if self.is_negative() {
                    (Self::neg_inf(), false)
                } else {
                    (Self::pos_inf(), false)
                }
            }
            (Zero, _) | (Finite { .. }, PosInf | NegInf) => (Self::zero(), false),
            (PosInf | NegInf, Finite { .. }) => {
                if self.is_negative() != other.is_negative() {
                    (Self::neg_inf(), false)
                } else {
                    (Self::pos_inf(), false)
                }
            }
            (
                Finite {
                    negative: na,
                    mant: ma,
                    exp: ea,
                },
                Finite {
                    negative: nb,
                    mant: mb,
                    exp: eb,
                },
            ) => {
                let want = prec.saturating_add(3).saturating_add(mb.bits());
                let shift = want.saturating_sub(ma.bits());

                let (q, r) = (ma << shift).div_rem(mb);

                let mut low =
                    Self::low_exp(ma, ea) - Self::low_exp(mb, eb) - BigInt::from(shift);

                let q = if r.is_zero() {
                    q
                } else {
                    low -= 1;
                    (q << 1u32) | BigUint::one()
                };

                let (res, inexact) = Self::round_finite(na != nb, q, low, prec, rnd);

                (res, inexact || !r.is_zero())
            }
        }
    }

    /// Compare absolute values. NaN compares as `None`.
    pub fn cmp_abs(&self, other: &Self) -> Option<Ordering> {
        use ArfKind::*;

        match (&self.0, &other.0) {
            (Nan, _) | (_, Nan) => None,
            (Zero, Zero) => Some(Ordering::Equal),
            (Zero, _) => Some(Ordering::Less),
            (_, Zero) => Some(Ordering::Greater),
            (PosInf | NegInf, PosInf | NegInf) => Some(Ordering::Equal),
            (PosInf | NegInf, _) => Some(Ordering::Greater),
            (_, PosInf | NegInf) => Some(Ordering::Less),
            (
                Finite {
                    mant: ma, exp: ea, ..
                },
                Finite {
                    mant: mb, exp: eb, ..
                },
            ) => match ea.cmp(eb) {
                Ordering::Equal => {
                    let (ba, bb) = (ma.bits(), mb.bits());

                    Some(if ba >= bb {
                        ma.cmp(&(mb << (ba - bb)))
                    } else {
                        (ma << (bb - ba)).cmp(mb)
                    })
                }
                o => Some(o),
            },
        }
    }

    /// Whether `2^e <= |x|`, i.e. `|x|` has a top exponent above `e`.
    pub fn abs_ge_2exp(&self, e: &BigInt) -> bool {
        match &self.0 {
            ArfKind::Finite { exp, .. } => *exp > *e,
            ArfKind::PosInf | ArfKind::NegInf => true,
            _ => false,
        }
    }

    /// Convert to an integer, rounding in direction `rnd`.
    ///
    /// # Panics
    /// If `x` is not finite.
    pub fn to_bigint(&self, rnd: Round) -> BigInt {
        let (negative, mant, exp) = match &self.0 {
            ArfKind::Zero => return BigInt::zero(),
            ArfKind::Finite {
                negative,
                mant,
                exp,
            } => (*negative, mant, exp),
            _ => panic!("cannot convert a non-finite value to an integer"),
        };

        let low = Self::low_exp(mant, exp);
        let sign = if negative { Sign::Minus } else { Sign::Plus };

        if !low.is_negative() {
            let shift = low.to_u64().expect("integer conversion out of range");

            return BigInt::from_biguint(sign, mant << shift);
        }

        let shift = (-&low).to_u64().unwrap_or(u64::MAX);

        let (mut q, rem_cmp_half, exact) = if shift > mant.bits() {
            (BigUint::zero(), Ordering::Less, false)
        } else {
            let q = mant >> shift;
            let rem = mant - (&q << shift);
            let half = BigUint::one() << (shift - 1);

            (q, rem.cmp(&half), rem.is_zero())
        };

        if !exact {
            let up = match rnd {
                Round::Down => false,
                Round::Up => true,
                Round::Floor => negative,
                Round::Ceil => !negative,
                Round::Near => match rem_cmp_half {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => q.is_odd(),
                },
            };

            if up {
                q += 1u32;
            }
        }

        BigInt::from_biguint(sign, q)
    }

    /// `floor(x * 2^scale)`.
    pub fn to_fixed_floor(&self, scale: u64) -> BigInt {
        self.mul_2exp(&BigInt::from(scale)).to_bigint(Round::Floor)
    }
}

impl fmt::Display for Arf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ArfKind::Zero => write!(f, "0"),
            ArfKind::PosInf => write!(f, "+inf"),
            ArfKind::NegInf => write!(f, "-inf"),
            ArfKind::Nan => write!(f, "nan"),
            ArfKind::Finite {
                negative,
                mant,
                exp,
            } => {
                let sign = if *negative { "-" } else { "" };
                let low = Self::low_exp(mant, exp);

                if low.is_zero() {
                    write!(f, "{sign}{mant}")
                } else {
                    write!(f, "{sign}{mant}*2^{low}")
                }
            }
        }
    }
}

impl FromStr for Arf {
    type Err = Error;

    /// Parses `nan`, `inf`, `-inf`, exact `m*2^e` (as printed) and integers
    /// exactly. Anything else is read as a decimal double.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let err = || Error::Parse(s.to_owned());

        match s {
            "nan" => return Ok(Self::nan()),
            "inf" | "+inf" => return Ok(Self::pos_inf()),
            "-inf" => return Ok(Self::neg_inf()),
            _ => {}
        }

        if let Some((m, e)) = s.split_once("*2^") {
            let m = m.parse::<BigInt>().map_err(|_| err())?;
            let e = e.parse::<BigInt>().map_err(|_| err())?;

            return Ok(Self::from_int_2exp(&m, &e));
        }

        if let Ok(m) = s.parse::<BigInt>() {
            return Ok(Self::from_bigint(&m));
        }

        let v = s.parse::<f64>().map_err(|_| err())?;

        if v.is_finite() {
            Ok(Self::from_f64(v))
        } else {
            Err(err())
        }
    }
}

/// `m * 2^e` with a single final rounding.
fn ldexp(mut m: f64, mut e: i64) -> f64 {
    while e > 1000 {
        m *= 2f64.powi(1000);
        e -= 1000;
    }

    while e < -1000 {
        m *= 2f64.powi(-1000);
        e += 1000;
    }

    m * 2f64.powi(e as i32)
}

impl PartialOrd for Arf {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }

        match (self.sgn(), other.sgn()) {
            (a, b) if a != b => Some(a.cmp(&b)),
            (0, 0) => Some(Ordering::Equal),
            (1, 1) => self.cmp_abs(other),
            _ => other.cmp_abs(self),
        }
    }
}
