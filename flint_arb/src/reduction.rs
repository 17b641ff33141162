use num::{BigInt, Integer, One, Signed, ToPrimitive, Zero};

use crate::{
    arf::{Arf, Round},
    constants::ConstantCache,
    mpn,
};

/// Largest fixed-point precision, in bits, at which log 2 is used for
/// reduction. Larger requests fall back to the generic algorithms.
pub const LOG2_FIXED_MAX_PREC: u64 = 8192;

/// Guard bits beyond the integer part of the quotient.
const REDUCTION_GUARD_BITS: u64 = 12;

/// Reduce `x` modulo log 2.
///
/// # Remarks
/// Writes `w` (a `w.len()`-limb fraction in `[0, log 2)`) and returns
/// `(n, error)` such that `x` lies within `error * 2^(-64 wn)` of
/// `n log 2 + w`.
///
/// Works in fixed point with `S = 64 wn + max(exp(x), 0) + 12` bits:
/// `L = floor(log 2 * 2^S)`, `X = floor(x * 2^S)`, `n = floor(X / L)` and
/// `w = (X - n L) >> (S - 64 wn)`.
///
/// Returns `None` when `S` exceeds [`LOG2_FIXED_MAX_PREC`] or `x` is not
/// finite.
pub fn get_mpn_fixed_mod_log2(
    w: &mut [u64],
    x: &Arf,
    constants: &ConstantCache,
) -> Option<(BigInt, u64)> {
    let wn = w.len() as u64;

    if x.is_zero() {
        w.fill(0);
        return Some((BigInt::zero(), 0));
    }

    let exp = x.small_exp()?;
    let extra = exp.max(0) as u64 + REDUCTION_GUARD_BITS;
    let scale = 64 * wn + extra;

    if scale > LOG2_FIXED_MAX_PREC {
        return None;
    }

    let ln2 = constants.log2(scale + 10);
    let (ln2_mid, ln2_rad) = (ln2.mid(), ln2.rad());

    let l = ln2_mid.to_fixed_floor(scale);
    let l_err: BigInt = ln2_rad
        .to_arf()
        .mul_2exp(&BigInt::from(scale))
        .to_bigint(Round::Ceil)
        + 1;

    let xs = x.to_fixed_floor(scale);
    let (n, rem) = xs.div_mod_floor(&l);

    let rem = rem >> extra;
    let rem = rem.magnitude();

    mpn::from_biguint(w, rem);

    // (1 + |n| eL) / 2^extra rounded up, plus one for the shift
    let unit = BigInt::one() << extra;
    let err: BigInt = (n.abs() * l_err).div_ceil(&unit) + 2;

    Some((n, err.to_u64()?))
}

#[cfg(test)]
mod tests {
    use num::BigInt;
    use rand::{Rng, thread_rng};

    use super::*;
    use crate::{arb::Arb, mag::Mag};

    fn random_arf(prec: u64, max_exp: i64) -> Arf {
        let mut rng = thread_rng();
        let m = rng.gen_range(-(1i64 << 52)..(1i64 << 52));
        let e = rng.gen_range(-max_exp..max_exp);

        Arf::from_i64(m).mul_2exp_si(e - 52).round(prec, Round::Down).0
    }

    #[test]
    fn reduction_contains_input() {
        let constants = ConstantCache::new();

        for i in 0..300 {
            let wn = thread_rng().gen_range(1..40);
            let mut x = random_arf(64, 14);

            // Inputs close to multiples of log 2.
            if i % 4 == 0 {
                let q = thread_rng().gen_range(-200i64..200);
                let t = constants.log2(200).mul_bigint(&BigInt::from(q), 200);
                x = x.mul_2exp_si(-40).add(t.mid(), 200, Round::Down).0;
            }

            let mut w = vec![0; wn];
            let Some((n, error)) = get_mpn_fixed_mod_log2(&mut w, &x, &constants) else {
                continue;
            };

            let (wmid, _) = Arf::from_fixed(&w, wn, false, 64 * wn as u64, Round::Down);
            let wball = Arb::new(wmid.clone(), Mag::from_u64_2exp_si(error, -64 * wn as i64));

            let prec2 = 64 * wn as u64 + 200;
            let ln2 = constants.log2(prec2);
            let t = ln2.mul_bigint(&n, prec2).add(&wball, prec2);

            assert!(t.contains_arf(&x), "x = {x}, n = {n}");
            assert!(wmid >= Arf::zero());
            assert!(wmid < *ln2.mid());
        }
    }

    #[test]
    fn reduction_rejects_huge_inputs() {
        let constants = ConstantCache::new();
        let mut w = vec![0; 4];
        let x = Arf::one().mul_2exp_si(10_000);

        assert!(get_mpn_fixed_mod_log2(&mut w, &x, &constants).is_none());
    }

    #[test]
    fn reduction_of_small_positive_input_is_identity() {
        let constants = ConstantCache::new();
        let mut w = vec![0; 2];
        let x = Arf::from_f64(0.5);

        let (n, error) = get_mpn_fixed_mod_log2(&mut w, &x, &constants).unwrap();

        assert_eq!(n, BigInt::zero());
        assert_eq!(w, vec![0, 1 << 63]);
        assert!(error <= 2);
    }
}
