//! Exact arithmetic on little-endian vectors of 64-bit limbs.
//!
//! These are the fixed-width primitives the Taylor kernels and the argument
//! reduction are written against. Every function is exact; truncation only
//! happens where a caller explicitly discards low limbs.

use std::cmp::Ordering;

use num::BigUint;

/// Number of bits in a limb.
pub const LIMB_BITS: u32 = 64;

/// `a += b` over `b.len()` limbs, propagating the carry into the rest of `a`.
/// Returns the carry out of the top of `a`.
///
/// # Panics
/// If `a.len() < b.len()`.
pub fn add_n(a: &mut [u64], b: &[u64]) -> u64 {
    assert!(a.len() >= b.len());

    let mut carry = 0u64;

    for (x, y) in a.iter_mut().zip(b.iter()) {
        let (s1, c1) = x.overflowing_add(*y);
        let (s2, c2) = s1.overflowing_add(carry);
        *x = s2;
        carry = (c1 as u64) + (c2 as u64);
    }

    add_1(&mut a[b.len()..], carry)
}

/// `a -= b` over `b.len()` limbs, propagating the borrow into the rest of `a`.
/// Returns the borrow out of the top of `a`.
///
/// # Panics
/// If `a.len() < b.len()`.
pub fn sub_n(a: &mut [u64], b: &[u64]) -> u64 {
    assert!(a.len() >= b.len());

    let mut borrow = 0u64;

    for (x, y) in a.iter_mut().zip(b.iter()) {
        let (d1, b1) = x.overflowing_sub(*y);
        let (d2, b2) = d1.overflowing_sub(borrow);
        *x = d2;
        borrow = (b1 as u64) + (b2 as u64);
    }

    sub_1(&mut a[b.len()..], borrow)
}

/// `a += c`, returning the carry out.
pub fn add_1(a: &mut [u64], c: u64) -> u64 {
    let mut carry = c;

    for x in a.iter_mut() {
        if carry == 0 {
            break;
        }

        let (s, c) = x.overflowing_add(carry);
        *x = s;
        carry = c as u64;
    }

    carry
}

/// `a -= c`, returning the borrow out.
pub fn sub_1(a: &mut [u64], c: u64) -> u64 {
    let mut borrow = c;

    for x in a.iter_mut() {
        if borrow == 0 {
            break;
        }

        let (d, b) = x.overflowing_sub(borrow);
        *x = d;
        borrow = b as u64;
    }

    borrow
}

/// Shift `a` right by `cnt` bits in place, returning the bits shifted out
/// (left-aligned in the returned limb).
///
/// # Panics
/// If `cnt` is not in `1..64`.
pub fn rshift(a: &mut [u64], cnt: u32) -> u64 {
    assert!(cnt > 0 && cnt < LIMB_BITS);

    let out = a.first().map(|x| x << (LIMB_BITS - cnt)).unwrap_or(0);

    for i in 0..a.len() {
        let hi = a.get(i + 1).copied().unwrap_or(0);
        a[i] = (a[i] >> cnt) | (hi << (LIMB_BITS - cnt));
    }

    out
}

/// Shift `a` left by `cnt` bits in place, returning the bits shifted out
/// (right-aligned in the returned limb).
///
/// # Panics
/// If `cnt` is not in `1..64`.
pub fn lshift(a: &mut [u64], cnt: u32) -> u64 {
    assert!(cnt > 0 && cnt < LIMB_BITS);

    let out = a.last().map(|x| x >> (LIMB_BITS - cnt)).unwrap_or(0);

    for i in (0..a.len()).rev() {
        let lo = if i > 0 { a[i - 1] } else { 0 };
        a[i] = (a[i] << cnt) | (lo >> (LIMB_BITS - cnt));
    }

    out
}

/// Compare two equal-length limb vectors as unsigned integers.
pub fn cmp(a: &[u64], b: &[u64]) -> Ordering {
    assert_eq!(a.len(), b.len());

    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            o => return o,
        }
    }

    Ordering::Equal
}

/// Whether every limb is zero.
pub fn is_zero(a: &[u64]) -> bool {
    a.iter().all(|x| *x == 0)
}

/// Number of leading zero bits of `a` viewed as a `64 * a.len()` bit integer.
/// A zero vector has `64 * a.len()` leading zeros.
pub fn leading_zeros(a: &[u64]) -> u64 {
    let mut count = 0u64;

    for x in a.iter().rev() {
        if *x != 0 {
            return count + x.leading_zeros() as u64;
        }

        count += LIMB_BITS as u64;
    }

    count
}

/// `r = a * b`, schoolbook.
///
/// # Panics
/// If `r.len() != a.len() + b.len()`.
pub fn mul(r: &mut [u64], a: &[u64], b: &[u64]) {
    assert_eq!(r.len(), a.len() + b.len());

    r.fill(0);

    for (i, y) in b.iter().enumerate() {
        let carry = addmul_1(&mut r[i..i + a.len()], a, *y);
        r[i + a.len()] = carry;
    }
}

/// `r = a * a`.
pub fn sqr(r: &mut [u64], a: &[u64]) {
    mul(r, a, a);
}

/// `a *= s`, returning the high limb.
pub fn mul_1(a: &mut [u64], s: u64) -> u64 {
    let mut carry = 0u64;

    for x in a.iter_mut() {
        let p = (*x as u128) * (s as u128) + carry as u128;
        *x = p as u64;
        carry = (p >> 64) as u64;
    }

    carry
}

/// `r += a * s` over `a.len()` limbs of `r`, returning the carry limb.
///
/// # Panics
/// If `r.len() < a.len()`.
pub fn addmul_1(r: &mut [u64], a: &[u64], s: u64) -> u64 {
    assert!(r.len() >= a.len());

    let mut carry = 0u64;

    for (x, y) in r.iter_mut().zip(a.iter()) {
        let p = (*y as u128) * (s as u128) + (*x as u128) + carry as u128;
        *x = p as u64;
        carry = (p >> 64) as u64;
    }

    carry
}

/// `a = floor(a / d)`, returning the remainder.
///
/// # Panics
/// If `d == 0`.
pub fn divrem_1(a: &mut [u64], d: u64) -> u64 {
    assert_ne!(d, 0);

    let mut rem = 0u128;

    for x in a.iter_mut().rev() {
        let cur = (rem << 64) | (*x as u128);
        *x = (cur / d as u128) as u64;
        rem = cur % d as u128;
    }

    rem as u64
}

/// `root = floor(sqrt(x))`. Returns whether the square root was exact.
///
/// # Panics
/// If the root does not fit in `root`.
pub fn sqrtrem(root: &mut [u64], x: &[u64]) -> bool {
    let v = to_biguint(x);
    let s = v.sqrt();
    let exact = &s * &s == v;

    from_biguint(root, &s);

    exact
}

/// Interpret a limb vector as an unsigned integer.
pub fn to_biguint(a: &[u64]) -> BigUint {
    let bytes = a.iter().flat_map(|x| x.to_le_bytes()).collect::<Vec<_>>();

    BigUint::from_bytes_le(&bytes)
}

/// Write `v` into `out`, zero-filling the high limbs.
///
/// # Panics
/// If `v` does not fit in `out.len()` limbs.
pub fn from_biguint(out: &mut [u64], v: &BigUint) {
    let digits = v.to_u64_digits();

    assert!(
        digits.len() <= out.len(),
        "value of {} limbs does not fit in {} limbs",
        digits.len(),
        out.len()
    );

    out.fill(0);
    out[..digits.len()].copy_from_slice(&digits);
}
