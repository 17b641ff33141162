use std::sync::OnceLock;

use log::{debug, error};
use num::{BigInt, Signed};

use crate::{arf::Arf, exp::generic::exp_bb, mpn};

/// Index bits of the one-level table.
pub const TAB1_BITS: u32 = 8;

/// Precision in bits of the one-level table.
pub const TAB1_PREC: u64 = 512;

/// Limbs per one-level table entry.
pub const TAB1_LIMBS: usize = (TAB1_PREC / 64) as usize;

/// Entries in the one-level table: `p / 256 < log(2)` for `p <= 177`.
pub const TAB1_LEN: usize = 178;

/// Index bits of the first two-level table.
pub const TAB21_BITS: u32 = 5;

/// Index bits of the second two-level table.
pub const TAB22_BITS: u32 = 5;

/// Precision in bits of both two-level tables.
pub const TAB2_PREC: u64 = 4608;

/// Limbs per two-level table entry.
pub const TAB2_LIMBS: usize = (TAB2_PREC / 64) as usize;

/// Entries in the first two-level table: `p / 32 < log(2)` for `p <= 22`.
pub const TAB21_LEN: usize = 23;

/// Entries in the second two-level table.
pub const TAB22_LEN: usize = 1 << TAB22_BITS;

/// The result of an [`ExpTable`] lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLookup<'a> {
    /// The top `wn` limbs of the entry, a fraction with `wn` limbs.
    Hit(&'a [u64]),

    /// The index is past the end of the table or `wn` exceeds its precision.
    /// The caller must fall back to an algorithm that doesn't need the table.
    OutOfRange,
}

/// Fixed-point values of `exp(p / 2^shift) / 2`.
///
/// # Remarks
/// Each entry is a fraction of [`ExpTable::limbs`] limbs that differs from
/// the true value by less than 2 units in its last place. Halving keeps every
/// entry below 1 so products of entries and Taylor sums stay fractions.
#[derive(Debug)]
pub struct ExpTable {
    shift: u32,
    limbs: usize,
    entries: Vec<Vec<u64>>,
}

impl ExpTable {
    fn build(shift: u32, limbs: usize, len: usize) -> Self {
        let prec = 64 * limbs as u64;

        debug!("building exp table: {len} entries of exp(p/2^{shift}) at {prec} bits");

        let entries = (0..len).map(|p| Self::entry(p, shift, limbs)).collect();

        Self {
            shift,
            limbs,
            entries,
        }
    }

    fn entry(p: usize, shift: u32, limbs: usize) -> Vec<u64> {
        let prec = 64 * limbs as u64;
        let x = Arf::from_u64(p as u64).mul_2exp_si(-(shift as i64));
        let v = exp_bb(&x, prec + 64, false, 1);

        if !v.rad_lt_2exp(&BigInt::from(-(prec as i64))) {
            error!("exp({p}/2^{shift}) is not accurate to {prec} bits: {v}");
            panic!("exp table entry {p} exceeds its error bound");
        }

        // floor(mid / 2 * 2^prec)
        let fixed = v.mid().to_fixed_floor(prec - 1);

        if fixed.is_negative() || fixed.bits() > prec {
            error!("exp({p}/2^{shift}) does not fit a {limbs}-limb fraction: {v}");
            panic!("exp table entry {p} is out of range");
        }

        let mut out = vec![0; limbs];
        mpn::from_biguint(&mut out, fixed.magnitude());

        out
    }

    /// The entry for `p` truncated to its top `wn` limbs.
    pub fn lookup(&self, p: usize, wn: usize) -> TableLookup<'_> {
        match self.entries.get(p) {
            Some(e) if wn <= self.limbs => TableLookup::Hit(&e[self.limbs - wn..]),
            _ => TableLookup::OutOfRange,
        }
    }

    /// Entries hold `exp(p / 2^shift) / 2`.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Limbs per entry.
    pub fn limbs(&self) -> usize {
        self.limbs
    }

    /// Precision of each entry in bits.
    pub fn prec(&self) -> u64 {
        64 * self.limbs as u64
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static TAB1: OnceLock<ExpTable> = OnceLock::new();
static TAB21: OnceLock<ExpTable> = OnceLock::new();
static TAB22: OnceLock<ExpTable> = OnceLock::new();

/// `exp(p / 2^8) / 2` at 512 bits.
pub fn tab1() -> &'static ExpTable {
    TAB1.get_or_init(|| ExpTable::build(TAB1_BITS, TAB1_LIMBS, TAB1_LEN))
}

/// `exp(p / 2^5) / 2` at 4608 bits.
pub fn tab21() -> &'static ExpTable {
    TAB21.get_or_init(|| ExpTable::build(TAB21_BITS, TAB2_LIMBS, TAB21_LEN))
}

/// `exp(p / 2^10) / 2` at 4608 bits.
pub fn tab22() -> &'static ExpTable {
    TAB22.get_or_init(|| ExpTable::build(TAB21_BITS + TAB22_BITS, TAB2_LIMBS, TAB22_LEN))
}
