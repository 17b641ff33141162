use crate::{
    ExpParams,
    arf::Arf,
    tables::{TAB1_PREC, TAB2_PREC},
};

/// Generic-path inputs with `mag < -prec / RS_SMALL_MAG_DIVISOR` always use
/// rectangular splitting.
pub const RS_SMALL_MAG_DIVISOR: i64 = 16;

/// Above this precision rectangular splitting is never preferred for its
/// small-argument advantage.
pub const RS_MAX_SMALL_MAG_PREC: u64 = 1_000_000_000;

/// Which precomputed tables the table path uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLevel {
    /// One 8-bit lookup into the low-precision table.
    One,

    /// Two 5-bit lookups into the high-precision tables.
    Two,
}

/// Working precisions of the table-based path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePlan {
    /// Which tables to use.
    pub level: TableLevel,

    /// Absolute working precision in bits.
    pub wp: u64,

    /// Number of fractional limbs.
    pub wn: usize,

    /// `64 * wn`.
    pub wprounded: u64,
}

/// How [`crate::ExpEvaluator::exp_arf`] evaluates a given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpStrategy {
    /// Zero, infinities and NaN.
    Special,

    /// The exponent exceeds the limit: the top ball for positive inputs, a
    /// tiny positive ball for negative ones.
    Overflow,

    /// `|x|` is so small that `1 + x` (or just 1 when `constant_only`) is
    /// accurate to the target precision.
    TinyLinear {
        /// Return 1 with radius `2|x|` instead of `1 + x` with radius `x^2`.
        constant_only: bool,
    },

    /// Reduce by multiples of log 2 and log 3.
    LogReduction,

    /// Reduce modulo log 2 and by table lookups, then evaluate a fixed-point
    /// Taylor series.
    TableReduction(TablePlan),

    /// Evaluate entirely in ball arithmetic.
    Generic,
}

/// Algorithms available on the generic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericAlgorithm {
    /// Reduce a large argument by log 2 first.
    Huge,

    /// Taylor series by rectangular splitting with repeated squaring.
    RectangularSplitting,

    /// Taylor series by (parallel) binary splitting on bit-chunks of `x`.
    BinarySplitting,
}

/// Decide how to evaluate `exp(x)` (or `exp(x) - 1` when `minus_one`) at
/// `prec` bits.
pub fn choose_strategy(
    x: &Arf,
    prec: u64,
    minus_one: bool,
    maglim: i64,
    params: &ExpParams,
) -> ExpStrategy {
    if x.is_special() {
        return ExpStrategy::Special;
    }

    let Some(exp) = x.small_exp() else {
        return if x.abs_bound_lt_2exp() > 0 {
            ExpStrategy::Overflow
        } else {
            ExpStrategy::TinyLinear {
                constant_only: false,
            }
        };
    };

    let iprec = prec as i64;

    if !minus_one && exp < -iprec - 4 {
        return ExpStrategy::TinyLinear {
            constant_only: true,
        };
    }

    let linear_limit = if minus_one {
        -iprec - 4
    } else {
        -(iprec / 2) - 4
    };

    if exp < linear_limit {
        return ExpStrategy::TinyLinear {
            constant_only: false,
        };
    }

    if exp > maglim {
        return ExpStrategy::Overflow;
    }

    if params.in_log_reduction_window(prec) {
        return ExpStrategy::LogReduction;
    }

    match table_plan(prec, minus_one, exp) {
        Some(plan) => ExpStrategy::TableReduction(plan),
        None => ExpStrategy::Generic,
    }
}

/// Working precision of the table path, or `None` if it exceeds what the
/// tables can certify.
pub fn table_plan(prec: u64, minus_one: bool, exp: i64) -> Option<TablePlan> {
    let mut wp = prec + 8;

    if minus_one && exp <= 0 {
        wp += exp.unsigned_abs();
    }

    let wn = wp.div_ceil(64);
    let wprounded = 64 * wn;

    // Leave room to add the truncation error without overflowing the limb.
    let wp = wp.max(wprounded - 60);

    if wp > TAB2_PREC {
        return None;
    }

    let level = if wp <= TAB1_PREC {
        TableLevel::One
    } else {
        TableLevel::Two
    };

    Some(TablePlan {
        level,
        wp,
        wn: wn as usize,
        wprounded,
    })
}

/// Choose a generic algorithm for `x` at `prec` bits with `threads` workers.
pub fn choose_generic(x: &Arf, prec: u64, threads: usize, params: &ExpParams) -> GenericAlgorithm {
    let mag = x.abs_bound_lt_2exp();
    let iprec = prec as i64;

    if mag > params.huge_mag || (mag > params.huge_mag_low_prec && prec < params.huge_prec) {
        return GenericAlgorithm::Huge;
    }

    let want_rs = if prec < params.rs_max_prec || mag < -iprec / RS_SMALL_MAG_DIVISOR {
        true
    } else if x.bits() < prec / params.bb_bits_divisor {
        false
    } else if threads == 1 {
        prec < params.serial_rs_max_prec
            || (prec < RS_MAX_SMALL_MAG_PREC
                && mag < -iprec / params.serial_mag_divisor as i64)
    } else {
        prec < params.rs_max_prec
            || (prec < RS_MAX_SMALL_MAG_PREC
                && mag < -iprec / params.parallel_mag_divisor as i64)
    };

    if want_rs {
        GenericAlgorithm::RectangularSplitting
    } else {
        GenericAlgorithm::BinarySplitting
    }
}
