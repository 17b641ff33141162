use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Tuning thresholds for the exponential engine.
///
/// # Remarks
/// None of these affect correctness: every path returns a ball containing the
/// true value. They only decide which algorithm runs for a given magnitude and
/// precision.
///
/// The table-based path covers low precision. Between
/// `log_reduction_min_prec` and `log_reduction_max_prec` bits the engine
/// reduces by multiples of log 2 and log 3 instead. Above that, or when the
/// tables cannot certify the requested accuracy, it falls back to the generic
/// algorithms, choosing between rectangular splitting in ball arithmetic and
/// (parallel) binary splitting with the remaining thresholds.
pub struct ExpParams {
    /// Smallest precision at which log-based reduction is used.
    pub log_reduction_min_prec: u64,

    /// Largest precision at which log-based reduction is used.
    pub log_reduction_max_prec: u64,

    /// Below this precision the generic path always uses rectangular
    /// splitting.
    pub rs_max_prec: u64,

    /// With one worker, rectangular splitting is preferred below this
    /// precision.
    pub serial_rs_max_prec: u64,

    /// Binary splitting is preferred when the input has fewer than
    /// `prec / bb_bits_divisor` significant bits.
    pub bb_bits_divisor: u64,

    /// With one worker, rectangular splitting is preferred when
    /// `mag < -prec / serial_mag_divisor`.
    pub serial_mag_divisor: u64,

    /// With several workers, rectangular splitting is preferred when
    /// `mag < -prec / parallel_mag_divisor`.
    pub parallel_mag_divisor: u64,

    /// Inputs with `|x| >= 2^huge_mag` are first reduced by log 2.
    pub huge_mag: i64,

    /// Below `huge_prec`, inputs with `|x| >= 2^huge_mag_low_prec` are
    /// reduced by log 2.
    pub huge_mag_low_prec: i64,

    /// See `huge_mag_low_prec`.
    pub huge_prec: u64,

    /// Overrides the number of available workers. `None` asks rayon.
    pub threads: Option<usize>,
}

/// The default engine thresholds.
pub const DEFAULT_PARAMS: ExpParams = ExpParams {
    log_reduction_min_prec: 2240,
    log_reduction_max_prec: 40_000,
    rs_max_prec: 10_000,
    serial_rs_max_prec: 20_000,
    bb_bits_divisor: 128,
    serial_mag_divisor: 800,
    parallel_mag_divisor: 200,
    huge_mag: 64,
    huge_mag_low_prec: 8,
    huge_prec: 1_000_000,
    threads: None,
};

impl Default for ExpParams {
    fn default() -> Self {
        DEFAULT_PARAMS
    }
}

impl ExpParams {
    /// Check that the thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        if self.log_reduction_min_prec > self.log_reduction_max_prec {
            return Err(Error::InvalidLogReductionWindow {
                min: self.log_reduction_min_prec,
                max: self.log_reduction_max_prec,
            });
        }

        if self.bb_bits_divisor == 0 {
            return Err(Error::ZeroDivisor("bb_bits_divisor"));
        }

        if self.serial_mag_divisor == 0 {
            return Err(Error::ZeroDivisor("serial_mag_divisor"));
        }

        if self.parallel_mag_divisor == 0 {
            return Err(Error::ZeroDivisor("parallel_mag_divisor"));
        }

        if self.threads == Some(0) {
            return Err(Error::ZeroThreads);
        }

        Ok(())
    }

    /// The number of workers available to binary splitting.
    pub fn num_threads(&self) -> usize {
        self.threads.unwrap_or_else(rayon::current_num_threads)
    }

    /// Whether log-based reduction applies at `prec`.
    pub fn in_log_reduction_window(&self, prec: u64) -> bool {
        prec >= self.log_reduction_min_prec && prec <= self.log_reduction_max_prec
    }

    /// Parameters that never select log-based reduction.
    pub fn without_log_reduction(self) -> Self {
        Self {
            log_reduction_min_prec: u64::MAX,
            log_reduction_max_prec: u64::MAX,
            ..self
        }
    }
}
