use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
/// Errors that can occur when configuring or driving the evaluator.
///
/// # Remarks
/// Numeric evaluation itself never fails: loss of accuracy widens the
/// returned ball instead. These errors only cover invalid configuration and
/// malformed input.
pub enum Error {
    /// The log-reduction precision window is empty.
    #[error("Log reduction window [{min}, {max}] is empty")]
    InvalidLogReductionWindow {
        /// Lower precision bound.
        min: u64,

        /// Upper precision bound.
        max: u64,
    },

    /// A threshold divisor was zero.
    #[error("Threshold divisor `{0}` must be nonzero")]
    ZeroDivisor(&'static str),

    /// The worker count override was zero.
    #[error("Thread count override must be at least 1")]
    ZeroThreads,

    /// The requested precision is not supported.
    #[error("Precision {0} is out of range; expected 2..={max}", max = crate::MAX_PREC)]
    InvalidPrecision(u64),

    /// A number could not be parsed.
    #[error("Failed to parse `{0}` as a binary floating-point number")]
    Parse(String),
}

/// A result that can fail with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
