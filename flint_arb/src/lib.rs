#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Rigorous ball arithmetic and a certified exponential.
//!
//! A real number is represented by an [`Arb`]: a floating-point midpoint
//! ([`Arf`]) together with an error radius ([`Mag`]). Every operation
//! returns a ball that is guaranteed to contain the exact result for every
//! point of its inputs. Loss of accuracy never raises an error; the ball just
//! gets wider, up to the unbounded ball [`Arb::zero_pm_inf`].
//!
//! The centerpiece is [`ExpEvaluator::exp_arf`], which picks among several
//! algorithms depending on the magnitude of the argument and the requested
//! precision:
//!
//! * closed forms for special, tiny and overflowing arguments,
//! * reduction modulo log 2 and precomputed [`tables`] followed by a
//!   fixed-point Taylor series from [`taylor`],
//! * reduction by log 2 and log 3 at medium precision,
//! * rectangular splitting or (parallel) binary splitting in
//!   [`exp::generic`] at high precision.
//!
//! Constants such as log 2 come from a [`ConstantCache`], which memoizes each
//! constant at the highest precision requested so far.
//!
//! # Example
//!
//! ```rust
//! use flint_arb::{Arb, Arf, ConstantCache, DEFAULT_PARAMS, ExpEvaluator};
//!
//! let cache = ConstantCache::new();
//! let ev = ExpEvaluator::new(&cache, DEFAULT_PARAMS);
//!
//! // e to double precision.
//! let e = ev.exp_arf(&Arf::one(), 53, false, 128);
//! assert!(e.rel_accuracy_bits() >= 52);
//! assert!((e.mid().to_f64() - std::f64::consts::E).abs() < 1e-15);
//!
//! // exp(x) - 1 stays accurate for tiny x.
//! let x = Arb::from_f64(1e-20);
//! let y = ev.expm1(&x, 64);
//! assert!((y.mid().to_f64() - 1e-20).abs() < 1e-35);
//! ```
mod arb;
mod arf;
mod constants;
mod error;
pub use error::*;

/// The exponential engine and its generic algorithms.
pub mod exp;
mod mag;

/// Little-endian limb vector arithmetic.
pub mod mpn;
mod params;

/// Reduction of an argument modulo log 2.
pub mod reduction;

/// Thread-local scratch buffers for limb arithmetic.
pub mod scratch;

/// Choosing an algorithm for the exponential.
pub mod strategy;

/// Precomputed tables of `exp(p / 2^k)`.
pub mod tables;
pub mod taylor;

pub use arb::{Arb, TRIM_PADDING};
pub use arf::{Arf, BALL_ROUND, PREC_EXACT, Round, SMALL_EXP_LIMIT};
pub use constants::{ConstantCache, ConstantId};
pub use exp::{ExpEvaluator, exp_arf, try_exp_arf};
pub use mag::{MAG_BITS, Mag};
pub use params::{DEFAULT_PARAMS, ExpParams};
pub use strategy::{ExpStrategy, GenericAlgorithm, TableLevel, TablePlan};
pub use tables::TableLookup;

/// The largest precision, in bits, accepted by the engine.
pub const MAX_PREC: u64 = 1 << 40;
