//! Error kinds surfaced by the engine (spec §7).

use thiserror::Error;

/// Errors the engine can report. Out-of-range parameters are clamped, not
/// errored (§4.14) — this enum is reserved for the handful of cases that
/// genuinely cannot be satisfied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A filter design was asked to use a corner frequency outside
    /// `(0, sample_rate / 2)`. The engine keeps its prior coefficients.
    #[error("invalid filter corner frequency: {0} Hz is not in (0, {1}) Hz")]
    InvalidCorner(f64, f64),

    /// A control message other than `Init` arrived before `Init`.
    #[error("engine received a control message before Init")]
    NotInitialized,

    /// The shared buffer handed to `Init` is too small for the declared
    /// `snapshot_points`.
    #[error("shared buffer has {actual} bytes, need at least {required}")]
    ShapeMismatch { actual: usize, required: usize },
}
