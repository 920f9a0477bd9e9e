//! Domain error types.
//!
//! All validation performed by this crate surfaces through [`CoreError`].
//! Each variant carries enough context for callers to build a useful
//! rejection message without inspecting opaque strings.

/// Unified error type for the OpenGrid domain model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A submitted field is outside its allowed range.
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A submitted tag is not part of its closed set.
    #[error("unknown {field}: {value}")]
    UnknownTag { field: &'static str, value: String },
}

/// Convenience alias used throughout the domain crate.
pub type Result<T> = std::result::Result<T, CoreError>;
