use thiserror::Error;

/// Errors raised by ensemble construction, compaction, merging and
/// code generation. All of them are programming or configuration
/// errors: nothing here is transient and nothing is retried.
#[derive(Debug, Error, PartialEq)]
pub enum PrtlError {
    /// Inconsistent or missing construction inputs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A merge could not fit the donor's alive particles.
    #[error("capacity exceeded: {needed} particles to add but only {free} free slots")]
    CapacityExceeded { needed: usize, free: usize },

    /// An unimplemented option, or an operation the backend cannot run.
    #[error("not supported: {0}")]
    NotSupported(String),
}

pub type Result<T> = std::result::Result<T, PrtlError>;

impl PrtlError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> PrtlError {
        PrtlError::Configuration(msg.into())
    }

    pub(crate) fn unsupported<S: Into<String>>(msg: S) -> PrtlError {
        PrtlError::NotSupported(msg.into())
    }
}
