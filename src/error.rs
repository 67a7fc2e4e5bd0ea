/// Error kinds reported by the node registry.
///
/// `InvalidArgument` and `OutOfMemory` are recoverable: the caller drops the
/// offending frame and carries on. `InternalInconsistency` marks a broken
/// invariant; debug builds assert before it is ever returned.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid frame record: {0}")]
    InvalidArgument(&'static str),

    #[error("out of memory: {0} pool is full")]
    OutOfMemory(&'static str),

    #[error("internal inconsistency: {0}")]
    InternalInconsistency(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Check an invariant. Fails loudly in debug builds, reports
/// `InternalInconsistency` otherwise.
#[inline]
pub(crate) fn ensure(cond: bool, what: &'static str) -> Result<()> {
    debug_assert!(cond, "internal inconsistency: {what}");
    if cond {
        Ok(())
    } else {
        Err(Error::InternalInconsistency(what))
    }
}
