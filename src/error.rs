//! Error types for transaction lifecycle failures.
//!
//! Every terminal outcome is tagged with the phase it belongs to. Causes
//! reported by the underlying resource are preserved behind the tag and can
//! be recovered with [`TxError::cause`] or downcast with
//! [`TxError::cause_as`]. Once a transaction tree has been finalized, all
//! further terminal calls report [`TxError::Exhausted`] wrapping whatever
//! the first call produced.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error used at the seam between this crate and a resource
/// implementation.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared, cloneable cause reported by a resource.
pub type TxCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Result alias for transaction operations.
pub type TxResult<T> = Result<T, TxError>;

/// Errors produced by transaction lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum TxError {
    /// Beginning a new transaction failed.
    #[error("transaction begin failed")]
    Begin(#[source] TxCause),

    /// The resource rejected a commit.
    #[error("transaction commit failed")]
    Commit(#[source] TxCause),

    /// The resource rejected a rollback.
    #[error("transaction rollback failed")]
    Rollback(#[source] TxCause),

    /// A terminal operation already ran on this transaction tree.
    ///
    /// Carries the outcome of the first terminal call: `None` when it
    /// succeeded, the phase-tagged failure otherwise.
    #[error("transaction exhausted")]
    Exhausted(#[source] Option<Box<TxError>>),
}

impl TxError {
    /// Tag `cause` as a begin failure.
    pub fn begin_failed(cause: impl Into<BoxError>) -> Self {
        TxError::Begin(Arc::from(cause.into()))
    }

    /// Tag `cause` as a commit failure.
    pub fn commit_failed(cause: impl Into<BoxError>) -> Self {
        TxError::Commit(Arc::from(cause.into()))
    }

    /// Tag `cause` as a rollback failure.
    pub fn rollback_failed(cause: impl Into<BoxError>) -> Self {
        TxError::Rollback(Arc::from(cause.into()))
    }

    /// The error reported when a finalized tree is finalized again after a
    /// clean first outcome.
    pub fn exhausted() -> Self {
        TxError::Exhausted(None)
    }

    /// Fold this error into the exhausted form stored on the shared state.
    ///
    /// An error that already carries the exhausted marker is kept as is so
    /// repeated finalization never stacks markers.
    pub(crate) fn into_exhausted(self) -> Self {
        match self {
            TxError::Exhausted(_) => self,
            other => TxError::Exhausted(Some(Box::new(other))),
        }
    }

    /// Whether the exhausted marker is anywhere in this error.
    pub fn is_exhausted(&self) -> bool {
        self.has(|err| matches!(err, TxError::Exhausted(_)))
    }

    /// Whether a begin failure is anywhere in this error.
    pub fn is_begin_failure(&self) -> bool {
        self.has(|err| matches!(err, TxError::Begin(_)))
    }

    /// Whether a commit failure is anywhere in this error, including one
    /// wrapped by the exhausted marker.
    pub fn is_commit_failure(&self) -> bool {
        self.has(|err| matches!(err, TxError::Commit(_)))
    }

    /// Whether a rollback failure is anywhere in this error, including one
    /// wrapped by the exhausted marker.
    pub fn is_rollback_failure(&self) -> bool {
        self.has(|err| matches!(err, TxError::Rollback(_)))
    }

    /// The cause reported by the resource, if any.
    ///
    /// Unwraps the exhausted marker first, so the cause of the original
    /// failure stays reachable on replayed errors.
    pub fn cause(&self) -> Option<&TxCause> {
        match self.tag() {
            TxError::Begin(cause) | TxError::Commit(cause) | TxError::Rollback(cause) => {
                Some(cause)
            }
            TxError::Exhausted(_) => None,
        }
    }

    /// The cause reported by the resource, downcast to `E`.
    pub fn cause_as<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause()?.downcast_ref::<E>()
    }

    /// The innermost phase tag, unwrapping exhausted markers.
    fn tag(&self) -> &TxError {
        match self {
            TxError::Exhausted(Some(inner)) => inner.tag(),
            other => other,
        }
    }

    /// Whether `pred` holds for any node in this error, descending through
    /// exhausted markers and through causes that are themselves [`TxError`]s.
    fn has(&self, pred: fn(&TxError) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            TxError::Exhausted(Some(inner)) => inner.has(pred),
            TxError::Exhausted(None) => false,
            TxError::Begin(cause) | TxError::Commit(cause) | TxError::Rollback(cause) => cause
                .downcast_ref::<TxError>()
                .is_some_and(|inner| inner.has(pred)),
        }
    }
}
