//! In-memory transaction source.
//!
//! Backed by nothing but counters, this adapter exists to exercise the
//! coordinator and handle machinery: tests seed it with the failures they
//! want and read back how often each lifecycle call actually reached the
//! resource. It is also the smallest worked example of implementing
//! [`TxResource`] and [`TxBeginner`].

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::coordinator::Coordinator;
use crate::error::BoxError;
use crate::handle::Transaction;
use crate::resource::{BeginOptions, TxBeginner, TxResource};
use crate::scope::Scope;

/// Coordinator over the in-memory source.
pub type InMemoryCoordinator = Coordinator<InMemoryBeginner>;

/// Error produced by the in-memory source when seeded to fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MemError(pub String);

impl MemError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An in-memory transaction resource.
#[derive(Debug, Default)]
pub struct InMemoryTx {
    fail_with: Option<MemError>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl InMemoryTx {
    /// A resource whose lifecycle calls succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resource whose lifecycle calls fail with `error`.
    pub fn failing(error: MemError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    /// How often `commit` reached this resource.
    pub fn commit_calls(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// How often `rollback` reached this resource.
    pub fn rollback_calls(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Total lifecycle calls that reached this resource.
    pub fn finalize_calls(&self) -> usize {
        self.commit_calls() + self.rollback_calls()
    }
}

impl TxResource for InMemoryTx {
    fn commit(&self, _scope: &Scope) -> Result<(), BoxError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!(err = ?self.fail_with, "in-memory commit");
        match &self.fail_with {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    fn rollback(&self, _scope: &Scope) -> Result<(), BoxError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        debug!(err = ?self.fail_with, "in-memory rollback");
        match &self.fail_with {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }
}

/// Opens [`InMemoryTx`] transactions.
///
/// Seed failures with the builder methods: a begin error makes `begin`
/// itself fail, a tx error makes the opened resources fail their
/// lifecycle calls.
#[derive(Debug, Default)]
pub struct InMemoryBeginner {
    begin_error: Option<MemError>,
    tx_error: Option<MemError>,
    begins: AtomicUsize,
    last_options: AtomicUsize,
}

impl InMemoryBeginner {
    /// A beginner whose transactions succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `begin` call with `message`.
    pub fn begin_error(mut self, message: impl Into<String>) -> Self {
        self.begin_error = Some(MemError::new(message));
        self
    }

    /// Open resources that fail their lifecycle calls with `message`.
    pub fn tx_error(mut self, message: impl Into<String>) -> Self {
        self.tx_error = Some(MemError::new(message));
        self
    }

    /// How often `begin` was called, including failed calls.
    pub fn begin_calls(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    /// Number of option values passed to the most recent `begin`.
    pub fn last_options_len(&self) -> usize {
        self.last_options.load(Ordering::SeqCst)
    }
}

impl TxBeginner for InMemoryBeginner {
    type Resource = InMemoryTx;

    fn begin(
        &self,
        scope: &Scope,
        options: &BeginOptions,
    ) -> Result<Transaction<InMemoryTx>, BoxError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.last_options.store(options.len(), Ordering::SeqCst);
        debug!(
            options = options.len(),
            begin_err = ?self.begin_error,
            tx_err = ?self.tx_error,
            "in-memory begin"
        );

        if let Some(err) = &self.begin_error {
            return Err(err.clone().into());
        }
        let resource = match &self.tx_error {
            Some(err) => InMemoryTx::failing(err.clone()),
            None => InMemoryTx::new(),
        };
        Ok(Transaction::wrap_owned(scope, resource))
    }
}
