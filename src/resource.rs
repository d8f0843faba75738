//! Integration seam between the coordinator and an actual transactional
//! resource.
//!
//! Implement [`TxResource`] for the value that represents one underlying
//! transaction (a database handle, a session, a staged batch) and
//! [`TxBeginner`] for the factory that opens them. Everything else in this
//! crate is generic over these two traits.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::handle::Transaction;
use crate::scope::Scope;

/// One underlying transaction.
///
/// The coordinator guarantees that at most one of these methods runs, at
/// most once, across every handle that shares the transaction: the first
/// terminal call on the owning handle. Implementations therefore do not
/// need their own replay protection.
///
/// Errors are returned as plain [`BoxError`]s; the handle tags them with
/// the failing phase before surfacing them.
pub trait TxResource: Send + Sync + 'static {
    /// Make the transaction's effects durable.
    fn commit(&self, scope: &Scope) -> Result<(), BoxError>;

    /// Discard the transaction's effects.
    fn rollback(&self, scope: &Scope) -> Result<(), BoxError>;
}

/// Opens new transactions for a [`Coordinator`](crate::Coordinator).
///
/// `begin` returns an owning [`Transaction`] handle, normally built with
/// [`Transaction::wrap_owned`] so the new transaction is bound into the
/// scope for nested calls to find.
pub trait TxBeginner: Send + Sync {
    /// The resource this beginner opens transactions on.
    type Resource: TxResource + ?Sized;

    /// Open a new transaction.
    fn begin(
        &self,
        scope: &Scope,
        options: &BeginOptions,
    ) -> Result<Transaction<Self::Resource>, BoxError>;
}

impl<B: TxBeginner + ?Sized> TxBeginner for Box<B> {
    type Resource = B::Resource;

    fn begin(
        &self,
        scope: &Scope,
        options: &BeginOptions,
    ) -> Result<Transaction<Self::Resource>, BoxError> {
        (**self).begin(scope, options)
    }
}

impl<B: TxBeginner + ?Sized> TxBeginner for Arc<B> {
    type Resource = B::Resource;

    fn begin(
        &self,
        scope: &Scope,
        options: &BeginOptions,
    ) -> Result<Transaction<Self::Resource>, BoxError> {
        (**self).begin(scope, options)
    }
}

/// Options forwarded verbatim to [`TxBeginner::begin`].
///
/// The coordinator never interprets these. Each option is an arbitrary
/// value; beginners pick out the types they understand with
/// [`BeginOptions::get`] and ignore the rest.
#[derive(Clone, Default)]
pub struct BeginOptions {
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

impl BeginOptions {
    /// No options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option value.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(Arc::new(value));
        self
    }

    /// The first option of type `T`, in insertion order.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.values.iter().find_map(|value| value.downcast_ref::<T>())
    }

    /// All options of type `T`, in insertion order.
    pub fn all<T: Any>(&self) -> impl Iterator<Item = &T> + '_ {
        self.values.iter().filter_map(|value| value.downcast_ref::<T>())
    }

    /// Number of option values, of any type.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no options were supplied.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for BeginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeginOptions")
            .field("len", &self.values.len())
            .finish()
    }
}
