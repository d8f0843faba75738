//! Type-erased transaction sources.
//!
//! [`AnyBeginner`] adapts a concrete [`TxBeginner`] so its transactions
//! come out as [`AnyTransaction`]s. Erasure happens after the concrete
//! begin, so the erased handle shares state with the concrete one and the
//! ownership rules are unchanged. Together with
//! [`AnyCoordinator`](crate::AnyCoordinator) this lets callers hold
//! coordinators over different resource types in one collection.

use std::fmt;

use crate::error::BoxError;
use crate::handle::AnyTransaction;
use crate::resource::{BeginOptions, TxBeginner, TxResource};
use crate::scope::Scope;

/// Adapts a concrete beginner into one producing [`AnyTransaction`]s.
pub struct AnyBeginner<B> {
    inner: B,
}

impl<B> AnyBeginner<B> {
    /// Wrap `inner`.
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// The wrapped concrete beginner.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B> TxBeginner for AnyBeginner<B>
where
    B: TxBeginner,
    B::Resource: Sized,
{
    type Resource = dyn TxResource;

    fn begin(
        &self,
        scope: &Scope,
        options: &BeginOptions,
    ) -> Result<AnyTransaction, BoxError> {
        let tx = self.inner.begin(scope, options)?;
        Ok(tx.as_any())
    }
}

impl<B> fmt::Debug for AnyBeginner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyBeginner").finish_non_exhaustive()
    }
}
