//! Reuse-or-begin entry point for scoped transactions.
//!
//! A [`Coordinator`] wraps a [`TxBeginner`] and hands out transaction
//! handles through [`Coordinator::scoped`]: when the scope already carries
//! a live transaction of the beginner's resource type, the caller joins it
//! through a non-owning handle; otherwise a new owned transaction is
//! begun. Code written against this entry point composes transparently
//! when called inside someone else's transaction.

use std::fmt;

use tracing::debug;

use crate::erased::AnyBeginner;
use crate::error::{TxError, TxResult};
use crate::handle::{self, Transaction};
use crate::resource::{BeginOptions, TxBeginner, TxResource};
use crate::scope::Scope;

/// A [`Coordinator`] over an erased beginner, for composing transaction
/// sources of different resource types behind one type.
pub type AnyCoordinator = Coordinator<Box<dyn TxBeginner<Resource = dyn TxResource>>>;

/// Hands out scoped transaction handles for one transaction source.
pub struct Coordinator<B> {
    beginner: B,
}

impl<B> Coordinator<B> {
    /// Create a coordinator over `beginner`.
    pub fn new(beginner: B) -> Self {
        Self { beginner }
    }

    /// The wrapped beginner.
    pub fn beginner(&self) -> &B {
        &self.beginner
    }
}

impl<B: TxBeginner> Coordinator<B> {
    /// [`Coordinator::scoped_with_options`] without options.
    pub fn scoped(&self, scope: &Scope) -> TxResult<Transaction<B::Resource>> {
        self.scoped_with_options(scope, &BeginOptions::new())
    }

    /// Join the transaction bound in `scope`, or begin a new one.
    ///
    /// A binding only counts when its resource type matches this
    /// coordinator's; a binding of some other type is left alone and a new
    /// transaction is begun without shadowing it. Joined handles are
    /// non-owning, so finalizing them defers to the outer owner. Begin
    /// failures surface as [`TxError::Begin`] with the beginner's error as
    /// the cause; `options` are forwarded to the beginner untouched.
    pub fn scoped_with_options(
        &self,
        scope: &Scope,
        options: &BeginOptions,
    ) -> TxResult<Transaction<B::Resource>> {
        if let Some(bound) = handle::bound_in_scope::<B::Resource>(scope) {
            debug!(tx = %bound.id(), "joining transaction bound in scope");
            return Ok(bound.unowned());
        }

        let tx = self
            .beginner
            .begin(scope, options)
            .map_err(TxError::begin_failed)?;
        debug!(tx = %tx.id(), options = options.len(), "began new owned transaction");
        Ok(tx)
    }

    /// Run `f` inside a scoped transaction and finalize by its outcome.
    ///
    /// The handle is obtained with [`Coordinator::scoped`], so inside an
    /// outer transaction both terminal calls are no-ops and the owner
    /// still decides. A finalization failure takes precedence over `f`'s
    /// result.
    pub fn with_transaction<T, E, F>(&self, scope: &Scope, f: F) -> Result<T, E>
    where
        E: From<TxError>,
        F: FnOnce(&Transaction<B::Resource>) -> Result<T, E>,
    {
        let tx = self.scoped(scope)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit(&tx.scope())?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback(&tx.scope())?;
                Err(err)
            }
        }
    }

    /// Erase the resource type, yielding a coordinator that hands out
    /// [`AnyTransaction`](crate::AnyTransaction)s.
    ///
    /// Note that an erased coordinator begins fresh transactions even
    /// inside a scope it populated itself: the binding holds the concrete
    /// handle, and the erased lookup does not match it.
    pub fn into_any(self) -> AnyCoordinator
    where
        B: 'static,
        B::Resource: Sized,
    {
        let boxed: Box<dyn TxBeginner<Resource = dyn TxResource>> =
            Box::new(AnyBeginner::new(self.beginner));
        Coordinator::new(boxed)
    }
}

impl<B> fmt::Debug for Coordinator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}
