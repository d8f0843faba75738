//! Transaction handles and the shared lifecycle state behind them.
//!
//! Every transaction tree has exactly one piece of shared state and any
//! number of handles pointing at it. The handle created when the
//! transaction was begun is the owner; handles produced by
//! [`Transaction::unowned`] are non-owning participants. Terminal calls
//! behave differently per role:
//!
//! - a non-owning handle's `commit`/`rollback` is a successful no-op, so
//!   nested code can finalize unconditionally and still leave the real
//!   decision to the owner
//! - the owner's first terminal call reaches the resource, and its outcome
//!   is recorded on the shared state
//! - every terminal call after the first, on any handle, reports the
//!   recorded outcome wrapped in [`TxError::Exhausted`]
//!
//! The recorded outcome is written under the same lock that runs the
//! resource call, so concurrent finalization from several threads still
//! reaches the resource at most once.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;
use ulid::Ulid;

use crate::error::{BoxError, TxError, TxResult};
use crate::resource::TxResource;
use crate::scope::{Scope, TX_KEY};

/// A handle erased over its resource type.
///
/// Produced by [`Transaction::as_any`]; shares state with the concrete
/// handle it came from.
pub type AnyTransaction = Transaction<dyn TxResource>;

/// Identifier assigned to a transaction tree when it is begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(Ulid);

impl TxId {
    fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}

/// State shared by every handle of one transaction tree.
struct TxState {
    id: TxId,
    began_at: DateTime<Utc>,
    inner: RwLock<StateInner>,
}

struct StateInner {
    /// Outcome of the first terminal call, in exhausted form. `None`
    /// while the transaction is still live.
    terminal: Option<TxError>,
    /// The scope the transaction was begun under, including its own
    /// binding when one was added.
    scope: Scope,
}

/// Entry bound into a scope under [`TX_KEY`].
///
/// Holds the owning handle's parts weakly: the scope must not keep a
/// transaction tree alive on its own, and a strong entry would cycle
/// through the state's stored scope. An expired entry reads as no
/// binding.
struct TxBinding<R: ?Sized> {
    is_owner: bool,
    state: Weak<TxState>,
    resource: Weak<R>,
}

/// Rehydrate the handle bound in `scope`, if one of resource type `R` is
/// still alive.
pub(crate) fn bound_in_scope<R: TxResource + ?Sized>(scope: &Scope) -> Option<Transaction<R>> {
    let binding = scope.get::<TxBinding<R>>(TX_KEY)?;
    let state = binding.state.upgrade()?;
    let resource = binding.resource.upgrade()?;
    Some(Transaction {
        is_owner: binding.is_owner,
        state,
        resource,
    })
}

/// A handle to a shared transaction.
///
/// Handles are cheap to clone; clones keep their role. All methods take
/// `&self`, so a handle can be shared across threads freely.
pub struct Transaction<R: ?Sized> {
    is_owner: bool,
    state: Arc<TxState>,
    resource: Arc<R>,
}

impl<R: TxResource> Transaction<R> {
    /// Wrap an already-begun `resource` in an owning handle.
    ///
    /// The handle is bound into a scope derived from `scope` so that
    /// nested lookups find this transaction. When `scope` already carries
    /// a transaction binding of any resource type, no binding is added;
    /// shadowing an outer transaction would silently reroute its nested
    /// work into this one.
    pub fn wrap_owned(scope: &Scope, resource: R) -> Self {
        let state = Arc::new(TxState {
            id: TxId::generate(),
            began_at: Utc::now(),
            inner: RwLock::new(StateInner {
                terminal: None,
                scope: scope.clone(),
            }),
        });
        let tx = Self {
            is_owner: true,
            state,
            resource: Arc::new(resource),
        };

        let bind = !scope.contains(TX_KEY);
        if bind {
            let binding = TxBinding {
                is_owner: true,
                state: Arc::downgrade(&tx.state),
                resource: Arc::downgrade(&tx.resource),
            };
            tx.state.inner.write().scope = scope.with_value(TX_KEY, binding);
        }
        debug!(tx = %tx.state.id, bound = bind, "owned transaction created");

        tx
    }

    /// Erase the resource type, keeping the shared state and role.
    pub fn as_any(&self) -> AnyTransaction {
        Transaction {
            is_owner: self.is_owner,
            state: Arc::clone(&self.state),
            resource: Arc::clone(&self.resource) as Arc<dyn TxResource>,
        }
    }
}

impl<R: TxResource + ?Sized> Transaction<R> {
    /// Commit the transaction.
    ///
    /// On a non-owning handle this is a successful no-op. On the owner it
    /// commits the resource once; afterwards the tree is exhausted and
    /// every further terminal call on any handle reports the recorded
    /// outcome. Resource failures surface as [`TxError::Commit`] with the
    /// cause attached.
    pub fn commit(&self, scope: &Scope) -> TxResult<()> {
        self.finalize("commit", |resource| {
            resource.commit(scope).map_err(classify_commit)
        })
    }

    /// Roll the transaction back.
    ///
    /// Role handling matches [`Transaction::commit`]; resource failures
    /// surface as [`TxError::Rollback`].
    pub fn rollback(&self, scope: &Scope) -> TxResult<()> {
        self.finalize("rollback", |resource| {
            resource.rollback(scope).map_err(classify_rollback)
        })
    }

    /// Run one terminal operation under the state's write lock.
    ///
    /// Holding the lock across the resource call is what makes the
    /// exhaustion check and the resource call one atomic step.
    fn finalize<F>(&self, op: &'static str, f: F) -> TxResult<()>
    where
        F: FnOnce(&R) -> TxResult<()>,
    {
        let mut inner = self.state.inner.write();

        if let Some(terminal) = &inner.terminal {
            debug!(tx = %self.state.id, op, "terminal call on exhausted transaction");
            return Err(terminal.clone());
        }

        if !self.is_owner {
            debug!(tx = %self.state.id, op, "non-owning handle, leaving outcome to owner");
            return Ok(());
        }

        let result = f(self.resource.as_ref());

        inner.terminal = Some(match &result {
            Ok(()) => TxError::exhausted(),
            Err(err) => err.clone().into_exhausted(),
        });
        debug!(tx = %self.state.id, op, ok = result.is_ok(), "transaction finalized");

        result
    }

    /// The scope this transaction runs under, with its binding when one
    /// was added.
    pub fn scope(&self) -> Scope {
        self.state.inner.read().scope.clone()
    }

    /// The recorded outcome of the first terminal call, if the tree has
    /// been finalized.
    pub fn terminal_error(&self) -> Option<TxError> {
        self.state.inner.read().terminal.clone()
    }

    /// Whether this handle owns the transaction.
    pub fn is_owned(&self) -> bool {
        self.is_owner
    }

    /// A non-owning handle to the same transaction.
    pub fn unowned(&self) -> Self {
        Self {
            is_owner: false,
            state: Arc::clone(&self.state),
            resource: Arc::clone(&self.resource),
        }
    }

    /// The underlying resource.
    pub fn underlying(&self) -> &R {
        self.resource.as_ref()
    }

    /// Identifier of the transaction tree.
    pub fn id(&self) -> TxId {
        self.state.id
    }

    /// When the transaction was begun.
    pub fn began_at(&self) -> DateTime<Utc> {
        self.state.began_at
    }
}

impl<R: ?Sized> Clone for Transaction<R> {
    fn clone(&self) -> Self {
        Self {
            is_owner: self.is_owner,
            state: Arc::clone(&self.state),
            resource: Arc::clone(&self.resource),
        }
    }
}

impl<R: ?Sized> fmt::Debug for Transaction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.state.id)
            .field("is_owner", &self.is_owner)
            .field("exhausted", &self.state.inner.read().terminal.is_some())
            .finish_non_exhaustive()
    }
}

/// A handle is itself a resource, so transactions can stack: finalizing
/// the outer handle finalizes the inner one through the same rules.
impl<R: TxResource + ?Sized> TxResource for Transaction<R> {
    fn commit(&self, scope: &Scope) -> Result<(), BoxError> {
        Transaction::commit(self, scope).map_err(Into::into)
    }

    fn rollback(&self, scope: &Scope) -> Result<(), BoxError> {
        Transaction::rollback(self, scope).map_err(Into::into)
    }
}

/// Tag a commit failure, keeping an already-tagged commit error intact so
/// stacked handles do not tag twice.
fn classify_commit(err: BoxError) -> TxError {
    match err.downcast::<TxError>() {
        Ok(tagged) if tagged.is_commit_failure() => *tagged,
        Ok(tagged) => TxError::commit_failed(*tagged),
        Err(raw) => TxError::commit_failed(raw),
    }
}

/// Rollback counterpart of [`classify_commit`].
fn classify_rollback(err: BoxError) -> TxError {
    match err.downcast::<TxError>() {
        Ok(tagged) if tagged.is_rollback_failure() => *tagged,
        Ok(tagged) => TxError::rollback_failed(*tagged),
        Err(raw) => TxError::rollback_failed(raw),
    }
}
