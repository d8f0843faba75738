//! Scoped transaction ownership for nested units of work.
//!
//! When business logic nests, every layer wants to run transactionally,
//! but only one of them may actually commit. This crate makes that
//! decision structural: a [`Coordinator`] begins a transaction the first
//! time a call tree asks for one and binds it into the [`Scope`] flowing
//! down the tree; every nested request joins the same transaction through
//! a non-owning handle whose `commit` and `rollback` are successful
//! no-ops. Layers finalize unconditionally, and the outcome is decided
//! exactly once, by the owner.
//!
//! ```text
//! ┌──────────────────┐   scoped()    ┌──────────────────┐
//! │   Coordinator    │──────────────▶│  Transaction<R>  │
//! │   (TxBeginner)   │ begin or join │  owner / joined  │
//! └──────────────────┘               └────────┬─────────┘
//!                                             │ commit / rollback
//!                                             ▼
//!                                    ┌──────────────────┐
//!                                    │  shared TxState  │
//!                                    │  first outcome,  │
//!                                    │  then exhausted  │
//!                                    └──────────────────┘
//! ```
//!
//! After the first terminal call on the owner, the tree is exhausted:
//! every later `commit` or `rollback` on any handle reports
//! [`TxError::Exhausted`] carrying the recorded first outcome. Plug in a
//! real backend by implementing [`TxResource`] and [`TxBeginner`]; the
//! [`mem`] module ships an in-memory source used throughout the tests.
//!
//! # Example
//!
//! ```
//! use txscope::mem::InMemoryBeginner;
//! use txscope::{Coordinator, Scope, TxResult};
//!
//! fn run() -> TxResult<()> {
//!     let coordinator = Coordinator::new(InMemoryBeginner::new());
//!
//!     let outer = coordinator.scoped(&Scope::root())?;
//!     assert!(outer.is_owned());
//!
//!     // Nested code joins the same transaction; its commit is a no-op.
//!     let inner = coordinator.scoped(&outer.scope())?;
//!     assert!(!inner.is_owned());
//!     inner.commit(&inner.scope())?;
//!
//!     outer.commit(&outer.scope())?;
//!     Ok(())
//! }
//! run().unwrap();
//! ```

pub mod coordinator;
pub mod erased;
pub mod error;
pub mod handle;
pub mod mem;
pub mod resource;
pub mod scope;

pub use coordinator::{AnyCoordinator, Coordinator};
pub use erased::AnyBeginner;
pub use error::{BoxError, TxCause, TxError, TxResult};
pub use handle::{AnyTransaction, Transaction, TxId};
pub use resource::{BeginOptions, TxBeginner, TxResource};
pub use scope::{Scope, ScopeKey, TX_KEY};
