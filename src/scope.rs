//! Scoping context for ambient transaction state.
//!
//! A [`Scope`] is an immutable environment value passed explicitly through a
//! call tree. Deriving a scope with [`Scope::with_value`] produces a child
//! that shadows the key within descendants; ancestor scopes are never
//! mutated. This is the carrier for "the current transaction": the
//! coordinator binds a begun transaction under [`TX_KEY`] and nested calls
//! look it up instead of beginning their own.
//!
//! Lookup resolves the *innermost* frame for a key and downcasts only that
//! frame's value. A binding of the wrong type therefore stops the search;
//! it does not fall back to an outer frame with a matching type. That is
//! deliberate: nesting is scoped per resource type, and a foreign binding
//! behaves exactly like no binding at all (see `Coordinator::scoped`).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Key under which the current transaction handle is bound in a [`Scope`].
pub const TX_KEY: ScopeKey = ScopeKey::new("txscope.tx");

/// Identifies a binding within a [`Scope`].
///
/// Keys compare by name, so two crates using the same name share a slot.
/// Prefix keys with a crate or module name to avoid collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey(&'static str);

impl ScopeKey {
    /// Create a key with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The key's name.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Frame {
    key: ScopeKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Frame>>,
}

/// An immutable chain of key/value bindings.
///
/// Cloning is cheap: scopes share their frames by reference. A scope with
/// no frames is the root scope.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Frame>>,
}

impl Scope {
    /// The empty scope.
    pub fn root() -> Self {
        Self { head: None }
    }

    /// Derive a scope with `value` bound under `key`.
    ///
    /// Existing bindings under the same key remain visible to holders of
    /// the original scope; within the derived scope they are shadowed.
    pub fn with_value<T: Any + Send + Sync>(&self, key: ScopeKey, value: T) -> Scope {
        Scope {
            head: Some(Arc::new(Frame {
                key,
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// The innermost value bound under `key`, untyped.
    pub fn value(&self, key: ScopeKey) -> Option<&(dyn Any + Send + Sync)> {
        self.frame(key).map(|frame| frame.value.as_ref())
    }

    /// The innermost value bound under `key`, downcast to `T`.
    ///
    /// Returns `None` when the key is unbound or when the innermost
    /// binding holds a different type.
    pub fn get<T: Any>(&self, key: ScopeKey) -> Option<&T> {
        self.frame(key)?.value.downcast_ref::<T>()
    }

    /// Whether any value is bound under `key`, regardless of type.
    pub fn contains(&self, key: ScopeKey) -> bool {
        self.frame(key).is_some()
    }

    fn frame(&self, key: ScopeKey) -> Option<&Frame> {
        let mut current = self.head.as_deref();
        while let Some(frame) = current {
            if frame.key == key {
                return Some(frame);
            }
            current = frame.parent.as_deref();
        }
        None
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut current = self.head.as_deref();
        while let Some(frame) = current {
            keys.push(frame.key.name());
            current = frame.parent.as_deref();
        }
        f.debug_struct("Scope").field("bindings", &keys).finish()
    }
}
