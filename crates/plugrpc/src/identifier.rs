//! # Proxy Identifiers
//!
//! A `ProxyIdentifier<T>` names one RPC-reachable interface. The type parameter is the
//! interface trait object (`dyn TerminalServiceMain`), so registering a handler or
//! requesting a proxy under the wrong identifier fails to compile.
//!
//! ## Invariants
//!
//! - The `id` string is what travels on the wire. It must be unique across the whole
//!   contract table and identical in both processes.
//! - Identifiers are `const` values; nothing mutates them after definition.

use std::fmt;
use std::marker::PhantomData;

pub struct ProxyIdentifier<T: ?Sized> {
    id: &'static str,
    _interface: PhantomData<fn(&T)>,
}

impl<T: ?Sized> ProxyIdentifier<T> {
    pub const fn new(id: &'static str) -> Self {
        Self { id, _interface: PhantomData }
    }

    pub const fn id(&self) -> &'static str {
        self.id
    }
}

// Manual impls: derives would demand `T: Clone` and friends.
impl<T: ?Sized> Clone for ProxyIdentifier<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ProxyIdentifier<T> {}

impl<T: ?Sized> PartialEq for ProxyIdentifier<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for ProxyIdentifier<T> {}

impl<T: ?Sized> fmt::Debug for ProxyIdentifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyIdentifier({})", self.id)
    }
}

impl<T: ?Sized> fmt::Display for ProxyIdentifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
