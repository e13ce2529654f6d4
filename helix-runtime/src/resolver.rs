//! Flow resolution.
//!
//! The scheduler only knows flow keys. Ingress code maps whatever it
//! receives (a tenant name, a user ID, a request) to a key with a
//! [`FlowResolver`].

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use helix_core::FlowKey;

/// Maps a work descriptor to the flow that should serve it.
pub trait FlowResolver<D: ?Sized>: Send + Sync {
    /// Returns the flow for `descriptor`, or `None` if it has none.
    fn resolve(&self, descriptor: &D) -> Option<FlowKey>;
}

/// Spreads descriptors over flows `0..slots` by hash.
///
/// The hash is stable across processes for the same descriptor, so a
/// descriptor always lands on the same flow.
#[derive(Debug, Clone, Copy)]
pub struct HashFlowResolver {
    slots: u64,
}

impl HashFlowResolver {
    /// Creates a resolver over `slots` flows.
    ///
    /// Returns `None` if `slots` is zero.
    #[must_use]
    pub const fn new(slots: u64) -> Option<Self> {
        if slots == 0 {
            return None;
        }
        Some(Self { slots })
    }

    /// Number of flows descriptors are spread over.
    #[must_use]
    pub const fn slots(&self) -> u64 {
        self.slots
    }
}

impl<D: Hash + ?Sized> FlowResolver<D> for HashFlowResolver {
    fn resolve(&self, descriptor: &D) -> Option<FlowKey> {
        let mut hasher = DefaultHasher::new();
        descriptor.hash(&mut hasher);
        Some(FlowKey::new(hasher.finish() % self.slots))
    }
}

/// Explicit descriptor to flow table with an optional fallback flow.
#[derive(Debug, Clone)]
pub struct StaticFlowResolver<K> {
    table: HashMap<K, FlowKey>,
    default: Option<FlowKey>,
}

impl<K: Eq + Hash> StaticFlowResolver<K> {
    /// Creates an empty table with no fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            default: None,
        }
    }

    /// Maps `descriptor` to `flow`.
    #[must_use]
    pub fn with_route(mut self, descriptor: K, flow: FlowKey) -> Self {
        self.table.insert(descriptor, flow);
        self
    }

    /// Sets the flow used for descriptors missing from the table.
    #[must_use]
    pub fn with_default(mut self, flow: FlowKey) -> Self {
        self.default = Some(flow);
        self
    }

    /// Adds or replaces a route.
    pub fn insert(&mut self, descriptor: K, flow: FlowKey) -> Option<FlowKey> {
        self.table.insert(descriptor, flow)
    }

    /// Number of explicit routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if there are no explicit routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<K: Eq + Hash> Default for StaticFlowResolver<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Send + Sync> FlowResolver<K> for StaticFlowResolver<K> {
    fn resolve(&self, descriptor: &K) -> Option<FlowKey> {
        self.table.get(descriptor).copied().or(self.default)
    }
}
