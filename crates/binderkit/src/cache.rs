//! Position-keyed proxy cache.
//!
//! Entries are created lazily on first access and only ever removed when
//! their position is deleted. Structural events rekey the surviving entries
//! with the same rule the proxies apply to themselves, so a lookup by position
//! always lands on the proxy whose own `position()` agrees.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::bus::{shifted, Event};
use crate::error::Result;

pub struct ProxyCache<P> {
    entries: RefCell<BTreeMap<usize, Rc<P>>>,
}

impl<P> Default for ProxyCache<P> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
        }
    }
}

impl<P> ProxyCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: usize) -> Option<Rc<P>> {
        self.entries.borrow().get(&position).cloned()
    }

    /// Returns the cached proxy or builds, stores and returns a new one.
    /// The factory runs without the cache borrowed, so it may query it.
    pub fn get_or_try_insert_with(
        &self,
        position: usize,
        factory: impl FnOnce() -> Result<Rc<P>>,
    ) -> Result<Rc<P>> {
        if let Some(hit) = self.get(position) {
            return Ok(hit);
        }
        let proxy = factory()?;
        self.entries.borrow_mut().insert(position, proxy.clone());
        Ok(proxy)
    }

    pub fn remove(&self, position: usize) -> Option<Rc<P>> {
        self.entries.borrow_mut().remove(&position)
    }

    /// Rekeys entries after a structural event.
    pub fn apply(&self, event: &Event) {
        let mut entries = self.entries.borrow_mut();
        let old = std::mem::take(&mut *entries);
        *entries = old
            .into_iter()
            .map(|(position, proxy)| (shifted(position, event), proxy))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Cached proxies in position order.
    pub fn values(&self) -> Vec<Rc<P>> {
        self.entries.borrow().values().cloned().collect()
    }
}
