//! Filter rule storage.
//!
//! Rules are kept twice under one lock: in a slot array indexed by id, for
//! id allocation and lookup, and in a list in walk order for dispatch.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::callback::{CallbackRegistry, FilterCallback};
use super::{DestType, FILTER_BYTES_MAX, FilterRule, NUM_FILTER_MAX};
use crate::api::{Error, Result};

/// A rule as stored in the table.
pub(crate) struct FilterCtrl {
    pub(crate) rule: FilterRule,
    pub(crate) hits: AtomicU64,
    /// Callback bound at create time by name
    pub(crate) callback: Option<Arc<dyn FilterCallback>>,
}

impl FilterCtrl {
    fn snapshot(&self) -> FilterRule {
        let mut rule = self.rule.clone();
        rule.hits = self.hits.load(Ordering::Relaxed);
        rule
    }
}

struct TableInner {
    /// Index 0 unused
    slots: Vec<Option<Arc<FilterCtrl>>>,
    /// Highest assigned id
    num: u32,
    /// Walk order
    list: Vec<Arc<FilterCtrl>>,
}

impl TableInner {
    fn slot(&self, id: u32) -> Option<&Arc<FilterCtrl>> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    fn next_present(&self, id: u32) -> u32 {
        (id + 1..=self.num)
            .find(|&i| self.slot(i).is_some())
            .unwrap_or(0)
    }

    /// Position where `rule` goes: before the first entry it sorts ahead
    /// of, so equal keys keep creation order.
    fn insert_pos(&self, rule: &FilterRule) -> usize {
        self.list
            .iter()
            .position(|fc| rule.sorts_before(&fc.rule))
            .unwrap_or(self.list.len())
    }
}

/// Ordered filter table of one device.
pub struct FilterTable {
    inner: Mutex<TableInner>,
    callbacks: Arc<CallbackRegistry>,
}

impl std::fmt::Debug for FilterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FilterTable")
            .field("num", &inner.num)
            .field("len", &inner.list.len())
            .finish()
    }
}

impl Default for FilterTable {
    fn default() -> Self {
        Self::new(Arc::new(CallbackRegistry::new()))
    }
}

impl FilterTable {
    pub fn new(callbacks: Arc<CallbackRegistry>) -> Self {
        let mut slots = Vec::with_capacity(NUM_FILTER_MAX as usize + 1);
        slots.resize_with(NUM_FILTER_MAX as usize + 1, || None);
        Self {
            inner: Mutex::new(TableInner {
                slots,
                num: 0,
                list: Vec::new(),
            }),
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    /// Add a rule and return its id.
    ///
    /// The id is the lowest free one. A callback destination binds the
    /// named callback whose name prefixes the rule's description and runs
    /// its create hook.
    pub fn create(&self, rule: &FilterRule) -> Result<u32> {
        if rule.matcher.size() > FILTER_BYTES_MAX {
            return Err(Error::InvalidParam);
        }

        let callback = if rule.dest.kind == DestType::Cb && !rule.desc.is_empty() {
            self.callbacks.lookup(&rule.desc)
        } else {
            None
        };

        let mut inner = self.inner.lock();

        let num = inner.num;
        let id = (1..=num + 1)
            .find(|&i| inner.slot(i).is_none())
            .unwrap_or(num + 1);
        if id > NUM_FILTER_MAX {
            return Err(Error::Resource);
        }

        let mut stored = rule.clone();
        stored.id = id;
        stored.next = 0;
        stored.hits = 0;
        if let Some(cb) = &callback {
            cb.on_create(&stored);
        }

        let fc = Arc::new(FilterCtrl {
            rule: stored,
            hits: AtomicU64::new(0),
            callback,
        });
        let pos = inner.insert_pos(&fc.rule);
        inner.list.insert(pos, fc.clone());
        inner.slots[id as usize] = Some(fc);
        if id == num + 1 {
            inner.num = id;
        }

        tracing::debug!(
            "filter {} created: prio {} flags {:#x} dest {:?}/{}",
            id,
            rule.priority,
            rule.flags,
            rule.dest.kind,
            rule.dest.id
        );
        Ok(id)
    }

    /// Remove a rule, running its destroy hook.
    pub fn destroy(&self, id: u32) -> Result<()> {
        if id == 0 || id > NUM_FILTER_MAX {
            return Err(Error::InvalidParam);
        }

        let mut inner = self.inner.lock();

        let fc = inner.slots[id as usize].take().ok_or(Error::NotFound)?;
        inner.list.retain(|f| !Arc::ptr_eq(f, &fc));
        if let Some(cb) = &fc.callback {
            cb.on_destroy(&fc.rule);
        }

        if id == inner.num {
            let highest = (1..id).rev().find(|&i| inner.slot(i).is_some());
            inner.num = highest.unwrap_or(0);
        }

        tracing::debug!("filter {} destroyed", id);
        Ok(())
    }

    /// Remove every rule in id order. Absent ids are skipped; any other
    /// failure stops the pass.
    pub fn destroy_all(&self) -> Result<()> {
        for id in 1..=NUM_FILTER_MAX {
            match self.destroy(id) {
                Ok(()) | Err(Error::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Copy out rule `id`, with `next` set to the next present id or 0.
    pub fn get(&self, id: u32) -> Result<FilterRule> {
        if id == 0 || id > NUM_FILTER_MAX {
            return Err(Error::InvalidParam);
        }

        let inner = self.inner.lock();
        let fc = inner.slot(id).ok_or(Error::NotFound)?;
        let mut rule = fc.snapshot();
        rule.next = inner.next_present(id);
        Ok(rule)
    }

    /// Enumerate: `next == 0` returns the lowest present rule, otherwise
    /// rule `next`.
    pub fn get_next(&self, next: u32) -> Result<FilterRule> {
        if next != 0 {
            return self.get(next);
        }
        let first = {
            let inner = self.inner.lock();
            (1..=inner.num).find(|&i| inner.slot(i).is_some())
        };
        self.get(first.ok_or(Error::NotFound)?)
    }

    /// Snapshot of all rules in walk order.
    pub fn iter(&self) -> impl Iterator<Item = FilterRule> {
        let rules: Vec<_> = self.inner.lock().list.iter().map(|fc| fc.snapshot()).collect();
        rules.into_iter()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` on the walk list under the table lock.
    pub(crate) fn with_list<T>(&self, f: impl FnOnce(&[Arc<FilterCtrl>]) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.list)
    }
}
