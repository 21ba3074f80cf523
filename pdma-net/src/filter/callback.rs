//! Filter callbacks.
//!
//! Rules with a [`DestType::Cb`](super::DestType::Cb) destination hand
//! matching packets to a callback. Callbacks are registered by name; a rule
//! picks the first callback whose name is a prefix of its description. A
//! default callback, if set, serves rules no named callback claims.

use parking_lot::RwLock;
use std::sync::Arc;

use super::FilterRule;
use crate::api::{Error, Result};
use crate::packet::Packet;

/// Context passed to a filter callback.
#[derive(Debug, Clone, Copy)]
pub struct CallbackDesc<'a> {
    pub dev_no: u32,
    /// Frame length as seen on the wire, FCS included
    pub pkt_len: usize,
    pub filter: &'a FilterRule,
}

/// What a callback did with a packet.
#[derive(Debug)]
pub enum Verdict {
    /// The callback took the packet
    Consumed,
    /// Continue with normal delivery. `filter` overrides the destination of
    /// the rule that matched; `None` leaves the packet undeliverable.
    Forward {
        pkt: Packet,
        filter: Option<FilterRule>,
    },
}

/// A packet callback attached to filter rules.
pub trait FilterCallback: Send + Sync {
    fn filter(&self, desc: &CallbackDesc<'_>, pkt: Packet) -> Verdict;

    /// Called once a rule using this callback is created.
    fn on_create(&self, _rule: &FilterRule) {}

    /// Called once a rule using this callback is destroyed.
    fn on_destroy(&self, _rule: &FilterRule) {}
}

#[derive(Default)]
struct Registry {
    named: Vec<(String, Arc<dyn FilterCallback>)>,
    default: Option<Arc<dyn FilterCallback>>,
}

/// Named callbacks available to filter rules.
#[derive(Default)]
pub struct CallbackRegistry {
    inner: RwLock<Registry>,
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CallbackRegistry")
            .field(
                "named",
                &inner.named.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("default", &inner.default.is_some())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cb` under `name`.
    pub fn register(&self, name: impl Into<String>, cb: Arc<dyn FilterCallback>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidParam);
        }
        let mut inner = self.inner.write();
        if inner.named.iter().any(|(n, _)| *n == name) {
            return Err(Error::Resource);
        }
        tracing::debug!("filter callback {} registered", name);
        inner.named.push((name, cb));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let pos = inner
            .named
            .iter()
            .position(|(n, _)| n == name)
            .ok_or(Error::NotFound)?;
        inner.named.remove(pos);
        Ok(())
    }

    /// Set or clear the fallback callback.
    pub fn set_default(&self, cb: Option<Arc<dyn FilterCallback>>) {
        self.inner.write().default = cb;
    }

    pub fn default_callback(&self) -> Option<Arc<dyn FilterCallback>> {
        self.inner.read().default.clone()
    }

    /// Callback whose name is a prefix of `desc`.
    pub fn lookup(&self, desc: &str) -> Option<Arc<dyn FilterCallback>> {
        self.inner
            .read()
            .named
            .iter()
            .find(|(n, _)| desc.starts_with(n.as_str()))
            .map(|(_, cb)| cb.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
