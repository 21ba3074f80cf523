//! Network interfaces that receive classified packets.
//!
//! Destination resolution runs for every received packet, while interfaces
//! are created and bound to channels only from the control path. The table
//! therefore uses `arc-swap` for lock-free reads:
//! - Reads: Single atomic load of the current snapshot
//! - Writes: Clone + `rcu` swap, so concurrent writers never lose updates

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::{Error, Result};
use crate::filter::FilterRule;
use crate::packet::Packet;

/// Interface id. 0 is the device's primary interface, 1..=NUM_VDEV_MAX are
/// virtual interfaces.
pub type NetifId = u32;

/// Highest virtual interface id.
pub const NUM_VDEV_MAX: NetifId = 128;

/// A kernel-style network interface as seen by the dispatch path.
#[derive(Debug)]
pub struct Netif {
    id: NetifId,
    name: String,
    /// Packets handed to this interface that the stack still owns.
    users: AtomicU64,
}

impl Netif {
    pub fn new(id: NetifId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            users: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> NetifId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// In-flight reference count.
    #[inline]
    pub fn users(&self) -> u64 {
        self.users.load(Ordering::Relaxed)
    }

    /// Take an in-flight reference for a packet bound to this interface.
    #[inline]
    pub fn hold(&self) {
        self.users.fetch_add(1, Ordering::Relaxed);
    }

    /// Release an in-flight reference once the stack is done with a packet.
    #[inline]
    pub fn release(&self) {
        let _ = self
            .users
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

/// Receive entry points of the network stack.
///
/// Each call transfers ownership of exactly one packet.
pub trait NetStack: Send + Sync {
    /// Deliver a packet to `netif`. `filter` is the rule that classified the
    /// packet, if any, for stacks that run a per-packet receive hook.
    fn receive(&self, netif: &Arc<Netif>, pkt: Packet, filter: Option<&FilterRule>);

    /// Deliver a packet to the virtual-network path.
    fn receive_vnet(&self, pkt: Packet);
}

#[derive(Debug, Clone, Default)]
struct NetifMap {
    primary: Option<Arc<Netif>>,
    vdev: HashMap<NetifId, Arc<Netif>>,
    /// Channel → interface bindings that bypass the filter list.
    bound: HashMap<u32, Arc<Netif>>,
}

impl NetifMap {
    fn resolve(&self, id: NetifId) -> Option<Arc<Netif>> {
        if id == 0 {
            self.primary.clone()
        } else {
            self.vdev.get(&id).cloned()
        }
    }
}

/// Interface table of one device.
#[derive(Debug, Default)]
pub struct NetifTable {
    inner: ArcSwap<NetifMap>,
}

impl NetifTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the primary interface (id 0).
    pub fn set_primary(&self, name: impl Into<String>) -> Arc<Netif> {
        let netif = Arc::new(Netif::new(0, name));
        let installed = netif.clone();
        self.inner.rcu(move |cur| {
            let mut map = (**cur).clone();
            map.primary = Some(installed.clone());
            map
        });
        netif
    }

    /// Create a virtual interface with the given id.
    pub fn add_vdev(&self, id: NetifId, name: impl Into<String>) -> Result<Arc<Netif>> {
        if id == 0 || id > NUM_VDEV_MAX {
            return Err(Error::InvalidParam);
        }
        if self.inner.load().vdev.contains_key(&id) {
            return Err(Error::Resource);
        }
        let netif = Arc::new(Netif::new(id, name));
        let installed = netif.clone();
        self.inner.rcu(move |cur| {
            let mut map = (**cur).clone();
            map.vdev.insert(id, installed.clone());
            map
        });
        tracing::debug!("netif {} ({}) created", id, netif.name());
        Ok(netif)
    }

    /// Remove a virtual interface and every channel binding that targets it.
    pub fn remove_vdev(&self, id: NetifId) -> Result<()> {
        if !self.inner.load().vdev.contains_key(&id) {
            return Err(Error::NotFound);
        }
        self.inner.rcu(move |cur| {
            let mut map = (**cur).clone();
            map.vdev.remove(&id);
            map.bound.retain(|_, n| n.id() != id);
            map
        });
        Ok(())
    }

    /// Bind a channel straight to an interface, bypassing the filter list.
    pub fn bind_channel(&self, chan: u32, id: NetifId) -> Result<()> {
        let netif = self.inner.load().resolve(id).ok_or(Error::Unavailable)?;
        self.inner.rcu(move |cur| {
            let mut map = (**cur).clone();
            map.bound.insert(chan, netif.clone());
            map
        });
        Ok(())
    }

    pub fn unbind_channel(&self, chan: u32) {
        self.inner.rcu(move |cur| {
            let mut map = (**cur).clone();
            map.bound.remove(&chan);
            map
        });
    }

    /// Resolve an interface id: 0 is the primary, anything else a
    /// virtual interface.
    #[inline]
    pub fn resolve(&self, id: NetifId) -> Option<Arc<Netif>> {
        self.inner.load().resolve(id)
    }

    /// Interface bound to `chan`, if any.
    #[inline]
    pub fn bound(&self, chan: u32) -> Option<Arc<Netif>> {
        self.inner.load().bound.get(&chan).cloned()
    }
}
