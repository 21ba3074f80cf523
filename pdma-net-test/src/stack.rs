//! Recording network stack.

use parking_lot::Mutex;
use std::sync::Arc;

use pdma_net::filter::FilterRule;
use pdma_net::netif::{NetStack, Netif, NetifId};
use pdma_net::packet::Packet;

/// A packet handed to an interface.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub netif: NetifId,
    pub pkt: Packet,
    /// Id of the rule that classified the packet, if any
    pub filter: Option<u32>,
}

/// Stores every delivered packet. With `release` set, the interface's
/// in-flight reference is dropped on receipt as a real stack would once
/// done with the packet.
#[derive(Debug, Default)]
pub struct RecordingStack {
    delivered: Mutex<Vec<Delivery>>,
    vnet: Mutex<Vec<Packet>>,
    release: bool,
}

impl RecordingStack {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn releasing() -> Arc<Self> {
        Arc::new(Self {
            release: true,
            ..Default::default()
        })
    }

    pub fn delivered(&self) -> Vec<Delivery> {
        self.delivered.lock().clone()
    }

    /// Interface ids in delivery order.
    pub fn netif_ids(&self) -> Vec<NetifId> {
        self.delivered.lock().iter().map(|d| d.netif).collect()
    }

    pub fn vnet(&self) -> Vec<Packet> {
        self.vnet.lock().clone()
    }

    pub fn clear(&self) {
        self.delivered.lock().clear();
        self.vnet.lock().clear();
    }
}

impl NetStack for RecordingStack {
    fn receive(&self, netif: &Arc<Netif>, pkt: Packet, filter: Option<&FilterRule>) {
        if self.release {
            netif.release();
        }
        self.delivered.lock().push(Delivery {
            netif: netif.id(),
            pkt,
            filter: filter.map(|f| f.id),
        });
    }

    fn receive_vnet(&self, pkt: Packet) {
        self.vnet.lock().push(pkt);
    }
}
