//! RX dispatch.
//!
//! A received packet goes to the interface bound to its channel if there is
//! one. Otherwise the filter list is walked in order; the first matching
//! rule and every following rule of the same priority that also matches
//! form a tier, and each rule of the tier gets its own copy of the packet.
//! Rules after the tier are never consulted.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::callback::{CallbackDesc, Verdict};
use super::matcher::matches;
use super::table::{FilterCtrl, FilterTable};
use super::{DestType, FilterRule, flags};
use crate::api::pdma::{Dir, PdmaDev, dev_flags};
use crate::api::{Error, Result};
use crate::netif::{Netif, NetifTable, NetStack};
use crate::packet::{ETH_FCS_LEN, Packet, attrs, hex_dump};

/// Routes received packets of one device.
pub struct Dispatcher {
    dev: Arc<PdmaDev>,
    netifs: Arc<NetifTable>,
    filters: Arc<FilterTable>,
    stack: Arc<dyn NetStack>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("dev", &self.dev.name())
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        dev: Arc<PdmaDev>,
        netifs: Arc<NetifTable>,
        filters: Arc<FilterTable>,
        stack: Arc<dyn NetStack>,
    ) -> Self {
        Self {
            dev,
            netifs,
            filters,
            stack,
        }
    }

    /// Deliver a received packet.
    ///
    /// Returns the outcome of the last branch of the matched tier, or
    /// [`Error::NoHandler`] when nothing matched. A branch that fails
    /// drops its copy of the packet.
    pub fn dispatch(&self, mut pkt: Packet) -> Result<()> {
        let chan = self.dev.lq_to_pq(pkt.queue_id() as usize, Dir::Rx)?;

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                "rx chan {} meta {} len {}\n{}",
                chan,
                pkt.meta_len(),
                pkt.data_len(),
                hex_dump(pkt.data())
            );
        }

        if let Some(netif) = self.netifs.bound(chan) {
            pkt.bind(netif.id());
            netif.hold();
            self.stack.receive(&netif, pkt, None);
            return Ok(());
        }

        let tier = self.filters.with_list(|list| {
            if list.is_empty() {
                return Err(Error::NoHandler);
            }
            let Some(pos) = list.iter().position(|fc| matches(&fc.rule, chan, &pkt)) else {
                return Ok(Vec::new());
            };
            let priority = list[pos].rule.priority;
            let tier: Vec<Arc<FilterCtrl>> = list[pos..]
                .iter()
                .take_while(|fc| fc.rule.priority == priority)
                .filter(|fc| matches(&fc.rule, chan, &pkt))
                .cloned()
                .collect();
            for fc in &tier {
                fc.hits.fetch_add(1, Ordering::Relaxed);
            }
            Ok(tier)
        })?;

        let Some((last, rest)) = tier.split_last() else {
            tracing::trace!("rx chan {}: no filter matched", chan);
            return Err(Error::NoHandler);
        };
        for fc in rest {
            let rv = self.branch(fc, pkt.clone());
            log_branch(fc, &rv);
        }
        let rv = self.branch(last, pkt);
        log_branch(last, &rv);
        rv
    }

    /// Interface a packet would be delivered to, without delivering it.
    ///
    /// Only the bound interface or the first matching rule is considered;
    /// callbacks are not run and nothing is replicated. The returned
    /// interface carries an in-flight reference.
    pub fn resolve_netif(&self, pkt: &Packet) -> Result<Arc<Netif>> {
        let chan = self.dev.lq_to_pq(pkt.queue_id() as usize, Dir::Rx)?;

        if let Some(netif) = self.netifs.bound(chan) {
            netif.hold();
            return Ok(netif);
        }

        self.filters.with_list(|list| {
            if list.is_empty() {
                return Err(Error::NoHandler);
            }
            let fc = list
                .iter()
                .find(|fc| matches(&fc.rule, chan, pkt))
                .ok_or(Error::NotFound)?;
            if fc.rule.dest.kind != DestType::Netif {
                return Err(Error::NoHandler);
            }
            let netif = self.netifs.resolve(fc.rule.dest.id).ok_or(Error::NoHandler)?;
            netif.hold();
            Ok(netif)
        })
    }

    fn branch(&self, fc: &FilterCtrl, pkt: Packet) -> Result<()> {
        if fc.rule.dest.kind != DestType::Cb {
            return self.process(pkt, &fc.rule);
        }

        let cb = fc
            .callback
            .clone()
            .or_else(|| self.filters.callbacks().default_callback());
        let Some(cb) = cb else {
            return self.process(pkt, &fc.rule);
        };

        let mut pkt_len = pkt.data_len();
        if self.dev.flags() & dev_flags::NO_FCS != 0 {
            pkt_len += ETH_FCS_LEN;
        }
        let desc = CallbackDesc {
            dev_no: self.dev.dev_no(),
            pkt_len,
            filter: &fc.rule,
        };
        match cb.filter(&desc, pkt) {
            Verdict::Consumed => Ok(()),
            Verdict::Forward {
                pkt,
                filter: Some(rule),
            } => self.process(pkt, &rule),
            Verdict::Forward { filter: None, .. } => Err(Error::NoHandler),
        }
    }

    /// Hand a packet to the destination of `rule`, plus its mirror.
    fn process(&self, mut pkt: Packet, rule: &FilterRule) -> Result<()> {
        let netif = match rule.dest.kind {
            DestType::Netif => self.netifs.resolve(rule.dest.id).ok_or(Error::NoHandler)?,
            DestType::Vnet => {
                pkt.set_attr(attrs::RX_TO_VNET);
                self.stack.receive_vnet(pkt);
                return Ok(());
            }
            DestType::Null | DestType::Cb => return Err(Error::NoHandler),
        };

        pkt.bind(netif.id());
        if rule.dest.proto != 0 {
            pkt.set_protocol(rule.dest.proto);
        }
        netif.hold();

        if rule.has_flag(flags::STRIP_TAG) {
            pkt.strip_vlan_tag();
        }

        let mirror = self.mirror(&pkt, rule);

        self.stack.receive(&netif, pkt, Some(rule));
        if let Some((mirror_netif, mirror_pkt)) = mirror {
            self.stack.receive(&mirror_netif, mirror_pkt, Some(rule));
        }
        Ok(())
    }

    fn mirror(&self, pkt: &Packet, rule: &FilterRule) -> Option<(Arc<Netif>, Packet)> {
        if rule.mirror.kind != DestType::Netif {
            return None;
        }
        let netif = self.netifs.resolve(rule.mirror.id)?;
        let mut copy = pkt.clone();
        copy.bind(netif.id());
        if rule.mirror.proto != 0 {
            copy.set_protocol(rule.mirror.proto);
        }
        netif.hold();
        Some((netif, copy))
    }
}

fn log_branch(fc: &FilterCtrl, rv: &Result<()>) {
    match rv {
        Ok(()) => {}
        Err(Error::NoHandler) => tracing::trace!("filter {}: packet dropped", fc.rule.id),
        Err(e) => tracing::warn!("filter {}: packet dropped: {}", fc.rule.id, e),
    }
}
