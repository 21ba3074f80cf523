//! RX packet filters.
//!
//! A filter rule matches a masked slice of a packet's out-of-band metadata
//! and frame bytes, and names where matching packets go. Rules live in a
//! [`FilterTable`] ordered by channel affinity and priority; the
//! [`Dispatcher`] walks that order for every received packet.

pub mod callback;
pub mod dispatch;
pub mod matcher;
pub mod table;

pub use callback::{CallbackDesc, CallbackRegistry, FilterCallback, Verdict};
pub use dispatch::Dispatcher;
pub use table::FilterTable;

use crate::api::Error;
use crate::netif::NetifId;

/// Highest filter id
pub const NUM_FILTER_MAX: u32 = 128;

/// Max metadata + frame bytes a filter matches
pub const FILTER_BYTES_MAX: usize = 256;

/// Max length of a filter description
pub const FILTER_DESC_MAX: usize = 32;

/// Filter rule flags.
pub mod flags {
    /// Match every packet
    pub const ANY_DATA: u32 = 1 << 0;
    /// Match only packets from `chan`
    pub const MATCH_CHAN: u32 = 1 << 1;
    /// Strip the outer VLAN tag before delivery
    pub const STRIP_TAG: u32 = 1 << 2;
}

/// What a filter applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum FilterType {
    /// Received packets
    #[default]
    RxPkt = 0,
}

impl TryFrom<u32> for FilterType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RxPkt),
            _ => Err(Error::Unavailable),
        }
    }
}

/// Where matching packets go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum DestType {
    /// Drop
    #[default]
    Null = 0,
    /// Deliver to a network interface
    Netif = 1,
    /// Deliver to the virtual-network path
    Vnet = 2,
    /// Hand to a filter callback
    Cb = 3,
}

impl TryFrom<u32> for DestType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Null),
            1 => Ok(Self::Netif),
            2 => Ok(Self::Vnet),
            3 => Ok(Self::Cb),
            _ => Err(Error::Unavailable),
        }
    }
}

/// A delivery target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dest {
    pub kind: DestType,
    /// Interface id; 0 is the primary interface
    pub id: NetifId,
    /// Protocol to force on delivered packets, 0 to keep
    pub proto: u16,
}

impl Dest {
    pub fn netif(id: NetifId) -> Self {
        Self {
            kind: DestType::Netif,
            id,
            proto: 0,
        }
    }
}

/// Bytes a filter compares.
///
/// `data` and `mask` hold the metadata slice followed by the frame slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    pub oob_offset: usize,
    pub oob_size: usize,
    /// Offset into the frame, i.e. after the metadata
    pub pkt_offset: usize,
    pub pkt_size: usize,
    pub data: [u8; FILTER_BYTES_MAX],
    pub mask: [u8; FILTER_BYTES_MAX],
}

impl Default for MatchSpec {
    fn default() -> Self {
        Self {
            oob_offset: 0,
            oob_size: 0,
            pkt_offset: 0,
            pkt_size: 0,
            data: [0; FILTER_BYTES_MAX],
            mask: [0; FILTER_BYTES_MAX],
        }
    }
}

impl MatchSpec {
    /// Total bytes compared.
    #[inline]
    pub fn size(&self) -> usize {
        self.oob_size + self.pkt_size
    }

    fn fill(&mut self, at: usize, value: &[u8], mask: &[u8]) {
        let n = value.len().min(FILTER_BYTES_MAX.saturating_sub(at));
        self.data[at..at + n].copy_from_slice(&value[..n]);
        for (i, m) in self.mask[at..at + n].iter_mut().enumerate() {
            *m = mask.get(i).copied().unwrap_or(0xff);
        }
    }
}

/// A filter rule.
///
/// Built with the chained setters, then handed to
/// [`FilterTable::create`], which assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub id: u32,
    /// Next present id, filled in by `get`
    pub next: u32,
    pub filter_type: FilterType,
    /// Lower sorts first
    pub priority: u32,
    /// See [`flags`]
    pub flags: u32,
    /// Channel for [`flags::MATCH_CHAN`]
    pub chan: u32,
    /// Description; for callback destinations, names the callback
    pub desc: String,
    pub matcher: MatchSpec,
    pub dest: Dest,
    /// Secondary copy, only [`DestType::Netif`] is acted on
    pub mirror: Dest,
    pub user_data: u32,
    /// Packets matched, filled in by `get`
    pub hits: u64,
}

impl Default for FilterRule {
    fn default() -> Self {
        Self {
            id: 0,
            next: 0,
            filter_type: FilterType::RxPkt,
            priority: 0,
            flags: 0,
            chan: 0,
            desc: String::new(),
            matcher: MatchSpec::default(),
            dest: Dest::default(),
            mirror: Dest::default(),
            user_data: 0,
            hits: 0,
        }
    }
}

impl FilterRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Only match packets received on `chan`.
    pub fn chan(mut self, chan: u32) -> Self {
        self.flags |= flags::MATCH_CHAN;
        self.chan = chan;
        self
    }

    /// Match every packet.
    pub fn match_any(mut self) -> Self {
        self.flags |= flags::ANY_DATA;
        self
    }

    /// Compare `value` under `mask` at `offset` of the metadata. Must be
    /// set before [`match_pkt`](Self::match_pkt).
    pub fn match_oob(mut self, offset: usize, value: &[u8], mask: &[u8]) -> Self {
        self.matcher.oob_offset = offset;
        self.matcher.oob_size = value.len();
        self.matcher.fill(0, value, mask);
        self
    }

    /// Compare `value` under `mask` at `offset` of the frame.
    pub fn match_pkt(mut self, offset: usize, value: &[u8], mask: &[u8]) -> Self {
        let at = self.matcher.oob_size;
        self.matcher.pkt_offset = offset;
        self.matcher.pkt_size = value.len();
        self.matcher.fill(at, value, mask);
        self
    }

    pub fn strip_tag(mut self) -> Self {
        self.flags |= flags::STRIP_TAG;
        self
    }

    pub fn dest(mut self, dest: Dest) -> Self {
        self.dest = dest;
        self
    }

    /// Deliver to interface `id`.
    pub fn to_netif(self, id: NetifId) -> Self {
        self.dest(Dest::netif(id))
    }

    /// Deliver to the virtual-network path.
    pub fn to_vnet(self) -> Self {
        self.dest(Dest {
            kind: DestType::Vnet,
            ..Default::default()
        })
    }

    /// Hand to the callback registered under a prefix of `desc`.
    pub fn to_callback(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self.dest(Dest {
            kind: DestType::Cb,
            ..Default::default()
        })
    }

    /// Force the protocol of delivered packets.
    pub fn proto(mut self, proto: u16) -> Self {
        self.dest.proto = proto;
        self
    }

    /// Also deliver a copy to interface `id`.
    pub fn mirror_to(mut self, id: NetifId, proto: u16) -> Self {
        self.mirror = Dest {
            kind: DestType::Netif,
            id,
            proto,
        };
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn user_data(mut self, user_data: u32) -> Self {
        self.user_data = user_data;
        self
    }

    #[inline]
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Sorts before `other` in the table walk: channel-affine rules first,
    /// by channel then priority; the rest by priority.
    pub fn sorts_before(&self, other: &FilterRule) -> bool {
        match (
            self.has_flag(flags::MATCH_CHAN),
            other.has_flag(flags::MATCH_CHAN),
        ) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => (self.chan, self.priority) < (other.chan, other.priority),
            (false, false) => self.priority < other.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_layout() {
        let rule = FilterRule::new()
            .priority(3)
            .match_oob(4, &[0x12, 0x34], &[0xff, 0x0f])
            .match_pkt(12, &[0x81, 0x00], &[])
            .to_netif(2)
            .proto(0x0800);
        assert_eq!(rule.matcher.size(), 4);
        assert_eq!(&rule.matcher.data[..4], &[0x12, 0x34, 0x81, 0x00]);
        assert_eq!(&rule.matcher.mask[..4], &[0xff, 0x0f, 0xff, 0xff]);
        assert_eq!(rule.dest, Dest { kind: DestType::Netif, id: 2, proto: 0x0800 });
    }

    #[test]
    fn test_sorts_before() {
        let a = FilterRule::new().priority(9).chan(1);
        let b = FilterRule::new().priority(1).chan(2);
        let c = FilterRule::new().priority(0);
        assert!(a.sorts_before(&b));
        assert!(b.sorts_before(&c));
        assert!(!c.sorts_before(&a));
        assert!(!c.sorts_before(&c.clone()));
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(FilterType::try_from(0), Ok(FilterType::RxPkt));
        assert_eq!(FilterType::try_from(1), Err(Error::Unavailable));
        assert_eq!(DestType::try_from(3), Ok(DestType::Cb));
        assert_eq!(DestType::try_from(9), Err(Error::Unavailable));
    }
}
