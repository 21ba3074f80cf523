// Packet buffer handed between the DMA queues, the filter pipeline and the
// network stack.

use bytes::BytesMut;
use smoltcp::wire::EthernetFrame;

use crate::netif::NetifId;

/// 802.1Q customer VLAN TPID
pub const ETH_P_8021Q: u16 = 0x8100;

/// 802.1ad service VLAN TPID
pub const ETH_P_8021AD: u16 = 0x88a8;

/// Length of one VLAN tag
pub const VLAN_HLEN: usize = 4;

/// Length of the Ethernet FCS
pub const ETH_FCS_LEN: usize = 4;

/// Offset of the TPID/ethertype field in an Ethernet frame
const ETH_TYPE_OFFSET: usize = 12;

/// Packet attribute bits carried in the packet header.
pub mod attrs {
    /// VLAN tag was stripped on receive
    pub const RX_STRIP_TAG: u32 = 1 << 0;
    /// Protocol field was forced by a filter
    pub const RX_SET_PROTO: u32 = 1 << 1;
    /// Packet goes to the virtual-network path
    pub const RX_TO_VNET: u32 = 1 << 2;
    /// Transmit on the queue recorded in the header
    pub const TX_BIND_QUE: u32 = 1 << 8;
}

/// Header prepended by the DMA engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PktHdr {
    /// Logical queue the packet arrived on (or should leave on)
    pub queue_id: u16,
    /// Attribute bits, see [`attrs`]
    pub attrs: u32,
}

/// A uniquely-owned packet.
///
/// Layout mirrors what the hardware writes: a header, a block of
/// out-of-band metadata, then the Ethernet frame. `Clone` produces a deep
/// copy; two packets never share storage, so dropping one replica cannot
/// affect another.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Packet {
    hdr: PktHdr,
    meta: BytesMut,
    data: BytesMut,
    protocol: Option<u16>,
    netif: Option<NetifId>,
}

impl Packet {
    /// Build a packet received on `queue_id`.
    pub fn new(queue_id: u16, meta: &[u8], data: &[u8]) -> Self {
        Self {
            hdr: PktHdr {
                queue_id,
                attrs: 0,
            },
            meta: BytesMut::from(meta),
            data: BytesMut::from(data),
            protocol: None,
            netif: None,
        }
    }

    #[inline]
    pub fn hdr(&self) -> &PktHdr {
        &self.hdr
    }

    #[inline]
    pub fn queue_id(&self) -> u16 {
        self.hdr.queue_id
    }

    #[inline]
    pub fn set_queue_id(&mut self, queue_id: u16) {
        self.hdr.queue_id = queue_id;
    }

    #[inline]
    pub fn attrs(&self) -> u32 {
        self.hdr.attrs
    }

    #[inline]
    pub fn has_attr(&self, attr: u32) -> bool {
        self.hdr.attrs & attr != 0
    }

    #[inline]
    pub fn set_attr(&mut self, attr: u32) {
        self.hdr.attrs |= attr;
    }

    /// Out-of-band metadata written by the switch.
    #[inline]
    pub fn meta(&self) -> &[u8] {
        &self.meta
    }

    /// Ethernet frame bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn meta_len(&self) -> usize {
        self.meta.len()
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Protocol forced by a filter, if any.
    #[inline]
    pub fn protocol(&self) -> Option<u16> {
        self.protocol
    }

    pub fn set_protocol(&mut self, proto: u16) {
        self.protocol = Some(proto);
        self.hdr.attrs |= attrs::RX_SET_PROTO;
    }

    /// Interface the packet has been bound to by destination resolution.
    #[inline]
    pub fn netif(&self) -> Option<NetifId> {
        self.netif
    }

    #[inline]
    pub fn bind(&mut self, netif: NetifId) {
        self.netif = Some(netif);
    }

    /// Read the TPID/ethertype of the frame.
    pub fn ethertype(&self) -> Option<u16> {
        let frame = EthernetFrame::new_checked(&self.data[..]).ok()?;
        Some(u16::from(frame.ethertype()))
    }

    /// Remove an outer 802.1Q/802.1ad tag in place.
    ///
    /// Returns `true` if a tag was removed. Untagged or truncated frames
    /// are left untouched.
    pub fn strip_vlan_tag(&mut self) -> bool {
        self.hdr.attrs |= attrs::RX_STRIP_TAG;
        match self.ethertype() {
            Some(ETH_P_8021Q) | Some(ETH_P_8021AD) => {}
            _ => return false,
        }
        let len = self.data.len();
        if len < ETH_TYPE_OFFSET + VLAN_HLEN + 2 {
            return false;
        }
        self.data
            .copy_within(ETH_TYPE_OFFSET + VLAN_HLEN.., ETH_TYPE_OFFSET);
        self.data.truncate(len - VLAN_HLEN);
        true
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("queue_id", &self.hdr.queue_id)
            .field("attrs", &format_args!("{:#x}", self.hdr.attrs))
            .field("meta_len", &self.meta_len())
            .field("data_len", &self.data_len())
            .field("protocol", &self.protocol)
            .field("netif", &self.netif)
            .finish()
    }
}

/// Format bytes as a hex dump, 32 bytes per line, grouped by 4.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + 16);
    for (line_no, line) in data.chunks(32).enumerate() {
        out.push_str(&format!("{:04x}: ", line_no * 32));
        for (i, b) in line.iter().enumerate() {
            out.push_str(&format!("{b:02x}"));
            if i & 0x3 == 0x3 && i + 1 != line.len() {
                out.push(' ');
            }
        }
        out.push('\n');
    }
    out
}
