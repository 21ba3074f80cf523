//! Synthetic Ethernet frames.

use smoltcp::wire;

pub const SRC_MAC: [u8; 6] = [0x00, 0x50, 0x56, 0xae, 0x76, 0xf5];
pub const DST_MAC: [u8; 6] = [0x00, 0x0b, 0x86, 0x64, 0x8b, 0xa0];

/// Ethernet + IPv4 + UDP header length
pub const UDP_HDR_LEN: usize = 42;

/// Offset of the UDP destination port in an untagged frame
pub const UDP_DST_PORT_OFFSET: usize = 36;

/// Build an untagged IPv4/UDP frame.
pub fn udp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; UDP_HDR_LEN + payload.len()];

    let mut frame = wire::EthernetFrame::new_unchecked(&mut buf[..]);
    frame.set_src_addr(wire::EthernetAddress(SRC_MAC));
    frame.set_dst_addr(wire::EthernetAddress(DST_MAC));
    frame.set_ethertype(wire::EthernetProtocol::Ipv4);

    let mut ipv4_pkt = wire::Ipv4Packet::new_unchecked(frame.payload_mut());
    ipv4_pkt.set_version(4);
    ipv4_pkt.set_header_len(20);
    ipv4_pkt.set_dscp(0);
    ipv4_pkt.set_ecn(0);
    ipv4_pkt.set_total_len((28 + payload.len()) as u16);
    ipv4_pkt.set_ident(0x5c65);
    ipv4_pkt.clear_flags();
    ipv4_pkt.set_frag_offset(0);
    ipv4_pkt.set_hop_limit(64);
    ipv4_pkt.set_next_header(wire::IpProtocol::Udp);
    ipv4_pkt.set_src_addr(wire::Ipv4Address::new(192, 168, 29, 58));
    ipv4_pkt.set_dst_addr(wire::Ipv4Address::new(192, 168, 29, 160));
    ipv4_pkt.fill_checksum();

    let mut udp_pkt = wire::UdpPacket::new_unchecked(ipv4_pkt.payload_mut());
    udp_pkt.set_src_port(src_port);
    udp_pkt.set_dst_port(dst_port);
    udp_pkt.set_len((8 + payload.len()) as u16);
    udp_pkt.set_checksum(0);
    udp_pkt.payload_mut().copy_from_slice(payload);

    buf
}

/// Build an IPv4/UDP frame carrying an outer VLAN tag with `tpid`.
pub fn vlan_udp_frame(tpid: u16, vid: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let untagged = udp_frame(60376, dst_port, payload);
    let mut buf = Vec::with_capacity(untagged.len() + 4);
    buf.extend_from_slice(&untagged[..12]);
    buf.extend_from_slice(&tpid.to_be_bytes());
    buf.extend_from_slice(&(vid & 0x0fff).to_be_bytes());
    buf.extend_from_slice(&untagged[12..]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_frame_parses() {
        let buf = udp_frame(1000, 2000, b"hello");
        let frame = wire::EthernetFrame::new_checked(&buf[..]).unwrap();
        assert_eq!(frame.ethertype(), wire::EthernetProtocol::Ipv4);
        let ip = wire::Ipv4Packet::new_checked(frame.payload()).unwrap();
        assert!(ip.verify_checksum());
        let udp = wire::UdpPacket::new_checked(ip.payload()).unwrap();
        assert_eq!(udp.dst_port(), 2000);
        assert_eq!(udp.payload(), b"hello");
        assert_eq!(&buf[UDP_DST_PORT_OFFSET..UDP_DST_PORT_OFFSET + 2], &2000u16.to_be_bytes());
    }

    #[test]
    fn test_vlan_frame_layout() {
        let buf = vlan_udp_frame(0x8100, 10, 53, b"x");
        assert_eq!(buf.len(), UDP_HDR_LEN + 1 + 4);
        assert_eq!(&buf[12..16], &[0x81, 0x00, 0x00, 0x0a]);
        assert_eq!(&buf[16..18], &[0x08, 0x00]);
    }
}
