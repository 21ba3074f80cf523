//! Masked byte comparison of a packet against a rule.

use arrayvec::ArrayVec;

use super::{FILTER_BYTES_MAX, FilterRule, flags};
use crate::packet::Packet;

/// Test whether `pkt`, received on channel `chan`, matches `rule`.
///
/// The compared bytes are the rule's metadata slice followed by its frame
/// slice, zero-padded to a multiple of four and compared one 32-bit word at
/// a time under the mask. A slice that reaches past the end of the packet
/// does not match.
pub fn matches(rule: &FilterRule, chan: u32, pkt: &Packet) -> bool {
    if rule.has_flag(flags::ANY_DATA) {
        return true;
    }
    if rule.has_flag(flags::MATCH_CHAN) && rule.chan != chan {
        return false;
    }

    let spec = &rule.matcher;
    let size = spec.size();
    if size > FILTER_BYTES_MAX {
        return false;
    }

    let Some(oob) = slice_at(pkt.meta(), spec.oob_offset, spec.oob_size) else {
        return false;
    };
    let Some(frame) = slice_at(pkt.data(), spec.pkt_offset, spec.pkt_size) else {
        return false;
    };

    let mut buf: ArrayVec<u8, FILTER_BYTES_MAX> = ArrayVec::new();
    if buf.try_extend_from_slice(oob).is_err() || buf.try_extend_from_slice(frame).is_err() {
        return false;
    }
    while buf.len() % 4 != 0 {
        buf.push(0);
    }

    buf.chunks_exact(4)
        .zip(spec.data.chunks_exact(4))
        .zip(spec.mask.chunks_exact(4))
        .all(|((s, d), m)| (word(s) & word(m)) == word(d))
}

#[inline]
fn slice_at(buf: &[u8], offset: usize, size: usize) -> Option<&[u8]> {
    let end = offset.checked_add(size)?;
    buf.get(offset..end)
}

#[inline]
fn word(b: &[u8]) -> u32 {
    u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Vec<u8> {
        (0u8..64).collect()
    }

    #[test]
    fn test_any_data() {
        let rule = FilterRule::new().match_any().chan(9);
        assert!(matches(&rule, 0, &Packet::new(0, &[], &[])));
    }

    #[test]
    fn test_chan_affinity() {
        let rule = FilterRule::new().chan(2).match_pkt(0, &[0, 1], &[]);
        let pkt = Packet::new(0, &[], &frame());
        assert!(matches(&rule, 2, &pkt));
        assert!(!matches(&rule, 3, &pkt));
    }

    #[test]
    fn test_masked_frame_match() {
        let rule = FilterRule::new().match_pkt(12, &[0x0c, 0x00, 0x0e], &[0xff, 0x00, 0xff]);
        let pkt = Packet::new(0, &[], &frame());
        assert!(matches(&rule, 0, &pkt));

        let rule = FilterRule::new().match_pkt(12, &[0x0c, 0x0d, 0x0f], &[]);
        assert!(!matches(&rule, 0, &pkt));
    }

    #[test]
    fn test_oob_then_frame() {
        let meta = [0xde, 0xad, 0xbe, 0xef, 0x01];
        let rule = FilterRule::new()
            .match_oob(3, &[0xef, 0x01], &[])
            .match_pkt(0, &[0x00, 0x01, 0x02], &[]);
        assert!(matches(&rule, 0, &Packet::new(0, &meta, &frame())));

        let meta = [0xde, 0xad, 0xbe, 0xef, 0x02];
        assert!(!matches(&rule, 0, &Packet::new(0, &meta, &frame())));
    }

    #[test]
    fn test_out_of_range() {
        let rule = FilterRule::new().match_pkt(62, &[62, 63, 0], &[]);
        assert!(!matches(&rule, 0, &Packet::new(0, &[], &frame())));

        let rule = FilterRule::new().match_oob(0, &[0], &[]);
        assert!(!matches(&rule, 0, &Packet::new(0, &[], &frame())));
    }

    #[test]
    fn test_empty_matcher_matches() {
        let rule = FilterRule::new();
        assert!(matches(&rule, 0, &Packet::new(0, &[], &frame())));
    }
}
