// RX/TX queue descriptors and their counters

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Dir;
use super::buf::BufMode;

/// Queue state bits.
pub mod state {
    /// Channel is configured for this queue
    pub const USED: u32 = 1 << 0;
    /// Queue has been started
    pub const ACTIVE: u32 = 1 << 1;
    /// RX ring is refilled in batches
    pub const BATCH_REFILL: u32 = 1 << 2;
    /// TX completions are reclaimed by polling
    pub const POLL: u32 = 1 << 3;
    /// Delivery masked by a suspend
    pub const SUSPENDED: u32 = 1 << 4;
}

/// RX queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxqStats {
    pub packets: u64,
    pub bytes: u64,
    pub dropped: u64,
    pub errors: u64,
    pub head_errors: u64,
    pub data_errors: u64,
    pub cell_errors: u64,
    pub nomems: u64,
}

impl RxqStats {
    pub(crate) fn add(&mut self, o: &Self) {
        self.packets = self.packets.wrapping_add(o.packets);
        self.bytes = self.bytes.wrapping_add(o.bytes);
        self.dropped = self.dropped.wrapping_add(o.dropped);
        self.errors = self.errors.wrapping_add(o.errors);
        self.head_errors = self.head_errors.wrapping_add(o.head_errors);
        self.data_errors = self.data_errors.wrapping_add(o.data_errors);
        self.cell_errors = self.cell_errors.wrapping_add(o.cell_errors);
        self.nomems = self.nomems.wrapping_add(o.nomems);
    }

    pub(crate) fn sub(&mut self, o: &Self) {
        self.packets = self.packets.wrapping_sub(o.packets);
        self.bytes = self.bytes.wrapping_sub(o.bytes);
        self.dropped = self.dropped.wrapping_sub(o.dropped);
        self.errors = self.errors.wrapping_sub(o.errors);
        self.head_errors = self.head_errors.wrapping_sub(o.head_errors);
        self.data_errors = self.data_errors.wrapping_sub(o.data_errors);
        self.cell_errors = self.cell_errors.wrapping_sub(o.cell_errors);
        self.nomems = self.nomems.wrapping_sub(o.nomems);
    }
}

/// TX queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxqStats {
    pub packets: u64,
    pub bytes: u64,
    pub dropped: u64,
    pub errors: u64,
    /// Number of times the queue was flow-controlled off
    pub xoffs: u64,
}

impl TxqStats {
    pub(crate) fn add(&mut self, o: &Self) {
        self.packets = self.packets.wrapping_add(o.packets);
        self.bytes = self.bytes.wrapping_add(o.bytes);
        self.dropped = self.dropped.wrapping_add(o.dropped);
        self.errors = self.errors.wrapping_add(o.errors);
        self.xoffs = self.xoffs.wrapping_add(o.xoffs);
    }

    pub(crate) fn sub(&mut self, o: &Self) {
        self.packets = self.packets.wrapping_sub(o.packets);
        self.bytes = self.bytes.wrapping_sub(o.bytes);
        self.dropped = self.dropped.wrapping_sub(o.dropped);
        self.errors = self.errors.wrapping_sub(o.errors);
        self.xoffs = self.xoffs.wrapping_sub(o.xoffs);
    }
}

/// Class of a failed RX descriptor reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxDescError {
    /// Packet header could not be written
    Head,
    /// Packet data could not be written
    Data,
    /// Cell-level error on the ingress path
    Cell,
}

/// Live RX counters, updated from the data path without the control lock.
#[derive(Debug, Default)]
pub(crate) struct RxqCounters {
    packets: AtomicU64,
    bytes: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    head_errors: AtomicU64,
    data_errors: AtomicU64,
    cell_errors: AtomicU64,
    nomems: AtomicU64,
}

impl RxqCounters {
    #[inline]
    pub fn record(&self, bytes: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn drop_one(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a descriptor error; it also counts as a generic error.
    pub fn desc_error(&self, kind: RxDescError) {
        self.error();
        let counter = match kind {
            RxDescError::Head => &self.head_errors,
            RxDescError::Data => &self.data_errors,
            RxDescError::Cell => &self.cell_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn nomem(&self) {
        self.nomems.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RxqStats {
        RxqStats {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            head_errors: self.head_errors.load(Ordering::Relaxed),
            data_errors: self.data_errors.load(Ordering::Relaxed),
            cell_errors: self.cell_errors.load(Ordering::Relaxed),
            nomems: self.nomems.load(Ordering::Relaxed),
        }
    }
}

/// Live TX counters.
#[derive(Debug, Default)]
pub(crate) struct TxqCounters {
    packets: AtomicU64,
    bytes: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    xoffs: AtomicU64,
}

impl TxqCounters {
    #[inline]
    pub fn record(&self, bytes: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn drop_one(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn xoff(&self) {
        self.xoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TxqStats {
        TxqStats {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            xoffs: self.xoffs.load(Ordering::Relaxed),
        }
    }
}

/// RX queue descriptor.
#[derive(Debug, Clone)]
pub struct RxQueue {
    pub(crate) group_id: u32,
    pub(crate) chan_id: u32,
    pub(crate) queue_id: u32,
    pub(crate) nb_desc: u32,
    pub(crate) free_thresh: u32,
    pub(crate) buf_size: u32,
    pub(crate) buf_mode: BufMode,
    pub(crate) page_order: u32,
    pub(crate) page_size: u32,
    pub(crate) state: u32,
    pub(crate) intr_coalescing: bool,
    pub(crate) ic_val: u32,
    pub(crate) counters: Arc<RxqCounters>,
}

impl RxQueue {
    pub(crate) fn new(group_id: u32, chan_id: u32) -> Self {
        Self {
            group_id,
            chan_id,
            queue_id: 0,
            nb_desc: 0,
            free_thresh: 0,
            buf_size: 0,
            buf_mode: BufMode::default(),
            page_order: 0,
            page_size: 0,
            state: 0,
            intr_coalescing: false,
            ic_val: 0,
            counters: Arc::default(),
        }
    }

    #[inline]
    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    /// Global channel number
    #[inline]
    pub fn chan_id(&self) -> u32 {
        self.chan_id
    }

    /// Logical queue id
    #[inline]
    pub fn queue_id(&self) -> u32 {
        self.queue_id
    }

    #[inline]
    pub fn nb_desc(&self) -> u32 {
        self.nb_desc
    }

    /// Batch-refill threshold, 0 when refilled per descriptor.
    #[inline]
    pub fn free_thresh(&self) -> u32 {
        self.free_thresh
    }

    /// Buffer size including the packet header
    #[inline]
    pub fn buf_size(&self) -> u32 {
        self.buf_size
    }

    #[inline]
    pub fn buf_mode(&self) -> BufMode {
        self.buf_mode
    }

    #[inline]
    pub fn page_order(&self) -> u32 {
        self.page_order
    }

    #[inline]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[inline]
    pub fn state(&self) -> u32 {
        self.state
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.state & state::USED != 0
    }

    /// Packed coalescing value, `None` when coalescing is off.
    pub fn intr_coalescing(&self) -> Option<u32> {
        self.intr_coalescing.then_some(self.ic_val)
    }

    /// Record the page layout chosen by the buffer manager.
    pub fn set_page_layout(&mut self, order: u32, size: u32) {
        self.page_order = order;
        self.page_size = size;
    }

    pub(crate) fn set_buf_size(&mut self, size: u32) {
        self.buf_size = size;
    }

    pub fn stats(&self) -> RxqStats {
        self.counters.snapshot()
    }
}

/// TX queue descriptor.
#[derive(Debug, Clone)]
pub struct TxQueue {
    pub(crate) group_id: u32,
    pub(crate) chan_id: u32,
    pub(crate) queue_id: u32,
    pub(crate) nb_desc: u32,
    pub(crate) free_thresh: u32,
    pub(crate) state: u32,
    pub(crate) counters: Arc<TxqCounters>,
    /// Serializes transmitters; shadow queues have none.
    pub(crate) xmit_lock: Option<Arc<Mutex<()>>>,
}

impl TxQueue {
    pub(crate) fn new(group_id: u32, chan_id: u32, with_lock: bool) -> Self {
        Self {
            group_id,
            chan_id,
            queue_id: 0,
            nb_desc: 0,
            free_thresh: 0,
            state: 0,
            counters: Arc::default(),
            xmit_lock: with_lock.then(|| Arc::new(Mutex::new(()))),
        }
    }

    #[inline]
    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    #[inline]
    pub fn chan_id(&self) -> u32 {
        self.chan_id
    }

    #[inline]
    pub fn queue_id(&self) -> u32 {
        self.queue_id
    }

    #[inline]
    pub fn nb_desc(&self) -> u32 {
        self.nb_desc
    }

    /// Poll-mode reclaim threshold, 0 when interrupt driven.
    #[inline]
    pub fn free_thresh(&self) -> u32 {
        self.free_thresh
    }

    #[inline]
    pub fn state(&self) -> u32 {
        self.state
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.state & state::USED != 0
    }

    pub fn has_xmit_lock(&self) -> bool {
        self.xmit_lock.is_some()
    }

    pub fn stats(&self) -> TxqStats {
        self.counters.snapshot()
    }
}

/// Interrupt handle of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntrHandle {
    pub unit: u32,
    pub group: u32,
    pub chan: u32,
    /// Channel within its group
    pub queue: u32,
    pub dir: Dir,
    /// Interrupt number reported by the hardware
    pub inum: u32,
    /// Packets handled per interrupt
    pub budget: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_wrapping_sub() {
        let mut a = RxqStats {
            packets: 1,
            ..Default::default()
        };
        let b = RxqStats {
            packets: 3,
            ..Default::default()
        };
        a.sub(&b);
        assert_eq!(a.packets, u64::MAX - 1);
        a.add(&b);
        assert_eq!(a.packets, 1);
    }

    #[test]
    fn test_counters_snapshot() {
        let txq = TxQueue::new(0, 4, true);
        txq.counters.record(100);
        txq.counters.record(50);
        txq.counters.xoff();
        let s = txq.stats();
        assert_eq!(s.packets, 2);
        assert_eq!(s.bytes, 150);
        assert_eq!(s.xoffs, 1);
        assert!(txq.has_xmit_lock());
        assert!(!TxQueue::new(0, 4, false).has_xmit_lock());
    }

    #[test]
    fn test_desc_errors() {
        let rxq = RxQueue::new(0, 0);
        rxq.counters.desc_error(RxDescError::Head);
        rxq.counters.desc_error(RxDescError::Cell);
        rxq.counters.desc_error(RxDescError::Cell);
        rxq.counters.error();
        let s = rxq.stats();
        assert_eq!(s.errors, 4);
        assert_eq!((s.head_errors, s.data_errors, s.cell_errors), (1, 0, 2));
    }

    #[test]
    fn test_clone_shares_counters() {
        let rxq = RxQueue::new(1, 17);
        let copy = rxq.clone();
        rxq.counters.record(64);
        assert_eq!(copy.stats().packets, 1);
    }
}
