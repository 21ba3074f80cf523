// RX buffer manager boundary

use super::hw::HwInfo;
use super::queue::RxQueue;

/// How RX buffers of a queue are allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BufMode {
    /// One socket buffer per descriptor
    #[default]
    Skb,
    /// Buffers carved out of (possibly compound) pages
    Page,
    /// Buffers mapped from a user-provided region
    Mapped,
}

/// Supplies the RX buffer-mode decision during channel configuration.
pub trait BufManager: Send + Sync {
    /// Called once when the device is opened.
    fn init(&self, _info: &HwInfo) {}

    /// Pick the buffer mode for `rxq`; may record page layout on the queue.
    fn rx_buf_mode(&self, rxq: &mut RxQueue, rx_ph_size: u32) -> BufMode;
}

/// Reserved headroom in front of every RX buffer
const RXB_RESV: u32 = 128;

/// Metadata room when the hardware has no separate packet header
const RXB_META: u32 = 64;

/// Shared-info trailer kept at the end of every buffer
const RXB_SHINFO: u32 = 320;

const RXB_ALIGN: u32 = 64;

const PAGE_ORDER_MAX: u32 = 10;

#[inline]
fn rxb_size(len: u32) -> u32 {
    (len + RXB_RESV).next_multiple_of(RXB_ALIGN) + RXB_SHINFO
}

/// Buffer manager that prefers page buffers.
///
/// Two buffers must fit in one allocation unit; the page order grows until
/// they do.
#[derive(Debug, Clone)]
pub struct PageBufManager {
    page_size: u32,
    page_mode: bool,
    zero_copy: bool,
}

impl Default for PageBufManager {
    fn default() -> Self {
        Self {
            page_size: 4096,
            page_mode: true,
            zero_copy: false,
        }
    }
}

impl PageBufManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base page size.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Use one socket buffer per descriptor instead of pages.
    pub fn skb_mode(mut self) -> Self {
        self.page_mode = false;
        self
    }

    /// Buffers come from a zero-copy user region.
    pub fn zero_copy(mut self) -> Self {
        self.zero_copy = true;
        self
    }
}

impl BufManager for PageBufManager {
    fn rx_buf_mode(&self, rxq: &mut RxQueue, rx_ph_size: u32) -> BufMode {
        if self.zero_copy {
            return BufMode::Mapped;
        } else if !self.page_mode {
            return BufMode::Skb;
        }

        let len = if rx_ph_size != 0 {
            rxq.buf_size()
        } else {
            rxq.buf_size() + RXB_META
        };
        let mut order = 0;
        let mut pgsz = self.page_size;
        while rxb_size(len) * 2 > pgsz && order < PAGE_ORDER_MAX {
            order += 1;
            pgsz *= 2;
        }
        rxq.set_page_layout(order, pgsz);

        BufMode::Page
    }
}
