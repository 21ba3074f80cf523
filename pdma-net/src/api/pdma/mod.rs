// Packet DMA device API
//
// Queues are organized in channel groups. A channel is one physical DMA
// path, globally indexed as `group * channels_per_group + channel`.
// Consumers address queues by a dense logical id assigned at configure time.

pub mod buf;
pub mod dev;
pub mod hw;
pub mod queue;
pub mod stats;

mod alloc;
mod ctrl;
mod group;

pub use buf::{BufManager, BufMode, PageBufManager};
pub use dev::{NetifAttach, PdmaDev};
pub use hw::{ChanConfig, HwInfo, PdmaHw};
pub use queue::{IntrHandle, RxDescError, RxQueue, RxqStats, TxQueue, TxqStats};
pub use stats::{DevInfo, DevStats};

/// Maximum number of groups supported by a device
pub const NUM_GRP_MAX: usize = 4;

/// Maximum number of queues supported by a group
pub const NUM_Q_PER_GRP: usize = 16;

/// Maximum number of queues supported by a device
pub const NUM_Q_MAX: usize = NUM_GRP_MAX * NUM_Q_PER_GRP;

/// Maximum length of a jumbo frame
pub const JUMBO_FRAME_LEN_MAX: u32 = 0xffff;

/// Maximum RX buffer size
pub const RX_BUF_SIZE_MAX: u32 = JUMBO_FRAME_LEN_MAX;

/// Minimum RX buffer size
pub const RX_BUF_SIZE_MIN: u32 = 68;

/// Default RX buffer size
pub const RX_BUF_SIZE_DFLT: u32 = 9216;

/// Default number of descriptors per ring
pub const NUM_RING_DESC: u32 = 64;

/// Default RX/TX budget per interrupt
pub const NUM_RXTX_BUDGET: u32 = 64;

/// Channel bitmap, bit `n` is global channel `n`
pub type ChanBitmap = u64;

/// Transfer direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Dir {
    #[default]
    Rx = 0,
    Tx = 1,
    /// Both directions (statistics reset only)
    RxTx = 2,
}

impl TryFrom<u32> for Dir {
    type Error = crate::api::Error;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Rx),
            1 => Ok(Self::Tx),
            2 => Ok(Self::RxTx),
            _ => Err(crate::api::Error::InvalidParam),
        }
    }
}

/// Device operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevMode {
    /// One queue per channel
    #[default]
    Standard,
    /// Each channel also carries a shadow virtual-network queue
    DualStack,
}

/// Device-wide behavior flags
pub mod dev_flags {
    /// Refill RX rings in batches
    pub const RX_BATCHING: u32 = 1 << 0;
    /// Reclaim TX descriptors by polling instead of interrupts
    pub const TX_POLLING: u32 = 1 << 1;
    /// TX descriptors are chained; channels start implicitly
    pub const CHAIN_MODE: u32 = 1 << 2;
    /// Frames arrive without FCS
    pub const NO_FCS: u32 = 1 << 3;
}
