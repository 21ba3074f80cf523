// Hardware layer boundary
//
// Register access, descriptor formats and channel programming live behind
// this trait. Every call returns a result; failures propagate unchanged to
// the caller of the device operation.

use super::Dir;
use super::buf::BufMode;
use crate::api::Result;
use crate::packet::Packet;

/// Capability descriptor reported by the hardware layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HwInfo {
    /// Number of channel groups (CMCs)
    pub num_cmcs: u32,
    /// Channels per group
    pub cmc_chans: u32,
    /// Total number of channels
    pub num_chans: u32,
    /// RX descriptor size in bytes
    pub rx_dcb_size: u32,
    /// TX descriptor size in bytes
    pub tx_dcb_size: u32,
    /// RX packet header size
    pub rx_ph_size: u32,
    /// TX packet header size
    pub tx_ph_size: u32,
}

/// Per-channel programming passed to [`PdmaHw::hw_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChanConfig {
    pub chan: u32,
    pub dir: Dir,
    pub queue: u32,
    pub nb_desc: u32,
    /// RX buffer size including packet header; 0 for TX
    pub buf_size: u32,
    pub buf_mode: BufMode,
}

/// Hardware operations consumed by the device controller.
pub trait PdmaHw: Send + Sync {
    /// Capability descriptor
    fn info(&self) -> HwInfo;

    fn hw_reset(&self) -> Result<()>;

    fn hw_init(&self) -> Result<()>;

    /// Program every configured channel.
    fn hw_config(&self, chans: &[ChanConfig]) -> Result<()>;

    fn chan_start(&self, chan: u32) -> Result<()>;

    fn chan_stop(&self, chan: u32) -> Result<()>;

    /// Mask/unmask delivery on a channel without touching its ring.
    fn chan_suspend(&self, chan: u32, dir: Dir) -> Result<()>;

    fn chan_resume(&self, chan: u32, dir: Dir) -> Result<()>;

    fn chan_intr_enable(&self, chan: u32) -> Result<()>;

    fn chan_intr_disable(&self, chan: u32) -> Result<()>;

    /// Acknowledge (clear) a pending interrupt.
    fn chan_intr_clear(&self, chan: u32) -> Result<()>;

    /// Whether the channel interrupt is raised.
    fn chan_intr_query(&self, chan: u32) -> Result<bool>;

    /// Whether the channel has work pending.
    fn chan_intr_check(&self, chan: u32) -> Result<bool>;

    fn chan_intr_coalesce(&self, chan: u32, count: u32, timer: u32) -> Result<()>;

    /// Interrupt number of a channel, `None` if the channel has none.
    fn chan_intr_num_get(&self, chan: u32) -> Option<u32>;

    fn chan_reg_dump(&self, chan: u32) -> Result<()>;

    /// Queue one packet for transmission; ownership moves to the hardware.
    fn chan_xmit(&self, chan: u32, pkt: Packet) -> Result<()>;
}
