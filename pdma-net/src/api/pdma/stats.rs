// Device information and statistics reports

use super::queue::{RxqStats, TxqStats};
use super::{ChanBitmap, NUM_Q_MAX};

/// Device statistics since the last reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevStats {
    /// Per logical RX queue
    pub rxq: [RxqStats; NUM_Q_MAX],
    /// Sum over all RX queues
    pub rxqs: RxqStats,
    /// Per logical TX queue
    pub txq: [TxqStats; NUM_Q_MAX],
    /// Sum over all TX queues
    pub txqs: TxqStats,
    /// Interrupts acknowledged
    pub intrs: u64,
}

impl Default for DevStats {
    fn default() -> Self {
        Self {
            rxq: [RxqStats::default(); NUM_Q_MAX],
            rxqs: RxqStats::default(),
            txq: [TxqStats::default(); NUM_Q_MAX],
            txqs: TxqStats::default(),
            intrs: 0,
        }
    }
}

/// Device information report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevInfo {
    pub dev_name: String,
    pub dev_id: u32,
    pub dev_type: u32,
    pub max_groups: u32,
    pub max_queues: u32,
    pub bm_groups: u32,
    pub bm_rx_queues: ChanBitmap,
    pub bm_tx_queues: ChanBitmap,
    pub nb_groups: u32,
    pub nb_rx_queues: u32,
    pub nb_tx_queues: u32,
    pub rx_desc_size: u32,
    pub tx_desc_size: u32,
    pub rx_ph_size: u32,
    pub tx_ph_size: u32,
    /// Default RX buffer size
    pub rx_buf_dflt: u32,
    /// Default ring size
    pub nb_desc_dflt: u32,
    /// Per logical RX queue, buffer size without packet header
    pub rx_buf_size: [u32; NUM_Q_MAX],
    pub nb_rx_desc: [u32; NUM_Q_MAX],
    pub rxq_state: [u32; NUM_Q_MAX],
    pub nb_tx_desc: [u32; NUM_Q_MAX],
    pub txq_state: [u32; NUM_Q_MAX],
}

impl Default for DevInfo {
    fn default() -> Self {
        Self {
            dev_name: String::new(),
            dev_id: 0,
            dev_type: 0,
            max_groups: 0,
            max_queues: 0,
            bm_groups: 0,
            bm_rx_queues: 0,
            bm_tx_queues: 0,
            nb_groups: 0,
            nb_rx_queues: 0,
            nb_tx_queues: 0,
            rx_desc_size: 0,
            tx_desc_size: 0,
            rx_ph_size: 0,
            tx_ph_size: 0,
            rx_buf_dflt: 0,
            nb_desc_dflt: 0,
            rx_buf_size: [0; NUM_Q_MAX],
            nb_rx_desc: [0; NUM_Q_MAX],
            rxq_state: [0; NUM_Q_MAX],
            nb_tx_desc: [0; NUM_Q_MAX],
            txq_state: [0; NUM_Q_MAX],
        }
    }
}
