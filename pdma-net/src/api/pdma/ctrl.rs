// Device control block

use super::alloc::QueueStore;
use super::queue::{IntrHandle, RxQueue, TxQueue};
use super::stats::DevStats;
use super::{ChanBitmap, DevMode, NUM_Q_MAX};
use crate::api::{Error, Result};

/// Channel geometry and policy fixed at open.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Geometry {
    pub unit: u32,
    pub dev_no: u32,
    /// Groups in use
    pub num_groups: usize,
    /// Groups exposed by the hardware
    pub max_groups: usize,
    /// Channels per group
    pub grp_queues: usize,
    /// Channels exposed by the hardware
    pub num_queues: usize,
    pub rx_ph_size: u32,
    pub tx_ph_size: u32,
    pub mode: DevMode,
    pub flags: u32,
}

/// One hardware channel group.
#[derive(Debug, Clone)]
pub(crate) struct Group {
    pub id: u32,
    pub attached: bool,
    /// Device that owns the group while attached
    pub owner: Option<u32>,
    pub intr_hdl: Vec<IntrHandle>,
    /// Per-channel descriptor count overrides, 0 = unset
    pub nb_desc: Vec<u32>,
    /// Per-channel RX buffer size overrides, 0 = unset
    pub rx_size: Vec<u32>,
    pub bm_rxq: u32,
    pub bm_txq: u32,
    pub nb_rxq: u32,
    pub nb_txq: u32,
    pub irq_mask: u32,
    pub poll_queues: u32,
}

impl Group {
    pub fn new(id: u32, grp_queues: usize) -> Self {
        Self {
            id,
            attached: false,
            owner: None,
            intr_hdl: vec![IntrHandle::default(); grp_queues],
            nb_desc: vec![0; grp_queues],
            rx_size: vec![0; grp_queues],
            bm_rxq: 0,
            bm_txq: 0,
            nb_rxq: 0,
            nb_txq: 0,
            irq_mask: 0,
            poll_queues: 0,
        }
    }

    /// Bits of the global channel bitmap that belong to this group.
    pub fn chan_mask(gi: usize, grp_queues: usize) -> ChanBitmap {
        let width = if grp_queues >= 64 {
            u64::MAX
        } else {
            (1u64 << grp_queues) - 1
        };
        width.checked_shl((gi * grp_queues) as u32).unwrap_or(0)
    }
}

/// Position of a queue in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueSlot {
    pub group: usize,
    pub chan: usize,
}

/// Everything the device lock protects.
#[derive(Debug)]
pub(crate) struct DevCtrl {
    pub geom: Geometry,
    pub grp: Vec<Group>,
    pub store: QueueStore,
    /// Dense logical id → queue
    pub rx_queue: [Option<QueueSlot>; NUM_Q_MAX],
    pub tx_queue: [Option<QueueSlot>; NUM_Q_MAX],
    pub vnet_rxq: [Option<QueueSlot>; NUM_Q_MAX],
    pub vnet_txq: [Option<QueueSlot>; NUM_Q_MAX],
    pub nb_rxq: usize,
    pub nb_txq: usize,
    pub bm_grp: u32,
    pub nb_grp: u32,
    pub bm_rxq: ChanBitmap,
    pub bm_txq: ChanBitmap,
    /// Device default descriptor count
    pub nb_desc: u32,
    /// Device interrupt budget
    pub budget: u32,
    /// Device default RX buffer size
    pub rx_buf_size: u32,
    pub rx_desc_size: u32,
    pub tx_desc_size: u32,
    /// Counters captured by the last reset
    pub stats_base: Box<DevStats>,
}

impl DevCtrl {
    pub fn new(geom: Geometry, grp: Vec<Group>, store: QueueStore) -> Self {
        Self {
            geom,
            grp,
            store,
            rx_queue: [None; NUM_Q_MAX],
            tx_queue: [None; NUM_Q_MAX],
            vnet_rxq: [None; NUM_Q_MAX],
            vnet_txq: [None; NUM_Q_MAX],
            nb_rxq: 0,
            nb_txq: 0,
            bm_grp: 0,
            nb_grp: 0,
            bm_rxq: 0,
            bm_txq: 0,
            nb_desc: 0,
            budget: 0,
            rx_buf_size: 0,
            rx_desc_size: 0,
            tx_desc_size: 0,
            stats_base: Box::default(),
        }
    }

    fn slot(table: &[Option<QueueSlot>; NUM_Q_MAX], queue: usize) -> Result<QueueSlot> {
        if queue >= NUM_Q_MAX {
            return Err(Error::InvalidParam);
        }
        table[queue].ok_or(Error::Unavailable)
    }

    /// RX queue by logical id, whether or not it is used.
    pub fn rxq(&self, queue: usize) -> Result<&RxQueue> {
        let s = Self::slot(&self.rx_queue, queue)?;
        self.store.rx(s.group, s.chan).ok_or(Error::Unavailable)
    }

    pub fn rxq_mut(&mut self, queue: usize) -> Result<&mut RxQueue> {
        let s = Self::slot(&self.rx_queue, queue)?;
        self.store.rx_mut(s.group, s.chan).ok_or(Error::Unavailable)
    }

    pub fn txq(&self, queue: usize) -> Result<&TxQueue> {
        let s = Self::slot(&self.tx_queue, queue)?;
        self.store.tx(s.group, s.chan).ok_or(Error::Unavailable)
    }

    pub fn txq_mut(&mut self, queue: usize) -> Result<&mut TxQueue> {
        let s = Self::slot(&self.tx_queue, queue)?;
        self.store.tx_mut(s.group, s.chan).ok_or(Error::Unavailable)
    }

    /// RX queue by logical id; must be in used state.
    pub fn used_rxq(&self, queue: usize) -> Result<&RxQueue> {
        let rxq = self.rxq(queue)?;
        if !rxq.is_used() {
            return Err(Error::Unavailable);
        }
        Ok(rxq)
    }

    pub fn used_txq(&self, queue: usize) -> Result<&TxQueue> {
        let txq = self.txq(queue)?;
        if !txq.is_used() {
            return Err(Error::Unavailable);
        }
        Ok(txq)
    }

    pub fn used_rxq_mut(&mut self, queue: usize) -> Result<&mut RxQueue> {
        let rxq = self.rxq_mut(queue)?;
        if !rxq.is_used() {
            return Err(Error::Unavailable);
        }
        Ok(rxq)
    }

    pub fn used_txq_mut(&mut self, queue: usize) -> Result<&mut TxQueue> {
        let txq = self.txq_mut(queue)?;
        if !txq.is_used() {
            return Err(Error::Unavailable);
        }
        Ok(txq)
    }

    /// Shadow RX queue registered under a logical id.
    pub fn vnet_rxq(&self, queue: usize) -> Result<&RxQueue> {
        let s = Self::slot(&self.vnet_rxq, queue)?;
        self.store
            .vnet_rx
            .get(s.group)
            .and_then(|g| g.get(s.chan))
            .ok_or(Error::Unavailable)
    }

    pub fn vnet_txq(&self, queue: usize) -> Result<&TxQueue> {
        let s = Self::slot(&self.vnet_txq, queue)?;
        self.store
            .vnet_tx
            .get(s.group)
            .and_then(|g| g.get(s.chan))
            .ok_or(Error::Unavailable)
    }

    /// Split a global channel into `(group, channel within group)`.
    pub fn chan_pos(&self, chan: u32) -> Result<(usize, usize)> {
        let chan = chan as usize;
        if chan >= self.geom.num_queues || self.geom.grp_queues == 0 {
            return Err(Error::InvalidParam);
        }
        let gi = chan / self.geom.grp_queues;
        if gi >= self.grp.len() {
            return Err(Error::InvalidParam);
        }
        Ok((gi, chan % self.geom.grp_queues))
    }

    /// Forget the per-queue statistics baseline. The interrupt baseline
    /// is device-wide and survives.
    pub fn clear_stats_base(&mut self) {
        let intrs = self.stats_base.intrs;
        *self.stats_base = DevStats {
            intrs,
            ..Default::default()
        };
    }

    /// Drop every dense mapping and detach every group.
    pub fn reset(&mut self) {
        for (gi, grp) in self.grp.iter_mut().enumerate() {
            if !grp.attached {
                continue;
            }
            self.bm_grp &= !(1 << gi);
            self.nb_grp = self.nb_grp.saturating_sub(1);
            grp.irq_mask = 0;
            grp.poll_queues = 0;
            grp.attached = false;
            grp.owner = None;
        }
        self.rx_queue = [None; NUM_Q_MAX];
        self.tx_queue = [None; NUM_Q_MAX];
        self.vnet_rxq = [None; NUM_Q_MAX];
        self.vnet_txq = [None; NUM_Q_MAX];
        self.nb_rxq = 0;
        self.nb_txq = 0;
        self.bm_rxq = 0;
        self.bm_txq = 0;
        self.clear_stats_base();
    }
}
