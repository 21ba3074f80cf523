// Queue store: every RX/TX queue object of a device, per group and channel

use super::DevMode;
use super::queue::{RxQueue, TxQueue};
use crate::api::Result;

/// Queue objects indexed by `[group][channel within group]`.
#[derive(Debug, Default)]
pub(crate) struct QueueStore {
    pub rx: Vec<Vec<RxQueue>>,
    pub tx: Vec<Vec<TxQueue>>,
    /// Shadow queues, dual-stack mode only
    pub vnet_rx: Vec<Vec<RxQueue>>,
    pub vnet_tx: Vec<Vec<TxQueue>>,
}

impl QueueStore {
    /// Allocate one RX and one TX queue for every channel of `num_groups`
    /// groups, plus shadow queues in dual-stack mode.
    ///
    /// Reservations are fallible; on failure whatever was built so far is
    /// dropped and `Error::Memory` is returned.
    pub fn alloc(num_groups: usize, grp_queues: usize, mode: DevMode) -> Result<Self> {
        let mut store = Self::default();
        let shadow = mode == DevMode::DualStack;

        store.rx.try_reserve_exact(num_groups)?;
        store.tx.try_reserve_exact(num_groups)?;
        if shadow {
            store.vnet_rx.try_reserve_exact(num_groups)?;
            store.vnet_tx.try_reserve_exact(num_groups)?;
        }

        for gi in 0..num_groups {
            store.rx.push(Self::rx_group(gi, grp_queues)?);
            store.tx.push(Self::tx_group(gi, grp_queues, true)?);
            if shadow {
                store.vnet_rx.push(Self::rx_group(gi, grp_queues)?);
                store.vnet_tx.push(Self::tx_group(gi, grp_queues, false)?);
            }
        }

        Ok(store)
    }

    fn rx_group(gi: usize, grp_queues: usize) -> Result<Vec<RxQueue>> {
        let mut queues = Vec::new();
        queues.try_reserve_exact(grp_queues)?;
        queues.extend((0..grp_queues).map(|qi| {
            RxQueue::new(gi as u32, (gi * grp_queues + qi) as u32)
        }));
        Ok(queues)
    }

    fn tx_group(gi: usize, grp_queues: usize, with_lock: bool) -> Result<Vec<TxQueue>> {
        let mut queues = Vec::new();
        queues.try_reserve_exact(grp_queues)?;
        queues.extend((0..grp_queues).map(|qi| {
            TxQueue::new(gi as u32, (gi * grp_queues + qi) as u32, with_lock)
        }));
        Ok(queues)
    }

    /// Release every queue object. Safe to call more than once.
    pub fn free(&mut self) {
        self.rx.clear();
        self.tx.clear();
        self.vnet_rx.clear();
        self.vnet_tx.clear();
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        !self.rx.is_empty()
    }

    #[inline]
    pub fn rx(&self, gi: usize, qi: usize) -> Option<&RxQueue> {
        self.rx.get(gi)?.get(qi)
    }

    #[inline]
    pub fn tx(&self, gi: usize, qi: usize) -> Option<&TxQueue> {
        self.tx.get(gi)?.get(qi)
    }

    #[inline]
    pub fn rx_mut(&mut self, gi: usize, qi: usize) -> Option<&mut RxQueue> {
        self.rx.get_mut(gi)?.get_mut(qi)
    }

    #[inline]
    pub fn tx_mut(&mut self, gi: usize, qi: usize) -> Option<&mut TxQueue> {
        self.tx.get_mut(gi)?.get_mut(qi)
    }
}
