// Group/channel configurator
//
// Every configure call re-derives queue state from the two channel bitmaps:
// a channel set in neither bitmap ends up unconfigured whatever it was
// before, and logical ids are handed out densely in channel order.

use super::buf::BufManager;
use super::ctrl::{DevCtrl, Group, QueueSlot};
use super::hw::ChanConfig;
use super::queue::state;
use super::{ChanBitmap, Dir, DevMode, NUM_Q_MAX, RX_BUF_SIZE_MAX, RX_BUF_SIZE_MIN, dev_flags};
use crate::api::{Error, Result};

impl DevCtrl {
    /// Apply RX/TX channel bitmaps and return the per-channel programming
    /// for the hardware layer.
    pub(crate) fn configure(
        &mut self,
        bm: &dyn BufManager,
        bm_rxq: ChanBitmap,
        bm_txq: ChanBitmap,
    ) -> Result<Vec<ChanConfig>> {
        if bm_rxq == 0 || bm_txq == 0 || bm_rxq & bm_txq != 0 {
            return Err(Error::InvalidParam);
        }
        if !self.store.is_allocated() {
            return Err(Error::Init);
        }

        self.attach_groups(bm_rxq | bm_txq);
        self.rx_group_parse(bm, bm_rxq);
        self.tx_group_parse(bm_txq);

        let dev_no = self.geom.dev_no;
        for (gi, grp) in self.grp.iter_mut().enumerate().take(self.geom.num_groups) {
            if !grp.attached {
                continue;
            }
            if grp.bm_rxq == 0 && grp.bm_txq == 0 {
                grp.attached = false;
                grp.owner = None;
                self.bm_grp &= !(1 << gi);
                self.nb_grp = self.nb_grp.saturating_sub(1);
                continue;
            }
            grp.owner = Some(dev_no);
            grp.id = gi as u32;
            grp.irq_mask = 0;
        }
        // logical ids may now name other channels
        self.clear_stats_base();

        tracing::debug!(
            "dev {} configured: {} groups, rxq {:#x} ({}), txq {:#x} ({})",
            dev_no,
            self.nb_grp,
            self.bm_rxq,
            self.nb_rxq,
            self.bm_txq,
            self.nb_txq
        );

        self.chan_configs()
    }

    /// Attach every group in use that owns a channel of `mask`.
    fn attach_groups(&mut self, mask: ChanBitmap) {
        let gq = self.geom.grp_queues;
        for (gi, grp) in self.grp.iter_mut().enumerate().take(self.geom.num_groups) {
            if grp.attached || mask & Group::chan_mask(gi, gq) == 0 {
                continue;
            }
            grp.attached = true;
            self.bm_grp |= 1 << gi;
            self.nb_grp += 1;
        }
    }

    fn rx_group_parse(&mut self, bm: &dyn BufManager, qbm: ChanBitmap) {
        let geom = self.geom;
        let gq = geom.grp_queues;
        let shadow = geom.mode == DevMode::DualStack;

        self.nb_rxq = 0;
        self.bm_rxq = 0;
        self.rx_queue = [None; NUM_Q_MAX];
        self.vnet_rxq = [None; NUM_Q_MAX];

        for gi in 0..geom.num_groups {
            let Some(grp) = self.grp.get_mut(gi) else {
                break;
            };
            let Some(queues) = self.store.rx.get_mut(gi) else {
                break;
            };
            if !grp.attached {
                queues.iter_mut().for_each(|rxq| rxq.state = 0);
                if let Some(vq) = self.store.vnet_rx.get_mut(gi) {
                    vq.iter_mut().for_each(|rxq| rxq.state = 0);
                }
                continue;
            }

            let mut qn = 0;
            let mut mask = 0;
            for (qi, rxq) in queues.iter_mut().enumerate().take(gq) {
                let chan = gi * gq + qi;
                if qbm & (1 << chan) == 0 {
                    rxq.state = 0;
                    if let Some(vq) = self.store.vnet_rx.get_mut(gi).and_then(|v| v.get_mut(qi)) {
                        vq.state = 0;
                    }
                    continue;
                }

                let mut nb_desc = grp.nb_desc[qi];
                if nb_desc == 0 {
                    nb_desc = self.nb_desc;
                    grp.nb_desc[qi] = nb_desc;
                }
                let mut buf_size = grp.rx_size[qi];
                if buf_size < RX_BUF_SIZE_MIN {
                    buf_size = RX_BUF_SIZE_MIN;
                    grp.rx_size[qi] = buf_size;
                } else if buf_size > RX_BUF_SIZE_MAX {
                    buf_size = self.rx_buf_size;
                    grp.rx_size[qi] = buf_size;
                }

                rxq.nb_desc = nb_desc;
                rxq.buf_size = buf_size + geom.rx_ph_size;
                rxq.buf_mode = bm.rx_buf_mode(rxq, geom.rx_ph_size);
                rxq.state |= state::USED;
                if geom.flags & dev_flags::RX_BATCHING != 0 {
                    rxq.free_thresh = nb_desc / 4;
                    rxq.state |= state::BATCH_REFILL;
                }

                let queue_id = self.nb_rxq;
                rxq.queue_id = queue_id as u32;
                self.rx_queue[queue_id] = Some(QueueSlot { group: gi, chan: qi });

                let hdl = &mut grp.intr_hdl[qi];
                hdl.queue = queue_id as u32;
                hdl.dir = Dir::Rx;
                hdl.budget = self.budget.min(nb_desc);

                if shadow {
                    if let Some(vq) = self.store.vnet_rx.get_mut(gi).and_then(|v| v.get_mut(qi)) {
                        vq.queue_id = queue_id as u32;
                        vq.nb_desc = nb_desc;
                        vq.buf_size = rxq.buf_size;
                        vq.buf_mode = rxq.buf_mode;
                        vq.state |= state::USED;
                        self.vnet_rxq[queue_id] = Some(QueueSlot { group: gi, chan: qi });
                    }
                }

                self.nb_rxq += 1;
                self.bm_rxq |= 1 << chan;
                qn += 1;
                mask |= 1 << qi;
            }

            grp.bm_rxq = mask;
            grp.nb_rxq = qn;
        }
    }

    fn tx_group_parse(&mut self, qbm: ChanBitmap) {
        let geom = self.geom;
        let gq = geom.grp_queues;
        let shadow = geom.mode == DevMode::DualStack;

        self.nb_txq = 0;
        self.bm_txq = 0;
        self.tx_queue = [None; NUM_Q_MAX];
        self.vnet_txq = [None; NUM_Q_MAX];

        for gi in 0..geom.num_groups {
            let Some(grp) = self.grp.get_mut(gi) else {
                break;
            };
            let Some(queues) = self.store.tx.get_mut(gi) else {
                break;
            };
            if !grp.attached {
                queues.iter_mut().for_each(|txq| txq.state = 0);
                if let Some(vq) = self.store.vnet_tx.get_mut(gi) {
                    vq.iter_mut().for_each(|txq| txq.state = 0);
                }
                continue;
            }

            let mut qn = 0;
            let mut mask = 0;
            for (qi, txq) in queues.iter_mut().enumerate().take(gq) {
                let chan = gi * gq + qi;
                if qbm & (1 << chan) == 0 {
                    txq.state = 0;
                    if let Some(vq) = self.store.vnet_tx.get_mut(gi).and_then(|v| v.get_mut(qi)) {
                        vq.state = 0;
                    }
                    continue;
                }

                let mut nb_desc = grp.nb_desc[qi];
                if nb_desc == 0 {
                    nb_desc = self.nb_desc;
                    grp.nb_desc[qi] = nb_desc;
                }

                txq.nb_desc = nb_desc;
                txq.state |= state::USED;
                if geom.flags & dev_flags::TX_POLLING != 0 {
                    txq.free_thresh = nb_desc / 4;
                    txq.state |= state::POLL;
                }

                let queue_id = self.nb_txq;
                txq.queue_id = queue_id as u32;
                self.tx_queue[queue_id] = Some(QueueSlot { group: gi, chan: qi });

                let hdl = &mut grp.intr_hdl[qi];
                hdl.queue = queue_id as u32;
                hdl.dir = Dir::Tx;
                hdl.budget = self.budget.min(nb_desc);

                if shadow {
                    if let Some(vq) = self.store.vnet_tx.get_mut(gi).and_then(|v| v.get_mut(qi)) {
                        vq.queue_id = queue_id as u32;
                        vq.nb_desc = nb_desc;
                        vq.state |= state::USED;
                        self.vnet_txq[queue_id] = Some(QueueSlot { group: gi, chan: qi });
                    }
                }

                self.nb_txq += 1;
                self.bm_txq |= 1 << chan;
                qn += 1;
                mask |= 1 << qi;
            }

            grp.bm_txq = mask;
            grp.nb_txq = qn;
        }
    }

    fn chan_configs(&self) -> Result<Vec<ChanConfig>> {
        let mut chans = Vec::new();
        chans.try_reserve_exact(self.nb_rxq + self.nb_txq)?;
        for queue in 0..self.nb_rxq {
            let rxq = self.rxq(queue)?;
            chans.push(ChanConfig {
                chan: rxq.chan_id(),
                dir: Dir::Rx,
                queue: rxq.queue_id(),
                nb_desc: rxq.nb_desc(),
                buf_size: rxq.buf_size(),
                buf_mode: rxq.buf_mode(),
            });
        }
        for queue in 0..self.nb_txq {
            let txq = self.txq(queue)?;
            chans.push(ChanConfig {
                chan: txq.chan_id(),
                dir: Dir::Tx,
                queue: txq.queue_id(),
                nb_desc: txq.nb_desc(),
                buf_size: 0,
                buf_mode: Default::default(),
            });
        }
        Ok(chans)
    }
}
