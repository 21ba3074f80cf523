// Device controller
//
// Structural state lives in one `DevCtrl` behind the device lock. Per-queue
// runtime operations read what they need under the lock, then call into
// the hardware layer after releasing it.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::alloc::QueueStore;
use super::buf::{BufManager, PageBufManager};
use super::ctrl::{DevCtrl, Geometry, Group};
use super::hw::{HwInfo, PdmaHw};
use super::queue::{IntrHandle, RxDescError, RxQueue, RxqCounters, TxQueue, state};
use super::stats::{DevInfo, DevStats};
use super::{
    ChanBitmap, Dir, DevMode, NUM_GRP_MAX, NUM_Q_MAX, NUM_Q_PER_GRP, RX_BUF_SIZE_DFLT,
    RX_BUF_SIZE_MAX, RX_BUF_SIZE_MIN, dev_flags,
};
use crate::api::{Error, Result};
use crate::config::DevConfig;
use crate::packet::{Packet, attrs};
use crate::runtime::RxControl;

/// Device-level TX detach/attach hooks.
///
/// When installed, device suspend/resume use them instead of suspending
/// each TX queue.
pub trait NetifAttach: Send + Sync {
    fn detach(&self) -> Result<()>;
    fn attach(&self) -> Result<()>;
}

/// An opened packet DMA device.
pub struct PdmaDev {
    name: String,
    dev_no: u32,
    dev_id: u32,
    dev_type: u32,
    hw: Arc<dyn PdmaHw>,
    buf_mngr: Arc<dyn BufManager>,
    ctrl: Mutex<DevCtrl>,
    netif_hooks: RwLock<Option<Arc<dyn NetifAttach>>>,
    intrs: AtomicU64,
}

impl std::fmt::Debug for PdmaDev {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdmaDev")
            .field("name", &self.name)
            .field("dev_no", &self.dev_no)
            .field("dev_id", &self.dev_id)
            .finish_non_exhaustive()
    }
}

impl PdmaDev {
    /// Open a device with the default page buffer manager.
    pub fn open(conf: &DevConfig, hw: Arc<dyn PdmaHw>) -> Result<Self> {
        Self::open_with(conf, hw, Arc::new(PageBufManager::new()))
    }

    /// Reset and initialize the hardware, derive the channel geometry and
    /// allocate every queue.
    pub fn open_with(
        conf: &DevConfig,
        hw: Arc<dyn PdmaHw>,
        buf_mngr: Arc<dyn BufManager>,
    ) -> Result<Self> {
        hw.hw_reset()?;
        hw.hw_init()?;

        let info = hw.info();
        if conf.num_groups > info.num_cmcs {
            return Err(Error::InvalidParam);
        }
        let max_groups = info.num_cmcs as usize;
        let grp_queues = info.cmc_chans as usize;
        let num_queues = info.num_chans as usize;
        if max_groups > NUM_GRP_MAX
            || grp_queues == 0
            || grp_queues > NUM_Q_PER_GRP
            || num_queues > max_groups * grp_queues
        {
            return Err(Error::InvalidParam);
        }

        let geom = Geometry {
            unit: conf.unit,
            dev_no: conf.dev_no,
            num_groups: conf.num_groups as usize,
            max_groups,
            grp_queues,
            num_queues,
            rx_ph_size: info.rx_ph_size,
            tx_ph_size: info.tx_ph_size,
            mode: conf.mode,
            flags: conf.flags,
        };

        let mut grp: Vec<Group> = (0..max_groups)
            .map(|gi| Group::new(gi as u32, grp_queues))
            .collect();
        for chan in 0..num_queues {
            let (gi, qi) = (chan / grp_queues, chan % grp_queues);
            let hdl = &mut grp[gi].intr_hdl[qi];
            hdl.unit = conf.unit;
            hdl.group = gi as u32;
            hdl.chan = chan as u32;
            hdl.queue = qi as u32;
            hdl.inum = hw.chan_intr_num_get(chan as u32).ok_or(Error::Internal)?;
        }

        buf_mngr.init(&info);

        let store = QueueStore::alloc(geom.num_groups, grp_queues, conf.mode)?;
        let mut ctrl = DevCtrl::new(geom, grp, store);
        ctrl.nb_desc = if conf.nb_desc == 0 {
            super::NUM_RING_DESC
        } else {
            conf.nb_desc
        };
        ctrl.budget = if conf.budget == 0 {
            super::NUM_RXTX_BUDGET
        } else {
            conf.budget
        };
        ctrl.rx_buf_size = if (RX_BUF_SIZE_MIN..=RX_BUF_SIZE_MAX).contains(&conf.rx_buf_size) {
            conf.rx_buf_size
        } else {
            RX_BUF_SIZE_DFLT
        };
        ctrl.rx_desc_size = info.rx_dcb_size;
        ctrl.tx_desc_size = info.tx_dcb_size;

        tracing::info!(
            "{}: opened, {} of {} groups x {} channels, mode {:?}",
            conf.name,
            conf.num_groups,
            max_groups,
            grp_queues,
            conf.mode
        );

        Ok(Self {
            name: conf.name.clone(),
            dev_no: conf.dev_no,
            dev_id: conf.dev_id,
            dev_type: conf.dev_type,
            hw,
            buf_mngr,
            ctrl: Mutex::new(ctrl),
            netif_hooks: RwLock::new(None),
            intrs: AtomicU64::new(0),
        })
    }

    /// Reset the hardware, detach every group and free every queue.
    pub fn close(&self) {
        if let Err(e) = self.hw.hw_reset() {
            tracing::warn!("{}: hardware reset on close failed: {}", self.name, e);
        }
        let mut ctrl = self.ctrl.lock();
        ctrl.reset();
        ctrl.store.free();
        tracing::info!("{}: closed", self.name);
    }

    /// Enable RX/TX channels. Both bitmaps must be non-empty and disjoint.
    pub fn configure(&self, bm_rxq: ChanBitmap, bm_txq: ChanBitmap) -> Result<()> {
        let chans = {
            let mut ctrl = self.ctrl.lock();
            ctrl.configure(self.buf_mngr.as_ref(), bm_rxq, bm_txq)?
        };
        self.hw.hw_config(&chans)
    }

    /// Override the descriptor count of a channel for the next configure.
    pub fn set_queue_desc(&self, chan: u32, nb_desc: u32) -> Result<()> {
        let mut ctrl = self.ctrl.lock();
        let (gi, qi) = ctrl.chan_pos(chan)?;
        ctrl.grp[gi].nb_desc[qi] = nb_desc;
        Ok(())
    }

    /// Override the RX buffer size of a channel for the next configure.
    pub fn set_rx_buf_size(&self, chan: u32, size: u32) -> Result<()> {
        let mut ctrl = self.ctrl.lock();
        let (gi, qi) = ctrl.chan_pos(chan)?;
        ctrl.grp[gi].rx_size[qi] = size;
        Ok(())
    }

    /// Install or remove the device-level TX detach/attach hooks.
    pub fn set_netif_hooks(&self, hooks: Option<Arc<dyn NetifAttach>>) {
        *self.netif_hooks.write() = hooks;
    }

    /// Mask RX delivery, then stop TX.
    ///
    /// Every queue is visited even if one fails; the first error is
    /// returned.
    pub fn suspend(&self) -> Result<()> {
        let rx = self.rx_suspend();
        let hooks = self.netif_hooks.read().clone();
        let tx = match hooks {
            Some(hooks) => hooks.detach(),
            None => {
                let nb_txq = self.ctrl.lock().nb_txq;
                self.each_queue(nb_txq, Dir::Tx, |q| self.tx_queue_suspend(q))
            }
        };
        rx.and(tx)
    }

    /// Restore TX first so the egress path can drain, then RX. RX is
    /// resumed even if TX fails.
    pub fn resume(&self) -> Result<()> {
        let hooks = self.netif_hooks.read().clone();
        let tx = match hooks {
            Some(hooks) => hooks.attach().inspect_err(|e| {
                tracing::warn!("{}: netif attach failed: {}", self.name, e);
            }),
            None => {
                let nb_txq = self.ctrl.lock().nb_txq;
                self.each_queue(nb_txq, Dir::Tx, |q| self.tx_queue_resume(q))
            }
        };
        let rx = self.rx_resume();
        tx.and(rx)
    }

    pub fn rx_suspend(&self) -> Result<()> {
        let nb_rxq = self.ctrl.lock().nb_rxq;
        self.each_queue(nb_rxq, Dir::Rx, |q| self.rx_queue_suspend(q))
    }

    pub fn rx_resume(&self) -> Result<()> {
        let nb_rxq = self.ctrl.lock().nb_rxq;
        self.each_queue(nb_rxq, Dir::Rx, |q| self.rx_queue_resume(q))
    }

    /// Run `op` on queues `0..nb`, keeping the first error.
    fn each_queue(&self, nb: usize, dir: Dir, op: impl Fn(usize) -> Result<()>) -> Result<()> {
        let mut first = Ok(());
        for q in 0..nb {
            if let Err(e) = op(q) {
                tracing::warn!("{}: {:?} queue {}: {}", self.name, dir, q, e);
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }
        first
    }

    /// Flip the suspended bit; returns the channel if the state changed.
    fn mark_suspended(&self, queue: usize, dir: Dir, on: bool) -> Result<Option<u32>> {
        let mut ctrl = self.ctrl.lock();
        let (st, chan) = match dir {
            Dir::Rx => {
                let rxq = ctrl.used_rxq_mut(queue)?;
                (&mut rxq.state, rxq.chan_id)
            }
            Dir::Tx => {
                let txq = ctrl.used_txq_mut(queue)?;
                (&mut txq.state, txq.chan_id)
            }
            Dir::RxTx => return Err(Error::InvalidParam),
        };
        if (*st & state::SUSPENDED != 0) == on {
            return Ok(None);
        }
        if on {
            *st |= state::SUSPENDED;
        } else {
            *st &= !state::SUSPENDED;
        }
        Ok(Some(chan))
    }

    fn queue_suspend(&self, queue: usize, dir: Dir) -> Result<()> {
        let Some(chan) = self.mark_suspended(queue, dir, true)? else {
            return Ok(());
        };
        if let Err(e) = self.hw.chan_suspend(chan, dir) {
            let _ = self.mark_suspended(queue, dir, false);
            return Err(e);
        }
        Ok(())
    }

    fn queue_resume(&self, queue: usize, dir: Dir) -> Result<()> {
        let Some(chan) = self.mark_suspended(queue, dir, false)? else {
            return Ok(());
        };
        if let Err(e) = self.hw.chan_resume(chan, dir) {
            let _ = self.mark_suspended(queue, dir, true);
            return Err(e);
        }
        Ok(())
    }

    /// Mask hardware delivery on one RX queue. Suspending a suspended
    /// queue is a no-op.
    pub fn rx_queue_suspend(&self, queue: usize) -> Result<()> {
        self.queue_suspend(queue, Dir::Rx)
    }

    pub fn rx_queue_resume(&self, queue: usize) -> Result<()> {
        self.queue_resume(queue, Dir::Rx)
    }

    /// Flow-control one TX queue off.
    pub fn tx_queue_suspend(&self, queue: usize) -> Result<()> {
        let was = self.ctrl.lock().used_txq(queue)?.state & state::SUSPENDED;
        self.queue_suspend(queue, Dir::Tx)?;
        if was == 0 {
            if let Ok(txq) = self.ctrl.lock().txq(queue) {
                txq.counters.xoff();
            }
        }
        Ok(())
    }

    pub fn tx_queue_resume(&self, queue: usize) -> Result<()> {
        self.queue_resume(queue, Dir::Tx)
    }

    fn rx_chan(&self, queue: usize) -> Result<u32> {
        Ok(self.ctrl.lock().used_rxq(queue)?.chan_id)
    }

    fn tx_chan(&self, queue: usize) -> Result<u32> {
        Ok(self.ctrl.lock().used_txq(queue)?.chan_id)
    }

    pub fn rx_queue_start(&self, queue: usize) -> Result<()> {
        let chan = {
            let mut ctrl = self.ctrl.lock();
            let rxq = ctrl.used_rxq_mut(queue)?;
            rxq.state |= state::ACTIVE;
            rxq.chan_id
        };
        self.hw.chan_start(chan)
    }

    pub fn rx_queue_stop(&self, queue: usize) -> Result<()> {
        let chan = {
            let mut ctrl = self.ctrl.lock();
            let rxq = ctrl.used_rxq_mut(queue)?;
            rxq.state &= !state::ACTIVE;
            rxq.chan_id
        };
        self.hw.chan_stop(chan)
    }

    /// Start a TX queue. In chain mode the channel is started implicitly
    /// by the first chained descriptor.
    pub fn tx_queue_start(&self, queue: usize) -> Result<()> {
        let (chan, flags) = {
            let mut ctrl = self.ctrl.lock();
            let flags = ctrl.geom.flags;
            let txq = ctrl.used_txq_mut(queue)?;
            txq.state |= state::ACTIVE;
            (txq.chan_id, flags)
        };
        if flags & dev_flags::CHAIN_MODE != 0 {
            return Ok(());
        }
        self.hw.chan_start(chan)
    }

    pub fn tx_queue_stop(&self, queue: usize) -> Result<()> {
        let chan = {
            let mut ctrl = self.ctrl.lock();
            let txq = ctrl.used_txq_mut(queue)?;
            txq.state &= !state::ACTIVE;
            txq.chan_id
        };
        self.hw.chan_stop(chan)
    }

    pub fn rx_queue_intr_enable(&self, queue: usize) -> Result<()> {
        self.hw.chan_intr_enable(self.rx_chan(queue)?)
    }

    pub fn rx_queue_intr_disable(&self, queue: usize) -> Result<()> {
        self.hw.chan_intr_disable(self.rx_chan(queue)?)
    }

    /// Acknowledge an RX interrupt.
    pub fn rx_queue_intr_ack(&self, queue: usize) -> Result<()> {
        self.hw.chan_intr_clear(self.rx_chan(queue)?)?;
        self.intrs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn rx_queue_intr_query(&self, queue: usize) -> Result<bool> {
        self.hw.chan_intr_query(self.rx_chan(queue)?)
    }

    pub fn rx_queue_intr_check(&self, queue: usize) -> Result<bool> {
        self.hw.chan_intr_check(self.rx_chan(queue)?)
    }

    /// TX queues in poll mode never use interrupts.
    fn tx_intr_chan(&self, queue: usize) -> Result<Option<u32>> {
        let ctrl = self.ctrl.lock();
        let txq = ctrl.used_txq(queue)?;
        if txq.state & state::POLL != 0 {
            return Ok(None);
        }
        Ok(Some(txq.chan_id))
    }

    pub fn tx_queue_intr_enable(&self, queue: usize) -> Result<()> {
        match self.tx_intr_chan(queue)? {
            Some(chan) => self.hw.chan_intr_enable(chan),
            None => Ok(()),
        }
    }

    pub fn tx_queue_intr_disable(&self, queue: usize) -> Result<()> {
        match self.tx_intr_chan(queue)? {
            Some(chan) => self.hw.chan_intr_disable(chan),
            None => Ok(()),
        }
    }

    pub fn tx_queue_intr_ack(&self, queue: usize) -> Result<()> {
        self.hw.chan_intr_clear(self.tx_chan(queue)?)?;
        self.intrs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn tx_queue_intr_query(&self, queue: usize) -> Result<bool> {
        self.hw.chan_intr_query(self.tx_chan(queue)?)
    }

    pub fn tx_queue_intr_check(&self, queue: usize) -> Result<bool> {
        self.hw.chan_intr_check(self.tx_chan(queue)?)
    }

    /// Pack an interrupt coalescing value: 15-bit count, 16-bit timer.
    #[inline]
    pub fn ic_val(count: u32, timer: u32) -> u32 {
        (count & 0x7fff) << 16 | (timer & 0xffff)
    }

    /// Coalesce RX interrupts on an active queue.
    pub fn rx_queue_coalesce(&self, queue: usize, count: u32, timer: u32) -> Result<()> {
        let chan = {
            let mut ctrl = self.ctrl.lock();
            if queue >= NUM_Q_MAX || queue >= ctrl.nb_rxq {
                return Err(Error::InvalidParam);
            }
            let rxq = ctrl.rxq_mut(queue)?;
            rxq.intr_coalescing = true;
            rxq.ic_val = Self::ic_val(count, timer);
            rxq.chan_id
        };
        self.hw.chan_intr_coalesce(chan, count, timer)
    }

    pub fn tx_queue_coalesce(&self, queue: usize, count: u32, timer: u32) -> Result<()> {
        let chan = {
            let ctrl = self.ctrl.lock();
            if queue >= NUM_Q_MAX || queue >= ctrl.nb_txq {
                return Err(Error::InvalidParam);
            }
            ctrl.txq(queue)?.chan_id
        };
        self.hw.chan_intr_coalesce(chan, count, timer)
    }

    pub fn rx_queue_reg_dump(&self, queue: usize) -> Result<()> {
        let chan = {
            let ctrl = self.ctrl.lock();
            if queue >= NUM_Q_MAX || queue >= ctrl.nb_rxq {
                return Err(Error::InvalidParam);
            }
            ctrl.rxq(queue)?.chan_id
        };
        self.hw.chan_reg_dump(chan)
    }

    pub fn tx_queue_reg_dump(&self, queue: usize) -> Result<()> {
        let chan = {
            let ctrl = self.ctrl.lock();
            if queue >= NUM_Q_MAX || queue >= ctrl.nb_txq {
                return Err(Error::InvalidParam);
            }
            ctrl.txq(queue)?.chan_id
        };
        self.hw.chan_reg_dump(chan)
    }

    /// Logical queue id to physical channel.
    pub fn lq_to_pq(&self, queue: usize, dir: Dir) -> Result<u32> {
        let ctrl = self.ctrl.lock();
        match dir {
            Dir::Rx => Ok(ctrl.used_rxq(queue)?.chan_id),
            Dir::Tx => Ok(ctrl.used_txq(queue)?.chan_id),
            Dir::RxTx => Err(Error::InvalidParam),
        }
    }

    /// Physical channel to logical queue id and direction.
    pub fn pq_to_lq(&self, chan: u32) -> Result<(usize, Dir)> {
        let ctrl = self.ctrl.lock();
        let (gi, qi) = ctrl.chan_pos(chan)?;
        if let Some(rxq) = ctrl.store.rx(gi, qi).filter(|q| q.is_used()) {
            return Ok((rxq.queue_id as usize, Dir::Rx));
        }
        if let Some(txq) = ctrl.store.tx(gi, qi).filter(|q| q.is_used()) {
            return Ok((txq.queue_id as usize, Dir::Tx));
        }
        Err(Error::Unavailable)
    }

    /// Transmit one packet on a started TX queue.
    pub fn xmit(&self, queue: usize, pkt: Packet) -> Result<()> {
        let (chan, st, lock, counters) = {
            let ctrl = self.ctrl.lock();
            let txq = ctrl.used_txq(queue)?;
            (
                txq.chan_id,
                txq.state,
                txq.xmit_lock.clone(),
                txq.counters.clone(),
            )
        };
        if st & state::ACTIVE == 0 || st & state::SUSPENDED != 0 {
            counters.drop_one();
            return Err(Error::Unavailable);
        }

        let _guard = lock.as_ref().map(|l| l.lock());
        let len = pkt.data_len();
        match self.hw.chan_xmit(chan, pkt) {
            Ok(()) => {
                counters.record(len);
                Ok(())
            }
            Err(e) => {
                counters.error();
                counters.drop_one();
                Err(e)
            }
        }
    }

    /// Queue a packet should leave on: the one it is bound to, if any.
    #[inline]
    pub fn tx_queue_schedule(pkt: &Packet, queue: usize) -> usize {
        if pkt.has_attr(attrs::TX_BIND_QUE) {
            pkt.queue_id() as usize
        } else {
            queue
        }
    }

    fn rx_counters(&self, queue: usize) -> Result<Arc<RxqCounters>> {
        Ok(self.ctrl.lock().used_rxq(queue)?.counters.clone())
    }

    /// Count a packet received on `queue`.
    pub fn rx_record(&self, queue: usize, bytes: usize) -> Result<()> {
        self.rx_counters(queue)?.record(bytes);
        Ok(())
    }

    /// Count a packet dropped after reception.
    pub fn rx_drop(&self, queue: usize) -> Result<()> {
        self.rx_counters(queue)?.drop_one();
        Ok(())
    }

    pub fn rx_error(&self, queue: usize) -> Result<()> {
        self.rx_counters(queue)?.error();
        Ok(())
    }

    /// Count a descriptor the hardware completed with an error.
    pub fn rx_desc_error(&self, queue: usize, kind: RxDescError) -> Result<()> {
        self.rx_counters(queue)?.desc_error(kind);
        Ok(())
    }

    pub fn rx_nomem(&self, queue: usize) -> Result<()> {
        self.rx_counters(queue)?.nomem();
        Ok(())
    }

    /// Statistics since the last reset.
    pub fn stats_get(&self) -> DevStats {
        let ctrl = self.ctrl.lock();
        let base = &ctrl.stats_base;
        let mut stats = DevStats::default();

        for q in 0..ctrl.nb_rxq {
            let Ok(rxq) = ctrl.rxq(q) else { continue };
            stats.rxq[q] = rxq.stats();
            stats.rxqs.add(&stats.rxq[q]);
            stats.rxq[q].sub(&base.rxq[q]);
        }
        stats.rxqs.sub(&base.rxqs);

        for q in 0..ctrl.nb_txq {
            let Ok(txq) = ctrl.txq(q) else { continue };
            stats.txq[q] = txq.stats();
            stats.txqs.add(&stats.txq[q]);
            stats.txq[q].sub(&base.txq[q]);
        }
        stats.txqs.sub(&base.txqs);

        stats.intrs = self.intrs.load(Ordering::Relaxed).wrapping_sub(base.intrs);
        stats
    }

    /// Capture current counters as the new baseline for `dir`.
    pub fn stats_reset(&self, dir: Dir) {
        let mut ctrl = self.ctrl.lock();
        let mut base = std::mem::take(&mut ctrl.stats_base);

        if matches!(dir, Dir::Rx | Dir::RxTx) {
            base.rxqs = Default::default();
            for q in 0..ctrl.nb_rxq {
                let Ok(rxq) = ctrl.rxq(q) else { continue };
                base.rxq[q] = rxq.stats();
                base.rxqs.add(&base.rxq[q]);
            }
        }
        if matches!(dir, Dir::Tx | Dir::RxTx) {
            base.txqs = Default::default();
            for q in 0..ctrl.nb_txq {
                let Ok(txq) = ctrl.txq(q) else { continue };
                base.txq[q] = txq.stats();
                base.txqs.add(&base.txq[q]);
            }
        }
        if dir == Dir::RxTx {
            base.intrs = self.intrs.load(Ordering::Relaxed);
        }

        ctrl.stats_base = base;
    }

    /// Identity, capability and per-queue configuration.
    pub fn info_get(&self) -> DevInfo {
        let ctrl = self.ctrl.lock();
        let geom = &ctrl.geom;
        let mut info = DevInfo {
            dev_name: self.name.clone(),
            dev_id: self.dev_id,
            dev_type: self.dev_type,
            max_groups: geom.max_groups as u32,
            max_queues: geom.num_queues as u32,
            bm_groups: ctrl.bm_grp,
            bm_rx_queues: ctrl.bm_rxq,
            bm_tx_queues: ctrl.bm_txq,
            nb_groups: ctrl.nb_grp,
            nb_rx_queues: ctrl.nb_rxq as u32,
            nb_tx_queues: ctrl.nb_txq as u32,
            rx_desc_size: ctrl.rx_desc_size,
            tx_desc_size: ctrl.tx_desc_size,
            rx_ph_size: geom.rx_ph_size,
            tx_ph_size: geom.tx_ph_size,
            rx_buf_dflt: ctrl.rx_buf_size,
            nb_desc_dflt: ctrl.nb_desc,
            ..Default::default()
        };
        for q in 0..ctrl.nb_rxq {
            let Ok(rxq) = ctrl.rxq(q) else { continue };
            info.rx_buf_size[q] = rxq.buf_size.saturating_sub(geom.rx_ph_size);
            info.nb_rx_desc[q] = rxq.nb_desc;
            info.rxq_state[q] = rxq.state;
        }
        for q in 0..ctrl.nb_txq {
            let Ok(txq) = ctrl.txq(q) else { continue };
            info.nb_tx_desc[q] = txq.nb_desc;
            info.txq_state[q] = txq.state;
        }
        info
    }

    /// Copy of an RX queue descriptor.
    pub fn rx_queue(&self, queue: usize) -> Result<RxQueue> {
        self.ctrl.lock().rxq(queue).cloned()
    }

    pub fn tx_queue(&self, queue: usize) -> Result<TxQueue> {
        self.ctrl.lock().txq(queue).cloned()
    }

    /// Shadow RX queue registered under a logical id (dual-stack mode).
    pub fn vnet_rx_queue(&self, queue: usize) -> Result<RxQueue> {
        self.ctrl.lock().vnet_rxq(queue).cloned()
    }

    pub fn vnet_tx_queue(&self, queue: usize) -> Result<TxQueue> {
        self.ctrl.lock().vnet_txq(queue).cloned()
    }

    /// Interrupt handle of a physical channel.
    pub fn intr_handle(&self, chan: u32) -> Result<IntrHandle> {
        let ctrl = self.ctrl.lock();
        let (gi, qi) = ctrl.chan_pos(chan)?;
        Ok(ctrl.grp[gi].intr_hdl[qi])
    }

    /// Whether a group is attached.
    pub fn group_attached(&self, gi: usize) -> bool {
        self.ctrl.lock().grp.get(gi).is_some_and(|g| g.attached)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dev_no(&self) -> u32 {
        self.dev_no
    }

    pub fn hw_info(&self) -> HwInfo {
        self.hw.info()
    }

    pub fn mode(&self) -> DevMode {
        self.ctrl.lock().geom.mode
    }

    pub fn flags(&self) -> u32 {
        self.ctrl.lock().geom.flags
    }

    pub fn nb_rx_queues(&self) -> usize {
        self.ctrl.lock().nb_rxq
    }

    pub fn nb_tx_queues(&self) -> usize {
        self.ctrl.lock().nb_txq
    }

    /// Interrupts acknowledged since open.
    #[inline]
    pub fn intrs(&self) -> u64 {
        self.intrs.load(Ordering::Relaxed)
    }
}

impl RxControl for PdmaDev {
    fn rx_suspend(&self) -> Result<()> {
        PdmaDev::rx_suspend(self)
    }

    fn rx_resume(&self) -> Result<()> {
        PdmaDev::rx_resume(self)
    }
}
