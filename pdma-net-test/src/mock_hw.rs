//! Recording hardware layer.
//!
//! `MockHw` implements [`PdmaHw`] without touching any registers. Every call
//! is appended to a log that tests can inspect, and individual operations
//! can be made to fail.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use pdma_net::api::pdma::{ChanConfig, Dir, HwInfo, PdmaHw};
use pdma_net::api::{Errno, Error, Result};
use pdma_net::packet::Packet;

/// One recorded hardware call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    Reset,
    Init,
    Config(Vec<ChanConfig>),
    Start(u32),
    Stop(u32),
    Suspend(u32, Dir),
    Resume(u32, Dir),
    IntrEnable(u32),
    IntrDisable(u32),
    IntrClear(u32),
    IntrQuery(u32),
    IntrCheck(u32),
    Coalesce(u32, u32, u32),
    RegDump(u32),
    Xmit(u32, usize),
}

pub struct MockHw {
    info: HwInfo,
    calls: Mutex<Vec<HwCall>>,
    sent: Mutex<Vec<(u32, Packet)>>,
    no_intr: Mutex<HashSet<u32>>,
    fail_xmit: AtomicBool,
    fail_suspend: AtomicBool,
    fail_resume: AtomicBool,
    fail_suspend_chans: Mutex<HashSet<u32>>,
    fail_resume_chans: Mutex<HashSet<u32>>,
    intr_pending: AtomicBool,
}

impl std::fmt::Debug for MockHw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHw")
            .field("info", &self.info)
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

/// Descriptor and header sizes reported by the mock
pub const MOCK_DCB_SIZE: u32 = 16;
pub const MOCK_PH_SIZE: u32 = 64;

impl MockHw {
    /// Hardware with `num_cmcs` groups of `cmc_chans` channels each.
    pub fn new(num_cmcs: u32, cmc_chans: u32) -> Self {
        Self::with_info(HwInfo {
            num_cmcs,
            cmc_chans,
            num_chans: num_cmcs * cmc_chans,
            rx_dcb_size: MOCK_DCB_SIZE,
            tx_dcb_size: MOCK_DCB_SIZE,
            rx_ph_size: MOCK_PH_SIZE,
            tx_ph_size: MOCK_PH_SIZE,
        })
    }

    pub fn with_info(info: HwInfo) -> Self {
        Self {
            info,
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            no_intr: Mutex::new(HashSet::new()),
            fail_xmit: AtomicBool::new(false),
            fail_suspend: AtomicBool::new(false),
            fail_resume: AtomicBool::new(false),
            fail_suspend_chans: Mutex::new(HashSet::new()),
            fail_resume_chans: Mutex::new(HashSet::new()),
            intr_pending: AtomicBool::new(false),
        }
    }

    /// Report no interrupt number for `chan`.
    pub fn without_intr(self, chan: u32) -> Self {
        self.no_intr.lock().insert(chan);
        self
    }

    pub fn set_fail_xmit(&self, fail: bool) {
        self.fail_xmit.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_suspend(&self, fail: bool) {
        self.fail_suspend.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::Relaxed);
    }

    /// Fail suspend on `chan` only.
    pub fn fail_suspend_on(&self, chan: u32) {
        self.fail_suspend_chans.lock().insert(chan);
    }

    /// Fail resume on `chan` only.
    pub fn fail_resume_on(&self, chan: u32) {
        self.fail_resume_chans.lock().insert(chan);
    }

    /// Value returned by interrupt query/check.
    pub fn set_intr_pending(&self, pending: bool) {
        self.intr_pending.store(pending, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&HwCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Channel configuration passed to the last `hw_config`.
    pub fn last_config(&self) -> Option<Vec<ChanConfig>> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            HwCall::Config(chans) => Some(chans.clone()),
            _ => None,
        })
    }

    /// Packets handed to `chan_xmit`, drained.
    pub fn take_sent(&self) -> Vec<(u32, Packet)> {
        std::mem::take(&mut *self.sent.lock())
    }

    fn record(&self, call: HwCall) {
        tracing::trace!("hw: {:?}", call);
        self.calls.lock().push(call);
    }
}

fn io_error() -> Error {
    Error::Hw(Errno::EIO)
}

impl PdmaHw for MockHw {
    fn info(&self) -> HwInfo {
        self.info
    }

    fn hw_reset(&self) -> Result<()> {
        self.record(HwCall::Reset);
        Ok(())
    }

    fn hw_init(&self) -> Result<()> {
        self.record(HwCall::Init);
        Ok(())
    }

    fn hw_config(&self, chans: &[ChanConfig]) -> Result<()> {
        self.record(HwCall::Config(chans.to_vec()));
        Ok(())
    }

    fn chan_start(&self, chan: u32) -> Result<()> {
        self.record(HwCall::Start(chan));
        Ok(())
    }

    fn chan_stop(&self, chan: u32) -> Result<()> {
        self.record(HwCall::Stop(chan));
        Ok(())
    }

    fn chan_suspend(&self, chan: u32, dir: Dir) -> Result<()> {
        if self.fail_suspend.load(Ordering::Relaxed)
            || self.fail_suspend_chans.lock().contains(&chan)
        {
            return Err(io_error());
        }
        self.record(HwCall::Suspend(chan, dir));
        Ok(())
    }

    fn chan_resume(&self, chan: u32, dir: Dir) -> Result<()> {
        if self.fail_resume.load(Ordering::Relaxed) || self.fail_resume_chans.lock().contains(&chan)
        {
            return Err(io_error());
        }
        self.record(HwCall::Resume(chan, dir));
        Ok(())
    }

    fn chan_intr_enable(&self, chan: u32) -> Result<()> {
        self.record(HwCall::IntrEnable(chan));
        Ok(())
    }

    fn chan_intr_disable(&self, chan: u32) -> Result<()> {
        self.record(HwCall::IntrDisable(chan));
        Ok(())
    }

    fn chan_intr_clear(&self, chan: u32) -> Result<()> {
        self.record(HwCall::IntrClear(chan));
        Ok(())
    }

    fn chan_intr_query(&self, chan: u32) -> Result<bool> {
        self.record(HwCall::IntrQuery(chan));
        Ok(self.intr_pending.load(Ordering::Relaxed))
    }

    fn chan_intr_check(&self, chan: u32) -> Result<bool> {
        self.record(HwCall::IntrCheck(chan));
        Ok(self.intr_pending.load(Ordering::Relaxed))
    }

    fn chan_intr_coalesce(&self, chan: u32, count: u32, timer: u32) -> Result<()> {
        self.record(HwCall::Coalesce(chan, count, timer));
        Ok(())
    }

    fn chan_intr_num_get(&self, chan: u32) -> Option<u32> {
        if self.no_intr.lock().contains(&chan) {
            None
        } else {
            Some(32 + chan)
        }
    }

    fn chan_reg_dump(&self, chan: u32) -> Result<()> {
        self.record(HwCall::RegDump(chan));
        Ok(())
    }

    fn chan_xmit(&self, chan: u32, pkt: Packet) -> Result<()> {
        if self.fail_xmit.load(Ordering::Relaxed) {
            return Err(io_error());
        }
        self.record(HwCall::Xmit(chan, pkt.data_len()));
        self.sent.lock().push((chan, pkt));
        Ok(())
    }
}
