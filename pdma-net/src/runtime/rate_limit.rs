// RX rate limiter
//
// One limiter serves every device of the process. The per-tick packet
// counter is global; pause state is kept per device. Suspend/resume calls
// into the device happen after the limiter lock is released, so the flag
// and the hardware action may briefly disagree. Both calls are idempotent
// on the device side.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::Runtime;
use crate::api::Result;
use crate::config::{RateLimitConfig, TickDriver};

/// Ticks per second for ceilings of 1000 pps and above
pub const RX_TICKS_DFLT: u32 = 10;

/// Ticks per second for a ceiling. Low ceilings tick less often so the
/// per-tick budget stays a whole number of packets.
pub fn rx_ticks_for(limit: u32) -> u32 {
    if limit < 1000 {
        limit.div_ceil(100).max(1)
    } else {
        RX_TICKS_DFLT
    }
}

/// RX suspend/resume of one device.
pub trait RxControl: Send + Sync {
    fn rx_suspend(&self) -> Result<()>;
    fn rx_resume(&self) -> Result<()>;
}

struct DevSlot {
    ctl: Arc<dyn RxControl>,
    active: bool,
    paused: bool,
}

struct RateState {
    devs: BTreeMap<u32, DevSlot>,
    /// Packets admitted in the current tick, all devices
    rx_pkts: u64,
    /// Packets seen while paused since the last pause
    rx_overruns: u64,
    limit: u32,
    rx_ticks: u32,
    started: bool,
}

struct TimerThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Process-wide RX rate limiter.
pub struct RateLimiter {
    state: Mutex<RateState>,
    driver: TickDriver,
    thread_name: String,
    timer: Mutex<Option<TimerThread>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("RateLimiter")
            .field("limit", &st.limit)
            .field("rx_ticks", &st.rx_ticks)
            .field("devs", &st.devs.len())
            .field("started", &st.started)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(conf: &RateLimitConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RateState {
                devs: BTreeMap::new(),
                rx_pkts: 0,
                rx_overruns: 0,
                limit: conf.limit,
                rx_ticks: rx_ticks_for(conf.limit),
                started: false,
            }),
            driver: conf.driver,
            thread_name: conf.thread_name.clone(),
            timer: Mutex::new(None),
        })
    }

    /// Change the packets-per-second ceiling.
    pub fn set_limit(&self, limit: u32) {
        let mut st = self.state.lock();
        st.limit = limit;
        st.rx_ticks = rx_ticks_for(limit);
    }

    pub fn limit(&self) -> u32 {
        self.state.lock().limit
    }

    pub fn rx_ticks(&self) -> u32 {
        self.state.lock().rx_ticks
    }

    /// Packets admitted per tick before devices are paused.
    pub fn budget(&self) -> u64 {
        let st = self.state.lock();
        u64::from(st.limit / st.rx_ticks)
    }

    /// Time between ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.rx_ticks()
    }

    /// Start limiting a device. The timer is armed by the first device.
    pub fn start(self: &Arc<Self>, dev_no: u32, ctl: Arc<dyn RxControl>) {
        let arm = {
            let mut st = self.state.lock();
            st.devs.insert(
                dev_no,
                DevSlot {
                    ctl,
                    active: true,
                    paused: false,
                },
            );
            !std::mem::replace(&mut st.started, true)
        };
        if arm {
            tracing::info!("rx rate limit started, {} pps", self.limit());
            if self.driver == TickDriver::Thread {
                self.arm_thread();
            }
        }
    }

    /// Stop limiting a device and resume it if it is paused. The timer is
    /// disarmed once no device is active.
    pub fn stop(&self, dev_no: u32) {
        let (resume, disarm) = {
            let mut st = self.state.lock();
            let mut resume = None;
            if let Some(slot) = st.devs.get_mut(&dev_no) {
                slot.active = false;
                if std::mem::take(&mut slot.paused) {
                    resume = Some(slot.ctl.clone());
                }
            }
            let disarm = st.started && !st.devs.values().any(|s| s.active);
            if disarm {
                st.started = false;
                st.rx_pkts = 0;
                st.rx_overruns = 0;
            }
            (resume, disarm)
        };

        if let Some(ctl) = resume {
            if let Err(e) = ctl.rx_resume() {
                tracing::warn!("dev {}: rx resume on stop failed: {}", dev_no, e);
            }
        }
        if disarm {
            self.disarm();
            tracing::info!("rx rate limit stopped");
        }
    }

    /// Forget a device entirely.
    pub fn unregister(&self, dev_no: u32) {
        self.stop(dev_no);
        self.state.lock().devs.remove(&dev_no);
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn is_active(&self, dev_no: u32) -> bool {
        self.state.lock().devs.get(&dev_no).is_some_and(|s| s.active)
    }

    pub fn is_paused(&self, dev_no: u32) -> bool {
        self.state.lock().devs.get(&dev_no).is_some_and(|s| s.paused)
    }

    /// Account one packet delivered by `dev_no`; pauses the device when the
    /// tick budget is exceeded.
    pub fn on_packet_delivered(&self, dev_no: u32) {
        let pause = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            st.rx_pkts += 1;
            let budget = u64::from(st.limit / st.rx_ticks);
            let over = st.rx_pkts + st.rx_overruns > budget;
            let Some(slot) = st.devs.get_mut(&dev_no) else {
                return;
            };
            let mut pause = None;
            if over && !slot.paused && slot.active {
                slot.paused = true;
                st.rx_overruns = 0;
                pause = Some(slot.ctl.clone());
            }
            if slot.paused {
                st.rx_overruns += 1;
            }
            pause
        };

        if let Some(ctl) = pause {
            tracing::debug!("dev {}: rx paused by rate limit", dev_no);
            if let Err(e) = ctl.rx_suspend() {
                tracing::warn!("dev {}: rx suspend failed: {}", dev_no, e);
            }
        }
    }

    /// Start a new tick: reset the counter and resume paused devices.
    pub fn tick(&self) {
        let resume: Vec<(u32, Arc<dyn RxControl>)> = {
            let mut st = self.state.lock();
            st.rx_pkts = 0;
            st.devs
                .iter_mut()
                .filter(|(_, s)| s.active && s.paused)
                .map(|(dev_no, s)| {
                    s.paused = false;
                    (*dev_no, s.ctl.clone())
                })
                .collect()
        };

        for (dev_no, ctl) in resume {
            match ctl.rx_resume() {
                Ok(()) => tracing::trace!("dev {}: rx resumed", dev_no),
                Err(e) => {
                    tracing::warn!("dev {}: rx resume failed: {}", dev_no, e);
                    let mut st = self.state.lock();
                    if let Some(slot) = st.devs.get_mut(&dev_no).filter(|s| s.active) {
                        slot.paused = true;
                    }
                }
            }
        }
    }

    /// Tick a limiter from an async task until `cancel` is set or the
    /// limiter is dropped.
    pub async fn run<R: Runtime>(limiter: Weak<RateLimiter>, cancel: Arc<AtomicBool>) {
        loop {
            let Some(interval) = limiter.upgrade().map(|rl| rl.interval()) else {
                break;
            };
            R::sleep(interval).await;
            if cancel.load(Ordering::Acquire) {
                break;
            }
            let Some(rl) = limiter.upgrade() else {
                break;
            };
            rl.tick();
        }
    }

    fn arm_thread(self: &Arc<Self>) {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let weak = Arc::downgrade(self);
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || Self::timer_loop(weak, flag));
        match spawned {
            Ok(handle) => *self.timer.lock() = Some(TimerThread { stop, handle }),
            Err(e) => tracing::error!("failed to spawn rate limit timer: {}", e),
        }
    }

    fn timer_loop(limiter: Weak<RateLimiter>, stop: Arc<AtomicBool>) {
        loop {
            let Some(interval) = limiter.upgrade().map(|rl| rl.interval()) else {
                return;
            };
            let deadline = Instant::now() + interval;
            loop {
                if stop.load(Ordering::Acquire) {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::park_timeout(deadline - now);
            }
            let Some(rl) = limiter.upgrade() else {
                return;
            };
            rl.tick();
        }
    }

    fn disarm(&self) {
        let Some(timer) = self.timer.lock().take() else {
            return;
        };
        timer.stop.store(true, Ordering::Release);
        timer.handle.thread().unpark();
        if timer.handle.thread().id() != thread::current().id() {
            let _ = timer.handle.join();
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Packet rate measurement of one direction.
///
/// Counts packets in windows of `boundary` packets and reports the rate
/// about once per second.
#[derive(Debug, Clone)]
pub struct RateMeter {
    boundary: u32,
    pkts: u32,
    prints: u32,
    ts0: Instant,
    intrs0: u64,
}

/// One rate measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateReport {
    pub packets: u32,
    pub elapsed: Duration,
    pub pps: u64,
    /// Interrupts taken during the window
    pub intrs: u64,
}

impl RateMeter {
    /// Window size follows the configured ceiling, if any.
    pub fn new(limit: Option<u32>) -> Self {
        let boundary = match limit {
            None => 100_000,
            Some(l) if l >= 100_000 => 100_000,
            Some(l) if l >= 10_000 => 10_000,
            Some(_) => 1000,
        };
        Self {
            boundary,
            pkts: 0,
            prints: 0,
            ts0: Instant::now(),
            intrs0: 0,
        }
    }

    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    /// Count one packet. `intrs` is the device interrupt counter.
    pub fn record(&mut self, intrs: u64) -> Option<RateReport> {
        self.record_at(Instant::now(), intrs)
    }

    fn record_at(&mut self, now: Instant, intrs: u64) -> Option<RateReport> {
        if self.pkts == 0 {
            self.ts0 = now;
            self.intrs0 = intrs;
        }
        self.pkts += 1;
        if self.pkts < self.boundary {
            return None;
        }
        self.pkts = 0;

        let elapsed = now.saturating_duration_since(self.ts0);
        let usecs = elapsed.as_micros().max(1) as u64;
        let pps = u64::from(self.boundary) * 1_000_000 / usecs;
        self.prints += 1;
        if self.intrs0 > intrs {
            self.intrs0 = 0;
        }
        if pps > u64::from(self.boundary) && u64::from(self.prints * self.boundary) < pps {
            return None;
        }
        self.prints = 0;
        Some(RateReport {
            packets: self.boundary,
            elapsed,
            pps,
            intrs: intrs - self.intrs0,
        })
    }
}
