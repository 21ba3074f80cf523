// Kernel-network glue for one device
//
// Owns the packet DMA device together with its interface table, filter
// table and dispatcher, and exposes the RX and TX frame entry points.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::api::Result;
use crate::api::pdma::PdmaDev;
use crate::filter::{CallbackRegistry, Dispatcher, FilterTable};
use crate::netif::{NetStack, NetifTable};
use crate::packet::Packet;
use crate::runtime::{RateLimiter, RateMeter};

/// A device with its RX dispatch path.
pub struct KnetDev {
    pdma: Arc<PdmaDev>,
    netifs: Arc<NetifTable>,
    filters: Arc<FilterTable>,
    dispatcher: Dispatcher,
    limiter: Option<Arc<RateLimiter>>,
    meter: Option<Mutex<RateMeter>>,
}

impl std::fmt::Debug for KnetDev {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnetDev")
            .field("pdma", &self.pdma)
            .field("filters", &self.filters)
            .field("rate_limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl KnetDev {
    /// Wrap an opened device. The primary interface takes the device name.
    pub fn new(
        pdma: Arc<PdmaDev>,
        stack: Arc<dyn NetStack>,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        let netifs = Arc::new(NetifTable::new());
        netifs.set_primary(pdma.name());
        let filters = Arc::new(FilterTable::new(callbacks));
        let dispatcher = Dispatcher::new(pdma.clone(), netifs.clone(), filters.clone(), stack);
        Self {
            pdma,
            netifs,
            filters,
            dispatcher,
            limiter: None,
            meter: None,
        }
    }

    /// Register with a rate limiter; RX is paused whenever the limiter's
    /// tick budget is exceeded.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        limiter.start(self.pdma.dev_no(), self.pdma.clone());
        self.limiter = Some(limiter);
        self
    }

    /// Log the RX rate periodically.
    pub fn with_rate_meter(mut self) -> Self {
        let limit = self.limiter.as_ref().map(|rl| rl.limit());
        self.meter = Some(Mutex::new(RateMeter::new(limit)));
        self
    }

    #[inline]
    pub fn pdma(&self) -> &Arc<PdmaDev> {
        &self.pdma
    }

    #[inline]
    pub fn netifs(&self) -> &Arc<NetifTable> {
        &self.netifs
    }

    #[inline]
    pub fn filters(&self) -> &Arc<FilterTable> {
        &self.filters
    }

    #[inline]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one packet received on the queue recorded in its header.
    ///
    /// The packet is counted, fed to the rate limiter and dispatched.
    /// Packets nobody takes are counted as dropped.
    pub fn rx_frame(&self, pkt: Packet) -> Result<()> {
        let queue = pkt.queue_id() as usize;
        self.pdma.rx_record(queue, pkt.data_len())?;

        if let Some(meter) = &self.meter {
            if let Some(report) = meter.lock().record(self.pdma.intrs()) {
                tracing::info!(
                    "{}: rx {} pkts in {:?}, {} pps, {} intrs",
                    self.pdma.name(),
                    report.packets,
                    report.elapsed,
                    report.pps,
                    report.intrs
                );
            }
        }
        if let Some(limiter) = &self.limiter {
            limiter.on_packet_delivered(self.pdma.dev_no());
        }

        let rv = self.dispatcher.dispatch(pkt);
        if rv.is_err() {
            self.pdma.rx_drop(queue)?;
        }
        rv
    }

    /// Transmit a packet on `queue`, or on the queue it is bound to.
    pub fn tx_frame(&self, pkt: Packet, queue: usize) -> Result<()> {
        let queue = PdmaDev::tx_queue_schedule(&pkt, queue);
        self.pdma.xmit(queue, pkt)
    }
}

impl Drop for KnetDev {
    fn drop(&mut self) {
        if let Some(limiter) = &self.limiter {
            limiter.stop(self.pdma.dev_no());
        }
    }
}
