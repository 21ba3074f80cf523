//! RX dispatch benchmark
//!
//! Drives synthetic UDP frames through a simulated packet DMA device, its
//! filter table and dispatcher, and reports throughput and per-queue
//! statistics.
//!
//! Every flow gets its own UDP destination port, a filter matching that
//! port and a virtual interface the filter delivers to. A share of the
//! frames matches no filter and is dropped.
//!
//! # Usage
//!
//! ```bash
//! # 2 groups of 4 channels, default split
//! pdma-bench
//!
//! # Custom channel split, 16 flows, 200k pps ceiling
//! pdma-bench --rx 0,1,2 --tx 3 --groups 1 --flows 16 --rate-limit 200000
//!
//! # Dispatch tracing
//! RUST_LOG=pdma_net=trace pdma-bench --packets 10
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use clap::Parser;
use pdma_net::api::Result;
use pdma_net::api::pdma::queue::state;
use pdma_net::api::pdma::{Dir, PdmaDev};
use pdma_net::config::{DevConfig, RateLimitConfig};
use pdma_net::filter::{CallbackRegistry, FilterRule};
use pdma_net::knet::KnetDev;
use pdma_net::netif::{NUM_VDEV_MAX, NetStack, Netif};
use pdma_net::packet::Packet;
use pdma_net::runtime::RateLimiter;
use pdma_net_test::frame::{UDP_DST_PORT_OFFSET, udp_frame};
use pdma_net_test::util::{chans, open_mock_with};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FLOW_PORT_BASE: u16 = 5000;
const MISS_PORT: u16 = 9;

#[derive(Parser, Debug)]
#[command(name = "pdma-bench")]
#[command(about = "RX dispatch benchmark on a simulated packet DMA device")]
struct Args {
    /// Number of channel groups
    #[arg(short, long, default_value = "2")]
    groups: u32,

    /// Channels per group
    #[arg(short, long, default_value = "4")]
    chans_per_group: u32,

    /// RX channels
    #[arg(long, value_delimiter = ',', default_value = "0,1,4,5")]
    rx: Vec<u32>,

    /// TX channels
    #[arg(long, value_delimiter = ',', default_value = "2,3,6,7")]
    tx: Vec<u32>,

    /// Frames to inject
    #[arg(short, long, default_value = "1000000")]
    packets: u64,

    /// Number of flows, each with its own filter and interface
    #[arg(short, long, default_value = "8")]
    flows: u32,

    /// One frame in this many matches no filter (0 disables)
    #[arg(long, default_value = "16")]
    miss_every: u64,

    /// Transmit every delivered frame back out
    #[arg(long)]
    echo: bool,

    /// RX packets-per-second ceiling
    #[arg(long)]
    rate_limit: Option<u32>,

    /// UDP payload size
    #[arg(long, default_value = "64")]
    payload: usize,
}

/// Counts deliveries per interface and frees the in-flight reference.
struct CountingStack {
    per_netif: Vec<AtomicU64>,
    vnet: AtomicU64,
}

impl CountingStack {
    fn new() -> Self {
        Self {
            per_netif: (0..=NUM_VDEV_MAX).map(|_| AtomicU64::new(0)).collect(),
            vnet: AtomicU64::new(0),
        }
    }
}

impl NetStack for CountingStack {
    fn receive(&self, netif: &Arc<Netif>, _pkt: Packet, _filter: Option<&FilterRule>) {
        if let Some(c) = self.per_netif.get(netif.id() as usize) {
            c.fetch_add(1, Ordering::Relaxed);
        }
        netif.release();
    }

    fn receive_vnet(&self, _pkt: Packet) {
        self.vnet.fetch_add(1, Ordering::Relaxed);
    }
}

fn rx_suspended(dev: &PdmaDev, queue: usize) -> bool {
    dev.rx_queue(queue)
        .is_ok_and(|q| q.state() & state::SUSPENDED != 0)
}

fn run(args: &Args, stop: Arc<AtomicBool>) -> Result<()> {
    let conf = DevConfig::new().name("bench0").num_groups(args.groups);
    let (_hw, dev) = open_mock_with(args.groups, args.chans_per_group, conf)?;
    dev.configure(chans(&args.rx), chans(&args.tx))?;
    for q in 0..dev.nb_rx_queues() {
        dev.rx_queue_start(q)?;
    }
    for q in 0..dev.nb_tx_queues() {
        dev.tx_queue_start(q)?;
    }

    let stack = Arc::new(CountingStack::new());
    let mut knet = KnetDev::new(dev.clone(), stack.clone(), Arc::new(CallbackRegistry::new()));
    if let Some(limit) = args.rate_limit {
        let limiter = RateLimiter::new(&RateLimitConfig::new().limit(limit));
        knet = knet.with_rate_limiter(limiter).with_rate_meter();
    }

    let flows = args.flows.clamp(1, NUM_VDEV_MAX);
    let payload = vec![0x5a; args.payload];
    let mut frames = Vec::with_capacity(flows as usize);
    for flow in 0..flows {
        let id = flow + 1;
        let port = FLOW_PORT_BASE + flow as u16;
        knet.netifs().add_vdev(id, format!("flow{flow}"))?;
        knet.filters().create(
            &FilterRule::new()
                .desc(format!("udp/{port}"))
                .match_pkt(UDP_DST_PORT_OFFSET, &port.to_be_bytes(), &[])
                .to_netif(id),
        )?;
        frames.push(udp_frame(40000, port, &payload));
    }
    let miss = udp_frame(40000, MISS_PORT, &payload);

    info!(
        dev = dev.name(),
        rx_queues = dev.nb_rx_queues(),
        tx_queues = dev.nb_tx_queues(),
        flows,
        "starting"
    );
    dev.stats_reset(Dir::RxTx);

    let nb_rx = dev.nb_rx_queues();
    let nb_tx = dev.nb_tx_queues();
    let mut sent = 0u64;
    let start = Instant::now();
    while sent < args.packets && !stop.load(Ordering::Relaxed) {
        let queue = (sent % nb_rx as u64) as usize;
        if rx_suspended(&dev, queue) {
            std::thread::yield_now();
            continue;
        }
        let frame = if args.miss_every != 0 && sent % args.miss_every == args.miss_every - 1 {
            &miss
        } else {
            &frames[(sent % u64::from(flows)) as usize]
        };
        let delivered = knet.rx_frame(Packet::new(queue as u16, &[], frame)).is_ok();
        if args.echo && delivered {
            let txq = (sent % nb_tx as u64) as usize;
            if let Err(e) = knet.tx_frame(Packet::new(0, &[], frame), txq) {
                warn!("tx queue {}: {}", txq, e);
            }
        }
        sent += 1;
    }
    let elapsed = start.elapsed();

    let stats = dev.stats_get();
    let pps = sent as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        packets = sent,
        elapsed = ?elapsed,
        pps = pps as u64,
        "done"
    );
    info!(
        rx_packets = stats.rxqs.packets,
        rx_bytes = stats.rxqs.bytes,
        rx_dropped = stats.rxqs.dropped,
        tx_packets = stats.txqs.packets,
        tx_dropped = stats.txqs.dropped,
        intrs = stats.intrs,
        "device totals"
    );
    for q in 0..nb_rx {
        let s = &stats.rxq[q];
        info!(
            "rxq {} (chan {}): {} pkts {} bytes {} dropped",
            q,
            dev.lq_to_pq(q, Dir::Rx)?,
            s.packets,
            s.bytes,
            s.dropped
        );
    }
    for rule in knet.filters().iter() {
        let netif = rule.dest.id as usize;
        let received = stack
            .per_netif
            .get(netif)
            .map_or(0, |c| c.load(Ordering::Relaxed));
        info!(
            "filter {} [{}]: {} hits, netif {} received {}",
            rule.id, rule.desc, rule.hits, netif, received
        );
    }

    knet.filters().destroy_all()?;
    drop(knet);
    dev.close();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Received Ctrl+C, shutting down");
        flag.store(true, Ordering::Relaxed);
    }) {
        warn!("failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = run(&args, stop) {
        tracing::error!("benchmark failed: {}", e);
        std::process::exit(1);
    }
}
