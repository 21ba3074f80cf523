// Test: per-queue runtime operations of the device controller

use pdma_net::api::pdma::queue::state;
use pdma_net::api::pdma::{Dir, NUM_Q_MAX, NetifAttach, PdmaDev, dev_flags};
use pdma_net::api::{Errno, Error, Result};
use pdma_net::config::DevConfig;
use pdma_net::packet::{Packet, attrs};
use pdma_net_test::frame::udp_frame;
use pdma_net_test::mock_hw::HwCall;
use pdma_net_test::util::{chans, configure_and_start, init_tracing, open_mock, open_mock_with};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[test]
fn test_start_stop() {
    init_tracing();
    let (hw, dev) = open_mock(1, 4).unwrap();
    dev.configure(chans(&[0, 2]), chans(&[1])).unwrap();
    hw.clear_calls();

    dev.rx_queue_start(1).unwrap();
    dev.tx_queue_start(0).unwrap();
    assert_ne!(dev.rx_queue(1).unwrap().state() & state::ACTIVE, 0);
    dev.rx_queue_stop(1).unwrap();
    assert_eq!(dev.rx_queue(1).unwrap().state() & state::ACTIVE, 0);
    assert_ne!(dev.rx_queue(1).unwrap().state() & state::USED, 0);

    assert_eq!(
        hw.calls(),
        vec![HwCall::Start(2), HwCall::Start(1), HwCall::Stop(2)]
    );
    assert_eq!(dev.rx_queue_start(2), Err(Error::Unavailable));
    assert_eq!(dev.rx_queue_start(NUM_Q_MAX), Err(Error::InvalidParam));
}

#[test]
fn test_chain_mode_tx_start() {
    let conf = DevConfig::new().flags(dev_flags::CHAIN_MODE);
    let (hw, dev) = open_mock_with(1, 4, conf).unwrap();
    dev.configure(chans(&[0]), chans(&[1])).unwrap();
    hw.clear_calls();

    dev.tx_queue_start(0).unwrap();
    assert!(hw.calls().is_empty());
    assert_ne!(dev.tx_queue(0).unwrap().state() & state::ACTIVE, 0);
}

#[test]
fn test_tx_poll_mode_skips_intr() {
    let conf = DevConfig::new().flags(dev_flags::TX_POLLING);
    let (hw, dev) = open_mock_with(1, 4, conf).unwrap();
    dev.configure(chans(&[0]), chans(&[1])).unwrap();
    hw.clear_calls();

    dev.tx_queue_intr_enable(0).unwrap();
    dev.tx_queue_intr_disable(0).unwrap();
    dev.rx_queue_intr_enable(0).unwrap();
    assert_eq!(hw.calls(), vec![HwCall::IntrEnable(0)]);
}

#[test]
fn test_intr_ops() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    dev.configure(chans(&[3]), chans(&[0])).unwrap();
    hw.set_intr_pending(true);
    hw.clear_calls();

    assert!(dev.rx_queue_intr_query(0).unwrap());
    assert!(dev.rx_queue_intr_check(0).unwrap());
    dev.rx_queue_intr_ack(0).unwrap();
    dev.tx_queue_intr_ack(0).unwrap();
    dev.tx_queue_intr_enable(0).unwrap();

    assert_eq!(
        hw.calls(),
        vec![
            HwCall::IntrQuery(3),
            HwCall::IntrCheck(3),
            HwCall::IntrClear(3),
            HwCall::IntrClear(0),
            HwCall::IntrEnable(0),
        ]
    );
    assert_eq!(dev.intrs(), 2);
    assert_eq!(dev.stats_get().intrs, 2);

    let hdl = dev.intr_handle(3).unwrap();
    assert_eq!((hdl.chan, hdl.queue, hdl.dir, hdl.inum), (3, 0, Dir::Rx, 35));
}

#[test]
fn test_coalesce_and_dump_bounds() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    dev.configure(chans(&[0, 1]), chans(&[2])).unwrap();
    hw.clear_calls();

    dev.rx_queue_coalesce(1, 8, 100).unwrap();
    assert_eq!(
        dev.rx_queue(1).unwrap().intr_coalescing(),
        Some(PdmaDev::ic_val(8, 100))
    );
    assert_eq!(dev.rx_queue_coalesce(2, 8, 100), Err(Error::InvalidParam));
    assert_eq!(dev.tx_queue_coalesce(1, 8, 100), Err(Error::InvalidParam));
    dev.tx_queue_reg_dump(0).unwrap();
    assert_eq!(dev.rx_queue_reg_dump(NUM_Q_MAX), Err(Error::InvalidParam));

    assert_eq!(
        hw.calls(),
        vec![HwCall::Coalesce(1, 8, 100), HwCall::RegDump(2)]
    );
}

#[test]
fn test_queue_suspend_resume_idempotent() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    configure_and_start(&dev, chans(&[0, 1]), chans(&[2])).unwrap();
    hw.clear_calls();

    dev.rx_queue_suspend(1).unwrap();
    dev.rx_queue_suspend(1).unwrap();
    let st = dev.rx_queue(1).unwrap().state();
    assert_ne!(st & state::SUSPENDED, 0);
    assert_ne!(st & state::ACTIVE, 0);
    dev.rx_queue_resume(1).unwrap();
    dev.rx_queue_resume(1).unwrap();

    dev.tx_queue_suspend(0).unwrap();
    dev.tx_queue_suspend(0).unwrap();
    dev.tx_queue_resume(0).unwrap();

    assert_eq!(
        hw.calls(),
        vec![
            HwCall::Suspend(1, Dir::Rx),
            HwCall::Resume(1, Dir::Rx),
            HwCall::Suspend(2, Dir::Tx),
            HwCall::Resume(2, Dir::Tx),
        ]
    );
    assert_eq!(dev.stats_get().txq[0].xoffs, 1);
}

#[test]
fn test_failed_suspend_keeps_state() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    configure_and_start(&dev, chans(&[0]), chans(&[1])).unwrap();

    hw.set_fail_suspend(true);
    assert_eq!(dev.rx_queue_suspend(0), Err(Error::Hw(Errno::EIO)));
    assert_eq!(dev.rx_queue(0).unwrap().state() & state::SUSPENDED, 0);

    hw.set_fail_suspend(false);
    dev.rx_queue_suspend(0).unwrap();
    hw.set_fail_resume(true);
    assert_eq!(dev.rx_queue_resume(0), Err(Error::Hw(Errno::EIO)));
    assert_ne!(dev.rx_queue(0).unwrap().state() & state::SUSPENDED, 0);
}

#[derive(Default)]
struct Hooks {
    detached: AtomicU32,
    attached: AtomicU32,
}

impl NetifAttach for Hooks {
    fn detach(&self) -> Result<()> {
        self.detached.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn attach(&self) -> Result<()> {
        self.attached.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_device_suspend_resume() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    configure_and_start(&dev, chans(&[0, 1]), chans(&[2, 3])).unwrap();
    hw.clear_calls();

    dev.suspend().unwrap();
    dev.resume().unwrap();
    assert_eq!(
        hw.calls(),
        vec![
            HwCall::Suspend(0, Dir::Rx),
            HwCall::Suspend(1, Dir::Rx),
            HwCall::Suspend(2, Dir::Tx),
            HwCall::Suspend(3, Dir::Tx),
            HwCall::Resume(2, Dir::Tx),
            HwCall::Resume(3, Dir::Tx),
            HwCall::Resume(0, Dir::Rx),
            HwCall::Resume(1, Dir::Rx),
        ]
    );

    let hooks = Arc::new(Hooks::default());
    dev.set_netif_hooks(Some(hooks.clone()));
    hw.clear_calls();
    dev.suspend().unwrap();
    dev.resume().unwrap();
    assert_eq!(hooks.detached.load(Ordering::Relaxed), 1);
    assert_eq!(hooks.attached.load(Ordering::Relaxed), 1);
    assert_eq!(hw.count(|c| matches!(c, HwCall::Suspend(_, Dir::Tx))), 0);
    assert_eq!(hw.count(|c| matches!(c, HwCall::Suspend(_, Dir::Rx))), 2);
}

fn rx_suspended(dev: &PdmaDev, queue: usize) -> bool {
    dev.rx_queue(queue).unwrap().state() & state::SUSPENDED != 0
}

#[test]
fn test_partial_suspend_visits_every_queue() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    configure_and_start(&dev, chans(&[0, 1]), chans(&[2, 3])).unwrap();
    hw.fail_suspend_on(0);
    hw.clear_calls();

    assert_eq!(dev.suspend(), Err(Error::Hw(Errno::EIO)));
    assert_eq!(
        hw.calls(),
        vec![
            HwCall::Suspend(1, Dir::Rx),
            HwCall::Suspend(2, Dir::Tx),
            HwCall::Suspend(3, Dir::Tx),
        ]
    );
    assert!(!rx_suspended(&dev, 0));
    assert!(rx_suspended(&dev, 1));
}

#[test]
fn test_resume_reaches_rx_after_tx_failure() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    configure_and_start(&dev, chans(&[0, 1]), chans(&[2, 3])).unwrap();
    dev.suspend().unwrap();
    hw.fail_resume_on(2);
    hw.clear_calls();

    assert_eq!(dev.resume(), Err(Error::Hw(Errno::EIO)));
    assert_eq!(
        hw.calls(),
        vec![
            HwCall::Resume(3, Dir::Tx),
            HwCall::Resume(0, Dir::Rx),
            HwCall::Resume(1, Dir::Rx),
        ]
    );
    assert!(!rx_suspended(&dev, 0));
    assert!(!rx_suspended(&dev, 1));
    assert_ne!(dev.tx_queue(0).unwrap().state() & state::SUSPENDED, 0);
    assert_eq!(dev.tx_queue(1).unwrap().state() & state::SUSPENDED, 0);
}

struct BrokenAttach;

impl NetifAttach for BrokenAttach {
    fn detach(&self) -> Result<()> {
        Ok(())
    }

    fn attach(&self) -> Result<()> {
        Err(Error::Internal)
    }
}

#[test]
fn test_resume_reaches_rx_after_attach_failure() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    configure_and_start(&dev, chans(&[0, 1]), chans(&[2])).unwrap();
    dev.set_netif_hooks(Some(Arc::new(BrokenAttach)));
    dev.suspend().unwrap();
    hw.clear_calls();

    assert_eq!(dev.resume(), Err(Error::Internal));
    assert_eq!(hw.count(|c| matches!(c, HwCall::Resume(_, Dir::Rx))), 2);
    assert!(!rx_suspended(&dev, 0));
    assert!(!rx_suspended(&dev, 1));
}

#[test]
fn test_xmit() {
    let (hw, dev) = open_mock(1, 4).unwrap();
    dev.configure(chans(&[0]), chans(&[1, 2])).unwrap();

    let frame = udp_frame(1, 2, &[0u8; 18]);
    assert_eq!(
        dev.xmit(0, Packet::new(0, &[], &frame)),
        Err(Error::Unavailable)
    );

    dev.tx_queue_start(0).unwrap();
    dev.tx_queue_start(1).unwrap();
    dev.xmit(1, Packet::new(0, &[], &frame)).unwrap();
    let sent = hw.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 2);

    dev.tx_queue_suspend(1).unwrap();
    assert_eq!(
        dev.xmit(1, Packet::new(0, &[], &frame)),
        Err(Error::Unavailable)
    );

    hw.set_fail_xmit(true);
    assert!(dev.xmit(0, Packet::new(0, &[], &frame)).is_err());

    let stats = dev.stats_get();
    assert_eq!(stats.txq[0].dropped, 2);
    assert_eq!(stats.txq[0].errors, 1);
    assert_eq!(stats.txq[1].packets, 1);
    assert_eq!(stats.txq[1].bytes, frame.len() as u64);
    assert_eq!(stats.txq[1].dropped, 1);
}

#[test]
fn test_tx_queue_schedule() {
    let mut pkt = Packet::new(3, &[], &[0u8; 60]);
    assert_eq!(PdmaDev::tx_queue_schedule(&pkt, 1), 1);
    pkt.set_attr(attrs::TX_BIND_QUE);
    assert_eq!(PdmaDev::tx_queue_schedule(&pkt, 1), 3);
}

#[test]
fn test_info_report() {
    let (_hw, dev) = open_mock(2, 4).unwrap();
    configure_and_start(&dev, chans(&[0, 5]), chans(&[1])).unwrap();

    let info = dev.info_get();
    assert_eq!(info.dev_name, "pdma0");
    assert_eq!(info.max_groups, 2);
    assert_eq!(info.max_queues, 8);
    assert_eq!(info.bm_groups, 0b11);
    assert_eq!(info.nb_rx_queues, 2);
    assert_eq!(info.nb_tx_queues, 1);
    assert_eq!(info.bm_rx_queues, chans(&[0, 5]));
    assert_ne!(info.rxq_state[1] & state::ACTIVE, 0);
    assert_eq!(info.rxq_state[2], 0);
}
