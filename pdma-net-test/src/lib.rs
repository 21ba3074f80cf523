pub mod frame;
pub mod mock_hw;
pub mod stack;

pub mod util {
    use std::sync::Arc;

    use pdma_net::api::Result;
    use pdma_net::api::pdma::{ChanBitmap, PdmaDev};
    use pdma_net::config::DevConfig;

    use crate::mock_hw::MockHw;

    /// Install a `tracing` subscriber honoring `RUST_LOG`. Safe to call
    /// from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Open a device on mock hardware with every group attached.
    pub fn open_mock(num_cmcs: u32, cmc_chans: u32) -> Result<(Arc<MockHw>, Arc<PdmaDev>)> {
        open_mock_with(num_cmcs, cmc_chans, DevConfig::new().num_groups(num_cmcs))
    }

    pub fn open_mock_with(
        num_cmcs: u32,
        cmc_chans: u32,
        conf: DevConfig,
    ) -> Result<(Arc<MockHw>, Arc<PdmaDev>)> {
        let hw = Arc::new(MockHw::new(num_cmcs, cmc_chans));
        let dev = PdmaDev::open(&conf, hw.clone())?;
        Ok((hw, Arc::new(dev)))
    }

    /// Configure, then start every RX and TX queue.
    pub fn configure_and_start(dev: &PdmaDev, bm_rxq: ChanBitmap, bm_txq: ChanBitmap) -> Result<()> {
        dev.configure(bm_rxq, bm_txq)?;
        for q in 0..dev.nb_rx_queues() {
            dev.rx_queue_start(q)?;
        }
        for q in 0..dev.nb_tx_queues() {
            dev.tx_queue_start(q)?;
        }
        Ok(())
    }

    /// Bitmap with the given channels set.
    pub fn chans(list: &[u32]) -> ChanBitmap {
        list.iter().fold(0, |bm, &c| bm | (1 << c))
    }
}
