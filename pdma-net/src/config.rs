// Device and rate-limiter configuration

use crate::api::pdma::{DevMode, NUM_RING_DESC, NUM_RXTX_BUDGET, RX_BUF_SIZE_DFLT};

/// Device open configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevConfig {
    /// Device name, also used for the primary interface
    pub name: String,
    /// Device number, unique per process
    pub dev_no: u32,
    pub dev_id: u32,
    pub dev_type: u32,
    pub unit: u32,
    /// Channel groups to use (at most what the hardware exposes)
    pub num_groups: u32,
    pub mode: DevMode,
    /// See [`dev_flags`](crate::api::pdma::dev_flags)
    pub flags: u32,
    /// Default descriptors per ring
    pub nb_desc: u32,
    /// Packets handled per interrupt
    pub budget: u32,
    /// Default RX buffer size
    pub rx_buf_size: u32,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            name: String::from("pdma0"),
            dev_no: 0,
            dev_id: 0,
            dev_type: 0,
            unit: 0,
            num_groups: 1,
            mode: DevMode::Standard,
            flags: 0,
            nb_desc: NUM_RING_DESC,
            budget: NUM_RXTX_BUDGET,
            rx_buf_size: RX_BUF_SIZE_DFLT,
        }
    }
}

impl DevConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn dev_no(mut self, dev_no: u32) -> Self {
        self.dev_no = dev_no;
        self
    }

    pub fn dev_id(mut self, dev_id: u32) -> Self {
        self.dev_id = dev_id;
        self
    }

    pub fn unit(mut self, unit: u32) -> Self {
        self.unit = unit;
        self
    }

    pub fn num_groups(mut self, num_groups: u32) -> Self {
        self.num_groups = num_groups;
        self
    }

    /// Give every channel a shadow virtual-network queue.
    pub fn dual_stack(mut self) -> Self {
        self.mode = DevMode::DualStack;
        self
    }

    /// Add device flags.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }

    pub fn nb_desc(mut self, nb_desc: u32) -> Self {
        self.nb_desc = nb_desc;
        self
    }

    pub fn budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    pub fn rx_buf_size(mut self, size: u32) -> Self {
        self.rx_buf_size = size;
        self
    }
}

/// Default RX rate ceiling, packets per second
pub const RX_RATE_LIMIT_DFLT: u32 = 100_000;

/// How the rate-limiter tick is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickDriver {
    /// A dedicated timer thread owned by the limiter
    #[default]
    Thread,
    /// The caller invokes `tick()`, e.g. from an async task
    Manual,
}

/// Rate-limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Packets per second admitted across all devices
    pub limit: u32,
    pub driver: TickDriver,
    /// Name of the timer thread
    pub thread_name: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: RX_RATE_LIMIT_DFLT,
            driver: TickDriver::Thread,
            thread_name: String::from("pdma-rate-limit"),
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Leave ticking to the caller.
    pub fn manual(mut self) -> Self {
        self.driver = TickDriver::Manual;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
