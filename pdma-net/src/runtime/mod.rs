//! Rate limiting and timer support.
//!
//! A single [`RateLimiter`] serves every device of the process. Devices
//! register an [`RxControl`] handle; the limiter pauses a device's RX
//! queues when the admitted packet count of the current tick exceeds the
//! budget, and resumes them on the next tick.
//!
//! The tick is driven either by a dedicated timer thread or, with
//! [`TickDriver::Manual`](crate::config::TickDriver), by the caller, for
//! example from an async task built on the [`Runtime`] trait. A
//! [`TokioRuntime`] implementation is provided behind the `tokio` feature.

mod rate_limit;
#[cfg(feature = "tokio")]
pub mod tokio_compat;
mod traits;

pub use rate_limit::{
    RX_TICKS_DFLT, RateLimiter, RateMeter, RateReport, RxControl, rx_ticks_for,
};
#[cfg(feature = "tokio")]
pub use tokio_compat::TokioRuntime;
pub use traits::Runtime;
