//! Tokio integration for the rate limiter.
//!
//! # Example
//!
//! ```no_run
//! use pdma_net::config::RateLimitConfig;
//! use pdma_net::runtime::RateLimiter;
//! use pdma_net::runtime::tokio_compat::spawn_ticker;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! async fn example() {
//!     let limiter = RateLimiter::new(&RateLimitConfig::new().limit(5000).manual());
//!     let cancel = Arc::new(AtomicBool::new(false));
//!     let task = spawn_ticker(&limiter, cancel.clone());
//!     // ... register devices and deliver packets ...
//!     cancel.store(true, std::sync::atomic::Ordering::Relaxed);
//!     task.await.unwrap();
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use super::Runtime;
use super::rate_limit::RateLimiter;

/// Tokio runtime implementation.
pub struct TokioRuntime;

impl Runtime for TokioRuntime {
    fn sleep(dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}

/// Drive a manually-ticked limiter from a tokio task until `cancel` is set
/// or the limiter is dropped.
pub fn spawn_ticker(
    limiter: &Arc<RateLimiter>,
    cancel: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    let weak = Arc::downgrade(limiter);
    tokio::spawn(RateLimiter::run::<TokioRuntime>(weak, cancel))
}
