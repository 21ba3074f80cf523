//! Runtime abstraction for async executors.
//!
//! The rate limiter's async ticker only needs a timer from the executor, so
//! it is written against this trait rather than a concrete runtime.

use std::future::Future;
use std::time::Duration;

/// Trait for abstracting async runtime operations.
///
/// # Example
///
/// ```rust
/// use pdma_net::runtime::Runtime;
/// use std::time::Duration;
///
/// struct MyRuntime;
///
/// impl Runtime for MyRuntime {
///     async fn sleep(_dur: Duration) {
///         // Your runtime's timer
///     }
/// }
/// ```
pub trait Runtime {
    /// Complete after `dur` has elapsed.
    fn sleep(dur: Duration) -> impl Future<Output = ()> + Send;
}
