//! Packet DMA queue management and RX filter dispatch for switch CPU ports.
//!
//! [`api::pdma::PdmaDev`] owns the descriptor-ring queues of one device and
//! maps dense logical queue ids onto physical channels. Received packets are
//! routed by [`filter::Dispatcher`] through an ordered [`filter::FilterTable`]
//! to network interfaces; [`knet::KnetDev`] ties the pieces together with an
//! optional [`runtime::RateLimiter`].

pub mod api;
pub mod config;
pub mod filter;
pub mod knet;
pub mod netif;
pub mod packet;
pub mod runtime;

pub use api::{Error, Result};
