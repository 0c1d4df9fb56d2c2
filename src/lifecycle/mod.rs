//! Lifecycle management for the long-running `monitor` command.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every ShutdownSignal resolves → monitor loop exits
//! ```
//!
//! # Design Decisions
//! - One-shot CLI commands never touch this module
//! - Breaker operations are never interrupted mid-way; the loop only checks
//!   for shutdown between polls

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_on_signal;
