//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker engine produces:
//!     → logging.rs (structured log events per operation and transition)
//!     → metrics.rs (failure, transition, admission counters; state gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, monitor command)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (no-op without an installed recorder)

pub mod logging;
pub mod metrics;
