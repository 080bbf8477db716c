//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry, modules and dispatcher produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON optional)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with module name on every lifecycle event
//! - Request ID flows from the HTTP layer into dispatch logs
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
