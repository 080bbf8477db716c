//! Process lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs + http/server.rs):
//!     Load config → Register modules → activate_all → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → deactivate_all → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload config → broadcast_config_change
//! ```
//!
//! # Design Decisions
//! - Listeners start only after modules have been activated
//! - Modules are deactivated only after in-flight requests drained

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
