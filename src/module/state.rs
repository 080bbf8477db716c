//! Module lifecycle state.
//!
//! # States
//! - Inactive: initial state, and after every deactivation
//! - Active: activated and able to produce request handlers
//!
//! # State Transitions
//! ```text
//! Inactive → Active:   on_activate succeeded
//! Inactive → Inactive: on_activate faulted
//! Active → Active:     on_config_change (either outcome), new_request_handler
//! Active → Inactive:   on_deactivate (either outcome)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Inactive = 0,
    Active = 1,
}

impl From<u8> for ModuleState {
    fn from(val: u8) -> Self {
        match val {
            1 => ModuleState::Active,
            _ => ModuleState::Inactive,
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Inactive => f.write_str("inactive"),
            ModuleState::Active => f.write_str("active"),
        }
    }
}

/// Lock-free cell holding a [`ModuleState`].
///
/// Writers hold the owning slot's lifecycle lock, so a plain store is enough;
/// readers on the request path only ever load.
#[derive(Debug)]
pub struct AtomicModuleState(AtomicU8);

impl AtomicModuleState {
    pub fn new(state: ModuleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ModuleState {
        ModuleState::from(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ModuleState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for AtomicModuleState {
    fn default() -> Self {
        Self::new(ModuleState::Inactive)
    }
}
