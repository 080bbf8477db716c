//! Status module: reports how many requests it has served.
//!
//! Also bounds its own concurrency: each handler holds an in-flight slot
//! until it is dropped, and handler creation fails once `max_in_flight`
//! slots are taken.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::module::{HandlerRequest, HandlerResult, Module, ModuleFault, RequestHandler};

pub const NAME: &str = "status";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub max_in_flight: usize,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self { max_in_flight: 1024 }
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    module: &'static str,
    /// Changes every time the module is activated.
    activation_id: Uuid,
    handled: u64,
    in_flight: usize,
    generation: u64,
}

/// Counters shared between the module and its handlers.
#[derive(Debug, Default)]
struct Counters {
    handled: AtomicU64,
    in_flight: AtomicUsize,
}

#[derive(Debug)]
struct Active {
    settings: StatusSettings,
    generation: u64,
    activation_id: Uuid,
}

#[derive(Debug, Default)]
pub struct StatusModule {
    counters: Arc<Counters>,
    active: Option<Arc<Active>>,
}

impl StatusModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests handed out since construction.
    pub fn handled(&self) -> u64 {
        self.counters.handled.load(Ordering::Relaxed)
    }

    fn load(cfg: &ServerConfig, activation_id: Uuid) -> Result<Active, ModuleFault> {
        let settings: StatusSettings = cfg.module_settings(NAME)?;
        if settings.max_in_flight == 0 {
            return Err(ModuleFault::config("max_in_flight must be greater than zero"));
        }
        Ok(Active {
            settings,
            generation: cfg.generation,
            activation_id,
        })
    }

    /// Claim an in-flight slot, or `None` if all are taken.
    fn try_acquire(&self, limit: usize) -> Option<InFlightGuard> {
        let mut prev = self.counters.in_flight.load(Ordering::Relaxed);
        loop {
            if prev >= limit {
                return None;
            }
            match self.counters.in_flight.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(InFlightGuard {
            counters: self.counters.clone(),
        })
    }
}

impl Module for StatusModule {
    fn name(&self) -> &str {
        NAME
    }

    fn on_activate(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.active = Some(Arc::new(Self::load(cfg, Uuid::new_v4())?));
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), ModuleFault> {
        self.active = None;
        Ok(())
    }

    fn on_config_change(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        let activation_id = self
            .active
            .as_ref()
            .map(|a| a.activation_id)
            .unwrap_or_else(Uuid::new_v4);
        self.active = Some(Arc::new(Self::load(cfg, activation_id)?));
        Ok(())
    }

    fn new_request_handler(&self) -> Result<Box<dyn RequestHandler>, ModuleFault> {
        let active = self
            .active
            .clone()
            .ok_or_else(|| ModuleFault::unavailable("status module not configured"))?;
        let slot = self.try_acquire(active.settings.max_in_flight).ok_or_else(|| {
            ModuleFault::unavailable(format!(
                "{} requests already in flight",
                active.settings.max_in_flight
            ))
        })?;
        let handled = self.counters.handled.fetch_add(1, Ordering::Relaxed) + 1;

        Ok(Box::new(StatusHandler {
            active,
            handled,
            slot,
        }))
    }
}

/// Releases an in-flight slot on drop.
#[derive(Debug)]
struct InFlightGuard {
    counters: Arc<Counters>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

struct StatusHandler {
    active: Arc<Active>,
    handled: u64,
    slot: InFlightGuard,
}

impl RequestHandler for StatusHandler {
    fn handle(self: Box<Self>, _request: HandlerRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            let report = StatusReport {
                module: NAME,
                activation_id: self.active.activation_id,
                handled: self.handled,
                in_flight: self.slot.counters.in_flight.load(Ordering::Relaxed),
                generation: self.active.generation,
            };
            let body = serde_json::to_vec(&report).map_err(|e| ModuleFault::internal(e.to_string()))?;

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .map_err(|e| ModuleFault::internal(e.to_string()))
        })
    }
}
