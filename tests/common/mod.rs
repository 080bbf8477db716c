//! Shared scripted modules for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use module_host::module::{HandlerRequest, HandlerResult};
use module_host::registry::Hook;
use module_host::{Module, ModuleFault, RequestHandler, ServerConfig};

/// Ordered record of every hook invocation, e.g. `"activate:a"`.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, hook: &str, module: &str) {
        self.0.lock().unwrap().push(format!("{hook}:{module}"));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Module names recorded for `hook`, in call order.
    pub fn calls(&self, hook: &str) -> Vec<String> {
        let prefix = format!("{hook}:");
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Fault,
    FaultOnce,
    Panic,
    Delay(Duration),
}

/// A module that records its hooks and misbehaves on request.
///
/// Handlers answer with `id=<n> generation=<g>`, where `g` is the generation
/// of the snapshot the module held when the handler was created.
pub struct ScriptedModule {
    name: String,
    journal: Journal,
    scripted: Vec<(Hook, Behavior)>,
    tripped: AtomicBool,
    config: Option<Arc<ServerConfig>>,
    next_id: Arc<AtomicU64>,
}

impl ScriptedModule {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            scripted: Vec::new(),
            tripped: AtomicBool::new(false),
            config: None,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn fault_on(mut self, hook: Hook) -> Self {
        self.scripted.push((hook, Behavior::Fault));
        self
    }

    /// Fault the first time `hook` runs, succeed afterwards.
    pub fn fault_once_on(mut self, hook: Hook) -> Self {
        self.scripted.push((hook, Behavior::FaultOnce));
        self
    }

    /// Block inside `hook` for `delay` before doing its work.
    pub fn delay_on(mut self, hook: Hook, delay: Duration) -> Self {
        self.scripted.push((hook, Behavior::Delay(delay)));
        self
    }

    pub fn panic_on(mut self, hook: Hook) -> Self {
        self.scripted.push((hook, Behavior::Panic));
        self
    }

    pub fn boxed(self) -> Box<dyn Module> {
        Box::new(self)
    }

    fn run(&self, hook: Hook) -> Result<(), ModuleFault> {
        let refuse = || Err(ModuleFault::resource(format!("{} refuses {}", self.name, hook)));
        for (_, behavior) in self.scripted.iter().filter(|(h, _)| *h == hook) {
            match behavior {
                Behavior::Fault => return refuse(),
                Behavior::FaultOnce => {
                    if !self.tripped.swap(true, Ordering::SeqCst) {
                        return refuse();
                    }
                }
                Behavior::Panic => panic!("{} panicked in {}", self.name, hook),
                Behavior::Delay(delay) => std::thread::sleep(*delay),
            }
        }
        Ok(())
    }
}

impl Module for ScriptedModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_activate(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.journal.push("activate", &self.name);
        self.run(Hook::Activate)?;
        self.config = Some(cfg.clone());
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), ModuleFault> {
        self.journal.push("deactivate", &self.name);
        self.config = None;
        self.run(Hook::Deactivate)
    }

    fn on_config_change(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.journal.push("config_change", &self.name);
        self.run(Hook::ConfigChange)?;
        self.config = Some(cfg.clone());
        Ok(())
    }

    fn new_request_handler(&self) -> Result<Box<dyn RequestHandler>, ModuleFault> {
        self.run(Hook::NewRequestHandler)?;
        let config = self
            .config
            .clone()
            .ok_or_else(|| ModuleFault::internal("handler requested while inactive"))?;
        Ok(Box::new(SnapshotHandler {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            config,
        }))
    }
}

struct SnapshotHandler {
    id: u64,
    config: Arc<ServerConfig>,
}

impl RequestHandler for SnapshotHandler {
    fn handle(self: Box<Self>, _request: HandlerRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            Ok(Response::new(Body::from(format!(
                "id={} generation={}",
                self.id, self.config.generation
            ))))
        })
    }
}

/// Counters shared by an [`ExclusiveModule`] and the test observing it.
#[derive(Default)]
pub struct HookMonitor {
    in_hook: AtomicBool,
    /// Times a hook started while another hook was still running.
    pub overlaps: AtomicUsize,
    /// Times a handler was requested while a hook was running.
    pub handlers_during_hook: AtomicUsize,
    /// Successful activations minus deactivations.
    pub balance: AtomicI64,
    pub hooks_run: AtomicUsize,
}

impl HookMonitor {
    fn enter(&self) {
        if self.in_hook.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.hooks_run.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which an overlapping hook would be seen.
        std::thread::sleep(Duration::from_micros(200));
    }

    fn exit(&self) {
        self.in_hook.store(false, Ordering::SeqCst);
    }
}

/// A module that reports overlapping lifecycle hooks to a [`HookMonitor`].
pub struct ExclusiveModule {
    name: String,
    monitor: Arc<HookMonitor>,
    config: Option<Arc<ServerConfig>>,
}

impl ExclusiveModule {
    pub fn new(name: &str, monitor: &Arc<HookMonitor>) -> Self {
        Self {
            name: name.to_string(),
            monitor: monitor.clone(),
            config: None,
        }
    }
}

impl Module for ExclusiveModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_activate(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.monitor.enter();
        self.config = Some(cfg.clone());
        self.monitor.balance.fetch_add(1, Ordering::SeqCst);
        self.monitor.exit();
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), ModuleFault> {
        self.monitor.enter();
        self.config = None;
        self.monitor.balance.fetch_sub(1, Ordering::SeqCst);
        self.monitor.exit();
        Ok(())
    }

    fn on_config_change(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.monitor.enter();
        self.config = Some(cfg.clone());
        self.monitor.exit();
        Ok(())
    }

    fn new_request_handler(&self) -> Result<Box<dyn RequestHandler>, ModuleFault> {
        if self.monitor.in_hook.load(Ordering::SeqCst) {
            self.monitor.handlers_during_hook.fetch_add(1, Ordering::SeqCst);
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| ModuleFault::internal("handler requested without a config"))?;
        Ok(Box::new(SnapshotHandler { id: 0, config }))
    }
}

/// Drive a handler with an empty GET and return its body as text.
pub async fn run_handler(handler: Box<dyn RequestHandler>) -> String {
    let request = Request::get("/").body(Bytes::new()).unwrap();
    let response = handler.handle(request).await.unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// Config snapshot stamped with `generation`.
pub fn snapshot(generation: u64) -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        generation,
        ..ServerConfig::default()
    })
}

/// True if every element is distinct.
pub fn all_unique<T: std::hash::Hash + Eq>(items: impl IntoIterator<Item = T>) -> bool {
    let mut seen = HashSet::new();
    items.into_iter().all(|item| seen.insert(item))
}
