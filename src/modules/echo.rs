//! Echo module: answers every request with a description of itself.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::module::{HandlerRequest, HandlerResult, Module, ModuleFault, RequestHandler};

pub const NAME: &str = "echo";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EchoSettings {
    /// Include request headers in the echoed text.
    pub include_headers: bool,
}

impl Default for EchoSettings {
    fn default() -> Self {
        Self { include_headers: true }
    }
}

#[derive(Debug, Default)]
pub struct EchoModule {
    settings: Option<Arc<EchoSettings>>,
}

impl EchoModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for EchoModule {
    fn name(&self) -> &str {
        NAME
    }

    fn on_activate(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.settings = Some(Arc::new(cfg.module_settings(NAME)?));
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), ModuleFault> {
        self.settings = None;
        Ok(())
    }

    fn on_config_change(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        let settings: EchoSettings = cfg.module_settings(NAME)?;
        self.settings = Some(Arc::new(settings));
        Ok(())
    }

    fn new_request_handler(&self) -> Result<Box<dyn RequestHandler>, ModuleFault> {
        let settings = self
            .settings
            .clone()
            .ok_or_else(|| ModuleFault::unavailable("echo settings not loaded"))?;
        Ok(Box::new(EchoHandler { settings }))
    }
}

struct EchoHandler {
    settings: Arc<EchoSettings>,
}

impl RequestHandler for EchoHandler {
    fn handle(self: Box<Self>, request: HandlerRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();

            let mut text = format!("{} {}\n", parts.method, parts.uri);
            if self.settings.include_headers {
                for (name, value) in &parts.headers {
                    let _ = writeln!(text, "{}: {}", name, value.to_str().unwrap_or("<binary>"));
                }
            }
            text.push('\n');

            let mut bytes = text.into_bytes();
            bytes.extend_from_slice(&body);

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(Body::from(bytes))
                .map_err(|e| ModuleFault::internal(e.to_string()))
        })
    }
}
