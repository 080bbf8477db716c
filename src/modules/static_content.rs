//! Static content module: serves a fixed body taken from configuration.
//!
//! ```toml
//! [modules.static]
//! body = "hello"
//! content_type = "text/plain; charset=utf-8"
//! status = 200
//! ```
//!
//! Activation fails without a `body`. A config change that does not decode
//! leaves the previous content in place.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Response, StatusCode};
use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::module::{HandlerRequest, HandlerResult, Module, ModuleFault, RequestHandler};

pub const NAME: &str = "static";

#[derive(Debug, Clone, Deserialize)]
pub struct StaticSettings {
    pub body: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_status")]
    pub status: u16,
}

fn default_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

fn default_status() -> u16 {
    200
}

/// Prepared response parts, shared by every handler issued under them.
#[derive(Debug)]
struct Content {
    body: Bytes,
    content_type: HeaderValue,
    status: StatusCode,
    generation: u64,
}

impl Content {
    fn from_config(cfg: &ServerConfig) -> Result<Self, ModuleFault> {
        let settings: StaticSettings = cfg.module_settings(NAME)?;
        let content_type = HeaderValue::from_str(&settings.content_type)
            .map_err(|_| ModuleFault::config(format!("invalid content_type `{}`", settings.content_type)))?;
        let status = StatusCode::from_u16(settings.status)
            .map_err(|_| ModuleFault::config(format!("invalid status {}", settings.status)))?;

        Ok(Self {
            body: Bytes::from(settings.body),
            content_type,
            status,
            generation: cfg.generation,
        })
    }
}

#[derive(Debug, Default)]
pub struct StaticModule {
    content: Option<Arc<Content>>,
}

impl StaticModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for StaticModule {
    fn name(&self) -> &str {
        NAME
    }

    fn on_activate(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        self.content = Some(Arc::new(Content::from_config(cfg)?));
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), ModuleFault> {
        self.content = None;
        Ok(())
    }

    fn on_config_change(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault> {
        // Build first, swap after: a bad config never replaces good content.
        let content = Content::from_config(cfg)?;
        self.content = Some(Arc::new(content));
        Ok(())
    }

    fn new_request_handler(&self) -> Result<Box<dyn RequestHandler>, ModuleFault> {
        let content = self
            .content
            .clone()
            .ok_or_else(|| ModuleFault::unavailable("no content loaded"))?;
        Ok(Box::new(StaticHandler { content }))
    }
}

struct StaticHandler {
    content: Arc<Content>,
}

impl RequestHandler for StaticHandler {
    fn handle(self: Box<Self>, _request: HandlerRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            Response::builder()
                .status(self.content.status)
                .header(header::CONTENT_TYPE, self.content.content_type.clone())
                .header("x-config-generation", self.content.generation)
                .body(Body::from(self.content.body.clone()))
                .map_err(|e| ModuleFault::internal(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;

    fn config(generation: u64, settings: &str) -> Arc<ServerConfig> {
        let mut config = ServerConfig {
            generation,
            ..ServerConfig::default()
        };
        config.modules.insert(NAME.into(), toml::from_str(settings).unwrap());
        Arc::new(config)
    }

    async fn body_of(handler: Box<dyn RequestHandler>) -> Bytes {
        let response = handler.handle(Request::new(Bytes::new())).await.unwrap();
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[test]
    fn activation_requires_body() {
        let mut module = StaticModule::new();
        let fault = module.on_activate(&Arc::new(ServerConfig::default())).unwrap_err();
        assert!(matches!(fault, ModuleFault::Config(_)));
        assert!(module.new_request_handler().is_err());
    }

    #[tokio::test]
    async fn issued_handlers_keep_their_snapshot() {
        let mut module = StaticModule::new();
        module.on_activate(&config(1, r#"body = "one""#)).unwrap();
        let old = module.new_request_handler().unwrap();

        module.on_config_change(&config(2, r#"body = "two""#)).unwrap();
        let new = module.new_request_handler().unwrap();

        assert_eq!(&body_of(old).await[..], b"one");
        assert_eq!(&body_of(new).await[..], b"two");
    }

    #[tokio::test]
    async fn bad_config_change_keeps_previous_content() {
        let mut module = StaticModule::new();
        module.on_activate(&config(1, r#"body = "one""#)).unwrap();

        let fault = module
            .on_config_change(&config(2, "body = \"two\"\nstatus = 42"))
            .unwrap_err();
        assert!(matches!(fault, ModuleFault::Config(_)));
        assert_eq!(&body_of(module.new_request_handler().unwrap()).await[..], b"one");
    }
}
