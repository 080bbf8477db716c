//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the module that serves a request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - Ties keep configuration order
//! - Explicit `None` rather than silent default

use axum::http::request::Parts;

use crate::config::RouteConfig;
use crate::routing::matcher::{HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub module: String,
    pub priority: u32,
    matchers: Vec<Box<dyn Matcher>>,
}

impl Route {
    pub fn compile(config: &RouteConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        Self {
            name: config.name.clone(),
            module: config.module.clone(),
            priority: config.priority,
            matchers,
        }
    }

    pub fn matches(&self, req: &Parts) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// Immutable request → module routing table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs.iter().map(Route::compile).collect();
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::debug!(routes = routes.len(), "Router compiled");
        Self { routes }
    }

    /// First route, by priority, whose conditions all hold.
    pub fn match_request(&self, req: &Parts) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(req))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
