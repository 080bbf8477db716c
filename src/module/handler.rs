//! Per-request handler contract.

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use crate::module::ModuleFault;

/// A fully buffered incoming request, as handed to a handler.
pub type HandlerRequest = Request<Bytes>;

/// Outcome of driving a handler to completion.
pub type HandlerResult = Result<Response<Body>, ModuleFault>;

/// A single-request worker produced by a [`Module`](crate::module::Module).
///
/// The handler owns the processing of exactly one request and is consumed by
/// [`handle`](RequestHandler::handle), so it cannot outlive that request.
/// Sibling handlers from the same module must not share unsynchronized
/// mutable state.
pub trait RequestHandler: Send + 'static {
    fn handle(self: Box<Self>, request: HandlerRequest) -> BoxFuture<'static, HandlerResult>;
}
