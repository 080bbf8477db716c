//! Fault containment at the module boundary.
//!
//! Every call into module code goes through one of these helpers so that a
//! panic inside a module surfaces as `ModuleFault::Panicked` instead of
//! unwinding into the server.

use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;

use crate::module::{HandlerRequest, HandlerResult, ModuleFault, RequestHandler};

/// Run a synchronous module call, converting a panic into a fault.
pub fn contain<T>(f: impl FnOnce() -> Result<T, ModuleFault>) -> Result<T, ModuleFault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ModuleFault::from_panic(payload)),
    }
}

/// Drive a handler to completion, containing panics raised while building
/// or polling its future.
pub async fn drive(handler: Box<dyn RequestHandler>, request: HandlerRequest) -> HandlerResult {
    let future = contain(|| Ok(handler.handle(request)))?;
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ModuleFault::from_panic(payload)),
    }
}
