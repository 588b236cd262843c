//! Per-request context: one parsed request and one response builder,
//! passed by mutable reference through hooks and the handler. A context
//! is owned by exactly one connection task.

use crate::request::Request;
use crate::response::Response;

#[derive(Debug)]
pub struct Context {
    pub request: Request,
    pub response: Response,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Context {
            request,
            response: Response::new(),
        }
    }
}
