//! Request boundary for the blockview kernel.
//!
//! Handlers take flat JSON argument maps, decode them once into typed
//! requests and answer with a `{code, msg, data}` envelope. They never panic.

pub mod api;
pub mod request;

pub use api::{event_message, ApiResult, BlockviewApi};
pub use request::RequestError;
