//! Request and response models for the offline worker.
//!
//! - `Request`, `RequestMode`: an intercepted fetch and how it was issued
//! - `Response`, `ResponseKind`: a fetch result, with explicit duplication
//!   for responses that feed more than one consumer

pub mod request;
pub mod response;

pub use request::{Request, RequestMode};
pub use response::{Response, ResponseKind};
