//! HTTP middleware stack and request extractors.

pub mod caller;
pub mod cors;
pub mod trace;

pub use caller::CallerId;
