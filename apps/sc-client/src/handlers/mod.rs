//! Handlers 模块

pub mod metrics;
pub mod status;

pub use metrics::*;
pub use status::*;
