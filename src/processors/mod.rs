//! Processor implementations

pub mod exception_backtrace;
pub mod id_maker;
pub mod lifecycle_token;

pub use exception_backtrace::ExceptionBacktrace;
pub use id_maker::{decode_id, IdMaker};
pub use lifecycle_token::{generate_token, CorrelationScope, LifecycleTokenInjector};

pub use crate::core::Processor;
