pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod handlers;
pub mod hierarchy;
pub mod host;
pub mod memory;
pub mod mode;
pub mod model;
pub mod ops;
pub mod proxy;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod scope;

pub use error::{RigError, RigResult};
pub use reconcile::{PassReport, RigPhysics};
pub use runtime::RigRuntime;
