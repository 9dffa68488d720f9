//! Node-configuration authoring for the irrigation console: the farm/zone
//! hierarchy, the node wizard, and the backend client it talks through.

pub mod api;
pub mod assembler;
pub mod config;
pub mod document;
pub mod draft;
pub mod error;
pub mod hierarchy;
pub mod http;
pub mod model;
pub mod repository;
pub mod session;
pub mod submit;
pub mod wizard;

#[cfg(test)]
mod fake;

pub use error::{ConsoleError, ConsoleResult};
