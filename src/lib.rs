pub use crate::config::{HiveSpec, HiveSpecLoader, HiveSpecLoaderFile, ProcessSpec};
pub use crate::message::{HiveMessage, MessageType};
pub use crate::supervisor::Supervisor;

pub mod cli;
pub mod config;
pub mod context;
pub mod event;
pub mod logging;
pub mod machine;
pub mod message;
pub mod sequence;
pub mod store;
pub mod supervisor;
