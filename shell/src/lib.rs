//! Terminal shell for the taxi dispatch dashboard core: executes HTTP and
//! timer effects with tokio and reqwest, renders view models through
//! `tracing`, and reads user commands from stdin.

#![forbid(unsafe_code)]
#![deny(clippy::all)]

pub mod commands;
pub mod config;
pub mod error;
pub mod render;
pub mod runtime;
pub mod transport;

pub use config::ShellConfig;
pub use error::{ConfigError, ShellError};
pub use render::{LogRenderer, Renderer};
pub use runtime::{Shell, ShellHandle};
pub use transport::{ReqwestTransport, Transport};
