//! dmgreet-core: wire protocol and shared types for the dmgreet greeter.
//!
//! This crate provides:
//! - Typed greeter/daemon message definitions and the big-endian wire codec
//! - Incremental frame assembly for partial reads over a byte stream
//! - Error taxonomy shared by the greeter library
//! - Logging setup

pub mod codec;
pub mod constants;
pub mod error;
pub mod logging;
pub mod message;
pub mod wire;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use message::{GreeterMessage, PromptStyle, ServerMessage};
