//! Client library for display-manager greeters.
//!
//! A greeter is the login UI a display manager spawns; it talks back to
//! the daemon over a pair of inherited pipes using a framed binary
//! protocol. This crate owns the client side of that conversation —
//! handshake, authentication exchange, session start — plus the local
//! facts a login screen needs: loggable users (live-updating), installed
//! sessions, locales, keyboard layouts, and system power capabilities.
//!
//! ```no_run
//! use dmgreet_greeter::{Greeter, GreeterEvent};
//!
//! # async fn example() -> dmgreet_core::Result<()> {
//! let (mut greeter, mut events) = Greeter::from_env()?;
//! greeter.connect().await?;
//! greeter.login(Some("alice")).await?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GreeterEvent::ShowPrompt { .. } => { /* collect and respond */ }
//!         GreeterEvent::AuthenticationComplete => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod connection;
pub mod event;
pub mod greeter;
pub mod hints;
pub mod keyfile;
pub mod locale;
pub mod power;
pub mod sessions;
pub mod users;

pub use connection::Connection;
pub use event::{GreeterEvent, MessageKind, PromptKind};
pub use greeter::Greeter;
pub use locale::{Language, Layout};
pub use power::PowerManager;
pub use sessions::Session;
pub use users::{User, UserChange, UserDirectory, UserHandle};
