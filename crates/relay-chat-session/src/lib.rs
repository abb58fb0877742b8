//! Session controller for the realtime chat client.
//!
//! Provides:
//! - `SessionController` - Own the live channel, the message log and reconnects
//! - `ConnectionHealth` - UI-facing summary of the channel state
//! - `ClientConfig` - Endpoint and liveness probe settings

pub mod config;
pub mod controller;
pub mod health;

pub use config::ClientConfig;
pub use controller::{SessionController, SessionError};
pub use health::ConnectionHealth;
