//! # Auth Agent Library
//!
//! Exchanges locally available credentials for a short-lived Vault token,
//! keeps the token alive through renewal and publishes every fresh token on
//! a channel for downstream consumers.
//!
//! Modules:
//! - `auth`: auth method contract and the alicloud / approle / jwt methods
//! - `client`: login, renew-self and unwrap calls against the server
//! - `handler`: the authenticate / renew / back off loop
//! - `resilience`: retry backoff policy
//! - `config`: YAML configuration, defaults and validation

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::auth::ServiceConfig;
pub use crate::error::{AuthError, ExhaustReason, MethodError};
pub use crate::handler::{AuthHandler, AuthHandlerConfig, TokenEnvelope};
