//! The auto-auth loop: authenticate, renew, back off, publish.

pub mod auth_handler;
pub mod authenticator;
pub mod envelope;
pub mod renewer;

pub use auth_handler::{AuthHandler, AuthHandlerConfig};
pub use authenticator::Authenticator;
pub use envelope::{TokenEnvelope, TokenOrigin};
pub use renewer::{RenewalOutcome, RenewalStream, Renewer};
