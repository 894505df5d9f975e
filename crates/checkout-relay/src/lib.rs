//! Backend relay between a browser checkout widget and the PayPal REST API.
//!
//! - [`token`]: client-credentials exchange and access-token cache
//! - [`gateway`]: authenticated Orders / Subscriptions calls
//! - [`normalize`]: upstream response to [`GatewayResult`]
//! - [`routes`]: browser-facing HTTP endpoints

pub mod config;
pub mod cors;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod normalize;
pub mod routes;
pub mod state;
pub mod token;
pub mod views;

pub use config::{Credentials, RelayConfig};
pub use error::RelayError;
pub use gateway::PaymentGateway;
pub use normalize::GatewayResult;
pub use state::AppState;
pub use token::TokenProvider;
