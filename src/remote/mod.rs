//! Remote management-API collaborator
//!
//! The framework treats the remote client as an injected black box; this
//! module provides the concrete handle resource definitions use.
//!
//! - [`auth`] - credential provider seam with token caching
//! - [`http`] - reqwest wrapper with typed status mapping
//! - [`client`] - the project-scoped client handle

pub mod auth;
pub mod client;
pub mod http;

pub use auth::{Credentials, EnvToken, StaticToken, TokenProvider};
pub use client::ApiClient;
pub use http::{HttpClient, RemoteError};
