//! HTTP plumbing: the outbound JWKS client and the inbound verification endpoint.

pub mod client;
pub mod server;
