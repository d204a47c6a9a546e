//! Single-slot, time-bounded JWKS cache.

pub mod entry;
pub mod provider;
pub mod state;
