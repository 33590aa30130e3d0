//! Small `std` abstractions for the IDP monitoring services.
//!
//! | Concern | Trait | Production | Test |
//! |---------|-------|------------|------|
//! | Env vars | [`ReadEnv`] | [`SystemEnv`] | [`InMemoryEnv`]* |
//!
//! *Available with `#[cfg(test)]` or the `"test-support"` feature.
//!
//! On top of raw lookups, [`env`] provides the parsing rules every service
//! follows: numbers fall back to their default with a warning, JSON values
//! are strict. [`signal`] holds the [`Shutdown`] switch both binaries stop on.

pub mod env;
pub mod signal;

pub use env::{JsonVarError, ReadEnv, SystemEnv, json_var, parse_var};
pub use signal::{Shutdown, shutdown_signal};

#[cfg(any(test, feature = "test-support"))]
pub use env::InMemoryEnv;
