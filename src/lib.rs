//! Typed access to collections in a remote document store, with a short-lived
//! shared cache, plus the HR feature hooks built on it.

pub mod cache;
pub mod client;
pub mod collections;
pub mod config;
pub mod hr;
pub mod logging;
pub mod store;

#[cfg(test)]
mod testing;
