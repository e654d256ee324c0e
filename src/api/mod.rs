//! API Module
//!
//! This module exposes the passport contract over REST. Routes validate
//! their input, delegate to a [`crate::chain::DppLedger`] and translate the
//! outcome to HTTP at a single boundary ([`ApiError`]).

mod error;
pub mod models;
mod server;

pub use error::ApiError;
pub use server::{AppState, Server, router};
