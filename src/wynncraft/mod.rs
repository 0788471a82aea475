//! Wynncraft v3 API client.
//!
//! Wynncraft reports the calls left in the current minute on every response,
//! so all requests share one
//! [`ReservableRateLimit`](crate::rate_limit::ReservableRateLimit) that is
//! reconciled against those headers. Background workers reserve a batch of
//! calls up front with [`WynncraftClient::reserve`] before fanning out.

mod client;
pub mod endpoints;

pub use client::{WynncraftClient, WynncraftClientBuilder};
