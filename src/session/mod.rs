//! Upstream host sessions.
//!
//! An [`ApiSession`] pairs one upstream host with an HTTP client and runs the
//! request cycle every endpoint shares:
//!
//! 1. wait on a [`RequestGate`](crate::rate_limit::RequestGate)
//! 2. send the request
//! 3. feed the response's rate limit headers back into the gate
//! 4. decode the body, map "not found" to `None` and classify errors

mod client;

pub use client::{ApiSession, ApiSessionBuilder};
