//! Bouncer - Fixed-Window Rate Limiting for Edge Functions
//!
//! This crate implements the request rate limiter consulted by edge function
//! handlers before they do any other work. Each caller key gets a fixed
//! window and a request budget; once the budget is spent the caller receives
//! a standard 429 response until the window ends. State is in-memory and
//! local to one process.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod tasks;
