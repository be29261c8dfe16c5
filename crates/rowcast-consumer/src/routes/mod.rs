//! HTTP route handlers.

pub mod consumer;
