//! Spigot - Shared-Custody Token Faucet
//!
//! This crate implements the admission and serialization layer of a token
//! faucet: a service holding one signing account per chain that lets many
//! concurrent, untrusted HTTP requests each trigger at most one outbound
//! transfer. Admission is guarded by a durable, multi-key, sliding-window
//! rate limiter; submission is serialized per chain so concurrent transfers
//! never race the signer's transaction sequence.

pub mod admission;
pub mod chain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod ratelimit;
