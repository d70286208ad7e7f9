//! Turnstile - In-Process Admission Control Engine
//!
//! This crate implements a rate-limit decision engine: given an incoming
//! request and an ordered list of rule references, it decides whether the
//! request may proceed, partitioning counters by a resolvable discriminator
//! (client token, remote address, or a host-defined custom dimension) and
//! enforcing per-rule quotas over fixed time windows.
//!
//! The hosting layer owns transport concerns: it assembles a
//! [`RequestContext`](discriminator::RequestContext) from the request, maps
//! a denied [`Decision`](evaluator::Decision) to its protocol's rejection,
//! and emits whatever observability signals it wants. Counters live in
//! process memory only; distributed counter sharing is out of scope.

pub mod clock;
pub mod config;
pub mod discriminator;
pub mod error;
pub mod evaluator;
pub mod resources;
pub mod rules;
pub mod store;
