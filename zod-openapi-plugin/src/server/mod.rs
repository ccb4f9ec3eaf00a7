//! In-process server harness
//!
//! Stands in for an HTTP server: routes are registered on a
//! [`ServerBuilder`], plugins receive the route and ready hooks, and the
//! resulting [`ReadyServer`] handles injected requests the way a server
//! would, running the validator and serializer adapters on every call.

mod builder;
mod core;
mod pattern;

pub use builder::ServerBuilder;
pub use core::{ErrorHandler, InjectRequest, InjectResponse, ReadyServer};
