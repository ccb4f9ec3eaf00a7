//! Test module for zod-openapi-plugin
//!
//! Document generation scenarios, request-time adapter behaviour through the
//! in-process server, and property-based tests using proptest.

#[cfg(test)]
pub mod document_tests;
