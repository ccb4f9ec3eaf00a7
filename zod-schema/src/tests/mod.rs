//! Test module for zod-schema
//!
//! Parsing behaviour, issue reporting and property-based checks of the
//! parse contract.

#[cfg(test)]
pub mod parse_tests;

#[cfg(test)]
pub mod property_tests;
