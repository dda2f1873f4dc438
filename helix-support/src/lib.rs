//! # Helix Support
//!
//! Shared helpers for the Helix crates.
//!
//! This crate provides:
//! - Rendering of resolution chains and candidate lists for diagnostics
//! - "Did you mean?" matching used by container and router errors

pub mod rendering;
