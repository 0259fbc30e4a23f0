//! Braggi LSP bridge
//!
//! Converts core diagnostics to LSP shape and publishes them from a stdio
//! server. Internal positions are 1-based; the conversion here is the only
//! place they become 0-based.

pub mod diagnostics;
