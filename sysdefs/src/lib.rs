//! sysdefs (System Definitions) is a small crate meant exclusively to contain
//! definitions for basic persistent memory platform concepts, abstractions,
//! and constants.
//!
//! As the name implies, the crate mainly provides definitions, and should
//! contain minimal or no behavior at all.
//!

pub mod interleave;
pub mod memory_modes;
