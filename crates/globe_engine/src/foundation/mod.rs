//! Shared low-level utilities

pub mod logging;
