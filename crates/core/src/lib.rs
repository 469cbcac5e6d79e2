//! Core emulator primitives shared by the RCP component crates.

pub mod logging;
