//! Lane-keeping perception-to-steering pipeline for small RC vehicles on no-std platforms.
//!
//! For a runnable host harness, see the `lanekeep-app/mock-car` binary.
#![no_std]

extern crate alloc;

pub mod utils;
