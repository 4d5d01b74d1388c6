//! seghash - segment hashing and verification of forensic disk images
//!
//! An image is split into fixed-size, sector-aligned segments and each segment
//! is hashed with up to two algorithms, producing one manifest per algorithm
//! (`<hex digest>,<start LBA>,<end LBA>` rows). A manifest can later be
//! replayed against the image to find the segments that changed.

pub mod calc;
pub mod cli;
pub mod common;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod verify;

pub use calc::{calculate, CalcOptions, CalcOutcome};
pub use common::HashAlgorithm;
pub use error::{Result, SeghashError};
pub use verify::{verify, Verifier, VerifyOptions, VerifyOutcome};
