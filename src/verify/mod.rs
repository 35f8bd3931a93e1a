//! Hash-check module
//!
//! Re-hashes content on disk and compares every piece with the digests
//! recorded in a metainfo.

pub mod check;

pub use check::{CheckEvent, CheckOptions, CheckReport, HashCheck, PieceCheck};
