//! ubcgen: generator for SHA-1 unavoidable-bit-condition checkers.
//!
//! Every known SHA-1 collision attack follows one of a small family of
//! disturbance vectors (DVs), and each DV forces a set of linear bit
//! conditions on the expanded message of the attacked compression — its
//! unavoidable bit conditions (UBCs). A collision-detecting SHA-1 therefore
//! only needs to re-verify the DVs whose UBCs a message actually satisfies,
//! and that check sits in the hot loop of every hashed block.
//!
//! This crate generates that check. It provides:
//! - DV construction and message-expansion algebra ([`dv`])
//! - parsing of per-DV bit-relation files ([`input`])
//! - bit-relation spans and the greedy global selection that maximizes
//!   sharing across DVs ([`bitrel`], [`selector`])
//! - minimum set-cover of state-snapshot steps ([`cover`])
//! - emission of the optimized C checker, its verifier and a SIMD variant
//!   ([`codegen`])
//! - save/load of intermediate selection state ([`persist`])

pub mod bitrel;
pub mod codegen;
pub mod cover;
pub mod dv;
pub mod error;
pub mod input;
pub mod persist;
pub mod selector;

// Re-exports for convenience
pub use bitrel::{Basis, BitRel};
pub use codegen::{CodeGen, GeneratedCode, Strategy};
pub use dv::DisturbanceVector;
pub use error::{Error, Result};
