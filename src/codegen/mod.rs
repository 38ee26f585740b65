//! Emission of the optimized C checker from the selection results.
//!
//! The pipeline ends by translating every chosen bit-relation into a short
//! arithmetic expression over the expanded message words and arranging those
//! expressions into one of three checker bodies:
//!
//! 1. **v3**: one `if` per DV over its own relations — the readable
//!    reference, no cross-DV sharing.
//! 2. **v1**: an unconditional AND-chain over shared relations followed by
//!    per-DV `if` blocks; constant-time when `min_dvs = 1`.
//! 3. **v2** (default): like v1 but each shared relation may be gated on
//!    its DVs still being live, using a probability estimate of how likely
//!    that is after the relations already emitted.
//!
//! Alongside the checker we emit its header, a brute-force verifier that
//! re-evaluates every DV's full basis, and a SIMD include built from
//! macro-abstracted vector ops.

pub mod checker;
pub mod expr;

pub use checker::{CodeGen, GeneratedCode, Strategy};
