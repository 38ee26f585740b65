//! Disturbance vectors and their message-difference expansion.
//!
//! A disturbance vector is an 80-word vector satisfying the SHA-1 message
//! expansion recurrence. Any 16 consecutive words determine the rest, so a
//! DV can be built from a symbolic `(type, K, b)` triple, from a raw 16-word
//! window at an arbitrary offset, or from a name string like `"II(46,0)"`.
//! Each DV carries the derived message difference `DW` that a colliding
//! message pair following the DV's trail must exhibit.

use std::ops::RangeInclusive;

use crate::bitrel::NWORDS;
use crate::error::{Error, Result};

/// A candidate SHA-1 difference trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisturbanceVector {
    /// The expanded disturbance words.
    pub dv: [u32; NWORDS],
    /// The induced message difference.
    pub dw: [u32; NWORDS],
    /// 1 or 2; 0 when constructed from raw words.
    pub dv_type: i32,
    pub k: i32,
    pub b: i32,
}

/// Expand `v` to a full message-expansion-closed vector from the 16
/// sequential words starting at `offset`, backward then forward.
fn expand(v: &mut [u32; NWORDS], offset: usize) {
    for i in (0..offset).rev() {
        v[i] = v[i + 16].rotate_right(1) ^ v[i + 13] ^ v[i + 8] ^ v[i + 2];
    }
    for i in offset + 16..NWORDS {
        v[i] = (v[i - 3] ^ v[i - 8] ^ v[i - 14] ^ v[i - 16]).rotate_left(1);
    }
}

impl DisturbanceVector {
    /// Build from the symbolic triple: type ∈ {1,2}, K ∈ [0,64], b ∈ [0,31].
    pub fn new(dv_type: i32, k: i32, b: i32) -> Result<Self> {
        if !(1..=2).contains(&dv_type) {
            return Err(Error::Range {
                what: "DV type",
                value: dv_type as i64,
                allowed: "1..=2",
            });
        }
        if !(0..=64).contains(&k) {
            return Err(Error::Range {
                what: "DV step K",
                value: k as i64,
                allowed: "0..=64",
            });
        }
        if !(0..=31).contains(&b) {
            return Err(Error::Range {
                what: "DV bit b",
                value: b as i64,
                allowed: "0..=31",
            });
        }

        let k_us = k as usize;
        let mut dv = [0u32; NWORDS];
        dv[k_us + 15] = 1u32 << b;
        if dv_type == 2 {
            dv[k_us + 1] = (1u32 << 31).rotate_left(b as u32);
            dv[k_us + 3] = (1u32 << 31).rotate_left(b as u32);
        }
        expand(&mut dv, k_us);

        Ok(DisturbanceVector {
            dv,
            dw: derive_dw(&dv),
            dv_type,
            k,
            b,
        })
    }

    /// Build from 16 raw disturbance words placed at `offset` ∈ [0,64].
    pub fn from_words(disturbances: &[u32; 16], offset: usize) -> Result<Self> {
        if offset > 64 {
            return Err(Error::Range {
                what: "disturbance window offset",
                value: offset as i64,
                allowed: "0..=64",
            });
        }
        let mut dv = [0u32; NWORDS];
        dv[offset..offset + 16].copy_from_slice(disturbances);
        expand(&mut dv, offset);

        Ok(DisturbanceVector {
            dv,
            dw: derive_dw(&dv),
            dv_type: 0,
            k: 0,
            b: 0,
        })
    }

    /// Parse a name like `"I(K,b)"` or `"II(K,b)"`; `_` is accepted in place
    /// of the punctuation, so `"II_52_0"` works too.
    pub fn from_name(name: &str) -> Result<Self> {
        let malformed = || Error::InputFormat(format!("DV name incorrect: {name}"));

        let rest = name.trim_start_matches('I');
        let dv_type = name.len() - rest.len();
        if dv_type == 0 || dv_type > 2 {
            return Err(malformed());
        }

        let rest = rest.strip_prefix(['(', '_']).ok_or_else(malformed)?;
        let (k_str, rest) = rest.split_once([',', '_']).ok_or_else(malformed)?;
        let b_str = &rest[..rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len())];

        let k: i32 = k_str.parse().map_err(|_| malformed())?;
        let b: i32 = b_str.parse().map_err(|_| malformed())?;
        DisturbanceVector::new(dv_type as i32, k, b)
    }

    /// Infer the symbolic name from the vector: scan for the 15-word
    /// near-zero window and classify it as type I, II, or unknown.
    pub fn name(&self) -> String {
        for k in 0..=64usize {
            if self.dv[k + 4..=k + 14].iter().any(|&w| w != 0) {
                continue;
            }
            if self.dv[k + 15].count_ones() != 1 {
                continue;
            }
            let b = self.dv[k + 15].trailing_zeros();

            if self.dv[k + 1] == 0 {
                if self.dv[k] == 0 && self.dv[k + 2] == 0 && self.dv[k + 3] == 0 {
                    return format!("I({},{})", k, b);
                }
            } else {
                let rb = (1u32 << 31).rotate_left(b);
                if self.dv[k] == 0
                    && self.dv[k + 1] == rb
                    && self.dv[k + 2] == 0
                    && self.dv[k + 3] == rb
                {
                    return format!("II({},{})", k, b);
                }
            }
            return format!("unknown({},{})", k, b);
        }
        "unknown".to_string()
    }

    /// Step indices at which this DV's trail can be verified by snapshotting
    /// the working state: `[K+5, K+15]` for type I, `[K+9, K+15]` for
    /// type II.
    pub fn test_steps(&self) -> Result<RangeInclusive<i32>> {
        match self.dv_type {
            1 => Ok(self.k + 5..=self.k + 15),
            2 => Ok(self.k + 9..=self.k + 15),
            _ => Err(Error::Invariant(format!(
                "no testable step range for DV type {}",
                self.dv_type
            ))),
        }
    }
}

/// Derive the message difference from a disturbance vector through the SHA-1
/// step algebra, then expand it from its middle window.
fn derive_dw(dv: &[u32; NWORDS]) -> [u32; NWORDS] {
    let mut dw = [0u32; NWORDS];
    for i in 16..32 {
        dw[i] = dv[i]
            ^ dv[i - 1].rotate_left(5)
            ^ dv[i - 2]
            ^ dv[i - 3].rotate_left(30)
            ^ dv[i - 4].rotate_left(30)
            ^ dv[i - 5].rotate_left(30);
    }
    expand(&mut dw, 16);
    dw
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_expansion_closed(v: &[u32; NWORDS]) {
        for i in 16..NWORDS {
            assert_eq!(
                v[i],
                (v[i - 3] ^ v[i - 8] ^ v[i - 14] ^ v[i - 16]).rotate_left(1),
                "forward recurrence fails at {i}"
            );
        }
        for i in 0..64 {
            assert_eq!(
                v[i],
                v[i + 16].rotate_right(1) ^ v[i + 13] ^ v[i + 8] ^ v[i + 2],
                "inverse recurrence fails at {i}"
            );
        }
    }

    #[test]
    fn type_one_window() {
        let dv = DisturbanceVector::new(1, 0, 0).unwrap();
        assert_eq!(dv.dv[15], 1);
        assert_eq!(&dv.dv[0..15], &[0; 15]);
        // DV[16] = rotl(DV[13] ^ DV[8] ^ DV[2] ^ DV[0], 1) = 0
        assert_eq!(dv.dv[16], 0);
        assert_eq!(dv.name(), "I(0,0)");
    }

    #[test]
    fn type_two_window() {
        let dv = DisturbanceVector::new(2, 10, 3).unwrap();
        let rb = (1u32 << 31).rotate_left(3);
        assert_eq!(dv.dv[25], 1 << 3);
        assert_eq!(dv.dv[11], rb);
        assert_eq!(dv.dv[13], rb);
        assert_eq!(dv.name(), "II(10,3)");
    }

    #[test]
    fn bounds_are_checked() {
        assert!(DisturbanceVector::new(0, 0, 0).is_err());
        assert!(DisturbanceVector::new(3, 0, 0).is_err());
        assert!(DisturbanceVector::new(1, 65, 0).is_err());
        assert!(DisturbanceVector::new(1, 0, 32).is_err());
        assert!(DisturbanceVector::from_words(&[0; 16], 65).is_err());
    }

    #[test]
    fn name_parsing_accepts_both_separators() {
        for name in ["II(46,0)", "II_46_0", "II(46_0)"] {
            let dv = DisturbanceVector::from_name(name).unwrap();
            assert_eq!((dv.dv_type, dv.k, dv.b), (2, 46, 0));
        }
        // Trailing close paren and junk after b are ignored.
        let dv = DisturbanceVector::from_name("I(48,5)").unwrap();
        assert_eq!((dv.dv_type, dv.k, dv.b), (1, 48, 5));
    }

    #[test]
    fn name_parsing_rejects_garbage() {
        for name in ["", "III(0,0)", "X(1,2)", "I", "I(", "I(5)", "I(a,b)"] {
            assert!(
                DisturbanceVector::from_name(name).is_err(),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn from_words_matches_symbolic() {
        let sym = DisturbanceVector::new(1, 20, 7).unwrap();
        let mut window = [0u32; 16];
        window.copy_from_slice(&sym.dv[20..36]);
        let raw = DisturbanceVector::from_words(&window, 20).unwrap();
        assert_eq!(raw.dv, sym.dv);
        assert_eq!(raw.dw, sym.dw);
        assert_eq!(raw.name(), "I(20,7)");
    }

    #[test]
    fn test_steps_by_type() {
        let one = DisturbanceVector::new(1, 40, 0).unwrap();
        assert_eq!(one.test_steps().unwrap(), 45..=55);
        let two = DisturbanceVector::new(2, 40, 0).unwrap();
        assert_eq!(two.test_steps().unwrap(), 49..=55);

        let mut raw = DisturbanceVector::from_words(&[1; 16], 0).unwrap();
        raw.dv_type = 7;
        assert!(raw.test_steps().is_err());
    }

    proptest! {
        #[test]
        fn expansion_closure(dv_type in 1i32..=2, k in 0i32..=64, b in 0i32..=31) {
            let dv = DisturbanceVector::new(dv_type, k, b).unwrap();
            assert_expansion_closed(&dv.dv);
            assert_expansion_closed(&dv.dw);
        }

        #[test]
        fn name_round_trip(dv_type in 1i32..=2, k in 0i32..=58, b in 0i32..=31) {
            let dv = DisturbanceVector::new(dv_type, k, b).unwrap();
            let expect = format!("{}({},{})", if dv_type == 1 { "I" } else { "II" }, k, b);
            prop_assert_eq!(dv.name(), expect);
        }

        #[test]
        fn dw_window_relation(dv_type in 1i32..=2, k in 0i32..=64, b in 0i32..=31) {
            let dv = DisturbanceVector::new(dv_type, k, b).unwrap();
            for i in 16..32 {
                let expect = dv.dv[i]
                    ^ dv.dv[i - 1].rotate_left(5)
                    ^ dv.dv[i - 2]
                    ^ dv.dv[i - 3].rotate_left(30)
                    ^ dv.dv[i - 4].rotate_left(30)
                    ^ dv.dv[i - 5].rotate_left(30);
                prop_assert_eq!(dv.dw[i], expect);
            }
        }
    }
}
