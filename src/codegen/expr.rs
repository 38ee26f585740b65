//! Translation of a single bit-relation into C and SIMD expressions.
//!
//! Every relation the selector keeps has exactly two active message bits
//! `(t1, b1)` and `(t2, b2)`: shift one word so the bits line up, XOR, and
//! inspect one bit. Four output shapes cover the emission strategies:
//! a boolean violation test, a full 0/−1 mask, a mask valid only on a given
//! bit range (which saves shifts and masks), and the same algebra spelled
//! with SIMD macros.

use crate::bitrel::BitRel;
use crate::error::Result;

/// C expression, non-zero iff the relation is *satisfied* (parity 1) or,
/// for parity 0, a negated test whose `!` the compiler can absorb into a
/// conditional jump.
pub fn bool_expression(rel: &BitRel, wname: &str) -> Result<String> {
    let ((t1, b1), (t2, b2)) = rel.active_pair()?;
    let w1 = format!("{wname}[{t1}]");
    let mut w2 = format!("{wname}[{t2}]");

    // shift W[t2] so bit b2 lands on bit b1, XOR, keep bit b1
    if b1 > b2 {
        w2 = format!("({}<<{})", w2, b1 - b2);
    } else if b2 > b1 {
        w2 = format!("({}>>{})", w2, b2 - b1);
    }
    let ret = format!("(({}^{}) & (1<<{}))", w1, w2, b1);

    if rel.parity() != 0 {
        Ok(ret)
    } else {
        Ok(format!("(!{ret})"))
    }
}

/// C expression evaluating to `0xFFFFFFFF` when the relation is satisfied
/// and `0` otherwise.
pub fn mask_expression(rel: &BitRel, wname: &str) -> Result<String> {
    let ((t1, b1), (t2, b2)) = rel.active_pair()?;
    let w1 = format!("{wname}[{t1}]");
    let w2 = format!("{wname}[{t2}]");
    let not = if rel.parity() == 0 { "~" } else { "" };

    if b1 == b2 {
        Ok(format!("(0-((({}^{}{})>>{})&1))", w1, not, w2, b1))
    } else {
        Ok(format!(
            "(0-((({}>>{})^({}{}>>{}))&1))",
            w1, b1, not, w2, b2
        ))
    }
}

/// C expression whose bits in the closed range `[lowbit, highbit]` are all 1
/// when the relation is satisfied and all 0 otherwise; bits outside the
/// range are undetermined. The slack is what makes the cheap forms legal.
pub fn ranged_mask_expression(
    rel: &BitRel,
    lowbit: u32,
    highbit: u32,
    wname: &str,
) -> Result<String> {
    let ((t1, b1), (t2, b2)) = rel.active_pair()?;
    let mut w1 = format!("{wname}[{t1}]");
    let mut w2 = format!("{wname}[{t2}]");
    // make b1 the lowest bit position
    let (b1, b2) = if b1 > b2 {
        std::mem::swap(&mut w1, &mut w2);
        (b2, b1)
    } else {
        (b1, b2)
    };
    let not = if rel.parity() == 0 { "~" } else { "" };

    if lowbit == highbit {
        // a single output bit never needs expanding to a full mask, so the
        // AND and the negate both drop out
        if b1 == b2 {
            let mut ret = format!("({}^{})", w1, w2);
            if b1 < lowbit {
                ret = format!("({}<<{})", ret, lowbit - b1);
            }
            if b1 > lowbit {
                ret = format!("({}>>{})", ret, b1 - lowbit);
            }
            return Ok(format!("({not}{ret})"));
        }
        if b1 < lowbit {
            w1 = format!("({}<<{})", w1, lowbit - b1);
        }
        if b1 > lowbit {
            w1 = format!("({}>>{})", w1, b1 - lowbit);
        }
        if b2 < lowbit {
            w2 = format!("({}<<{})", w2, lowbit - b2);
        }
        if b2 > lowbit {
            w2 = format!("({}>>{})", w2, b2 - lowbit);
        }
        return Ok(format!("({not}({}^{}))", w1, w2));
    }

    if b1 <= lowbit {
        // align b2 onto b1 and keep the bit in place; the subtract or the
        // negate then smears it across [lowbit, highbit]
        if b2 != b1 {
            w2 = format!("({}>>{})", w2, b2 - b1);
        }
        let ret = format!("(({}^{})&(1<<{}))", w1, w2, b1);
        return if rel.parity() == 0 {
            Ok(format!("({}-(1<<{}))", ret, b1))
        } else {
            Ok(format!("(0-{ret})"))
        };
    }

    let ret = if b1 == b2 {
        format!("((({}^{})>>{})&1)", w1, w2, b1)
    } else {
        format!("((({}>>{})^({}>>{}))&1)", w1, b1, w2, b2)
    };
    if rel.parity() == 0 {
        Ok(format!("({ret}-1)"))
    } else {
        Ok(format!("(0-{ret})"))
    }
}

/// The ranged mask expression over an opaque SIMD word type, spelled with
/// the `SIMD_*` macros the runtime headers define per lane width.
pub fn simd_expression(rel: &BitRel, lowbit: u32, highbit: u32, wname: &str) -> Result<String> {
    let ((t1, b1), (t2, b2)) = rel.active_pair()?;
    let mut w1 = format!("{wname}[{t1}]");
    let mut w2 = format!("{wname}[{t2}]");
    let (b1, b2) = if b1 > b2 {
        std::mem::swap(&mut w1, &mut w2);
        (b2, b1)
    } else {
        (b1, b2)
    };

    if lowbit == highbit {
        if b1 == b2 {
            let mut ret = format!("SIMD_XOR_VV({},{})", w1, w2);
            if b1 < lowbit {
                ret = format!("SIMD_SHL_V({},{})", ret, lowbit - b1);
            }
            if b1 > lowbit {
                ret = format!("SIMD_SHR_V({},{})", ret, b1 - lowbit);
            }
            if rel.parity() == 0 {
                return Ok(format!("SIMD_NOT_V({ret})"));
            }
            return Ok(ret);
        }
        if b1 < lowbit {
            w1 = format!("SIMD_SHL_V({},{})", w1, lowbit - b1);
        }
        if b1 > lowbit {
            w1 = format!("SIMD_SHR_V({},{})", w1, b1 - lowbit);
        }
        if b2 < lowbit {
            w2 = format!("SIMD_SHL_V({},{})", w2, lowbit - b2);
        }
        if b2 > lowbit {
            w2 = format!("SIMD_SHR_V({},{})", w2, b2 - lowbit);
        }
        let open = if rel.parity() == 0 { "SIMD_NOT_V(" } else { "(" };
        return Ok(format!("{open}SIMD_XOR_VV({},{}))", w1, w2));
    }

    if b1 <= lowbit {
        if b2 != b1 {
            w2 = format!("SIMD_SHR_V({},{})", w2, b2 - b1);
        }
        let ret = format!("SIMD_AND_VW(SIMD_XOR_VV({},{}),(1<<{}))", w1, w2, b1);
        return if rel.parity() == 0 {
            Ok(format!("SIMD_SUB_VW({},(1<<{}))", ret, b1))
        } else {
            Ok(format!("SIMD_NEG_V({ret})"))
        };
    }

    let ret = if b1 == b2 {
        format!("SIMD_AND_VW(SIMD_SHR_V(SIMD_XOR_VV({},{}),{}),1)", w1, w2, b1)
    } else {
        format!(
            "SIMD_AND_VW(SIMD_XOR_VV(SIMD_SHR_V({},{}),SIMD_SHR_V({},{})),1)",
            w1, b1, w2, b2
        )
    };
    if rel.parity() == 0 {
        Ok(format!("SIMD_SUB_VW({ret},1)"))
    } else {
        Ok(format!("SIMD_NEG_V({ret})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(pairs: &[(usize, u32)], parity: u32) -> BitRel {
        let mut r = BitRel::new();
        for &(t, b) in pairs {
            r.toggle(t, b).unwrap();
        }
        r.set_parity(parity);
        r
    }

    #[test]
    fn bool_same_bit() {
        let r = rel(&[(37, 4), (39, 4)], 1);
        assert_eq!(
            bool_expression(&r, "W").unwrap(),
            "((W[37]^W[39]) & (1<<4))"
        );
        let r = rel(&[(37, 4), (39, 4)], 0);
        assert_eq!(
            bool_expression(&r, "W").unwrap(),
            "(!((W[37]^W[39]) & (1<<4)))"
        );
    }

    #[test]
    fn bool_shifts_second_word() {
        // b2 > b1: shift right; b1 > b2: shift left. The second word is
        // always the one scanned from the top.
        let r = rel(&[(5, 2), (9, 6)], 1);
        assert_eq!(
            bool_expression(&r, "W").unwrap(),
            "((W[5]^(W[9]>>4)) & (1<<2))"
        );
        let r = rel(&[(5, 6), (9, 2)], 1);
        assert_eq!(
            bool_expression(&r, "W").unwrap(),
            "((W[5]^(W[9]<<4)) & (1<<6))"
        );
    }

    #[test]
    fn full_mask_forms() {
        let r = rel(&[(5, 7), (50, 7)], 0);
        assert_eq!(
            mask_expression(&r, "W").unwrap(),
            "(0-(((W[5]^~W[50])>>7)&1))"
        );
        let r = rel(&[(5, 3), (50, 9)], 1);
        assert_eq!(
            mask_expression(&r, "W").unwrap(),
            "(0-(((W[5]>>3)^(W[50]>>9))&1))"
        );
    }

    #[test]
    fn ranged_single_bit_avoids_mask_and_negate() {
        // parity 0, both bits at 7, output range [7,7]: plain negated XOR,
        // all-ones in bit 7 when satisfied.
        let r = rel(&[(5, 7), (50, 7)], 0);
        assert_eq!(
            ranged_mask_expression(&r, 7, 7, "W").unwrap(),
            "(~(W[5]^W[50]))"
        );
        // same but output at bit 0: one shift down
        assert_eq!(
            ranged_mask_expression(&r, 0, 0, "W").unwrap(),
            "(~((W[5]^W[50])>>7))"
        );
    }

    #[test]
    fn ranged_single_bit_different_columns() {
        let r = rel(&[(5, 3), (50, 9)], 1);
        assert_eq!(
            ranged_mask_expression(&r, 6, 6, "W").unwrap(),
            "(((W[5]<<3)^(W[50]>>3)))"
        );
    }

    #[test]
    fn ranged_low_b1_uses_single_downshift() {
        // b1 = 2 <= lowbit = 3 < b2: align b2 onto b1, AND, then smear
        let r = rel(&[(5, 2), (9, 6)], 1);
        assert_eq!(
            ranged_mask_expression(&r, 3, 8, "W").unwrap(),
            "(0-((W[5]^(W[9]>>4))&(1<<2)))"
        );
        let r = rel(&[(5, 2), (9, 6)], 0);
        assert_eq!(
            ranged_mask_expression(&r, 3, 8, "W").unwrap(),
            "(((W[5]^(W[9]>>4))&(1<<2))-(1<<2))"
        );
    }

    #[test]
    fn ranged_general_case_aligns_to_bit_zero() {
        let r = rel(&[(5, 6), (9, 9)], 1);
        assert_eq!(
            ranged_mask_expression(&r, 2, 8, "W").unwrap(),
            "(0-(((W[5]>>6)^(W[9]>>9))&1))"
        );
        let r = rel(&[(5, 6), (9, 6)], 0);
        assert_eq!(
            ranged_mask_expression(&r, 2, 8, "W").unwrap(),
            "((((W[5]^W[9])>>6)&1)-1)"
        );
    }

    #[test]
    fn ranged_swaps_for_canonical_bit_order() {
        // active pair scan yields b1 = 9 > b2 = 3; the ranged form swaps so
        // the low bit leads
        let r = rel(&[(5, 9), (50, 3)], 1);
        assert_eq!(
            ranged_mask_expression(&r, 3, 5, "W").unwrap(),
            "(0-((W[50]^(W[5]>>6))&(1<<3)))"
        );
    }

    #[test]
    fn simd_forms() {
        let r = rel(&[(5, 7), (50, 7)], 0);
        assert_eq!(
            simd_expression(&r, 7, 7, "W").unwrap(),
            "SIMD_NOT_V(SIMD_XOR_VV(W[5],W[50]))"
        );
        let r = rel(&[(5, 7), (50, 7)], 1);
        assert_eq!(
            simd_expression(&r, 0, 5, "W").unwrap(),
            "SIMD_NEG_V(SIMD_AND_VW(SIMD_SHR_V(SIMD_XOR_VV(W[5],W[50]),7),1))"
        );
        let r = rel(&[(5, 2), (9, 6)], 0);
        assert_eq!(
            simd_expression(&r, 3, 8, "W").unwrap(),
            "SIMD_SUB_VW(SIMD_AND_VW(SIMD_XOR_VV(W[5],SIMD_SHR_V(W[9],4)),(1<<2)),(1<<2))"
        );
        let r = rel(&[(5, 6), (9, 9)], 1);
        assert_eq!(
            simd_expression(&r, 2, 8, "W").unwrap(),
            "SIMD_NEG_V(SIMD_AND_VW(SIMD_XOR_VV(SIMD_SHR_V(W[5],6),SIMD_SHR_V(W[9],9)),1))"
        );
    }

    #[test]
    fn rejects_wrong_weight() {
        let r = rel(&[(5, 7)], 0);
        assert!(bool_expression(&r, "W").is_err());
        assert!(mask_expression(&r, "W").is_err());
        assert!(ranged_mask_expression(&r, 0, 0, "W").is_err());
        assert!(simd_expression(&r, 0, 0, "W").is_err());
    }
}
