//! Bit-relations over the expanded message and their linear spans.
//!
//! A bit-relation asserts that the XOR of a set of bits of the 80-word
//! expanded message `W` equals a fixed parity. Each DV comes with a basis of
//! such relations; the span of that basis is every relation the message pair
//! must satisfy. The greedy selector works entirely in terms of these spans.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of words in an expanded message.
pub const NWORDS: usize = 80;

/// Largest basis whose span we are willing to enumerate (2^27 elements).
pub const MAX_BASIS: usize = 27;

/// One bit-relation: 80 word bitmasks selecting positions of `W`, plus a
/// trailing word whose LSB is the parity target.
///
/// The derived `Ord` is lexicographic over the words; the selector's ordered
/// maps and the final tie-break of [`selection_cmp`] rely on it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitRel {
    words: Vec<u32>,
}

impl Default for BitRel {
    fn default() -> Self {
        BitRel::new()
    }
}

impl BitRel {
    /// The empty relation (all 80 masks zero, parity 0).
    pub fn new() -> Self {
        BitRel {
            words: vec![0; NWORDS + 1],
        }
    }

    /// Word mask at index `t`; indices past the stored length read as zero.
    #[inline]
    pub fn word(&self, t: usize) -> u32 {
        self.words.get(t).copied().unwrap_or(0)
    }

    /// Parity target (0 or 1).
    #[inline]
    pub fn parity(&self) -> u32 {
        self.word(NWORDS) & 1
    }

    /// Set the parity target bit.
    pub fn set_parity(&mut self, parity: u32) {
        self.words[NWORDS] = parity & 1;
    }

    /// Toggle bit `b` of word `t`. A pair mentioned twice cancels out.
    pub fn toggle(&mut self, t: usize, b: u32) -> Result<()> {
        if t >= NWORDS {
            return Err(Error::Range {
                what: "bit-relation word index",
                value: t as i64,
                allowed: "0..=79",
            });
        }
        if b >= 32 {
            return Err(Error::Range {
                what: "bit-relation bit index",
                value: b as i64,
                allowed: "0..=31",
            });
        }
        self.words[t] ^= 1u32 << b;
        Ok(())
    }

    /// XOR another relation into this one.
    pub fn xor_assign(&mut self, other: &BitRel) {
        debug_assert_eq!(self.words.len(), other.words.len());
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w ^= o;
        }
    }

    /// Copy truncated to the first `len` words. `len = 80` drops the parity
    /// column, `len = 81` keeps it; the two spans may differ in size.
    pub fn truncated(&self, len: usize) -> BitRel {
        let mut words = self.words.clone();
        words.resize(len, 0);
        BitRel { words }
    }

    /// Number of active bits in the 80 word masks, excluding the parity word.
    pub fn word_weight(&self) -> u32 {
        self.words
            .iter()
            .take(NWORDS)
            .map(|w| w.count_ones())
            .sum()
    }

    /// OR of all 80 word masks: the set of distinct active bit columns.
    pub fn column_mask(&self) -> u32 {
        self.words.iter().take(NWORDS).fold(0, |acc, w| acc | w)
    }

    /// Indices of the first and last non-zero word mask, or `None` when no
    /// word is active.
    pub fn active_range(&self) -> Option<(usize, usize)> {
        let first = self.words.iter().take(NWORDS).position(|&w| w != 0)?;
        let last = self
            .words
            .iter()
            .take(NWORDS)
            .rposition(|&w| w != 0)
            .unwrap_or(first);
        Some((first, last))
    }

    /// The two active `(t, b)` positions of a relation with exactly two
    /// active word bits: first position scanning words upward and bits from
    /// the LSB, second scanning words downward and bits from the MSB.
    ///
    /// Expression synthesis is only defined for such relations; anything
    /// else is an `Invariant` error.
    pub fn active_pair(&self) -> Result<((usize, u32), (usize, u32))> {
        if self.word_weight() != 2 {
            return Err(Error::Invariant(format!(
                "expected bit-relation with exactly 2 active W bits, got {}: {}",
                self.word_weight(),
                self
            )));
        }
        let (t1, t2) = self.active_range().expect("weight 2 implies active words");
        let b1 = self.words[t1].trailing_zeros();
        let b2 = 31 - self.words[t2].leading_zeros();
        Ok(((t1, b1), (t2, b2)))
    }

    /// Whether an expanded message satisfies this relation.
    pub fn holds(&self, w: &[u32; NWORDS]) -> bool {
        let mut acc = 0u32;
        for (t, &mask) in self.words.iter().take(NWORDS).enumerate() {
            acc ^= (w[t] & mask).count_ones() & 1;
        }
        acc == self.parity()
    }

    /// All active `(t, b)` positions in word-then-bit order.
    pub fn active_bits(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.words
            .iter()
            .take(NWORDS)
            .enumerate()
            .flat_map(|(t, &mask)| {
                (0..32)
                    .filter(move |&b| (mask >> b) & 1 != 0)
                    .map(move |b| (t, b))
            })
    }
}

impl fmt::Display for BitRel {
    /// `W37[4] ^ W39[4] = 1` — the format used in progress output and in
    /// the files this generator consumes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (t, b) in self.active_bits() {
            if first {
                write!(f, "W{}[{}]", t, b)?;
                first = false;
            } else {
                write!(f, " ^ W{}[{}]", t, b)?;
            }
        }
        if self.words.len() > NWORDS {
            write!(f, " = {}", self.parity())?;
        }
        Ok(())
    }
}

/// Total order used to break ties between equally-voted candidates during
/// greedy selection. Rates, in order: total active W bits, distinct active
/// bit columns, distance between first and last active word, and finally the
/// lexicographic order of the full vector.
pub fn selection_cmp(l: &BitRel, r: &BitRel) -> Ordering {
    let by_weight = l.word_weight().cmp(&r.word_weight());
    if by_weight != Ordering::Equal {
        return by_weight;
    }

    let by_columns = l
        .column_mask()
        .count_ones()
        .cmp(&r.column_mask().count_ones());
    if by_columns != Ordering::Equal {
        return by_columns;
    }

    let span = |rel: &BitRel| {
        rel.active_range()
            .map(|(first, last)| last as i64 - first as i64)
            .unwrap_or(-1)
    };
    let by_span = span(l).cmp(&span(r));
    if by_span != Ordering::Equal {
        return by_span;
    }

    l.cmp(r)
}

/// An ordered set of bit-relations for one DV.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Basis {
    rels: Vec<BitRel>,
}

impl Basis {
    pub fn new() -> Self {
        Basis::default()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn push(&mut self, rel: BitRel) {
        self.rels.push(rel);
    }

    pub fn iter(&self) -> impl Iterator<Item = &BitRel> {
        self.rels.iter()
    }

    /// Every non-zero XOR combination of the basis, truncated to the first
    /// `len` words, sorted and deduplicated.
    ///
    /// `len = 81` keeps the parity column and is what the selector queries;
    /// `len = 80` identifies a relation with its negation.
    pub fn space(&self, len: usize) -> Result<Vec<BitRel>> {
        if self.rels.is_empty() {
            return Ok(Vec::new());
        }
        if self.rels.len() > MAX_BASIS {
            return Err(Error::Range {
                what: "basis size",
                value: self.rels.len() as i64,
                allowed: "0..=27",
            });
        }

        let mut out = Vec::with_capacity((1usize << self.rels.len()) - 1);
        for combo in 1u32..(1u32 << self.rels.len()) {
            let mut elem = BitRel::new();
            for (j, rel) in self.rels.iter().enumerate() {
                if combo & (1 << j) != 0 {
                    elem.xor_assign(rel);
                }
            }
            out.push(elem.truncated(len));
        }
        out.sort();
        out.dedup();
        Ok(out)
    }
}

impl FromIterator<BitRel> for Basis {
    fn from_iter<I: IntoIterator<Item = BitRel>>(iter: I) -> Self {
        Basis {
            rels: iter.into_iter().collect(),
        }
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
    fn toggle_cancels() {
        let mut r = BitRel::new();
        r.toggle(5, 3).unwrap();
        r.toggle(5, 3).unwrap();
        assert_eq!(r.word(5), 0);
        assert_eq!(r.word_weight(), 0);
    }

    #[test]
    fn toggle_bounds() {
        let mut r = BitRel::new();
        assert!(r.toggle(80, 0).is_err());
        assert!(r.toggle(0, 32).is_err());
    }

    #[test]
    fn display_format() {
        let r = rel(&[(37, 4), (39, 4)], 1);
        assert_eq!(r.to_string(), "W37[4] ^ W39[4] = 1");
    }

    #[test]
    fn active_pair_scans_outward() {
        // Two active bits in the same word: lowest bit first, highest last.
        let r = rel(&[(12, 7), (12, 2)], 0);
        assert_eq!(r.active_pair().unwrap(), ((12, 2), (12, 7)));

        let r = rel(&[(5, 9), (50, 1)], 1);
        assert_eq!(r.active_pair().unwrap(), ((5, 9), (50, 1)));
    }

    #[test]
    fn active_pair_rejects_other_weights() {
        assert!(rel(&[(3, 3)], 0).active_pair().is_err());
        assert!(rel(&[(1, 1), (2, 2), (3, 3)], 1).active_pair().is_err());
    }

    #[test]
    fn holds_checks_parity() {
        let r = rel(&[(0, 0), (1, 0)], 0);
        let mut w = [0u32; NWORDS];
        assert!(r.holds(&w));
        w[0] = 1;
        assert!(!r.holds(&w));
        w[1] = 1;
        assert!(r.holds(&w));
    }

    #[test]
    fn space_enumerates_nonzero_combinations() {
        let a = rel(&[(0, 0), (1, 0)], 0);
        let b = rel(&[(1, 0), (2, 0)], 1);
        let basis: Basis = [a.clone(), b.clone()].into_iter().collect();

        let space = basis.space(81).unwrap();
        assert_eq!(space.len(), 3);
        let mut ab = a.clone();
        ab.xor_assign(&b);
        assert!(space.binary_search(&a).is_ok());
        assert!(space.binary_search(&b).is_ok());
        assert!(space.binary_search(&ab).is_ok());
    }

    #[test]
    fn space_80_merges_negations() {
        // Same word bits, opposite parity: distinct in 81 columns, identical
        // in 80.
        let a = rel(&[(0, 0), (1, 0)], 0);
        let b = rel(&[(0, 0), (1, 0)], 1);
        let basis: Basis = [a, b].into_iter().collect();

        // combos: a, b, a^b (= parity-only vector)
        assert_eq!(basis.space(81).unwrap().len(), 3);
        // truncating drops parity: a == b, a^b == zero-in-80-words
        assert_eq!(basis.space(80).unwrap().len(), 2);
    }

    #[test]
    fn space_empty_basis() {
        assert!(Basis::new().space(81).unwrap().is_empty());
    }

    #[test]
    fn selection_cmp_prefers_fewer_bits() {
        let light = rel(&[(0, 0), (1, 0)], 0);
        let heavy = rel(&[(0, 0), (1, 0), (2, 0), (3, 0)], 0);
        assert_eq!(selection_cmp(&light, &heavy), Ordering::Less);
    }

    #[test]
    fn selection_cmp_prefers_fewer_columns() {
        // Equal weight (2), but one spreads over two bit columns.
        let one_col = rel(&[(0, 3), (9, 3)], 0);
        let two_col = rel(&[(0, 3), (9, 4)], 0);
        assert_eq!(selection_cmp(&one_col, &two_col), Ordering::Less);
    }

    #[test]
    fn selection_cmp_prefers_narrow_span() {
        // Equal weight and columns, different word distance.
        let narrow = rel(&[(10, 3), (12, 3)], 0);
        let wide = rel(&[(0, 3), (70, 3)], 0);
        assert_eq!(selection_cmp(&narrow, &wide), Ordering::Less);
    }

    #[test]
    fn selection_cmp_falls_back_to_lex() {
        let a = rel(&[(4, 3), (6, 3)], 0);
        let b = rel(&[(5, 3), (7, 3)], 0);
        assert_eq!(selection_cmp(&a, &b), a.cmp(&b));
    }
}
