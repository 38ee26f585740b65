//! Ingestion of per-DV bit-relation files.
//!
//! Each file in the input directory describes the unavoidable bit conditions
//! of one DV. The DV identity is recovered from the filename stem
//! (`II-46-0.txt`, `I_48_0` and the like); the body is UTF-8 text where every
//! line containing `=` is one bit-relation.
//!
//! # Example
//!
//! ```text
//! - W37[4] ^ W39[4] = 1
//! ```
//!
//! parses to a relation toggling bit 4 of words 37 and 39 with parity 1.
//! Non-digit characters merely delimit the `(t, b)` integer pairs, so the
//! exact punctuation around them does not matter.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::bitrel::{Basis, BitRel};
use crate::error::{Error, Result};

/// Parse one bit-relation line. The parity is the first `0` or `1` at or
/// after the `=`; everything before it is scanned for `(t, b)` integer
/// pairs, each of which toggles bit `b` of word `t`. A trailing unpaired
/// integer is ignored.
pub fn parse_bitrel_line(line: &str) -> Result<BitRel> {
    let eq = line
        .find('=')
        .ok_or_else(|| Error::InputFormat(format!("bit-relation line without '=': {line:?}")))?;
    let parity_off = line[eq..]
        .find(['0', '1'])
        .ok_or_else(|| Error::InputFormat(format!("bit-relation line without parity: {line:?}")))?;

    let mut rel = BitRel::new();
    if line.as_bytes()[eq + parity_off] == b'1' {
        rel.set_parity(1);
    }

    let lhs = &line[..eq + parity_off];
    let mut runs = lhs
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty());
    while let Some(t_str) = runs.next() {
        let Some(b_str) = runs.next() else { break };
        let t: usize = t_str
            .parse()
            .map_err(|_| Error::InputFormat(format!("bad word index {t_str:?} in {line:?}")))?;
        let b: u32 = b_str
            .parse()
            .map_err(|_| Error::InputFormat(format!("bad bit index {b_str:?} in {line:?}")))?;
        rel.toggle(t, b)?;
    }
    Ok(rel)
}

/// Recover the DV name from a filename stem: the stem splits on `_` and `-`
/// into at least three tokens `I|II`, `K`, `b`, yielding `"I(K,b)"`.
pub fn filename_to_dv(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let tokens: Vec<&str> = stem.split(['_', '-']).collect();

    if tokens.len() >= 3
        && (tokens[0] == "I" || tokens[0] == "II")
        && tokens[1].bytes().all(|c| c.is_ascii_digit())
        && !tokens[1].is_empty()
        && tokens[2].bytes().all(|c| c.is_ascii_digit())
        && !tokens[2].is_empty()
    {
        return Ok(format!("{}({},{})", tokens[0], tokens[1], tokens[2]));
    }
    Err(Error::InputFormat(format!(
        "filename does not contain a DV description: {}",
        path.display()
    )))
}

/// Load the bit-relation basis from one file: every line containing `=`
/// contributes one relation, in file order.
pub fn load_bitrel_file(path: &Path) -> Result<Basis> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    text.lines()
        .filter(|line| line.contains('='))
        .map(parse_bitrel_line)
        .collect::<Result<_>>()
}

/// Whether a DV passes the `--DV` selection filter: some token occurs in the
/// filename stem or the DV name, and prefixing the token with `I` does not
/// (so selecting `I(48` does not also pull in `II(48`).
fn selected(stem: &str, dv: &str, selection: &BTreeSet<String>) -> bool {
    if selection.is_empty() {
        return true;
    }
    selection.iter().any(|token| {
        let shadow = format!("I{token}");
        (stem.contains(token.as_str()) || dv.contains(token.as_str()))
            && !stem.contains(&shadow)
            && !dv.contains(&shadow)
    })
}

/// Load bit-relation data for every (selected) DV file in `ubcdir`.
pub fn load_bitrels(
    ubcdir: &Path,
    selection: &BTreeSet<String>,
) -> Result<BTreeMap<String, Basis>> {
    println!(
        "Loading bit relation data for DVs from directory {}",
        ubcdir.display()
    );
    if !ubcdir.is_dir() {
        return Err(Error::InputFormat(format!(
            "not a directory: {}",
            ubcdir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(ubcdir).map_err(|e| Error::io(ubcdir, e))? {
        let entry = entry.map_err(|e| Error::io(ubcdir, e))?;
        if entry.path().is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut map = BTreeMap::new();
    for path in paths {
        let dv = filename_to_dv(&path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if !selected(&stem, &dv, selection) {
            continue;
        }
        let basis = load_bitrel_file(&path)?;
        println!("{}: {}", dv, basis.len());
        map.insert(dv, basis);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_example_line() {
        let rel = parse_bitrel_line("- W37[4] ^ W39[4] = 1").unwrap();
        assert_eq!(rel.word(37), 1 << 4);
        assert_eq!(rel.word(39), 1 << 4);
        assert_eq!(rel.parity(), 1);
        assert_eq!(rel.word_weight(), 2);
    }

    #[test]
    fn punctuation_only_delimits() {
        let a = parse_bitrel_line("W5[3]^W9[3]=0").unwrap();
        let b = parse_bitrel_line("  5 3   9 3  = 0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.parity(), 0);
    }

    #[test]
    fn repeated_pair_toggles_off() {
        let rel = parse_bitrel_line("W5[3] ^ W5[3] = 1").unwrap();
        assert_eq!(rel.word_weight(), 0);
        assert_eq!(rel.parity(), 1);
    }

    #[test]
    fn trailing_unpaired_integer_is_dropped() {
        let rel = parse_bitrel_line("W5[3] ^ W9 = 0").unwrap();
        assert_eq!(rel.word(5), 1 << 3);
        // the lone 9 has no partner bit index
        assert_eq!(rel.word(9), 0);
    }

    #[test]
    fn rejects_missing_parity_and_bounds() {
        assert!(parse_bitrel_line("W5[3] ^ W9[3]").is_err());
        assert!(parse_bitrel_line("W5[3] ^ W9[3] = x").is_err());
        assert!(parse_bitrel_line("W80[0] ^ W1[0] = 0").is_err());
        assert!(parse_bitrel_line("W5[32] ^ W9[3] = 0").is_err());
    }

    #[test]
    fn filename_stems() {
        assert_eq!(
            filename_to_dv(Path::new("dir/II-46-0.txt")).unwrap(),
            "II(46,0)"
        );
        assert_eq!(filename_to_dv(Path::new("I_48_0")).unwrap(), "I(48,0)");
        assert_eq!(
            filename_to_dv(Path::new("II_52_0_extra.txt")).unwrap(),
            "II(52,0)"
        );
        assert!(filename_to_dv(Path::new("README.md")).is_err());
        assert!(filename_to_dv(Path::new("III-1-2.txt")).is_err());
        assert!(filename_to_dv(Path::new("I-x-2.txt")).is_err());
    }

    #[test]
    fn selection_filter_avoids_type_confusion() {
        let sel: BTreeSet<String> = ["I(48".to_string()].into();
        assert!(selected("I_48_0", "I(48,0)", &sel));
        // "II(48,0)" contains "I(48" only via the "II(48" prefix, which the
        // shadow rule excludes.
        assert!(!selected("II_48_0", "II(48,0)", &sel));
        // empty selection admits everything
        assert!(selected("II_48_0", "II(48,0)", &BTreeSet::new()));
    }
}
