//! Choice of SHA-1 steps at which the collision detector snapshots state.
//!
//! Recomputing a DV's trail requires copying the working state at a step
//! inside the DV's testable range and rerunning the compression backward and
//! forward from there. Every snapshot step costs time in the hot loop, so we
//! want the fewest steps that together cover every DV. This is an
//! unweighted set-cover over at most ~20 candidate steps, small enough to
//! solve exactly by enumerating subsets of increasing size.

use std::collections::{BTreeMap, BTreeSet};

use crate::bitrel::BitRel;
use crate::dv::DisturbanceVector;
use crate::error::{Error, Result};

/// Pick a minimum set of test steps covering every DV, then assign each DV a
/// step from the set inside its own range.
///
/// All covers of the minimum size are enumerated; of those the
/// lexicographically smallest step set is kept. Within that set a DV is
/// assigned the largest step its range admits.
pub fn find_testt(
    dvs: &BTreeMap<String, DisturbanceVector>,
    bitrel_to_dv: &BTreeMap<BitRel, Vec<String>>,
) -> Result<BTreeMap<String, i32>> {
    let mut all_dvs: BTreeSet<&str> = bitrel_to_dv
        .values()
        .flatten()
        .map(String::as_str)
        .collect();

    let mut t_count: BTreeMap<i32, BTreeSet<&str>> = BTreeMap::new();
    for (name, dv) in dvs {
        all_dvs.insert(name.as_str());
        for t in dv.test_steps()? {
            t_count.entry(t).or_default().insert(name.as_str());
        }
    }
    for dv in &all_dvs {
        if !dvs.contains_key(*dv) {
            return Err(Error::Invariant(format!(
                "selected bit-relations reference unknown DV {dv}"
            )));
        }
    }
    if all_dvs.is_empty() {
        return Ok(BTreeMap::new());
    }

    let steps: Vec<i32> = t_count.keys().copied().collect();
    let mut solutions: Vec<Vec<i32>> = Vec::new();
    for size in 1..=steps.len() {
        for combo in combinations(steps.len(), size) {
            let mut covered: BTreeSet<&str> = BTreeSet::new();
            for &i in &combo {
                covered.extend(&t_count[&steps[i]]);
            }
            if covered == all_dvs {
                solutions.push(combo.iter().map(|&i| steps[i]).collect());
            }
        }
        if !solutions.is_empty() {
            break;
        }
    }
    let best = solutions
        .first()
        .ok_or_else(|| Error::Invariant("no test-step cover exists".to_string()))?;
    println!(
        "Found {} solutions of size {}",
        solutions.len(),
        best.len()
    );

    let mut assignment = BTreeMap::new();
    for t in best {
        for dv in &t_count[t] {
            assignment.insert(dv.to_string(), *t);
        }
    }
    Ok(assignment)
}

/// Lexicographic enumeration of all `size`-element index subsets of `0..n`.
fn combinations(n: usize, size: usize) -> impl Iterator<Item = Vec<usize>> {
    let mut current: Option<Vec<usize>> = if size <= n {
        Some((0..size).collect())
    } else {
        None
    };
    std::iter::from_fn(move || {
        let combo = current.clone()?;
        // advance: bump the rightmost index that still has room
        let next = {
            let mut c = combo.clone();
            let mut i = size;
            loop {
                if i == 0 {
                    break None;
                }
                i -= 1;
                if c[i] + (size - i) < n {
                    c[i] += 1;
                    for j in i + 1..size {
                        c[j] = c[j - 1] + 1;
                    }
                    break Some(c);
                }
            }
        };
        current = next;
        Some(combo)
    })
}
