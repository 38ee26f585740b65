//! Greedy selection of a shared set of bit-relations across all DVs.
//!
//! Every DV's basis spans a subspace of relations; distinct DVs overlap
//! heavily. The selector repeatedly picks the single relation that is still
//! missing from the most DVs' selected spans, so that one evaluation of the
//! emitted expression rules out as many DVs as possible at once. Ties are
//! broken by [`selection_cmp`], which prefers relations that compile to the
//! cheapest expressions.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::bitrel::{selection_cmp, Basis, BitRel};
use crate::error::{Error, Result};

/// Run the greedy selection over the full basis map. Returns, for every
/// chosen relation, the sorted list of DVs it constrains.
pub fn greedy_selection(
    map_dv_bitrels: &BTreeMap<String, Basis>,
) -> Result<BTreeMap<BitRel, Vec<String>>> {
    let mut selected: BTreeMap<&str, Basis> = map_dv_bitrels
        .keys()
        .map(|dv| (dv.as_str(), Basis::new()))
        .collect();
    let mut bitrel_to_dv: BTreeMap<BitRel, Vec<String>> = BTreeMap::new();

    loop {
        // Vote: each DV votes for every span element missing from its
        // selected span. `implied` additionally counts the DVs whose
        // selected span already covers the element.
        let mut votes: BTreeMap<BitRel, Vec<&str>> = BTreeMap::new();
        let mut implied: FxHashMap<BitRel, usize> = FxHashMap::default();
        for (dv, basis) in map_dv_bitrels {
            let full = basis.space(81)?;
            let sel = selected[dv.as_str()].space(81)?;
            for rel in full {
                *implied.entry(rel.clone()).or_insert(0) += 1;
                if sel.binary_search(&rel).is_err() {
                    votes.entry(rel).or_default().push(dv.as_str());
                }
            }
        }

        let max_cnt = votes.values().map(Vec::len).max().unwrap_or(0);
        if max_cnt == 0 {
            break;
        }

        let chosen = votes
            .iter()
            .filter(|(_, dvs)| dvs.len() == max_cnt)
            .map(|(rel, _)| rel)
            .min_by(|&l, &r| selection_cmp(l, r))
            .expect("max_cnt > 0 implies a candidate")
            .clone();
        let voters = votes.remove(&chosen).expect("chosen came from votes");

        println!(
            "- {}: {} (+{}DVs)",
            chosen,
            voters.join(" "),
            implied[&chosen] - voters.len()
        );

        for dv in &voters {
            selected
                .get_mut(dv)
                .expect("voter is a known DV")
                .push(chosen.clone());
        }
        let entry = bitrel_to_dv.entry(chosen).or_default();
        entry.extend(voters.iter().map(|dv| dv.to_string()));
        entry.sort();
    }

    report_subsets(&bitrel_to_dv);
    Ok(bitrel_to_dv)
}

/// Diagnostic only: for each chosen relation, list the other chosen
/// multi-DV relations whose DV set it strictly contains. Such pairs show
/// where one mask update shadows another.
fn report_subsets(bitrel_to_dv: &BTreeMap<BitRel, Vec<String>>) {
    for (rel, dvs) in bitrel_to_dv {
        let mut first = true;
        for (other, other_dvs) in bitrel_to_dv {
            if other == rel || other_dvs.len() <= 1 {
                continue;
            }
            if !other_dvs
                .iter()
                .all(|dv| dvs.binary_search(dv).is_ok())
            {
                continue;
            }
            if first {
                first = false;
                print!("{} ({}) => ", rel, dvs.len());
            } else {
                print!(" , ");
            }
            print!("{} ({})", other, other_dvs.len());
        }
        if !first {
            println!();
        }
    }
}

/// Check the termination invariant: the relations selected for each DV must
/// span exactly the DV's full space.
pub fn verify_selection(
    map_dv_bitrels: &BTreeMap<String, Basis>,
    bitrel_to_dv: &BTreeMap<BitRel, Vec<String>>,
) -> Result<()> {
    for (dv, basis) in map_dv_bitrels {
        let chosen: Basis = bitrel_to_dv
            .iter()
            .filter(|(_, dvs)| dvs.binary_search(dv).is_ok())
            .map(|(rel, _)| rel.clone())
            .collect();
        if chosen.space(81)? != basis.space(81)? {
            return Err(Error::Invariant(format!(
                "selected bit-relations do not span the full space of {dv}"
            )));
        }
    }
    Ok(())
}
