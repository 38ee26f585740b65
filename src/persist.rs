//! Save and load of the pipeline's intermediate state.
//!
//! Greedy selection over the real DV corpus takes a while; `--store` dumps
//! the selection so later runs can `--load` it and go straight to code
//! emission. Four blobs are written as JSON next to the working directory:
//! the DV tokens, the selection filter, the full basis map, and the chosen
//! relation-to-DV map.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::bitrel::{Basis, BitRel};
use crate::error::{Error, Result};

const DVS_FILE: &str = "data_dvs.json";
const DVSELECTION_FILE: &str = "data_dvselection.json";
const MAP_DV_BITRELS_FILE: &str = "data_map_dv_bitrels.json";
const BITREL_TO_DV_FILE: &str = "data_bitrel_to_dv.json";

/// The four intermediate blobs.
///
/// `bitrel_to_dv` is stored as a pair list because JSON object keys must be
/// strings; [`SavedState::bitrel_map`] rebuilds the ordered map.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SavedState {
    pub dvs: Vec<String>,
    pub dv_selection: BTreeSet<String>,
    pub map_dv_bitrels: BTreeMap<String, Basis>,
    pub bitrel_to_dv: Vec<(BitRel, Vec<String>)>,
}

impl SavedState {
    pub fn new(
        dvs: Vec<String>,
        dv_selection: BTreeSet<String>,
        map_dv_bitrels: BTreeMap<String, Basis>,
        bitrel_to_dv: &BTreeMap<BitRel, Vec<String>>,
    ) -> Self {
        SavedState {
            dvs,
            dv_selection,
            map_dv_bitrels,
            bitrel_to_dv: bitrel_to_dv
                .iter()
                .map(|(rel, dvs)| (rel.clone(), dvs.clone()))
                .collect(),
        }
    }

    /// The chosen-relation map in its working form.
    pub fn bitrel_map(&self) -> BTreeMap<BitRel, Vec<String>> {
        self.bitrel_to_dv.iter().cloned().collect()
    }
}

fn save_blob<T: Serialize>(value: &T, dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

fn load_blob<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write all four blobs into `dir`.
pub fn save_state(state: &SavedState, dir: &Path) -> Result<()> {
    save_blob(&state.dvs, dir, DVS_FILE)?;
    save_blob(&state.dv_selection, dir, DVSELECTION_FILE)?;
    save_blob(&state.map_dv_bitrels, dir, MAP_DV_BITRELS_FILE)?;
    save_blob(&state.bitrel_to_dv, dir, BITREL_TO_DV_FILE)?;
    Ok(())
}

/// Read all four blobs from `dir`. Callers treat failure as "recompute from
/// the input directory", not as a fatal error.
pub fn load_state(dir: &Path) -> Result<SavedState> {
    Ok(SavedState {
        dvs: load_blob(dir, DVS_FILE)?,
        dv_selection: load_blob(dir, DVSELECTION_FILE)?,
        map_dv_bitrels: load_blob(dir, MAP_DV_BITRELS_FILE)?,
        bitrel_to_dv: load_blob(dir, BITREL_TO_DV_FILE)?,
    })
}
