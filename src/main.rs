//! CLI driver: parse per-DV bit-relation files, run the greedy selection,
//! and emit the generated checker sources.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use ubcgen::bitrel::{Basis, BitRel};
use ubcgen::codegen::{CodeGen, Strategy};
use ubcgen::error::{Error, Result};
use ubcgen::{input, persist, selector};

#[derive(Debug, Parser)]
#[clap(
    name = "ubcgen",
    about = "Generate the unavoidable-bit-condition checker for \
             collision-detecting SHA-1."
)]
struct Opt {
    /// Directory containing the ubc's for each DV
    #[clap(short = 'w', long, default_value = "../data/3565")]
    ubcdir: PathBuf,

    /// Directory to output ubc_check{.c,.h,_verify.c,_simd.cinc}
    #[clap(short = 'o', long, default_value = "../../lib")]
    outdir: PathBuf,

    /// Select DVs (if not specified uses all DVs in ubcdir)
    #[clap(short = 'd', long = "DV")]
    dv: Vec<String>,

    /// Store intermediate results
    #[clap(short, long)]
    store: bool,

    /// Load intermediate results
    #[clap(short, long)]
    load: bool,
}

fn main() {
    let opt = Opt::parse();
    if let Err(err) = run(opt) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let selection: BTreeSet<String> = opt.dv.iter().cloned().collect();
    let state_dir = Path::new(".");

    let mut loaded: Option<(BTreeMap<String, Basis>, BTreeMap<BitRel, Vec<String>>)> = None;
    if opt.load {
        // a failed or partial load falls back to recomputing
        match persist::load_state(state_dir) {
            Ok(state) if !state.bitrel_to_dv.is_empty() => {
                println!("Loaded previously stored intermediate results.");
                let bitrel_map = state.bitrel_map();
                loaded = Some((state.map_dv_bitrels, bitrel_map));
            }
            _ => println!("Loading previously stored intermediate results failed!"),
        }
    }

    let (map_dv_bitrels, bitrel_to_dv) = match loaded {
        Some(parts) => parts,
        None => {
            let map = input::load_bitrels(&opt.ubcdir, &selection)?;

            println!(
                "Applying greedy selection to exploit overlap of unavoidable bit relation space between DVs..."
            );
            let chosen = selector::greedy_selection(&map)?;
            selector::verify_selection(&map, &chosen)?;

            if opt.store {
                println!("Storing intermediate results");
                let state = persist::SavedState::new(
                    opt.dv.clone(),
                    selection.clone(),
                    map.clone(),
                    &chosen,
                );
                persist::save_state(&state, state_dir)?;
            }
            (map, chosen)
        }
    };

    // summary: basis sizes and the aggregate chance a random block leaves
    // some DV plausible
    let mut total = 0.0f64;
    for (dv, basis) in &map_dv_bitrels {
        println!("{}: {}", dv, basis.len());
        total += f64::exp2(-(basis.len() as f64));
    }
    println!("{} = 2^ {}", total, total.log2());

    println!(
        "Generating code files in directory {}",
        opt.outdir.display()
    );
    let gen = CodeGen::new(&map_dv_bitrels, &bitrel_to_dv)?;
    let code = gen.generate(Strategy::default())?;

    let write = |name: &str, contents: &str| -> Result<()> {
        let path = opt.outdir.join(name);
        fs::write(&path, contents).map_err(|e| Error::io(&path, e))
    };
    write("ubc_check.h", &code.header)?;
    write("ubc_check.c", &code.source)?;
    write("ubc_check_verify.c", &code.verify)?;
    write("ubc_check_simd.cinc", &code.simd)?;
    Ok(())
}
