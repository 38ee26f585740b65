//! Assembly of the generated checker sources.
//!
//! Produces four artifacts as strings: the `ubc_check.h` header, the
//! `ubc_check.c` implementation in one of three strategies, the
//! `ubc_check_verify.c` brute-force verifier, and the `ubc_check_simd.cinc`
//! include. Writing them to disk is the driver's job; everything here is
//! pure string building, so the capacity check runs before any file exists.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use rustc_hash::FxHashMap;

use crate::bitrel::{Basis, BitRel};
use crate::codegen::expr;
use crate::cover::find_testt;
use crate::dv::DisturbanceVector;
use crate::error::{Error, Result};

/// Checker body layout.
///
/// Measured on the full DV corpus, v2 at `minprob = 0.1` is the fastest,
/// v1 with `min_dvs = 2` close behind, v1 with `min_dvs = 1` constant-time,
/// v3 the slow reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Unconditional AND-chain over relations covering at least `min_dvs`
    /// DVs, then per-DV gated blocks for the rest.
    V1 { min_dvs: usize },
    /// Relations processed from most-shared down, each gated on its DVs
    /// still being live once the estimated probability drops to `minprob`.
    /// Useful `minprob` range is 0.05–0.2.
    V2 { minprob: f64 },
    /// One gated block per DV, no sharing.
    V3,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::V2 { minprob: 0.1 }
    }
}

/// The four emitted source artifacts.
#[derive(Clone, Debug)]
pub struct GeneratedCode {
    pub header: String,
    pub source: String,
    pub verify: String,
    pub simd: String,
}

/// Mangle a DV name into a C identifier: `DV_II_46_0_bit`.
fn dv_variable(dv: &str, suffix: &str) -> String {
    format!("DV_{dv}{suffix}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Code generator context: the selection results plus the derived packing
/// and test-step assignment.
pub struct CodeGen<'a> {
    map_dv_bitrels: &'a BTreeMap<String, Basis>,
    bitrel_to_dv: &'a BTreeMap<BitRel, Vec<String>>,
    dv_to_bitpos: BTreeMap<String, u32>,
    dvs: BTreeMap<String, DisturbanceVector>,
    dv_testt: BTreeMap<String, i32>,
}

impl<'a> CodeGen<'a> {
    /// Assign mask bit positions (in DV name order), rebuild each DV from
    /// its name, and choose the test steps. Fails with `Capacity` when the
    /// DVs do not fit a 64-bit mask — before any output exists.
    pub fn new(
        map_dv_bitrels: &'a BTreeMap<String, Basis>,
        bitrel_to_dv: &'a BTreeMap<BitRel, Vec<String>>,
    ) -> Result<Self> {
        if map_dv_bitrels.len() > 64 {
            return Err(Error::Capacity {
                count: map_dv_bitrels.len(),
            });
        }
        let dv_to_bitpos: BTreeMap<String, u32> = map_dv_bitrels
            .keys()
            .enumerate()
            .map(|(pos, dv)| (dv.clone(), pos as u32))
            .collect();

        let mut dvs = BTreeMap::new();
        for name in map_dv_bitrels.keys() {
            dvs.insert(name.clone(), DisturbanceVector::from_name(name)?);
        }
        let dv_testt = find_testt(&dvs, bitrel_to_dv)?;

        Ok(CodeGen {
            map_dv_bitrels,
            bitrel_to_dv,
            dv_to_bitpos,
            dvs,
            dv_testt,
        })
    }

    fn dv_count(&self) -> usize {
        self.dv_to_bitpos.len()
    }

    fn dvmasksize(&self) -> usize {
        (self.dv_count() + 31) / 32
    }

    fn mask_type(&self) -> &'static str {
        if self.dv_count() <= 32 {
            "uint32_t"
        } else {
            "uint64_t"
        }
    }

    /// `(DV_..bit|DV_..bit)` plus the lowest and highest mask bit among the
    /// listed DVs; the emitted expression only needs to be valid on that
    /// bit range.
    fn dvs_mask(&self, dvs: &[String]) -> (String, u32, u32) {
        let mut lowbit = 31u32;
        let mut highbit = 0u32;
        let mut mask = String::from("(");
        for (i, dv) in dvs.iter().enumerate() {
            if i > 0 {
                mask.push('|');
            }
            mask.push_str(&dv_variable(dv, "bit"));
            let pos = self.dv_to_bitpos[dv];
            lowbit = lowbit.min(pos);
            highbit = highbit.max(pos);
        }
        mask.push(')');
        (mask, lowbit, highbit)
    }

    /// Generate all four artifacts for one strategy.
    pub fn generate(&self, strategy: Strategy) -> Result<GeneratedCode> {
        println!("Generating code...");
        let mut source = self.source_prologue();
        match strategy {
            Strategy::V1 { min_dvs } => self.check_v1(&mut source, min_dvs)?,
            Strategy::V2 { minprob } => self.check_v2(&mut source, minprob)?,
            Strategy::V3 => self.check_v3(&mut source)?,
        }
        Ok(GeneratedCode {
            header: self.header(),
            source,
            verify: self.verify(),
            simd: self.simd()?,
        })
    }

    fn header(&self) -> String {
        let mut out = String::new();
        out.push_str("#ifndef UBC_CHECK_H\n#define UBC_CHECK_H\n\n");
        out.push_str("#include <stdint.h>\n\n");
        writeln!(out, "#define DVMASKSIZE {}", self.dvmasksize()).unwrap();
        out.push_str(
            "typedef struct { int dvType; int dvK; int dvB; int testt; int maski; int maskb; uint32_t dm[80]; } dv_info_t;\n",
        );
        out.push_str("extern dv_info_t sha1_dvs[];\n");
        out.push_str("void ubc_check(const uint32_t W[80], uint32_t dvmask[DVMASKSIZE]);\n");
        out.push('\n');
        let testts: BTreeSet<i32> = self.dv_testt.values().copied().collect();
        for t in testts {
            writeln!(out, "#define DOSTORESTATE{:02}", t).unwrap();
        }
        out.push('\n');
        out.push_str("\n#endif // UBC_CHECK_H\n");
        out
    }

    fn bit_constants(&self, out: &mut String) {
        let ty = self.mask_type();
        for (dv, &pos) in &self.dv_to_bitpos {
            writeln!(
                out,
                "static const {} {} \t= ({})(1) << {};",
                ty,
                dv_variable(dv, "bit"),
                ty,
                pos
            )
            .unwrap();
        }
    }

    fn source_prologue(&self) -> String {
        let mut out = String::new();
        out.push_str("#include <stdint.h>\n#include \"ubc_check.h\"\n\n");
        self.bit_constants(&mut out);
        out.push('\n');

        out.push_str("dv_info_t sha1_dvs[] = \n{\n");
        for (i, (name, dv)) in self.dvs.iter().enumerate() {
            let pos = self.dv_to_bitpos[name];
            let dw: Vec<String> = dv.dw.iter().map(|w| format!("0x{:08x}", w)).collect();
            writeln!(
                out,
                "{}{{{},{},{},{},{},{}, {{ {} }} }}",
                if i == 0 { "  " } else { ", " },
                dv.dv_type,
                dv.k,
                dv.b,
                self.dv_testt[name],
                pos / 32,
                pos % 32,
                dw.join(",")
            )
            .unwrap();
        }
        out.push_str(", {0,0,0,0,0,0, {0");
        for _ in 1..80 {
            out.push_str(",0");
        }
        out.push_str("}}\n};\n");
        out
    }

    fn check_opening(&self, out: &mut String) {
        let ty = self.mask_type();
        write!(
            out,
            "void ubc_check(const uint32_t W[80], uint32_t dvmask[{}])\n{{\n\t{} mask = ~(({})(0));\n",
            self.dvmasksize(),
            ty,
            ty
        )
        .unwrap();
    }

    fn store_mask(&self, out: &mut String) {
        if self.dv_count() <= 32 {
            out.push_str("\tdvmask[0]=mask;\n");
        } else {
            out.push_str("\tdvmask[0]=(uint32_t)(mask);\n\tdvmask[1]=(uint32_t)(mask>>32);\n");
        }
    }

    /// The `if ( !rel || !rel ... ) mask &= ~DVbit;` block shared by the
    /// gated sections of v1 and v2.
    fn gated_block(&self, out: &mut String, dv: &str, rels: &[&BitRel]) -> Result<()> {
        writeln!(out, "\tif (mask & {})", dv_variable(dv, "bit")).unwrap();
        out.push_str("\t\t if (\n");
        for (i, rel) in rels.iter().enumerate() {
            out.push_str(if i == 0 { "\t\t\t    " } else { "\t\t\t || " });
            writeln!(out, "!{}", expr::bool_expression(rel, "W")?).unwrap();
        }
        writeln!(out, "\t\t )  mask &= ~{};", dv_variable(dv, "bit")).unwrap();
        Ok(())
    }

    fn check_v1(&self, out: &mut String, min_dvs: usize) -> Result<()> {
        self.check_opening(out);

        out.push_str("\tmask = mask\n");
        for (rel, dvs) in self.bitrel_to_dv {
            if dvs.len() < min_dvs {
                continue;
            }
            let (dvsmask, lowbit, highbit) = self.dvs_mask(dvs);
            writeln!(
                out,
                "\t\t & ( {} | ~{})",
                expr::ranged_mask_expression(rel, lowbit, highbit, "W")?,
                dvsmask
            )
            .unwrap();
        }
        out.push_str("\t\t;\n\n");

        if min_dvs > 1 {
            out.push_str("if (mask) {\n\n");
        }
        for dv in self.dv_to_bitpos.keys() {
            let gated: Vec<&BitRel> = self
                .bitrel_to_dv
                .iter()
                .filter(|(_, dvs)| dvs.len() < min_dvs && dvs.binary_search(dv).is_ok())
                .map(|(rel, _)| rel)
                .collect();
            if gated.is_empty() {
                continue;
            }
            self.gated_block(out, dv, &gated)?;
        }
        if min_dvs > 1 {
            out.push_str("}\n\n");
        }

        self.store_mask(out);
        out.push_str("}\n");
        Ok(())
    }

    fn check_v2(&self, out: &mut String, minprob: f64) -> Result<()> {
        self.check_opening(out);

        // shared relations, most DVs first; once enough relations have been
        // checked per DV, the chance any of a relation's DVs is still live
        // drops and gating on the mask pays off
        let mut processed: FxHashMap<&str, i32> = FxHashMap::default();
        for nrdvs in (2..=self.dv_count()).rev() {
            for (rel, dvs) in self.bitrel_to_dv.iter().filter(|(_, d)| d.len() == nrdvs) {
                let (dvsmask, lowbit, highbit) = self.dvs_mask(dvs);
                let mut prob_est = 0.0f64;
                for dv in dvs {
                    let cnt = processed.entry(dv.as_str()).or_insert(0);
                    prob_est += f64::exp2(-f64::from(*cnt));
                    *cnt += 1;
                }
                if prob_est <= minprob {
                    write!(out, "\tif (mask & {})\n\t", dvsmask).unwrap();
                }
                writeln!(
                    out,
                    "\tmask &= ({} | ~{});",
                    expr::ranged_mask_expression(rel, lowbit, highbit, "W")?,
                    dvsmask
                )
                .unwrap();
            }
        }

        out.push_str("if (mask) {\n\n");
        for (dv, &pos) in &self.dv_to_bitpos {
            let singles: Vec<&BitRel> = self
                .bitrel_to_dv
                .iter()
                .filter(|(_, dvs)| dvs.len() == 1 && dvs[0] == *dv)
                .map(|(rel, _)| rel)
                .collect();
            if singles.is_empty() {
                continue;
            }
            if singles.len() == 1 {
                writeln!(out, "\tif (mask & {})", dv_variable(dv, "bit")).unwrap();
                writeln!(
                    out,
                    "\t\tmask &= ({} | ~{});",
                    expr::ranged_mask_expression(singles[0], pos, pos, "W")?,
                    dv_variable(dv, "bit")
                )
                .unwrap();
                continue;
            }
            self.gated_block(out, dv, &singles)?;
        }
        out.push_str("}\n\n");

        self.store_mask(out);
        out.push_str("}\n");
        Ok(())
    }

    fn check_v3(&self, out: &mut String) -> Result<()> {
        self.check_opening(out);

        for dv in self.dv_to_bitpos.keys() {
            let rels: Vec<&BitRel> = self
                .bitrel_to_dv
                .iter()
                .filter(|(_, dvs)| dvs.binary_search(dv).is_ok())
                .map(|(rel, _)| rel)
                .collect();
            if rels.is_empty() {
                continue;
            }
            out.push_str("\t if (\t    ");
            for (i, rel) in rels.iter().enumerate() {
                if i > 0 {
                    out.push_str("\t\t || ");
                }
                writeln!(out, "!{}", expr::bool_expression(rel, "W")?).unwrap();
            }
            writeln!(out, "\t )  mask &= ~{};", dv_variable(dv, "bit")).unwrap();
        }

        self.store_mask(out);
        out.push_str("}\n");
        Ok(())
    }

    /// The brute-force verifier: per DV, re-evaluate every basis relation
    /// bit by bit. Slow and obviously correct; tests diff the optimized
    /// checker against it.
    fn verify(&self) -> String {
        let mut out = String::new();
        out.push_str("#include <stdint.h>\n#include \"ubc_check.h\"\n\n");
        out.push_str("void ubc_check_verify(const uint32_t W[80], uint32_t dvmask[DVMASKSIZE])\n{\n");
        out.push_str("\tfor (unsigned i=0; i < DVMASKSIZE; ++i)\n\t\tdvmask[i]=0xFFFFFFFF;\n\n");

        for (dv, basis) in self.map_dv_bitrels {
            if basis.is_empty() {
                continue;
            }
            out.push_str("\tif (\t   ");
            for (i, rel) in basis.iter().enumerate() {
                if i > 0 {
                    out.push_str("\t\t|| ");
                }
                out.push_str("(0");
                for (t, b) in rel.active_bits() {
                    write!(out, "^((W[{}]>>{})&1)", t, b).unwrap();
                }
                writeln!(out, ")!={}", rel.parity()).unwrap();
            }
            let pos = self.dv_to_bitpos[dv];
            write!(
                out,
                "\t\t)\n\t\t\tdvmask[{}] &= ~((uint32_t)(1<<{}));\n\n",
                pos / 32,
                pos % 32
            )
            .unwrap();
        }
        out.push_str("}\n");
        out
    }

    /// The SIMD include: every selected relation applied unconditionally,
    /// lane-wise, over the macro-abstracted vector word type.
    fn simd(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str("#include \"ubc_check.h\"\n\n");
        self.bit_constants(&mut out);
        out.push('\n');
        out.push_str("void UBC_CHECK_SIMD(const SIMD_WORD* W, SIMD_WORD* dvmask)\n{\n");
        out.push_str("\tSIMD_WORD mask = SIMD_WTOV(0xFFFFFFFF);\n");

        for (rel, dvs) in self.bitrel_to_dv {
            let (dvsmask, lowbit, highbit) = self.dvs_mask(dvs);
            writeln!(
                out,
                "\tmask = SIMD_AND_VV(mask, SIMD_OR_VW({}, ~{}));",
                expr::simd_expression(rel, lowbit, highbit, "W")?,
                dvsmask
            )
            .unwrap();
        }

        out.push_str("\tdvmask[0]=mask;\n}\n");
        Ok(out)
    }
}
