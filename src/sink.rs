//! Result rows and where they go.
//!
//! Both tables are headerless and append-only: a rerun adds rows to whatever
//! previous runs left behind, and the analysis step reads them positionally.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tier::Tier;

/// One measured stage of a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Create,
    Forward,
    Add,
    Multiply,
    Inverse,
    Context,
    KeyGen,
    Encrypt,
    Decrypt,
}

impl Stage {
    pub const POLY: [Stage; 5] = [
        Stage::Create,
        Stage::Forward,
        Stage::Add,
        Stage::Multiply,
        Stage::Inverse,
    ];

    pub const SCHEME: [Stage; 6] = [
        Stage::Context,
        Stage::KeyGen,
        Stage::Encrypt,
        Stage::Add,
        Stage::Multiply,
        Stage::Decrypt,
    ];
}

/// Timings of one completed scenario, µs per logical operation.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioResult {
    pub backend: String,
    pub tier: Tier,
    /// `C·B` of the plan that was actually built.
    pub achieved_bits: u32,
    pub repetition: usize,
    pub stages: BTreeMap<Stage, f64>,
}

impl ScenarioResult {
    fn stage(&self, s: Stage) -> Result<f64> {
        self.stages
            .get(&s)
            .copied()
            .ok_or_else(|| Error::invalid(format!("{}: no timing for stage {s:?}", self.backend)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyRow {
    pub library: String,
    pub repetition_index: usize,
    pub bit_tier: u32,
    pub time_create_us: f64,
    pub time_forward_us: f64,
    pub time_add_us: f64,
    pub time_multiply_us: f64,
    pub time_inverse_us: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemeRow {
    pub library: String,
    pub repetition_index: usize,
    pub security_tier: u32,
    pub time_keygen_us: f64,
    pub time_encrypt_us: f64,
    pub time_add_us: f64,
    pub time_multiply_us: f64,
    pub time_decrypt_us: f64,
    /// Empty when the backend folds context construction into key generation.
    pub time_context_us: Option<f64>,
}

impl TryFrom<&ScenarioResult> for PolyRow {
    type Error = Error;

    fn try_from(r: &ScenarioResult) -> Result<Self> {
        Ok(PolyRow {
            library: r.backend.clone(),
            repetition_index: r.repetition,
            bit_tier: r.achieved_bits,
            time_create_us: r.stage(Stage::Create)?,
            time_forward_us: r.stage(Stage::Forward)?,
            time_add_us: r.stage(Stage::Add)?,
            time_multiply_us: r.stage(Stage::Multiply)?,
            time_inverse_us: r.stage(Stage::Inverse)?,
        })
    }
}

impl TryFrom<&ScenarioResult> for SchemeRow {
    type Error = Error;

    fn try_from(r: &ScenarioResult) -> Result<Self> {
        Ok(SchemeRow {
            library: r.backend.clone(),
            repetition_index: r.repetition,
            security_tier: r.tier.nominal(),
            time_keygen_us: r.stage(Stage::KeyGen)?,
            time_encrypt_us: r.stage(Stage::Encrypt)?,
            time_add_us: r.stage(Stage::Add)?,
            time_multiply_us: r.stage(Stage::Multiply)?,
            time_decrypt_us: r.stage(Stage::Decrypt)?,
            time_context_us: r.stages.get(&Stage::Context).copied(),
        })
    }
}

/// Destination of completed scenarios. Only completed scenarios are recorded.
pub trait ResultSink {
    fn record(&mut self, result: &ScenarioResult) -> Result<()>;
}

/// Appends rows to the two CSV tables, opening each file on first use.
pub struct CsvSink {
    poly_path: PathBuf,
    scheme_path: PathBuf,
    poly: Option<Writer<File>>,
    scheme: Option<Writer<File>>,
}

fn open_append(path: &Path) -> Result<Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(WriterBuilder::new().has_headers(false).from_writer(file))
}

impl CsvSink {
    pub fn new(poly_path: impl Into<PathBuf>, scheme_path: impl Into<PathBuf>) -> Self {
        Self {
            poly_path: poly_path.into(),
            scheme_path: scheme_path.into(),
            poly: None,
            scheme: None,
        }
    }
}

impl ResultSink for CsvSink {
    fn record(&mut self, result: &ScenarioResult) -> Result<()> {
        match result.tier {
            Tier::Bits(_) => {
                let row = PolyRow::try_from(result)?;
                if self.poly.is_none() {
                    self.poly = Some(open_append(&self.poly_path)?);
                }
                if let Some(w) = self.poly.as_mut() {
                    w.serialize(&row)?;
                    w.flush()?;
                }
            }
            Tier::Security(_) => {
                let row = SchemeRow::try_from(result)?;
                if self.scheme.is_none() {
                    self.scheme = Some(open_append(&self.scheme_path)?);
                }
                if let Some(w) = self.scheme.as_mut() {
                    w.serialize(&row)?;
                    w.flush()?;
                }
            }
        }
        Ok(())
    }
}

/// Keeps rows in memory; used by tests and by callers that post-process directly.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub poly: Vec<PolyRow>,
    pub scheme: Vec<SchemeRow>,
}

impl ResultSink for MemorySink {
    fn record(&mut self, result: &ScenarioResult) -> Result<()> {
        match result.tier {
            Tier::Bits(_) => self.poly.push(PolyRow::try_from(result)?),
            Tier::Security(_) => self.scheme.push(SchemeRow::try_from(result)?),
        }
        Ok(())
    }
}
