//! latbench ― comparative timing harness for lattice polynomial arithmetic
//! and BFV-family homomorphic encryption backends.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod analysis;
pub mod backends;
pub mod config;
pub mod error;
pub mod mapper;
pub mod ntt;
pub mod primes;
pub mod runner;
pub mod sink;
pub mod tier;
pub mod timer;

pub use adapter::{ContextStage, Domain, HarnessRng, PolyBackend, SchemeBackend};
pub use backends::{PolyBackendKind, SchemeBackendKind};
pub use config::HarnessConfig;
pub use error::{Disposition, Error, Result};
pub use mapper::{DecompositionPolicy, ModulusPlan, ParameterMapper};
pub use runner::{RunOptions, RunSummary, ScenarioOutcome, ScenarioRunner, ScenarioState};
pub use sink::{CsvSink, MemorySink, PolyRow, ResultSink, ScenarioResult, SchemeRow, Stage};
pub use tier::{BitTier, SecurityTier, Tier};
