//! Scenario runner: drives the (repetition × backend × tier) matrix.
//!
//! Every scenario runs in isolation. Errors raised inside one are turned
//! into a skip or failure marker according to [`Error::disposition`] and the
//! matrix moves on; only harness bugs and a broken sink end the run early.
//! A panic inside an adapter is caught and counts as a failed scenario.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use rand::SeedableRng;
use tracing::{debug, error, info, info_span, warn};

use crate::adapter::{ContextStage, Domain, HarnessRng, PolyBackend, SchemeBackend};
use crate::error::{Disposition, Error, Result};
use crate::mapper::{ModulusPlan, ParameterMapper};
use crate::primes::mod_mul;
use crate::sink::{ResultSink, ScenarioResult, Stage};
use crate::tier::{BitTier, SecurityTier, Tier};
use crate::timer::measure;

/// Fixed plaintext vectors of the scheme scenarios (slot values mod 65537).
pub const REFERENCE_A: [u64; 10] = [12, 2345, 65222, 44, 5913, 65505, 65, 1987, 65520, 20];
pub const REFERENCE_B: [u64; 10] = [11, 3690, 65535, 35, 8765, 65490, 89, 9012, 65530, 10];
pub const REFERENCE_C: [u64; 10] = [5, 4321, 65100, 23, 6789, 65495, 88, 1024, 65200, 95];

// ------------------------------------------------------------
// scenario lifecycle
// ------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioState {
    Pending,
    ParametersResolved,
    ContextBuilt,
    Measuring(Stage),
    Completed,
    Skipped,
    Failed,
}

impl ScenarioState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed)
    }

    fn allows(self, next: ScenarioState) -> bool {
        use ScenarioState::*;
        match (self, next) {
            (_, Skipped | Failed) => !self.is_terminal(),
            (Pending, ParametersResolved) => true,
            (ParametersResolved, ContextBuilt | Measuring(_)) => true,
            (ContextBuilt, Measuring(_)) => true,
            (Measuring(Stage::Context), ContextBuilt) => true,
            (Measuring(a), Measuring(b)) => a != b,
            (Measuring(_), Completed) => true,
            _ => false,
        }
    }

    /// Moves to `next`; an out-of-order transition is a harness bug.
    pub fn advance(&mut self, next: ScenarioState) -> Result<()> {
        if !self.allows(next) {
            return Err(Error::invalid(format!(
                "illegal scenario transition {self:?} -> {next:?}"
            )));
        }
        *self = next;
        Ok(())
    }
}

/// Knobs shared by every scenario of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// Polynomials per operand batch (`N`).
    pub batch_size: usize,
    /// Check round trips and decrypted results outside the timed regions.
    pub verify: bool,
    pub seed: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            verify: true,
            seed: 0x6c61_7462_656e_6368,
        }
    }
}

/// Logical operations executed inside one polynomial stage.
pub fn poly_units(stage: Stage, batch: usize) -> usize {
    match stage {
        Stage::Create | Stage::Forward | Stage::Inverse => 2 * batch,
        Stage::Add | Stage::Multiply => batch,
        _ => 0,
    }
}

/// Logical operations executed inside one scheme stage.
pub fn scheme_units(stage: Stage) -> usize {
    match stage {
        Stage::Context | Stage::KeyGen => 1,
        Stage::Encrypt => 3,
        Stage::Add | Stage::Multiply | Stage::Decrypt => 2,
        _ => 0,
    }
}

// ------------------------------------------------------------
// object-safe benches over the adapter traits
// ------------------------------------------------------------

/// Runs the five polynomial stages for one plan. Implemented for every
/// [`PolyBackend`] so heterogeneous adapters can share one matrix.
pub trait PolyBench {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        plan: &ModulusPlan,
        opts: &RunOptions,
        rng: &mut HarnessRng,
        state: &mut ScenarioState,
    ) -> Result<BTreeMap<Stage, f64>>;
}

/// Runs the six scheme stages for one plan.
pub trait SchemeBench {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        plan: &ModulusPlan,
        opts: &RunOptions,
        rng: &mut HarnessRng,
        state: &mut ScenarioState,
    ) -> Result<BTreeMap<Stage, f64>>;
}

fn require_domain<B: PolyBackend>(backend: &B, polys: &[B::Poly], want: Domain) -> Result<()> {
    match polys.iter().find(|p| backend.domain(p) != want) {
        Some(p) => Err(Error::backend(
            PolyBackend::name(backend),
            format!("operand in {:?} domain, expected {want:?}", backend.domain(p)),
        )),
        None => Ok(()),
    }
}

impl<B: PolyBackend> PolyBench for B {
    fn name(&self) -> &'static str {
        PolyBackend::name(self)
    }

    fn run(
        &self,
        plan: &ModulusPlan,
        opts: &RunOptions,
        rng: &mut HarnessRng,
        state: &mut ScenarioState,
    ) -> Result<BTreeMap<Stage, f64>> {
        let n = opts.batch_size;
        let mut times = BTreeMap::new();

        let ring = self.build_ring(plan)?;
        state.advance(ScenarioState::ContextBuilt)?;

        state.advance(ScenarioState::Measuring(Stage::Create))?;
        let (mut polys, t) = measure(poly_units(Stage::Create, n), || {
            self.create_random_batch(&ring, 2 * n, rng)
        })?;
        times.insert(Stage::Create, t);
        if polys.len() != 2 * n {
            return Err(Error::backend(
                PolyBackend::name(self),
                format!("asked for {} polynomials, got {}", 2 * n, polys.len()),
            ));
        }
        let originals = opts.verify.then(|| polys.clone());

        state.advance(ScenarioState::Measuring(Stage::Forward))?;
        let ((), t) = measure(poly_units(Stage::Forward, n), || {
            polys.iter_mut().try_for_each(|p| self.forward(&ring, p))
        })?;
        times.insert(Stage::Forward, t);

        require_domain(self, &polys, Domain::Evaluation)?;
        let (lhs, rhs) = polys.split_at(n);

        state.advance(ScenarioState::Measuring(Stage::Add))?;
        let (sums, t) = measure(poly_units(Stage::Add, n), || {
            lhs.iter()
                .zip(rhs)
                .map(|(a, b)| self.add(&ring, a, b))
                .collect::<Result<Vec<_>>>()
        })?;
        times.insert(Stage::Add, t);

        require_domain(self, &polys, Domain::Evaluation)?;
        state.advance(ScenarioState::Measuring(Stage::Multiply))?;
        let (products, t) = measure(poly_units(Stage::Multiply, n), || {
            lhs.iter()
                .zip(rhs)
                .map(|(a, b)| self.multiply(&ring, a, b))
                .collect::<Result<Vec<_>>>()
        })?;
        times.insert(Stage::Multiply, t);
        drop((sums, products));

        state.advance(ScenarioState::Measuring(Stage::Inverse))?;
        let ((), t) = measure(poly_units(Stage::Inverse, n), || {
            polys.iter_mut().try_for_each(|p| self.inverse(&ring, p))
        })?;
        times.insert(Stage::Inverse, t);

        if let Some(originals) = originals {
            if originals != polys {
                return Err(Error::backend(
                    PolyBackend::name(self),
                    "inverse transform did not restore the inputs",
                ));
            }
        }
        Ok(times)
    }
}

fn reference(t: u64) -> [Vec<u64>; 3] {
    [REFERENCE_A, REFERENCE_B, REFERENCE_C].map(|v| v.iter().map(|x| x % t).collect())
}

impl<B: SchemeBackend> SchemeBench for B {
    fn name(&self) -> &'static str {
        SchemeBackend::name(self)
    }

    fn run(
        &self,
        plan: &ModulusPlan,
        opts: &RunOptions,
        rng: &mut HarnessRng,
        state: &mut ScenarioState,
    ) -> Result<BTreeMap<Stage, f64>> {
        let mut times = BTreeMap::new();
        let units = scheme_units;

        let (ctx, keys) = match self.context_stage() {
            ContextStage::Separate => {
                state.advance(ScenarioState::Measuring(Stage::Context))?;
                let (ctx, t) = measure(units(Stage::Context), || self.build_context(plan))?;
                times.insert(Stage::Context, t);
                state.advance(ScenarioState::ContextBuilt)?;

                state.advance(ScenarioState::Measuring(Stage::KeyGen))?;
                let (keys, t) = measure(units(Stage::KeyGen), || self.generate_key_pair(&ctx, rng))?;
                times.insert(Stage::KeyGen, t);
                (ctx, keys)
            }
            ContextStage::FoldedIntoKeyGen => {
                state.advance(ScenarioState::Measuring(Stage::KeyGen))?;
                let (pair, t) = measure(units(Stage::KeyGen), || {
                    let ctx = self.build_context(plan)?;
                    let keys = self.generate_key_pair(&ctx, rng)?;
                    Ok((ctx, keys))
                })?;
                times.insert(Stage::KeyGen, t);
                pair
            }
        };

        let t_mod = plan.plaintext_modulus;
        let [a, b, c] = reference(t_mod);

        state.advance(ScenarioState::Measuring(Stage::Encrypt))?;
        let ((ca, cb, cc), t) = measure(units(Stage::Encrypt), || {
            Ok((
                self.encrypt(&ctx, &keys, &a, rng)?,
                self.encrypt(&ctx, &keys, &b, rng)?,
                self.encrypt(&ctx, &keys, &c, rng)?,
            ))
        })?;
        times.insert(Stage::Encrypt, t);

        state.advance(ScenarioState::Measuring(Stage::Add))?;
        let (sum, t) = measure(units(Stage::Add), || {
            let ab = self.hom_add(&ctx, &keys, &ca, &cb)?;
            self.hom_add(&ctx, &keys, &ab, &cc)
        })?;
        times.insert(Stage::Add, t);

        state.advance(ScenarioState::Measuring(Stage::Multiply))?;
        let (product, t) = measure(units(Stage::Multiply), || {
            let ab = self.hom_multiply(&ctx, &keys, &ca, &cb)?;
            self.hom_multiply(&ctx, &keys, &ab, &cc)
        })?;
        times.insert(Stage::Multiply, t);

        state.advance(ScenarioState::Measuring(Stage::Decrypt))?;
        let ((dec_sum, dec_product), t) = measure(units(Stage::Decrypt), || {
            Ok((
                self.decrypt(&ctx, &keys, &sum, a.len())?,
                self.decrypt(&ctx, &keys, &product, a.len())?,
            ))
        })?;
        times.insert(Stage::Decrypt, t);

        debug!(sum = ?dec_sum, product = ?dec_product, "decrypted");
        if opts.verify {
            let want_sum: Vec<u64> = (0..a.len()).map(|i| (a[i] + b[i] + c[i]) % t_mod).collect();
            let want_product: Vec<u64> = (0..a.len())
                .map(|i| mod_mul(mod_mul(a[i], b[i], t_mod), c[i], t_mod))
                .collect();
            if dec_sum != want_sum {
                return Err(Error::backend(SchemeBackend::name(self), "decrypted sum does not match"));
            }
            if dec_product != want_product {
                return Err(Error::backend(
                    SchemeBackend::name(self),
                    "decrypted product does not match",
                ));
            }
        }
        Ok(times)
    }
}

// ------------------------------------------------------------
// matrix
// ------------------------------------------------------------

/// How a scenario ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ScenarioOutcome {
    Completed(ScenarioResult),
    Skipped(String),
    Failed(String),
}

/// One entry per attempted scenario, in execution order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioMarker {
    pub backend: String,
    pub tier: Tier,
    pub repetition: usize,
    pub outcome: ScenarioOutcome,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub markers: Vec<ScenarioMarker>,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.written + self.skipped + self.failed
    }

    fn absorb(&mut self, other: RunSummary) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.markers.extend(other.markers);
    }
}

/// Per-scenario seed, stable across runs and independent of matrix order.
pub fn scenario_seed(base: u64, backend: &str, tier: Tier, repetition: usize) -> u64 {
    let mut h = base ^ 0xcbf2_9ce4_8422_2325;
    for b in backend.bytes() {
        h = (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3);
    }
    let mut z = h
        .wrapping_add((tier.nominal() as u64) << 32)
        .wrapping_add(repetition as u64)
        .wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct ScenarioRunner {
    mapper: ParameterMapper,
    options: RunOptions,
    repetitions: usize,
    poly_backends: Vec<Box<dyn PolyBench>>,
    bit_tiers: Vec<BitTier>,
    scheme_backends: Vec<Box<dyn SchemeBench>>,
    security_tiers: Vec<SecurityTier>,
}

impl ScenarioRunner {
    pub fn new(mapper: ParameterMapper, options: RunOptions, repetitions: usize) -> Self {
        Self {
            mapper,
            options,
            repetitions,
            poly_backends: Vec::new(),
            bit_tiers: Vec::new(),
            scheme_backends: Vec::new(),
            security_tiers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_poly(mut self, backends: Vec<Box<dyn PolyBench>>, tiers: Vec<BitTier>) -> Self {
        self.poly_backends = backends;
        self.bit_tiers = tiers;
        self
    }

    #[must_use]
    pub fn with_scheme(
        mut self,
        backends: Vec<Box<dyn SchemeBench>>,
        tiers: Vec<SecurityTier>,
    ) -> Self {
        self.scheme_backends = backends;
        self.security_tiers = tiers;
        self
    }

    fn check_options(&self) -> Result<()> {
        if self.options.batch_size == 0 {
            return Err(Error::invalid("batch size must be positive"));
        }
        Ok(())
    }

    /// Polynomial matrix, then scheme matrix.
    pub fn run_all(&self, sink: &mut dyn ResultSink) -> Result<RunSummary> {
        let mut summary = self.run_poly(sink)?;
        summary.absorb(self.run_scheme(sink)?);
        Ok(summary)
    }

    pub fn run_poly(&self, sink: &mut dyn ResultSink) -> Result<RunSummary> {
        self.check_options()?;
        let mut summary = RunSummary::default();
        for rep in 0..self.repetitions {
            for bench in &self.poly_backends {
                for &tier in &self.bit_tiers {
                    let tier = Tier::from(tier);
                    let outcome = self.scenario(bench.name(), tier, rep, |plan, rng, state| {
                        bench.run(plan, &self.options, rng, state)
                    })?;
                    self.settle(sink, &mut summary, bench.name(), tier, rep, outcome)?;
                }
            }
        }
        Ok(summary)
    }

    pub fn run_scheme(&self, sink: &mut dyn ResultSink) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for rep in 0..self.repetitions {
            for bench in &self.scheme_backends {
                for &tier in &self.security_tiers {
                    let tier = Tier::from(tier);
                    let outcome = self.scenario(bench.name(), tier, rep, |plan, rng, state| {
                        bench.run(plan, &self.options, rng, state)
                    })?;
                    self.settle(sink, &mut summary, bench.name(), tier, rep, outcome)?;
                }
            }
        }
        Ok(summary)
    }

    fn scenario(
        &self,
        backend: &str,
        tier: Tier,
        repetition: usize,
        body: impl FnOnce(&ModulusPlan, &mut HarnessRng, &mut ScenarioState) -> Result<BTreeMap<Stage, f64>>,
    ) -> Result<ScenarioOutcome> {
        let span = info_span!("scenario", backend, %tier, repetition);
        let _guard = span.enter();

        let mut state = ScenarioState::Pending;
        let mut rng =
            HarnessRng::seed_from_u64(scenario_seed(self.options.seed, backend, tier, repetition));

        let measured = self.mapper.resolve(backend, tier).and_then(|plan| {
            state.advance(ScenarioState::ParametersResolved)?;
            debug!(
                degree = plan.degree,
                primes = plan.prime_count,
                prime_bits = plan.prime_bits,
                achieved = plan.achieved_bits(),
                "resolved plan"
            );
            let run = AssertUnwindSafe(|| body(&plan, &mut rng, &mut state));
            let stages = panic::catch_unwind(run).map_err(|payload| {
                Error::backend(backend, format!("panicked: {}", panic_reason(&*payload)))
            })??;
            Ok((plan, stages))
        });

        let err = match measured {
            Ok((plan, stages)) => {
                let bad = stages
                    .iter()
                    .find(|(_, t)| !t.is_finite() || **t < 0.0)
                    .map(|(s, t)| format!("stage {s:?} produced timing {t}"));
                match bad {
                    Some(reason) => Error::backend(backend, reason),
                    None => {
                        state.advance(ScenarioState::Completed)?;
                        return Ok(ScenarioOutcome::Completed(ScenarioResult {
                            backend: backend.to_string(),
                            tier,
                            achieved_bits: plan.achieved_bits(),
                            repetition,
                            stages,
                        }));
                    }
                }
            }
            Err(e) => e,
        };

        match err.disposition() {
            Disposition::Skip => {
                state.advance(ScenarioState::Skipped)?;
                warn!(reason = %err, "scenario skipped");
                Ok(ScenarioOutcome::Skipped(err.to_string()))
            }
            Disposition::Fail => {
                let at = state;
                state.advance(ScenarioState::Failed)?;
                error!(reason = %err, state = ?at, "scenario failed");
                Ok(ScenarioOutcome::Failed(err.to_string()))
            }
            Disposition::Abort => Err(err),
        }
    }

    fn settle(
        &self,
        sink: &mut dyn ResultSink,
        summary: &mut RunSummary,
        backend: &str,
        tier: Tier,
        repetition: usize,
        outcome: ScenarioOutcome,
    ) -> Result<()> {
        match &outcome {
            ScenarioOutcome::Completed(result) => {
                sink.record(result)?;
                summary.written += 1;
                info!(
                    backend,
                    %tier,
                    repetition,
                    achieved_bits = result.achieved_bits,
                    "row written"
                );
            }
            ScenarioOutcome::Skipped(_) => summary.skipped += 1,
            ScenarioOutcome::Failed(_) => summary.failed += 1,
        }
        summary.markers.push(ScenarioMarker {
            backend: backend.to_string(),
            tier,
            repetition,
            outcome,
        });
        Ok(())
    }
}
