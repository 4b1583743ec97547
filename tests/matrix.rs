mod common;

use common::{MockPolyBackend, PlainScheme, OPEN_POLICY};
use latbench::backends::{fhe_bfv, native, ConcreteBackend, FheBfvBackend, FheMathBackend, NativeBackend};
use latbench::runner::{PolyBench, SchemeBench};
use latbench::{
    analysis, BitTier, CsvSink, DecompositionPolicy, Disposition, MemorySink, ParameterMapper,
    RunOptions, ScenarioOutcome, ScenarioRunner, SecurityTier, Tier,
};

fn poly_backends() -> Vec<Box<dyn PolyBench>> {
    vec![
        Box::new(NativeBackend),
        Box::new(FheMathBackend),
        Box::new(ConcreteBackend),
        Box::new(MockPolyBackend::new("mock")),
    ]
}

#[test]
fn every_scenario_is_accounted_for() {
    let mapper = ParameterMapper::new(256, 8192, 65537).with_policy(
        "mock",
        DecompositionPolicy {
            max_prime_bits: 20,
            min_prime_bits: 10,
            max_primes: 1,
        },
    );
    let opts = RunOptions {
        batch_size: 2,
        ..RunOptions::default()
    };
    let reps = 3;
    let runner = ScenarioRunner::new(mapper, opts, reps).with_poly(poly_backends(), BitTier::ALL.to_vec());
    let mut sink = MemorySink::default();
    let summary = runner.run_all(&mut sink).unwrap();

    assert_eq!(summary.attempted(), 4 * 4 * reps);
    assert_eq!(summary.markers.len(), 4 * 4 * reps);
    // mock only fits the 14-bit tier
    assert_eq!(summary.skipped, 3 * reps);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.written, sink.poly.len());
    assert_eq!(summary.written, 13 * reps);

    for row in &sink.poly {
        for t in [
            row.time_create_us,
            row.time_forward_us,
            row.time_add_us,
            row.time_multiply_us,
            row.time_inverse_us,
        ] {
            assert!(t.is_finite() && t >= 0.0);
        }
    }
}

#[test]
fn matrix_order_is_repetition_backend_tier() {
    let runner = ScenarioRunner::new(ParameterMapper::new(256, 8192, 65537), RunOptions::default(), 2)
        .with_poly(
            vec![Box::new(NativeBackend), Box::new(MockPolyBackend::new("mock"))],
            vec![BitTier::B14, BitTier::B30],
        );
    let summary = runner.run_all(&mut MemorySink::default()).unwrap();
    let order: Vec<(usize, &str, u32)> = summary
        .markers
        .iter()
        .map(|m| (m.repetition, m.backend.as_str(), m.tier.nominal()))
        .collect();
    assert_eq!(
        order,
        [
            (0, "native", 14),
            (0, "native", 30),
            (0, "mock", 14),
            (0, "mock", 30),
            (1, "native", 14),
            (1, "native", 30),
            (1, "mock", 14),
            (1, "mock", 30),
        ]
    );
}

#[test]
fn native_reports_achieved_bits() {
    let runner = ScenarioRunner::new(ParameterMapper::new(256, 8192, 65537), RunOptions::default(), 1)
        .with_poly(vec![Box::new(NativeBackend)], vec![BitTier::B60, BitTier::B62]);
    let mut sink = MemorySink::default();
    runner.run_all(&mut sink).unwrap();
    let tiers: Vec<u32> = sink.poly.iter().map(|r| r.bit_tier).collect();
    assert_eq!(tiers, [60, 60]);
    assert!(sink.poly.iter().all(|r| r.library == native::ID));
}

#[test]
fn round_trip_mismatch_fails_without_row() {
    let corrupt = MockPolyBackend {
        corrupt_inverse: true,
        ..MockPolyBackend::new("corrupt")
    };
    let mapper = ParameterMapper::new(256, 8192, 65537).with_policy("corrupt", OPEN_POLICY);
    let runner = ScenarioRunner::new(mapper.clone(), RunOptions::default(), 1)
        .with_poly(vec![Box::new(corrupt)], vec![BitTier::B30]);
    let mut sink = MemorySink::default();
    let summary = runner.run_all(&mut sink).unwrap();
    assert_eq!(summary.failed, 1);
    assert!(sink.poly.is_empty());

    // without verification the same backend produces a row
    let opts = RunOptions {
        verify: false,
        ..RunOptions::default()
    };
    let runner = ScenarioRunner::new(mapper, opts, 1).with_poly(vec![Box::new(corrupt)], vec![BitTier::B30]);
    let mut sink = MemorySink::default();
    assert_eq!(runner.run_all(&mut sink).unwrap().written, 1);
}

#[test]
fn wrong_decryption_fails_without_row() {
    let liar = PlainScheme {
        corrupt_decrypt: true,
        ..PlainScheme::new("liar")
    };
    let mapper = ParameterMapper::new(256, 8192, 65537).with_policy("liar", OPEN_POLICY);
    let runner = ScenarioRunner::new(mapper.clone(), RunOptions::default(), 1)
        .with_scheme(vec![Box::new(liar)], vec![SecurityTier::S128]);
    let mut sink = MemorySink::default();
    let summary = runner.run_all(&mut sink).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 0);
    assert!(sink.scheme.is_empty());
    match &summary.markers[0].outcome {
        ScenarioOutcome::Failed(reason) => assert!(reason.contains("does not match"), "{reason}"),
        other => panic!("unexpected outcome {other:?}"),
    }

    // decryption is only checked when verification is on
    let opts = RunOptions {
        verify: false,
        ..RunOptions::default()
    };
    let runner = ScenarioRunner::new(mapper, opts, 1)
        .with_scheme(vec![Box::new(liar)], vec![SecurityTier::S128]);
    assert_eq!(runner.run_all(&mut MemorySink::default()).unwrap().written, 1);
}

#[test]
fn panicking_backend_fails_only_its_scenario() {
    let broken = MockPolyBackend {
        panic_in_multiply: true,
        ..MockPolyBackend::new("broken")
    };
    let mapper = ParameterMapper::new(256, 8192, 65537).with_policy("broken", OPEN_POLICY);
    let runner = ScenarioRunner::new(mapper, RunOptions::default(), 2).with_poly(
        vec![Box::new(broken), Box::new(NativeBackend)],
        vec![BitTier::B30],
    );
    let mut sink = MemorySink::default();
    let summary = runner.run_all(&mut sink).unwrap();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.written, 2);
    assert!(sink.poly.iter().all(|r| r.library == native::ID));
    for m in summary.markers.iter().filter(|m| m.backend == "broken") {
        match &m.outcome {
            ScenarioOutcome::Failed(reason) => {
                assert!(reason.contains("panicked: operand length mismatch"), "{reason}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[test]
fn zero_batch_aborts_the_run() {
    let opts = RunOptions {
        batch_size: 0,
        ..RunOptions::default()
    };
    let runner = ScenarioRunner::new(ParameterMapper::new(256, 8192, 65537), opts, 1)
        .with_poly(poly_backends(), vec![BitTier::B14]);
    let err = runner.run_all(&mut MemorySink::default()).unwrap_err();
    assert_eq!(err.disposition(), Disposition::Abort);
}

#[test]
fn unsupported_and_failing_scenarios_are_isolated() {
    // 192-bit security at n = 8192 is 143 bits: three 47-bit primes, below the floor
    let mapper = ParameterMapper::new(256, 8192, 65537)
        .with_policy(
            fhe_bfv::ID,
            DecompositionPolicy {
                max_prime_bits: 62,
                min_prime_bits: 48,
                max_primes: 4,
            },
        )
        .with_policy("flaky", OPEN_POLICY)
        .with_policy("plain", OPEN_POLICY);
    let schemes: Vec<Box<dyn SchemeBench>> = vec![
        Box::new(FheBfvBackend),
        Box::new(PlainScheme {
            fail_multiply: true,
            ..PlainScheme::new("flaky")
        }),
        Box::new(PlainScheme::new("plain")),
    ];
    let runner = ScenarioRunner::new(mapper, RunOptions::default(), 2)
        .with_scheme(schemes, vec![SecurityTier::S192, SecurityTier::S128]);
    let mut sink = MemorySink::default();
    let summary = runner.run_all(&mut sink).unwrap();

    assert_eq!(summary.attempted(), 3 * 2 * 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.written, 6);
    assert_eq!(sink.scheme.len(), 6);

    for m in &summary.markers {
        let expect_skip = m.backend == fhe_bfv::ID && m.tier == Tier::from(SecurityTier::S192);
        match &m.outcome {
            ScenarioOutcome::Skipped(_) => assert!(expect_skip, "{m:?}"),
            ScenarioOutcome::Failed(reason) => {
                assert_eq!(m.backend, "flaky");
                assert!(reason.contains("depth"));
            }
            ScenarioOutcome::Completed(r) => {
                assert!(!expect_skip);
                assert_ne!(r.backend, "flaky");
            }
        }
    }

    let bfv_rows: Vec<_> = sink.scheme.iter().filter(|r| r.library == fhe_bfv::ID).collect();
    assert_eq!(bfv_rows.len(), 2);
    assert!(bfv_rows.iter().all(|r| r.security_tier == 128 && r.time_context_us.is_some()));
    let plain_rows: Vec<_> = sink.scheme.iter().filter(|r| r.library == "plain").collect();
    assert_eq!(plain_rows.len(), 4);
    assert!(plain_rows.iter().all(|r| r.time_context_us.is_none()));
}

#[test]
fn csv_tables_feed_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let poly = dir.path().join("statistics.csv");
    let scheme = dir.path().join("he_schemes.csv");
    let mapper = ParameterMapper::new(256, 8192, 65537).with_policy("plain", OPEN_POLICY);
    let runner = ScenarioRunner::new(mapper, RunOptions::default(), 3)
        .with_poly(vec![Box::new(MockPolyBackend::new("mock"))], vec![BitTier::B14])
        .with_scheme(
            vec![Box::new(PlainScheme::new("plain"))],
            vec![SecurityTier::S128],
        );
    let mut sink = CsvSink::new(&poly, &scheme);
    let summary = runner.run_all(&mut sink).unwrap();
    // "mock" has no policy registered, so every polynomial scenario is skipped
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.written, 3);
    assert!(!poly.exists());

    let groups = analysis::summarize_scheme(&scheme).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].library, "plain");
    assert_eq!(groups[0].tier, 128);
    assert_eq!(groups[0].samples, 3);
    assert_eq!(groups[0].column("time_context_us").unwrap().count, 0);
}
