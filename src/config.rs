//! Run configuration: defaults, optional TOML file, validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backends::{PolyBackendKind, SchemeBackendKind};
use crate::error::{Error, Result};
use crate::mapper::ParameterMapper;
use crate::runner::{RunOptions, ScenarioRunner};
use crate::tier::{BitTier, SecurityTier};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub repetitions: usize,
    pub batch_size: usize,
    pub poly_degree: usize,
    pub scheme_degree: usize,
    pub plaintext_modulus: u64,
    pub bit_tiers: Vec<BitTier>,
    pub security_tiers: Vec<SecurityTier>,
    pub poly_backends: Vec<PolyBackendKind>,
    pub scheme_backends: Vec<SchemeBackendKind>,
    pub seed: u64,
    pub verify: bool,
    pub poly_output: PathBuf,
    pub scheme_output: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            repetitions: 10,
            batch_size: 10,
            poly_degree: 256,
            scheme_degree: 32768,
            plaintext_modulus: 65537,
            bit_tiers: vec![BitTier::B14, BitTier::B30, BitTier::B60],
            security_tiers: SecurityTier::ALL.to_vec(),
            poly_backends: PolyBackendKind::ALL.to_vec(),
            scheme_backends: SchemeBackendKind::ALL.to_vec(),
            seed: RunOptions::default().seed,
            verify: true,
            poly_output: PathBuf::from("statistics.csv"),
            scheme_output: PathBuf::from("he_schemes.csv"),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repetitions == 0 {
            return Err(Error::Config("repetitions must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        for (name, n) in [("poly_degree", self.poly_degree), ("scheme_degree", self.scheme_degree)] {
            if n < 8 || !n.is_power_of_two() {
                return Err(Error::Config(format!("{name} = {n} is not a power of two >= 8")));
            }
        }
        if !self.runs_schemes() {
            return Ok(());
        }
        let t = self.plaintext_modulus;
        let order = 2 * self.scheme_degree as u64;
        if t < 2 || t % order != 1 {
            return Err(Error::Config(format!(
                "plaintext_modulus {t} must be 1 mod {order} for slot packing"
            )));
        }
        Ok(())
    }

    /// Whether the scheme matrix has at least one scenario.
    pub fn runs_schemes(&self) -> bool {
        !self.scheme_backends.is_empty() && !self.security_tiers.is_empty()
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            batch_size: self.batch_size,
            verify: self.verify,
            seed: self.seed,
        }
    }

    pub fn mapper(&self) -> ParameterMapper {
        ParameterMapper::new(self.poly_degree, self.scheme_degree, self.plaintext_modulus)
    }

    /// Validated runner over the configured matrix.
    pub fn runner(&self) -> Result<ScenarioRunner> {
        self.validate()?;
        Ok(ScenarioRunner::new(self.mapper(), self.run_options(), self.repetitions)
            .with_poly(
                self.poly_backends.iter().map(|k| k.instantiate()).collect(),
                self.bit_tiers.clone(),
            )
            .with_scheme(
                self.scheme_backends.iter().map(|k| k.instantiate()).collect(),
                self.security_tiers.clone(),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Disposition;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = HarnessConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.bit_tiers, [BitTier::B14, BitTier::B30, BitTier::B60]);
        assert_eq!(cfg.poly_output, PathBuf::from("statistics.csv"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = HarnessConfig::from_toml_str(
            r#"
            repetitions = 3
            bit_tiers = [30, 62]
            poly_backends = ["native", "concrete-ntt"]
            scheme_degree = 8192
            "#,
        )
        .unwrap();
        assert_eq!(cfg.repetitions, 3);
        assert_eq!(cfg.bit_tiers, [BitTier::B30, BitTier::B62]);
        assert_eq!(
            cfg.poly_backends,
            [PolyBackendKind::Native, PolyBackendKind::ConcreteNtt]
        );
        assert_eq!(cfg.batch_size, 10);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(HarnessConfig::from_toml_str("bit_tiers = [31]").is_err());
        assert!(HarnessConfig::from_toml_str("poly_backends = [\"nfl\"]").is_err());
        assert!(HarnessConfig::from_toml_str("repetiton = 2").is_err());
    }

    #[test]
    fn test_validate() {
        let bad = [
            HarnessConfig {
                repetitions: 0,
                ..HarnessConfig::default()
            },
            HarnessConfig {
                batch_size: 0,
                ..HarnessConfig::default()
            },
            HarnessConfig {
                poly_degree: 300,
                ..HarnessConfig::default()
            },
            HarnessConfig {
                plaintext_modulus: 65539,
                ..HarnessConfig::default()
            },
        ];
        for cfg in bad {
            let err = cfg.validate().unwrap_err();
            assert_eq!(err.disposition(), Disposition::Abort);
        }
    }

    #[test]
    fn test_plaintext_modulus_ignored_without_schemes() {
        let no_backends = HarnessConfig {
            plaintext_modulus: 65539,
            scheme_backends: Vec::new(),
            ..HarnessConfig::default()
        };
        assert!(!no_backends.runs_schemes());
        no_backends.validate().unwrap();

        let no_tiers = HarnessConfig {
            plaintext_modulus: 65539,
            security_tiers: Vec::new(),
            ..HarnessConfig::default()
        };
        no_tiers.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "seed = 7\nverify = false\n").unwrap();
        let cfg = HarnessConfig::load(&path).unwrap();
        assert_eq!(cfg.seed, 7);
        assert!(!cfg.verify);
        assert_eq!(cfg.run_options().seed, 7);
    }
}
