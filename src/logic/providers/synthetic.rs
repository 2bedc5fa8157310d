//! Synthetic Data Provider - Profile-driven sample generator
//!
//! Each row draws a class (legitimate / suspicious / fraud), a risk score
//! inside that class band, then every feature as
//! `base + slope * risk/100 + noise * N(0,1)` clamped to its valid range.
//! Seeded, so the same profile always yields the same pool.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::SyntheticDataProvider;
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::table::{FRAUD_MIN_RISK, LEGITIMATE_MAX_RISK, RISK_MAX, RISK_MIN};
use crate::logic::features::{DocumentKind, FeatureSchema, FeatureTable};

// ============================================================================
// PROFILE
// ============================================================================

/// Generation parameters for one feature column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureProfile {
    pub base: f64,
    pub slope: f64,
    pub noise: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub integer: bool,
}

impl FeatureProfile {
    pub const fn new(base: f64, slope: f64, noise: f64, min: f64, max: f64) -> Self {
        Self { base, slope, noise, min, max, integer: false }
    }

    pub const fn count(base: f64, slope: f64, noise: f64, min: f64, max: f64) -> Self {
        Self { base, slope, noise, min, max, integer: true }
    }

    fn sample(&self, risk_unit: f64, rng: &mut StdRng) -> f64 {
        let raw = self.base + self.slope * risk_unit + self.noise * standard_normal(rng);
        let clamped = raw.clamp(self.min, self.max);
        if self.integer {
            clamped.round()
        } else {
            clamped
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticProfile {
    pub schema: FeatureSchema,
    /// Share of rows drawn from the fraud band
    pub fraud_ratio: f64,
    /// Share of rows drawn from the in-between band
    pub suspicious_ratio: f64,
    pub features: Vec<FeatureProfile>,
    pub seed: u64,
}

impl SyntheticProfile {
    pub fn validate(&self) -> RetrainResult<()> {
        if self.features.len() != self.schema.len() {
            return Err(RetrainError::Config(format!(
                "synthetic profile has {} feature profiles, schema {} has {}",
                self.features.len(),
                self.schema.describe(),
                self.schema.len()
            )));
        }
        let mix = self.fraud_ratio + self.suspicious_ratio;
        if self.fraud_ratio < 0.0 || self.suspicious_ratio < 0.0 || mix > 1.0 {
            return Err(RetrainError::Config(
                "class ratios must be non-negative and sum to at most 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Built-in profile for a known document kind
    pub fn for_kind(kind: DocumentKind, seed: u64) -> Self {
        let features = match kind {
            DocumentKind::Invoice => vec![
                FeatureProfile::new(3.0, 0.8, 0.5, 0.0, 7.0),
                FeatureProfile::count(8.0, -4.0, 3.0, 1.0, 60.0),
                FeatureProfile::new(0.005, 0.08, 0.01, 0.0, 0.5),
                FeatureProfile::new(900.0, -800.0, 200.0, 0.0, 5000.0),
                FeatureProfile::new(0.1, 0.7, 0.1, 0.0, 1.0),
                FeatureProfile::new(0.15, 0.5, 0.1, 0.0, 1.0),
                FeatureProfile::new(0.05, 0.6, 0.1, 0.0, 1.0),
                FeatureProfile::new(0.95, -0.2, 0.04, 0.0, 1.0),
            ],
            DocumentKind::BankStatement => vec![
                FeatureProfile::new(0.01, 0.4, 0.05, 0.0, 1.0),
                FeatureProfile::count(40.0, -15.0, 10.0, 1.0, 400.0),
                FeatureProfile::new(2.5, 0.6, 0.4, 0.0, 6.0),
                FeatureProfile::new(0.05, 0.5, 0.08, 0.0, 1.0),
                FeatureProfile::new(0.05, 0.7, 0.1, 0.0, 1.0),
                FeatureProfile::new(0.1, 0.6, 0.12, 0.0, 1.0),
                FeatureProfile::new(0.1, 0.4, 0.08, 0.0, 1.0),
                FeatureProfile::new(0.96, -0.15, 0.03, 0.0, 1.0),
            ],
        };
        Self {
            schema: kind.schema(),
            fraud_ratio: 0.4,
            suspicious_ratio: 0.0,
            features,
            seed,
        }
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

pub struct ProfileSyntheticProvider {
    profile: SyntheticProfile,
}

impl ProfileSyntheticProvider {
    pub fn new(profile: SyntheticProfile) -> RetrainResult<Self> {
        profile.validate()?;
        Ok(Self { profile })
    }

    pub fn for_kind(kind: DocumentKind, seed: u64) -> Self {
        Self {
            profile: SyntheticProfile::for_kind(kind, seed),
        }
    }

    pub fn profile(&self) -> &SyntheticProfile {
        &self.profile
    }

    fn draw_risk(&self, rng: &mut StdRng) -> f64 {
        let u: f64 = rng.gen();
        if u < self.profile.fraud_ratio {
            rng.gen_range(FRAUD_MIN_RISK..=RISK_MAX)
        } else if u < self.profile.fraud_ratio + self.profile.suspicious_ratio {
            rng.gen_range(LEGITIMATE_MAX_RISK + 1.0..FRAUD_MIN_RISK)
        } else {
            rng.gen_range(RISK_MIN..=LEGITIMATE_MAX_RISK)
        }
    }
}

impl SyntheticDataProvider for ProfileSyntheticProvider {
    fn schema(&self) -> &FeatureSchema {
        &self.profile.schema
    }

    fn generate(&self, n: usize) -> FeatureTable {
        let mut rng = StdRng::seed_from_u64(self.profile.seed);
        let width = self.profile.features.len();
        let mut features = Array2::<f64>::zeros((n, width));
        let mut risk = Vec::with_capacity(n);

        for i in 0..n {
            let r = self.draw_risk(&mut rng);
            let unit = r / RISK_MAX;
            for (j, fp) in self.profile.features.iter().enumerate() {
                features[[i, j]] = fp.sample(unit, &mut rng);
            }
            risk.push(r);
        }

        log::debug!(
            "Generated {} synthetic rows for {} (seed {})",
            n,
            self.profile.schema.describe(),
            self.profile.seed
        );

        // Width is checked against the schema when the profile is validated.
        FeatureTable::new(self.profile.schema.clone(), features, risk)
            .unwrap_or_else(|_| FeatureTable::empty(self.profile.schema.clone()))
    }
}

/// Box-Muller transform over two uniform draws
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_are_valid() {
        for kind in DocumentKind::ALL {
            assert!(SyntheticProfile::for_kind(kind, 7).validate().is_ok());
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let provider = ProfileSyntheticProvider::for_kind(DocumentKind::Invoice, 11);
        let a = provider.generate(50);
        let b = provider.generate(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_respects_class_mix() {
        let provider = ProfileSyntheticProvider::for_kind(DocumentKind::BankStatement, 3);
        let table = provider.generate(1000);
        assert_eq!(table.n_rows(), 1000);

        let counts = table.class_counts();
        assert_eq!(counts.suspicious, 0);
        assert!(counts.fraud > 300 && counts.fraud < 500, "fraud={}", counts.fraud);
    }

    #[test]
    fn test_features_stay_in_range() {
        let provider = ProfileSyntheticProvider::for_kind(DocumentKind::Invoice, 5);
        let table = provider.generate(200);
        let profile = provider.profile();
        for row in table.features().rows() {
            for (j, v) in row.iter().enumerate() {
                assert!(*v >= profile.features[j].min && *v <= profile.features[j].max);
            }
        }
        assert!(table.risk().unwrap().iter().all(|r| (0.0..=100.0).contains(r)));
    }

    #[test]
    fn test_rejects_profile_width_mismatch() {
        let mut profile = SyntheticProfile::for_kind(DocumentKind::Invoice, 1);
        profile.features.pop();
        assert!(ProfileSyntheticProvider::new(profile).is_err());
    }
}
