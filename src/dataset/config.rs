use serde::Deserialize;

use crate::model::Element;

use super::error::Error;
use super::sample::SamplePolicy;

/// Configuration surface of the dataset pipeline.
///
/// Loadable from TOML; every field has a default except the type map.
/// Validation is eager so bad values never surface mid-run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Element names indexed by atom type id − 1 (e.g. `["C", "H", "O"]`).
    pub atom_names: Vec<String>,
    /// Neighbor cutoff radius in Å for the environment descriptor.
    pub cutoff: f64,
    /// Maximum number of samples retained per fingerprint class.
    pub quota: usize,
    /// Active-learning filter: keep only atoms whose model error exceeds
    /// this threshold. `None` keeps every atom.
    pub error_limit: Option<f64>,
    /// Selection policy within an over-quota class.
    pub policy: SamplePolicy,
    /// Per-axis periodicity of the simulation box.
    pub periodic: [bool; 3],
    /// Distance slack in Å added to covalent-radius sums by the built-in
    /// bond perceiver.
    pub perceive_tolerance: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            atom_names: Vec::new(),
            cutoff: 3.5,
            quota: 10,
            error_limit: None,
            policy: SamplePolicy::default(),
            periodic: [true; 3],
            perceive_tolerance: 0.45,
        }
    }
}

impl BuildConfig {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.atom_names.is_empty() {
            return Err(Error::EmptyTypeMap);
        }
        self.elements()?;
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(Error::InvalidCutoff(self.cutoff));
        }
        if self.quota == 0 {
            return Err(Error::ZeroQuota);
        }
        if let Some(limit) = self.error_limit {
            if !limit.is_finite() {
                return Err(Error::InvalidErrorLimit(limit));
            }
        }
        if !(self.perceive_tolerance.is_finite() && self.perceive_tolerance >= 0.0) {
            return Err(Error::InvalidTolerance(self.perceive_tolerance));
        }
        Ok(())
    }

    /// Resolves the name map into elements, 1-based type id → element.
    pub fn elements(&self) -> Result<Vec<Element>, Error> {
        self.atom_names
            .iter()
            .map(|name| name.parse::<Element>().map_err(Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BuildConfig {
        BuildConfig {
            atom_names: vec!["C".into(), "H".into(), "O".into()],
            ..BuildConfig::default()
        }
    }

    #[test]
    fn default_values_pass_validation() {
        base().validate().unwrap();
    }

    #[test]
    fn rejects_nonpositive_cutoff() {
        let mut config = base();
        config.cutoff = 0.0;
        assert!(matches!(config.validate(), Err(Error::InvalidCutoff(_))));
        config.cutoff = -1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidCutoff(_))));
    }

    #[test]
    fn rejects_zero_quota_and_empty_map() {
        let mut config = base();
        config.quota = 0;
        assert!(matches!(config.validate(), Err(Error::ZeroQuota)));

        let empty = BuildConfig::default();
        assert!(matches!(empty.validate(), Err(Error::EmptyTypeMap)));
    }

    #[test]
    fn rejects_unknown_element_names() {
        let mut config = base();
        config.atom_names.push("Xx".into());
        assert!(matches!(config.validate(), Err(Error::UnknownElement(_))));
    }

    #[test]
    fn loads_from_toml() {
        let config = BuildConfig::from_toml(
            r#"
            atom_names = ["C", "H"]
            cutoff = 5.0
            quota = 20
            policy = "leading"
            periodic = [true, true, false]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.cutoff, 5.0);
        assert_eq!(config.quota, 20);
        assert_eq!(config.policy, SamplePolicy::Leading);
        assert_eq!(config.periodic, [true, true, false]);
        assert_eq!(
            config.elements().unwrap(),
            vec![Element::C, Element::H]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BuildConfig::from_toml("atom_names = [\"C\"]\nbogus = 1").is_err());
    }
}
