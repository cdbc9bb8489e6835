use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use traj_forge::dataset::BuildConfig;
use traj_forge::Format;

use crate::cli::{FilterOptions, SamplingOptions, TrajectoryOptions};

/// Merges the TOML configuration file (if any) with explicit CLI flags;
/// flags win over the file, the file over built-in defaults.
pub fn resolve_config(
    traj: &TrajectoryOptions,
    sampling: Option<&SamplingOptions>,
    filter: &FilterOptions,
) -> Result<BuildConfig> {
    let mut config = match &traj.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            BuildConfig::from_toml(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => BuildConfig::default(),
    };

    if !traj.atom_names.is_empty() {
        config.atom_names = traj.atom_names.clone();
    }
    if let Some(sampling) = sampling {
        if let Some(cutoff) = sampling.cutoff {
            config.cutoff = cutoff;
        }
        if let Some(quota) = sampling.quota {
            config.quota = quota;
        }
        if let Some(policy) = sampling.policy {
            config.policy = policy.into();
        }
    }
    if let Some(limit) = filter.error_limit {
        config.error_limit = Some(limit);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Resolves the trajectory format: explicit flag first, extension second.
pub fn resolve_format(traj: &TrajectoryOptions) -> Result<Format> {
    if let Some(format) = traj.format {
        return Ok(format.into());
    }
    if let Some(format) = infer_format(&traj.input[0]) {
        return Ok(format);
    }
    bail!(
        "Cannot infer trajectory format from '{}'. Use --format to specify.",
        traj.input[0].display()
    );
}

fn infer_format(path: &Path) -> Option<Format> {
    let name = path.file_name()?.to_str()?.to_lowercase();
    if name.ends_with(".bond") || name.ends_with(".bonds") || name.ends_with(".reaxff") {
        return Some(Format::Bond);
    }
    if name.ends_with(".dump") || name.ends_with(".lammpstrj") {
        return Some(Format::Dump);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_inferred_from_extension() {
        assert_eq!(
            infer_format(&PathBuf::from("run/bonds.reaxff")),
            Some(Format::Bond)
        );
        assert_eq!(
            infer_format(&PathBuf::from("traj.lammpstrj")),
            Some(Format::Dump)
        );
        assert_eq!(infer_format(&PathBuf::from("traj.xyz")), None);
    }
}
