mod build;
mod scan;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use traj_forge::dataset::BuildConfig;
use traj_forge::io::read_error_rows;
use traj_forge::{open_trajectory, Format, TrajectoryReader};

use build::run_build;
use scan::run_scan;

use crate::cli::{Command, FilterOptions};
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Scan(args) => run_scan(args, ctx),
        Command::Build(args) => run_build(args, ctx),
    }
}

fn open_reader(
    format: Format,
    paths: &[PathBuf],
    config: &BuildConfig,
) -> Result<Box<dyn TrajectoryReader>> {
    let elements = config.elements()?;
    open_trajectory(format, paths, &elements, config.periodic).with_context(|| {
        format!(
            "Failed to open {} trajectory: {}",
            format,
            paths[0].display()
        )
    })
}

fn load_error_rows(filter: &FilterOptions, atom_count: usize) -> Result<Option<Vec<Vec<f64>>>> {
    let Some(path) = &filter.error_file else {
        return Ok(None);
    };
    let file = File::open(path)
        .with_context(|| format!("Failed to open error file: {}", path.display()))?;
    let rows = read_error_rows(BufReader::new(file), atom_count)
        .with_context(|| format!("Failed to read error file: {}", path.display()))?;
    Ok(Some(rows))
}
