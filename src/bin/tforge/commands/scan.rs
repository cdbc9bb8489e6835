use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context as _, Result};

use traj_forge::dataset::assemble::hill_formula;
use traj_forge::dataset::{scan_trajectory, step_molecules, CovalentRadiusPerceiver};

use crate::cli::ScanArgs;
use crate::config::{resolve_config, resolve_format};
use crate::display::{print_class_table, print_trajectory_info, Context as DisplayContext, Progress};

use super::{load_error_rows, open_reader};

const TOTAL_STAGES: u8 = 2;

pub fn run_scan(args: ScanArgs, ctx: DisplayContext) -> Result<()> {
    let config = resolve_config(&args.traj, None, &args.filter)?;
    let format = resolve_format(&args.traj)?;
    let mut reader = open_reader(format, &args.traj.input, &config)?;
    let error_rows = load_error_rows(&args.filter, reader.atom_count())?;
    let perceiver = CovalentRadiusPerceiver::new(config.perceive_tolerance);

    if ctx.interactive {
        print_trajectory_info(reader.as_ref(), args.traj.input.len());
    }

    let mut progress = Progress::new(ctx.interactive, TOTAL_STAGES);

    progress.stage("Scanning trajectory");
    let outcome = scan_trajectory(
        reader.as_mut(),
        &config,
        &perceiver,
        error_rows.as_deref(),
        |step| {
            if step % 200 == 0 {
                progress.update(&format!("Scanning trajectory ({} steps)", step + 1));
            }
        },
    )
    .context("Trajectory scan failed")?;

    let notes = [
        format!("Classified {} steps", outcome.steps),
        format!("Skipped {} damaged steps", outcome.skipped),
        format!("{} environment classes", outcome.table.len()),
    ];
    let notes_ref: Vec<&str> = notes.iter().map(String::as_str).collect();
    progress.complete("Scanning trajectory", &notes_ref);

    progress.stage("Resolving molecules");
    let composition = first_step_composition(reader.as_mut(), &perceiver)?;
    let molecule_count: usize = composition.values().sum();
    let note = format!(
        "{} molecules in {} species (first step)",
        molecule_count,
        composition.len()
    );
    progress.complete("Resolving molecules", &[&note]);
    progress.finish();

    if ctx.interactive {
        print_class_table(&outcome.table);
    }

    // Plain report on stdout, one class per line, for scripting.
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut classes: Vec<_> = outcome
        .table
        .iter()
        .map(|(key, candidates)| (key.clone(), candidates.len()))
        .collect();
    classes.sort();
    for (key, count) in classes {
        writeln!(out, "{} {}", key, count)?;
    }
    for (formula, count) in &composition {
        writeln!(out, "molecule {} {}", formula, count)?;
    }

    Ok(())
}

/// Hill formula → molecule count for the first step of the trajectory.
fn first_step_composition(
    reader: &mut dyn traj_forge::TrajectoryReader,
    perceiver: &CovalentRadiusPerceiver,
) -> Result<BTreeMap<String, usize>> {
    reader.rewind()?;
    let elements = reader.elements().to_vec();
    let mut composition = BTreeMap::new();

    if let Some(step) = reader.next_step()? {
        for molecule in step_molecules(&step, &elements, perceiver)? {
            let members: Vec<_> = molecule.iter().map(|&i| elements[i]).collect();
            *composition.entry(hill_formula(&members)).or_insert(0) += 1;
        }
    }
    Ok(composition)
}
