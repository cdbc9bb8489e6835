use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context as _, Result};

use traj_forge::dataset::{
    describe_selections, scan_trajectory, select, BuildConfig, CovalentRadiusPerceiver,
    DescriptorRecord, SampleReport,
};
use traj_forge::{Format, TrajectoryReader};

use crate::cli::BuildArgs;
use crate::config::{resolve_config, resolve_format};
use crate::display::{
    print_sample_table, print_trajectory_info, Context as DisplayContext, Progress,
};

use super::{load_error_rows, open_reader};

const TOTAL_STAGES: u8 = 4;

pub fn run_build(args: BuildArgs, ctx: DisplayContext) -> Result<()> {
    let config = resolve_config(&args.traj, Some(&args.sampling), &args.filter)?;
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
    let scan_notes = [
        format!("Classified {} steps", outcome.steps),
        format!("Skipped {} damaged steps", outcome.skipped),
        format!("{} environment classes", outcome.table.len()),
    ];
    let scan_notes_ref: Vec<&str> = scan_notes.iter().map(String::as_str).collect();
    progress.complete("Scanning trajectory", &scan_notes_ref);

    progress.stage("Sampling representatives");
    let (selections, report) = select(&outcome.table, config.quota, config.policy);
    let sample_note = format!(
        "{} atoms selected across {} classes (quota {})",
        report.total_selected(),
        report.classes.len(),
        config.quota
    );
    progress.complete("Sampling representatives", &[&sample_note]);

    if ctx.interactive {
        print_sample_table(&report);
    }

    progress.stage("Extracting descriptors");
    let mut coord_reader = resolve_coord_reader(&args, format, reader, &config)?;
    let described = describe_selections(coord_reader.as_mut(), &selections, config.cutoff)
        .context("Descriptor extraction failed")?;
    let describe_notes = [
        format!("{} descriptors extracted", described.records.len()),
        format!("{} selections lost to damaged steps", described.missing),
    ];
    let describe_notes_ref: Vec<&str> = describe_notes.iter().map(String::as_str).collect();
    progress.complete("Extracting descriptors", &describe_notes_ref);

    progress.stage("Writing dataset");
    let files = write_dataset(&args.out_dir, &described.records, &report)?;
    let write_note = format!(
        "{} files under {}",
        files,
        args.out_dir.display()
    );
    progress.complete("Writing dataset", &[&write_note]);
    progress.finish();

    Ok(())
}

/// The descriptor pass needs coordinates: an explicit `--coords` dump wins,
/// a dump-format input is reused, a bond-only run is an error.
fn resolve_coord_reader(
    args: &BuildArgs,
    scan_format: Format,
    scan_reader: Box<dyn TrajectoryReader>,
    config: &BuildConfig,
) -> Result<Box<dyn TrajectoryReader>> {
    if !args.coords.is_empty() {
        let reader = open_reader(Format::Dump, &args.coords, config)?;
        if reader.atom_count() != scan_reader.atom_count() {
            bail!(
                "Coordinate dump has {} atoms but the trajectory has {}",
                reader.atom_count(),
                scan_reader.atom_count()
            );
        }
        return Ok(reader);
    }
    if scan_format == Format::Dump {
        return Ok(scan_reader);
    }
    bail!("Descriptor extraction needs coordinates: pass --coords with a LAMMPS dump file");
}

/// Writes one `descriptors.<class>.txt` per class plus a `classes.list`
/// manifest. Returns the number of files written.
fn write_dataset(
    out_dir: &Path,
    records: &[DescriptorRecord],
    report: &SampleReport,
) -> Result<usize> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let mut by_class: BTreeMap<String, Vec<&DescriptorRecord>> = BTreeMap::new();
    for record in records {
        by_class
            .entry(record.fingerprint.to_string())
            .or_default()
            .push(record);
    }

    for (class, records) in &by_class {
        let path = out_dir.join(format!("descriptors.{}.txt", class));
        let mut out = BufWriter::new(
            File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        );
        for record in records {
            let values: Vec<String> = record
                .descriptor
                .iter()
                .map(|v| format!("{:.8}", v))
                .collect();
            writeln!(out, "{} {} {}", record.step, record.atom, values.join(","))?;
        }
    }

    let manifest = out_dir.join("classes.list");
    let mut out = BufWriter::new(
        File::create(&manifest)
            .with_context(|| format!("Failed to create {}", manifest.display()))?,
    );
    let mut classes = report.classes.clone();
    classes.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
    for class in &classes {
        writeln!(
            out,
            "{} {} {}",
            class.fingerprint, class.selected, class.candidates
        )?;
    }

    Ok(by_class.len() + 1)
}
