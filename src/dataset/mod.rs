//! The dataset pipeline: fingerprint accumulation over a whole trajectory,
//! bounded representative sampling, and local-environment descriptor
//! extraction for the selected atoms.
//!
//! Steps are pulled sequentially from the format adapter in bounded batches;
//! each batch is classified in parallel into per-worker tables which a
//! single-threaded reducer merges, so the hot accumulation map needs no
//! locks.

use std::collections::BTreeMap;

use rayon::prelude::*;

pub mod assemble;
pub mod config;
pub mod connect;
pub mod descriptor;
pub mod error;
pub mod fingerprint;
pub mod perceive;
pub mod sample;

pub use assemble::{
    assemble, batch_size, hill_formula, AssemblyReport, DatasetSink, LabelError, LabelRunner,
    LabeledFrame, SinkError, SystemSummary,
};
pub use config::BuildConfig;
pub use connect::{molecules, molecules_from_adjacency};
pub use descriptor::{local_environment, Environment};
pub use error::Error;
pub use fingerprint::{classify_step, FingerprintTable};
pub use perceive::{BondPerceiver, CovalentRadiusPerceiver, PerceivedBonds};
pub use sample::{select, ClassCount, SamplePolicy, SampleReport, Selection};

use crate::io::TrajectoryReader;
use crate::model::{Fingerprint, Step, Structure};

/// Steps classified per parallel batch.
const SCAN_BATCH: usize = 64;

/// Result of the fingerprint scan over a whole trajectory.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub table: FingerprintTable,
    /// Steps successfully classified.
    pub steps: usize,
    /// Steps skipped over recoverable damage (malformed rows, failed
    /// perception).
    pub skipped: usize,
}

/// Streams every step of the trajectory and accumulates the
/// fingerprint-class → (step, atom id) table.
///
/// Recoverable per-step damage is skipped and counted; structural errors
/// abort. `error_rows`, when given, must cover every step of the
/// trajectory and feeds the active-learning filter together with
/// `config.error_limit`.
pub fn scan_trajectory(
    reader: &mut dyn TrajectoryReader,
    config: &BuildConfig,
    perceiver: &dyn BondPerceiver,
    error_rows: Option<&[Vec<f64>]>,
    mut on_step: impl FnMut(usize),
) -> Result<ScanOutcome, Error> {
    let elements = reader.elements().to_vec();
    let mut outcome = ScanOutcome::default();

    loop {
        let mut batch: Vec<Step> = Vec::with_capacity(SCAN_BATCH);
        while batch.len() < SCAN_BATCH {
            match reader.next_step() {
                Ok(Some(step)) => batch.push(step),
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    log::warn!("skipping step: {e}");
                    outcome.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        if batch.is_empty() {
            break;
        }

        if let (Some(rows), Some(last)) = (error_rows, batch.last()) {
            if last.index >= rows.len() {
                return Err(Error::ErrorRowsExhausted {
                    rows: rows.len(),
                    step: last.index,
                });
            }
        }

        let classified: Vec<_> = batch
            .par_iter()
            .map(|step| {
                let errors = error_rows.map(|rows| rows[step.index].as_slice());
                classify_step(step, &elements, perceiver, errors, config.error_limit)
                    .map(|classes| (step.index, classes))
            })
            .collect();

        for result in classified {
            match result {
                Ok((step, classes)) => {
                    outcome.table.insert_step(step, classes);
                    outcome.steps += 1;
                    on_step(step);
                }
                Err(Error::Perception(details)) => {
                    log::warn!("skipping step, bond perception failed: {details}");
                    outcome.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(outcome)
}

/// One selected atom with its descriptor and the extracted local cluster.
#[derive(Debug, Clone)]
pub struct DescriptorRecord {
    pub fingerprint: Fingerprint,
    pub step: usize,
    /// 1-based atom id, matching the trajectory files.
    pub atom: usize,
    pub descriptor: Vec<f64>,
    pub structure: Structure,
}

#[derive(Debug, Default)]
pub struct DescribeOutcome {
    pub records: Vec<DescriptorRecord>,
    /// Selections dropped because their step could not be re-read.
    pub missing: usize,
}

/// Re-reads the trajectory once, sequentially, and emits a descriptor for
/// every selection. Selections are grouped by step beforehand so each step
/// block is parsed at most once.
///
/// The reader must be a coordinate source; a step without coordinates is a
/// pipeline invariant violation.
pub fn describe_selections(
    reader: &mut dyn TrajectoryReader,
    selections: &[Selection],
    cutoff: f64,
) -> Result<DescribeOutcome, Error> {
    let mut by_step: BTreeMap<usize, Vec<&Selection>> = BTreeMap::new();
    for selection in selections {
        by_step.entry(selection.step).or_default().push(selection);
    }

    let elements = reader.elements().to_vec();
    let mut outcome = DescribeOutcome::default();
    reader.rewind()?;

    loop {
        let step = match reader.next_step() {
            Ok(Some(step)) => step,
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                log::warn!("skipping step during descriptor pass: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let Some(wanted) = by_step.remove(&step.index) else {
            continue;
        };

        let coords = step
            .coords
            .as_ref()
            .ok_or(Error::MissingCoordinates(step.index))?;

        for selection in wanted {
            let target = selection.atom - 1;
            let env = local_environment(target, &elements, coords, step.cell.as_ref(), cutoff);
            let structure = cluster_structure(target, &env, &elements, coords, step.cell.as_ref());
            outcome.records.push(DescriptorRecord {
                fingerprint: selection.fingerprint.clone(),
                step: selection.step,
                atom: selection.atom,
                descriptor: env.descriptor,
                structure,
            });
        }
    }

    // Steps that never re-appeared (skipped blocks) drop their selections.
    outcome.missing = by_step.values().map(|v| v.len()).sum();
    if outcome.missing > 0 {
        log::warn!(
            "{} selections lost their step during the descriptor pass",
            outcome.missing
        );
    }
    Ok(outcome)
}

/// Cuts the target atom plus its wrapped neighbors out as an isolated
/// cluster for external labeling. The target comes first.
fn cluster_structure(
    target: usize,
    env: &Environment,
    elements: &[crate::model::Element],
    coords: &[[f64; 3]],
    cell: Option<&crate::model::Cell>,
) -> Structure {
    let mut cluster_elements = Vec::with_capacity(env.neighbors.len() + 1);
    let mut cluster_coords = Vec::with_capacity(env.neighbors.len() + 1);

    // Pull the target into the neighbors' image so the cluster is unbroken.
    let target_coord = match (cell, env.coords.first()) {
        (Some(cell), Some(anchor)) => {
            let d = cell.minimum_image([
                coords[target][0] - anchor[0],
                coords[target][1] - anchor[1],
                coords[target][2] - anchor[2],
            ]);
            [anchor[0] + d[0], anchor[1] + d[1], anchor[2] + d[2]]
        }
        _ => coords[target],
    };
    cluster_elements.push(elements[target]);
    cluster_coords.push(target_coord);

    for (&j, &coord) in env.neighbors.iter().zip(&env.coords) {
        cluster_elements.push(elements[j]);
        cluster_coords.push(coord);
    }

    Structure {
        elements: cluster_elements,
        coords: cluster_coords,
        cell: None,
    }
}

/// Partitions one step's atoms into molecules, deriving the adjacency from
/// the step's own bonds or from the perception seam for coordinate steps.
pub fn step_molecules(
    step: &Step,
    elements: &[crate::model::Element],
    perceiver: &dyn BondPerceiver,
) -> Result<Vec<Vec<usize>>, Error> {
    if let Some(bonds) = &step.bonds {
        let edges = bonds
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.neighbors.iter().map(move |&j| (i, j)));
        return Ok(molecules(bonds.len(), edges));
    }
    if let Some(coords) = &step.coords {
        let perceived = perceiver.perceive(elements, coords, step.cell.as_ref())?;
        return Ok(molecules(coords.len(), perceived.pairs.iter().copied()));
    }
    Err(Error::EmptyStep { step: step.index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bond::BondReader;
    use crate::io::dump::DumpReader;
    use crate::model::Element;
    use std::io::Cursor;

    const DUMP: &str = "\
ITEM: TIMESTEP
0
ITEM: NUMBER OF ATOMS
4
ITEM: BOX BOUNDS pp pp pp
0.0 10.0
0.0 10.0
0.0 10.0
ITEM: ATOMS id type x y z
1 1 5.0 5.0 5.0
2 2 6.0 5.0 5.0
3 2 5.0 6.5 5.0
4 2 5.0 5.0 7.0
ITEM: TIMESTEP
100
ITEM: NUMBER OF ATOMS
4
ITEM: BOX BOUNDS pp pp pp
0.0 10.0
0.0 10.0
0.0 10.0
ITEM: ATOMS id type x y z
1 1 5.0 5.0 5.0
2 2 6.0 5.0 5.0
3 2 5.0 6.5 5.0
4 2 5.0 5.0 7.0
";

    fn config() -> BuildConfig {
        BuildConfig {
            atom_names: vec!["C".into(), "H".into()],
            ..BuildConfig::default()
        }
    }

    fn dump_reader() -> DumpReader<Cursor<Vec<u8>>> {
        DumpReader::new(
            Cursor::new(DUMP.as_bytes().to_vec()),
            &[Element::C, Element::H],
            [true; 3],
        )
        .unwrap()
    }

    #[test]
    fn scan_accumulates_across_all_steps() {
        let mut reader = dump_reader();
        let mut seen = Vec::new();
        let outcome = scan_trajectory(
            &mut reader,
            &config(),
            &CovalentRadiusPerceiver::default(),
            None,
            |step| seen.push(step),
        )
        .unwrap();

        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(seen, vec![0, 1]);
        // Only the two H within covalent reach of C bond; the third is bare.
        let h_key = Fingerprint::new(Element::H, &[1.0]);
        assert_eq!(outcome.table.candidates(&h_key).unwrap().len(), 4);
        let bare_h = Fingerprint::new(Element::H, &[]);
        assert_eq!(outcome.table.candidates(&bare_h).unwrap().len(), 2);
    }

    #[test]
    fn scan_is_deterministic_across_reruns() {
        let collect = || {
            let mut reader = dump_reader();
            let outcome = scan_trajectory(
                &mut reader,
                &config(),
                &CovalentRadiusPerceiver::default(),
                None,
                |_| {},
            )
            .unwrap();
            let mut entries: Vec<(Fingerprint, Vec<(usize, usize)>)> = outcome
                .table
                .iter()
                .map(|(k, v)| {
                    let mut v = v.to_vec();
                    v.sort_unstable();
                    (k.clone(), v)
                })
                .collect();
            entries.sort();
            entries
        };
        assert_eq!(collect(), collect());
    }

    #[test]
    fn end_to_end_descriptor_for_the_methyl_scenario() {
        let mut reader = dump_reader();
        let cfg = config();
        let outcome = scan_trajectory(
            &mut reader,
            &cfg,
            &CovalentRadiusPerceiver::default(),
            None,
            |_| {},
        )
        .unwrap();
        let (selections, _) = select(&outcome.table, cfg.quota, cfg.policy);

        let described = describe_selections(&mut reader, &selections, cfg.cutoff).unwrap();
        assert_eq!(described.missing, 0);

        let carbon_step0 = described
            .records
            .iter()
            .find(|r| r.atom == 1 && r.step == 0)
            .unwrap();
        let expected = [1.0 / 2.0, 1.0 / 1.5, 1.0 / 1.0];
        assert_eq!(carbon_step0.descriptor.len(), 3);
        for (got, want) in carbon_step0.descriptor.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
        // The extracted cluster is target-first: C then the three H.
        assert_eq!(carbon_step0.structure.elements[0], Element::C);
        assert_eq!(carbon_step0.structure.elements.len(), 4);
    }

    #[test]
    fn error_filter_threads_through_the_scan() {
        let mut reader = dump_reader();
        let mut cfg = config();
        cfg.error_limit = Some(0.1);
        // Only atom 2 of step 0 and atom 3 of step 1 exceed the limit.
        let rows = vec![
            vec![0.0, 0.5, 0.0, 0.0],
            vec![0.0, 0.0, 0.7, 0.0],
        ];
        let outcome = scan_trajectory(
            &mut reader,
            &cfg,
            &CovalentRadiusPerceiver::default(),
            Some(&rows),
            |_| {},
        )
        .unwrap();

        let h_key = Fingerprint::new(Element::H, &[1.0]);
        let mut candidates = outcome.table.candidates(&h_key).unwrap().to_vec();
        candidates.sort_unstable();
        assert_eq!(candidates, vec![(0, 2), (1, 3)]);
    }

    #[test]
    fn short_error_file_is_fatal() {
        let mut reader = dump_reader();
        let rows = vec![vec![0.0, 0.0, 0.0, 0.0]];
        let result = scan_trajectory(
            &mut reader,
            &config(),
            &CovalentRadiusPerceiver::default(),
            Some(&rows),
            |_| {},
        );
        assert!(matches!(result, Err(Error::ErrorRowsExhausted { .. })));
    }

    #[test]
    fn molecules_from_a_bond_step() {
        const BONDS: &str = "\
# Timestep 0
#
# Number of particles 4
# header
# header
 1 1 1 2 1 1.0
 2 2 1 1 1 1.0
 3 2 0 1
 4 2 0 1
#
# Timestep 10
#
# Number of particles 4
# header
# header
 1 1 1 2 1 1.0
 2 2 1 1 1 1.0
 3 2 1 4 1 1.0
 4 2 1 3 1 1.0
#
";
        let mut reader = BondReader::new(
            Cursor::new(BONDS.as_bytes().to_vec()),
            &[Element::C, Element::H],
        )
        .unwrap();
        let elements = reader.elements().to_vec();

        let step0 = reader.next_step().unwrap().unwrap();
        let mols = step_molecules(&step0, &elements, &CovalentRadiusPerceiver::default()).unwrap();
        assert_eq!(mols, vec![vec![0, 1], vec![2], vec![3]]);

        let step1 = reader.next_step().unwrap().unwrap();
        let mols = step_molecules(&step1, &elements, &CovalentRadiusPerceiver::default()).unwrap();
        assert_eq!(mols, vec![vec![0, 1], vec![2, 3]]);
    }
}
