//! Dataset assembly boundary: labeled structures are grouped by chemical
//! formula and handed to external collaborators. Only the seams live here —
//! the QM runner and the on-disk training format are black boxes.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{Element, Structure};

/// Work budget for one training batch: `batch_size * atoms_per_frame` stays
/// at or under this.
const BATCH_WORK_BUDGET: usize = 32;

#[derive(Debug, Error)]
#[error("labeling failed: {0}")]
pub struct LabelError(pub String);

#[derive(Debug, Error)]
#[error("dataset serialization failed: {0}")]
pub struct SinkError(pub String);

/// A structure with its QM-derived labels attached.
#[derive(Debug, Clone)]
pub struct LabeledFrame {
    pub structure: Structure,
    pub energy: f64,
    pub forces: Vec<[f64; 3]>,
}

/// External QM/labeling runner. A failure labels one structure only and
/// must not abort its siblings.
pub trait LabelRunner {
    fn label(&self, structure: &Structure) -> Result<(f64, Vec<[f64; 3]>), LabelError>;
}

/// External dataset-serialization collaborator: persists one system's
/// frames and reports how many it wrote.
pub trait DatasetSink {
    fn write_system(&mut self, formula: &str, frames: &[LabeledFrame]) -> Result<usize, SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSummary {
    pub formula: String,
    pub frames: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    pub systems: Vec<SystemSummary>,
    /// Structures whose labeling failed; excluded, not fatal.
    pub failed: usize,
}

/// Labels every structure, groups the survivors by formula, and hands each
/// system to the sink.
pub fn assemble(
    structures: &[Structure],
    runner: &dyn LabelRunner,
    sink: &mut dyn DatasetSink,
) -> Result<AssemblyReport, SinkError> {
    let mut systems: BTreeMap<String, Vec<LabeledFrame>> = BTreeMap::new();
    let mut failed = 0usize;

    for structure in structures {
        match runner.label(structure) {
            Ok((energy, forces)) => {
                systems
                    .entry(hill_formula(&structure.elements))
                    .or_default()
                    .push(LabeledFrame {
                        structure: structure.clone(),
                        energy,
                        forces,
                    });
            }
            Err(e) => {
                log::warn!("excluding structure from dataset: {e}");
                failed += 1;
            }
        }
    }

    let mut report = AssemblyReport {
        failed,
        ..AssemblyReport::default()
    };
    for (formula, frames) in &systems {
        let written = sink.write_system(formula, frames)?;
        let atoms_per_frame = frames
            .first()
            .map(|f| f.structure.elements.len())
            .unwrap_or(0);
        report.systems.push(SystemSummary {
            formula: formula.clone(),
            frames: written,
            batch_size: batch_size(atoms_per_frame, written),
        });
    }
    Ok(report)
}

/// Suggested training batch size: inversely scaled by frame size so that
/// `batch_size * atoms_per_frame` stays within the work budget, floored at
/// 1, capped at the number of available frames.
pub fn batch_size(atoms_per_frame: usize, frames: usize) -> usize {
    let scaled = if atoms_per_frame == 0 {
        1
    } else {
        (BATCH_WORK_BUDGET / atoms_per_frame).max(1)
    };
    scaled.min(frames.max(1))
}

/// Hill-convention chemical formula: C first, then H, then the rest
/// alphabetically; the count is omitted when it is 1.
pub fn hill_formula(elements: &[Element]) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for element in elements {
        *counts.entry(element.symbol()).or_default() += 1;
    }

    let mut out = String::new();
    let mut push = |symbol: &str, count: usize| {
        out.push_str(symbol);
        if count > 1 {
            out.push_str(&count.to_string());
        }
    };

    if let Some(&c) = counts.get("C") {
        push("C", c);
        counts.remove("C");
        if let Some(&h) = counts.get("H") {
            push("H", h);
            counts.remove("H");
        }
    }
    for (symbol, count) in counts {
        push(symbol, count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyRunner;

    impl LabelRunner for FlakyRunner {
        fn label(&self, structure: &Structure) -> Result<(f64, Vec<[f64; 3]>), LabelError> {
            // Structures with more than two atoms "fail" the QM calculation.
            if structure.elements.len() > 2 {
                return Err(LabelError("did not converge".into()));
            }
            Ok((-1.5, vec![[0.0; 3]; structure.elements.len()]))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        written: Vec<(String, usize)>,
    }

    impl DatasetSink for RecordingSink {
        fn write_system(
            &mut self,
            formula: &str,
            frames: &[LabeledFrame],
        ) -> Result<usize, SinkError> {
            self.written.push((formula.to_string(), frames.len()));
            Ok(frames.len())
        }
    }

    fn structure(elements: Vec<Element>) -> Structure {
        let coords = vec![[0.0; 3]; elements.len()];
        Structure {
            elements,
            coords,
            cell: None,
        }
    }

    #[test]
    fn hill_formula_orders_c_then_h_then_alphabetical() {
        assert_eq!(
            hill_formula(&[Element::H, Element::C, Element::H, Element::O]),
            "CH2O"
        );
        assert_eq!(hill_formula(&[Element::O, Element::H, Element::H]), "H2O");
        assert_eq!(hill_formula(&[Element::C]), "C");
    }

    #[test]
    fn batch_size_obeys_the_work_budget() {
        assert_eq!(batch_size(4, 100), 8);
        assert_eq!(batch_size(100, 100), 1);
        assert_eq!(batch_size(1, 5), 5);
        assert_eq!(batch_size(0, 5), 1);
    }

    #[test]
    fn failed_labels_are_excluded_without_aborting() {
        let structures = vec![
            structure(vec![Element::C, Element::O]),
            structure(vec![Element::C, Element::H, Element::H]),
            structure(vec![Element::C, Element::O]),
        ];
        let mut sink = RecordingSink::default();
        let report = assemble(&structures, &FlakyRunner, &mut sink).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(sink.written, vec![("CO".to_string(), 2)]);
        assert_eq!(report.systems.len(), 1);
        assert_eq!(report.systems[0].frames, 2);
    }

    #[test]
    fn systems_are_grouped_by_formula() {
        let structures = vec![
            structure(vec![Element::C, Element::O]),
            structure(vec![Element::O, Element::O]),
            structure(vec![Element::C, Element::O]),
        ];
        let mut sink = RecordingSink::default();
        let report = assemble(&structures, &FlakyRunner, &mut sink).unwrap();
        let formulas: Vec<&str> = report.systems.iter().map(|s| s.formula.as_str()).collect();
        assert_eq!(formulas, vec!["CO", "O2"]);
    }
}
