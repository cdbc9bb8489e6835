//! Bounded representative sampling across the whole trajectory.

use serde::Deserialize;

use crate::model::Fingerprint;

use super::fingerprint::FingerprintTable;

/// How an over-quota class picks its Q representatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePolicy {
    /// Evenly strided over the ordered candidate list, endpoints included,
    /// spreading picks across simulation time.
    #[default]
    Stride,
    /// First Q candidates in (step, atom) order.
    Leading,
}

/// One sampled (class, step, atom id) record; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub fingerprint: Fingerprint,
    pub step: usize,
    pub atom: usize,
}

/// Per-class accounting, observable for under-quota classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCount {
    pub fingerprint: Fingerprint,
    pub candidates: usize,
    pub selected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SampleReport {
    pub classes: Vec<ClassCount>,
}

impl SampleReport {
    pub fn total_selected(&self) -> usize {
        self.classes.iter().map(|c| c.selected).sum()
    }
}

/// Selects at most `quota` entries per fingerprint class.
///
/// Candidates are sorted by (step, atom id) first, so the outcome does not
/// depend on accumulation order. Classes with fewer candidates than the
/// quota contribute everything they have.
pub fn select(
    table: &FingerprintTable,
    quota: usize,
    policy: SamplePolicy,
) -> (Vec<Selection>, SampleReport) {
    let mut keys: Vec<&Fingerprint> = table.iter().map(|(k, _)| k).collect();
    keys.sort();

    let mut selections = Vec::new();
    let mut report = SampleReport::default();

    for key in keys {
        let mut candidates = table
            .candidates(key)
            .expect("key taken from the table")
            .to_vec();
        candidates.sort_unstable();

        let picked: Vec<(usize, usize)> = if candidates.len() <= quota {
            candidates.clone()
        } else {
            match policy {
                SamplePolicy::Leading => candidates[..quota].to_vec(),
                SamplePolicy::Stride => stride_indices(candidates.len(), quota)
                    .map(|i| candidates[i])
                    .collect(),
            }
        };

        report.classes.push(ClassCount {
            fingerprint: key.clone(),
            candidates: candidates.len(),
            selected: picked.len(),
        });
        selections.extend(picked.into_iter().map(|(step, atom)| Selection {
            fingerprint: key.clone(),
            step,
            atom,
        }));
    }

    (selections, report)
}

/// `quota` distinct indices spread evenly over `0..len`, first and last
/// included. Requires `len > quota`.
fn stride_indices(len: usize, quota: usize) -> impl Iterator<Item = usize> {
    debug_assert!(len > quota && quota > 0);
    (0..quota).map(move |i| {
        if quota == 1 {
            len / 2
        } else {
            i * (len - 1) / (quota - 1)
        }
    })
}
