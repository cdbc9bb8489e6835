//! Periodic-boundary-aware neighbor search and the permutation-invariant
//! local-environment descriptor.

use crate::model::{step::norm, Cell, Element};

/// The local environment of one target atom within one step.
#[derive(Debug, Clone)]
pub struct Environment {
    /// 0-based indices of atoms within the cutoff, self excluded.
    pub neighbors: Vec<usize>,
    /// Neighbor coordinates re-wrapped into the first neighbor's periodic
    /// image, so pairwise neighbor-neighbor geometry is physically
    /// meaningful.
    pub coords: Vec<[f64; 3]>,
    /// Ascending-sorted `Z(neighbor) / |d(neighbor, target)|` values.
    /// Empty when no atom falls within the cutoff.
    pub descriptor: Vec<f64>,
}

/// Finds all neighbors of `target` within `cutoff` under the minimum-image
/// convention and derives the sorted descriptor.
///
/// `cell = None` means an open boundary: plain Euclidean distances. The
/// zero-distance self pair is always excluded; an isolated atom yields an
/// empty (not missing) descriptor.
pub fn local_environment(
    target: usize,
    elements: &[Element],
    coords: &[[f64; 3]],
    cell: Option<&Cell>,
    cutoff: f64,
) -> Environment {
    let displacement = |j: usize| -> [f64; 3] {
        let raw = [
            coords[j][0] - coords[target][0],
            coords[j][1] - coords[target][1],
            coords[j][2] - coords[target][2],
        ];
        match cell {
            Some(cell) => cell.minimum_image(raw),
            None => raw,
        }
    };

    let mut neighbors = Vec::new();
    let mut distances = Vec::new();
    for j in 0..coords.len() {
        if j == target {
            continue;
        }
        let distance = norm(displacement(j));
        if distance > 0.0 && distance <= cutoff {
            neighbors.push(j);
            distances.push(distance);
        }
    }

    let wrapped = rewrap_neighbors(&neighbors, coords, cell);

    let mut descriptor: Vec<f64> = neighbors
        .iter()
        .zip(&distances)
        .map(|(&j, &d)| f64::from(elements[j].atomic_number()) / d)
        .collect();
    descriptor.sort_by(|a, b| a.total_cmp(b));

    Environment {
        neighbors,
        coords: wrapped,
        descriptor,
    }
}

/// Moves every neighbor into the periodic image nearest the first neighbor,
/// leaving the first as the anchor.
fn rewrap_neighbors(
    neighbors: &[usize],
    coords: &[[f64; 3]],
    cell: Option<&Cell>,
) -> Vec<[f64; 3]> {
    let Some(cell) = cell else {
        return neighbors.iter().map(|&j| coords[j]).collect();
    };
    let Some(&anchor_idx) = neighbors.first() else {
        return Vec::new();
    };
    let anchor = coords[anchor_idx];

    neighbors
        .iter()
        .map(|&j| {
            let d = cell.minimum_image([
                coords[j][0] - anchor[0],
                coords[j][1] - anchor[1],
                coords[j][2] - anchor[2],
            ]);
            [anchor[0] + d[0], anchor[1] + d[1], anchor[2] + d[2]]
        })
        .collect()
}
