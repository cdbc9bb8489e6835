//! Seam for the external bond-perception oracle.
//!
//! Dump-format steps carry coordinates only; adjacency must be derived from
//! geometry. The pipeline treats whatever a [`BondPerceiver`] returns as
//! ground truth and never re-derives bonds itself. The built-in
//! [`CovalentRadiusPerceiver`] is a geometric stand-in for a full
//! cheminformatics engine: it connects atoms whose minimum-image distance
//! falls under the sum of covalent radii plus a tolerance, and reports no
//! bond orders.

use crate::model::{Cell, Element};

use super::error::Error;

/// Bonds perceived for one step. Pairs are 0-based `(i, j)` with `i < j`;
/// `orders` is parallel to `pairs` when the oracle assigns them.
#[derive(Debug, Clone, Default)]
pub struct PerceivedBonds {
    pub pairs: Vec<(usize, usize)>,
    pub orders: Option<Vec<u8>>,
}

impl PerceivedBonds {
    /// Expands pairs into a per-atom adjacency list.
    pub fn adjacency(&self, atom_count: usize) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); atom_count];
        for &(i, j) in &self.pairs {
            adjacency[i].push(j);
            adjacency[j].push(i);
        }
        adjacency
    }

    /// Per-atom integer bond orders; pairs without a perceived order count
    /// as single bonds.
    pub fn atom_orders(&self, atom_count: usize) -> Vec<Vec<u8>> {
        let mut orders = vec![Vec::new(); atom_count];
        for (idx, &(i, j)) in self.pairs.iter().enumerate() {
            let order = self
                .orders
                .as_ref()
                .map(|o| o[idx].max(1))
                .unwrap_or(1);
            orders[i].push(order);
            orders[j].push(order);
        }
        orders
    }
}

/// Black-box bond perception over elements, coordinates, and an optional
/// periodic cell. Implementations must tolerate isolated atoms and mixed
/// periodic/non-periodic axes.
pub trait BondPerceiver: Sync {
    fn perceive(
        &self,
        elements: &[Element],
        coords: &[[f64; 3]],
        cell: Option<&Cell>,
    ) -> Result<PerceivedBonds, Error>;
}

/// Distance-based perception: `|d(i,j)| < r_cov(i) + r_cov(j) + tolerance`,
/// with a floor below which contacts are treated as overlapping artifacts.
#[derive(Debug, Clone)]
pub struct CovalentRadiusPerceiver {
    pub tolerance: f64,
    pub min_distance: f64,
}

impl Default for CovalentRadiusPerceiver {
    fn default() -> Self {
        Self {
            tolerance: 0.45,
            min_distance: 0.4,
        }
    }
}

impl CovalentRadiusPerceiver {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }
}

impl BondPerceiver for CovalentRadiusPerceiver {
    fn perceive(
        &self,
        elements: &[Element],
        coords: &[[f64; 3]],
        cell: Option<&Cell>,
    ) -> Result<PerceivedBonds, Error> {
        if elements.len() != coords.len() {
            return Err(Error::Perception(format!(
                "{} elements but {} coordinates",
                elements.len(),
                coords.len()
            )));
        }

        let mut pairs = Vec::new();
        for i in 0..coords.len() {
            for j in (i + 1)..coords.len() {
                let raw = [
                    coords[i][0] - coords[j][0],
                    coords[i][1] - coords[j][1],
                    coords[i][2] - coords[j][2],
                ];
                let distance = match cell {
                    Some(cell) => crate::model::step::norm(cell.minimum_image(raw)),
                    None => crate::model::step::norm(raw),
                };
                let reach =
                    elements[i].covalent_radius() + elements[j].covalent_radius() + self.tolerance;
                if distance > self.min_distance && distance < reach {
                    pairs.push((i, j));
                }
            }
        }

        Ok(PerceivedBonds {
            pairs,
            orders: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connects_a_water_molecule() {
        let elements = [Element::O, Element::H, Element::H];
        let coords = [
            [0.0, 0.0, 0.0],
            [0.96, 0.0, 0.0],
            [-0.24, 0.93, 0.0],
        ];
        let perceived = CovalentRadiusPerceiver::default()
            .perceive(&elements, &coords, None)
            .unwrap();
        assert_eq!(perceived.pairs, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn isolated_atoms_produce_no_bonds() {
        let elements = [Element::He, Element::He];
        let coords = [[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]];
        let perceived = CovalentRadiusPerceiver::default()
            .perceive(&elements, &coords, None)
            .unwrap();
        assert!(perceived.pairs.is_empty());
    }

    #[test]
    fn bonds_across_the_periodic_boundary() {
        // Minimum-image distance 1.3 Å, well under the C-C reach of 1.97 Å
        // and above the overlap floor.
        let elements = [Element::C, Element::C];
        let coords = [[0.5, 5.0, 5.0], [9.2, 5.0, 5.0]];
        let cell = Cell::orthorhombic([10.0, 10.0, 10.0], [true; 3]);

        let with_pbc = CovalentRadiusPerceiver::default()
            .perceive(&elements, &coords, Some(&cell))
            .unwrap();
        assert_eq!(with_pbc.pairs, vec![(0, 1)]);

        let open_cell = Cell::orthorhombic([10.0, 10.0, 10.0], [false; 3]);
        let without = CovalentRadiusPerceiver::default()
            .perceive(&elements, &coords, Some(&open_cell))
            .unwrap();
        assert!(without.pairs.is_empty());
    }

    #[test]
    fn overlap_floor_applies_through_the_minimum_image() {
        // Wrapped separation of ~0.4 Å sits at the overlap floor.
        let elements = [Element::C, Element::C];
        let coords = [[0.2, 5.0, 5.0], [9.8, 5.0, 5.0]];
        let cell = Cell::orthorhombic([10.0, 10.0, 10.0], [true; 3]);
        let perceived = CovalentRadiusPerceiver::default()
            .perceive(&elements, &coords, Some(&cell))
            .unwrap();
        assert!(perceived.pairs.is_empty());
    }

    #[test]
    fn overlapping_artifacts_are_not_bonded() {
        let elements = [Element::H, Element::H];
        let coords = [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]];
        let perceived = CovalentRadiusPerceiver::default()
            .perceive(&elements, &coords, None)
            .unwrap();
        assert!(perceived.pairs.is_empty());
    }

    #[test]
    fn missing_orders_default_to_single_bonds() {
        let perceived = PerceivedBonds {
            pairs: vec![(0, 1), (1, 2)],
            orders: None,
        };
        let orders = perceived.atom_orders(3);
        assert_eq!(orders[1], vec![1, 1]);
    }
}
