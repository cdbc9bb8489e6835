//! Per-step fingerprint classification and the trajectory-wide accumulation
//! table consumed by the sampler.

use std::collections::HashMap;

use crate::model::{Element, Fingerprint, Step};

use super::error::Error;
use super::perceive::BondPerceiver;

/// Classifies one step's atoms into fingerprint classes.
///
/// Bond-list steps take bond orders straight from the file; dump steps run
/// the bond-perception seam first. Returned atom ids are 1-based, matching
/// the trajectory files.
///
/// When both `errors` and an `error_limit` are present, only atoms whose
/// error exceeds the limit are kept (the atoms the current model trusts
/// least); otherwise every atom is kept.
pub fn classify_step(
    step: &Step,
    elements: &[Element],
    perceiver: &dyn BondPerceiver,
    errors: Option<&[f64]>,
    error_limit: Option<f64>,
) -> Result<HashMap<Fingerprint, Vec<usize>>, Error> {
    let keep = |atom: usize| match (errors, error_limit) {
        (Some(errors), Some(limit)) => errors[atom] > limit,
        _ => true,
    };

    let mut classes: HashMap<Fingerprint, Vec<usize>> = HashMap::new();

    if let Some(bonds) = &step.bonds {
        for (atom, row) in bonds.iter().enumerate() {
            if !keep(atom) {
                continue;
            }
            let key = Fingerprint::new(elements[atom], &row.orders);
            classes.entry(key).or_default().push(atom + 1);
        }
        return Ok(classes);
    }

    if let Some(coords) = &step.coords {
        let perceived = perceiver.perceive(elements, coords, step.cell.as_ref())?;
        let orders = perceived.atom_orders(elements.len());
        for (atom, atom_orders) in orders.iter().enumerate() {
            if !keep(atom) {
                continue;
            }
            let key = Fingerprint::from_integer_orders(elements[atom], atom_orders);
            classes.entry(key).or_default().push(atom + 1);
        }
        return Ok(classes);
    }

    Err(Error::EmptyStep { step: step.index })
}

/// Trajectory-wide accumulation: fingerprint class → (step, atom id)
/// candidates. Grows monotonically during the scan; consumed read-only by
/// the sampler.
///
/// Workers classify chunks into local tables which a single-threaded
/// reducer [`merge`](FingerprintTable::merge)s, so no locking is needed on
/// hot keys.
#[derive(Debug, Default)]
pub struct FingerprintTable {
    map: HashMap<Fingerprint, Vec<(usize, usize)>>,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one step's classification into the table.
    pub fn insert_step(&mut self, step: usize, classes: HashMap<Fingerprint, Vec<usize>>) {
        for (key, atoms) in classes {
            let entries = self.map.entry(key).or_default();
            entries.extend(atoms.into_iter().map(|atom| (step, atom)));
        }
    }

    /// Concatenates another table's candidate lists per identical key.
    pub fn merge(&mut self, other: FingerprintTable) {
        for (key, mut entries) in other.map {
            self.map.entry(key).or_default().append(&mut entries);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &[(usize, usize)])> {
        self.map.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn candidates(&self, key: &Fingerprint) -> Option<&[(usize, usize)]> {
        self.map.get(key).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::perceive::CovalentRadiusPerceiver;
    use crate::model::{BondRow, Cell};

    fn bond_step(index: usize, rows: Vec<BondRow>) -> Step {
        Step {
            index,
            timestep: None,
            coords: None,
            cell: None,
            bonds: Some(rows),
        }
    }

    fn methane_rows() -> Vec<BondRow> {
        let mut rows = vec![BondRow {
            neighbors: vec![1, 2, 3, 4],
            orders: vec![0.94, 0.97, 1.02, 0.99],
        }];
        for _ in 0..4 {
            rows.push(BondRow {
                neighbors: vec![0],
                orders: vec![1.0],
            });
        }
        rows
    }

    fn methane_elements() -> Vec<Element> {
        vec![
            Element::C,
            Element::H,
            Element::H,
            Element::H,
            Element::H,
        ]
    }

    #[test]
    fn groups_equivalent_atoms_into_one_class() {
        let step = bond_step(0, methane_rows());
        let classes = classify_step(
            &step,
            &methane_elements(),
            &CovalentRadiusPerceiver::default(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(classes.len(), 2);
        let c_key = Fingerprint::new(Element::C, &[1.0; 4]);
        let h_key = Fingerprint::new(Element::H, &[1.0]);
        assert_eq!(classes[&c_key], vec![1]);
        assert_eq!(classes[&h_key], vec![2, 3, 4, 5]);
    }

    #[test]
    fn error_filter_keeps_only_untrusted_atoms() {
        let step = bond_step(0, methane_rows());
        let errors = [0.01, 0.5, 0.02, 0.9, 0.03];
        let classes = classify_step(
            &step,
            &methane_elements(),
            &CovalentRadiusPerceiver::default(),
            Some(&errors),
            Some(0.1),
        )
        .unwrap();

        let h_key = Fingerprint::new(Element::H, &[1.0]);
        assert_eq!(classes[&h_key], vec![2, 4]);
        assert!(!classes.contains_key(&Fingerprint::new(Element::C, &[1.0; 4])));
    }

    #[test]
    fn no_threshold_means_no_filtering() {
        let step = bond_step(0, methane_rows());
        let errors = [0.0; 5];
        let classes = classify_step(
            &step,
            &methane_elements(),
            &CovalentRadiusPerceiver::default(),
            Some(&errors),
            None,
        )
        .unwrap();
        let total: usize = classes.values().map(Vec::len).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn dump_steps_go_through_the_perceiver() {
        let step = Step {
            index: 0,
            timestep: Some(0),
            coords: Some(vec![
                [5.0, 5.0, 5.0],
                [6.0, 5.0, 5.0],
                [5.0, 6.0, 5.0],
                [0.0, 0.0, 0.0],
            ]),
            cell: Some(Cell::orthorhombic([20.0, 20.0, 20.0], [true; 3])),
            bonds: None,
        };
        let elements = vec![Element::C, Element::H, Element::H, Element::He];
        let classes = classify_step(
            &step,
            &elements,
            &CovalentRadiusPerceiver::default(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(classes[&Fingerprint::new(Element::C, &[1.0, 1.0])], vec![1]);
        assert_eq!(classes[&Fingerprint::new(Element::He, &[])], vec![4]);
    }

    #[test]
    fn table_merge_concatenates_per_key() {
        let elements = methane_elements();
        let perceiver = CovalentRadiusPerceiver::default();

        let mut left = FingerprintTable::new();
        left.insert_step(
            0,
            classify_step(&bond_step(0, methane_rows()), &elements, &perceiver, None, None)
                .unwrap(),
        );
        let mut right = FingerprintTable::new();
        right.insert_step(
            1,
            classify_step(&bond_step(1, methane_rows()), &elements, &perceiver, None, None)
                .unwrap(),
        );

        left.merge(right);
        let h_key = Fingerprint::new(Element::H, &[1.0]);
        let candidates = left.candidates(&h_key).unwrap();
        assert_eq!(candidates.len(), 8);
        assert!(candidates.contains(&(0, 2)));
        assert!(candidates.contains(&(1, 5)));
    }

    #[test]
    fn same_environment_in_different_steps_shares_a_key() {
        let elements = methane_elements();
        let perceiver = CovalentRadiusPerceiver::default();
        let a = classify_step(&bond_step(0, methane_rows()), &elements, &perceiver, None, None)
            .unwrap();
        let b = classify_step(&bond_step(7, methane_rows()), &elements, &perceiver, None, None)
            .unwrap();
        let keys_a: std::collections::BTreeSet<_> = a.keys().cloned().collect();
        let keys_b: std::collections::BTreeSet<_> = b.keys().cloned().collect();
        assert_eq!(keys_a, keys_b);
    }
}
