use super::element::Element;

/// Triclinic simulation cell with per-axis periodicity flags.
///
/// Lattice vectors are stored as rows in the LAMMPS lower-triangular
/// convention: `[[lx,0,0],[xy,ly,0],[xz,yz,lz]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    rows: [[f64; 3]; 3],
    periodic: [bool; 3],
}

impl Cell {
    pub fn new(rows: [[f64; 3]; 3], periodic: [bool; 3]) -> Self {
        Self { rows, periodic }
    }

    pub fn orthorhombic(lengths: [f64; 3], periodic: [bool; 3]) -> Self {
        Self {
            rows: [
                [lengths[0], 0.0, 0.0],
                [0.0, lengths[1], 0.0],
                [0.0, 0.0, lengths[2]],
            ],
            periodic,
        }
    }

    #[inline]
    pub fn rows(&self) -> &[[f64; 3]; 3] {
        &self.rows
    }

    #[inline]
    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn volume(&self) -> f64 {
        det3(&self.rows).abs()
    }

    fn is_orthorhombic(&self) -> bool {
        self.rows[1][0] == 0.0 && self.rows[2][0] == 0.0 && self.rows[2][1] == 0.0
    }

    /// Applies the minimum-image convention to a displacement vector,
    /// respecting the per-axis periodicity flags.
    pub fn minimum_image(&self, d: [f64; 3]) -> [f64; 3] {
        if self.is_orthorhombic() {
            let mut out = d;
            for k in 0..3 {
                if self.periodic[k] {
                    let len = self.rows[k][k];
                    out[k] -= (out[k] / len).round() * len;
                }
            }
            return out;
        }

        // General triclinic: wrap in fractional coordinates. Positions are
        // row vectors, r = s · M, so s = r · M⁻¹.
        let inv = inv3(&self.rows);
        let mut s = mul_row(d, &inv);
        for k in 0..3 {
            if self.periodic[k] {
                s[k] -= s[k].round();
            }
        }
        mul_row(s, &self.rows)
    }

    /// Minimum-image distance between two positions.
    pub fn distance(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        let d = self.minimum_image([a[0] - b[0], a[1] - b[1], a[2] - b[2]]);
        norm(d)
    }
}

pub fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inv3(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let det = det3(m);
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

fn mul_row(v: [f64; 3], m: &[[f64; 3]; 3]) -> [f64; 3] {
    [
        v[0] * m[0][0] + v[1] * m[1][0] + v[2] * m[2][0],
        v[0] * m[0][1] + v[1] * m[1][1] + v[2] * m[2][1],
        v[0] * m[0][2] + v[1] * m[1][2] + v[2] * m[2][2],
    ]
}

/// Bonded neighbors of one atom within a single step, as read from a
/// bond-list trajectory. Neighbor indices are 0-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BondRow {
    pub neighbors: Vec<usize>,
    pub orders: Vec<f64>,
}

/// One timestep snapshot. All per-atom vectors are indexed by atom id − 1;
/// atom ids are stable across the whole trajectory.
///
/// A bond-list source fills `bonds`; a coordinate-dump source fills `coords`
/// and `cell`.
#[derive(Debug, Clone)]
pub struct Step {
    /// Ordinal of this step within the trajectory, starting at 0.
    pub index: usize,
    /// Simulation timestep from the dump header, when present.
    pub timestep: Option<i64>,
    pub coords: Option<Vec<[f64; 3]>>,
    pub cell: Option<Cell>,
    pub bonds: Option<Vec<BondRow>>,
}

/// A standalone structure handed to external labeling collaborators.
#[derive(Debug, Clone)]
pub struct Structure {
    pub elements: Vec<Element>,
    pub coords: Vec<[f64; 3]>,
    pub cell: Option<Cell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthorhombic_minimum_image_picks_nearest_copy() {
        let cell = Cell::orthorhombic([10.0, 10.0, 10.0], [true; 3]);
        let d = cell.minimum_image([0.5 - 9.6, 0.0, 0.0]);
        assert!((norm(d) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn minimum_image_distance_matches_synthetic_pair() {
        let cell = Cell::orthorhombic([10.0, 10.0, 10.0], [true; 3]);
        let d = cell.distance([0.5, 5.0, 5.0], [9.6, 5.0, 5.0]);
        assert!((d - 0.9).abs() < 1e-12);
    }

    #[test]
    fn non_periodic_axes_are_left_unwrapped() {
        let cell = Cell::orthorhombic([10.0, 10.0, 10.0], [true, false, true]);
        let d = cell.minimum_image([9.0, 9.0, 0.0]);
        assert!((d[0] - (-1.0)).abs() < 1e-12);
        assert!((d[1] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn triclinic_wrap_agrees_with_orthorhombic_when_tilt_is_zero() {
        // Force the general path with a negligible tilt.
        let tilted = Cell::new(
            [[10.0, 0.0, 0.0], [1e-15, 10.0, 0.0], [0.0, 0.0, 10.0]],
            [true; 3],
        );
        let d = tilted.minimum_image([9.1, -8.7, 4.9]);
        assert!((d[0] - (-0.9)).abs() < 1e-9);
        assert!((d[1] - 1.3).abs() < 1e-9);
        assert!((d[2] - 4.9).abs() < 1e-9);
    }

    #[test]
    fn triclinic_wrap_uses_lattice_vectors() {
        // Sheared box: the wrap must subtract whole lattice vectors, not
        // axis lengths.
        let cell = Cell::new(
            [[10.0, 0.0, 0.0], [5.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            [true; 3],
        );
        let d = cell.minimum_image([7.0, 9.0, 0.0]);
        // s = (0.25, 0.9, 0) -> wraps b: d - b = (2.0, -1.0, 0)
        assert!((d[0] - 2.0).abs() < 1e-9);
        assert!((d[1] - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn volume_of_sheared_cell_is_preserved() {
        let cell = Cell::new(
            [[10.0, 0.0, 0.0], [3.0, 10.0, 0.0], [1.0, 2.0, 10.0]],
            [true; 3],
        );
        assert!((cell.volume() - 1000.0).abs() < 1e-9);
    }
}
