//! Reader for LAMMPS coordinate dumps (`ITEM:`-tagged sections).
//!
//! A closed set of line kinds drives a small state machine: every `ITEM:`
//! header switches the current section, every other line is data for that
//! section. The id/type/x/y/z column positions are resolved once from the
//! `ITEM: ATOMS` header row and reused for all subsequent steps.

use std::io::{BufRead, Seek, SeekFrom};

use crate::model::{Cell, Element, Step};

use super::{element_for_type, read_block, Error, Format, TrajectoryReader};

const STEP_MARKER: &str = "ITEM: NUMBER OF ATOMS";

/// Section kinds of a LAMMPS dump, one per `ITEM:` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Timestep,
    AtomCount,
    BoxBounds,
    Atoms,
    Other,
}

impl LineKind {
    /// Pure classification of a raw line. Returns `None` for data lines.
    pub fn classify(line: &str) -> Option<LineKind> {
        if !line.starts_with("ITEM:") {
            return None;
        }
        if line.starts_with("ITEM: TIMESTEP") {
            Some(LineKind::Timestep)
        } else if line.starts_with(STEP_MARKER) {
            Some(LineKind::AtomCount)
        } else if line.starts_with("ITEM: BOX BOUNDS") {
            Some(LineKind::BoxBounds)
        } else if line.starts_with("ITEM: ATOMS") {
            Some(LineKind::Atoms)
        } else {
            Some(LineKind::Other)
        }
    }
}

/// Column positions within an `ITEM: ATOMS` data row, resolved once from the
/// header and carried explicitly for every per-step call.
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    id: usize,
    type_id: usize,
    x: usize,
    y: usize,
    z: usize,
}

impl ColumnLayout {
    fn from_header(line: &str, ln: usize) -> Result<Self, Error> {
        // Tokens after "ITEM:" "ATOMS" are the column names.
        let names: Vec<&str> = line.split_whitespace().skip(2).collect();
        let position = |key: &str| {
            names.iter().position(|&n| n == key).ok_or_else(|| {
                Error::parse(
                    Format::Dump,
                    ln,
                    format!("ATOMS header is missing the '{}' column", key),
                )
            })
        };
        Ok(Self {
            id: position("id")?,
            type_id: position("type")?,
            x: position("x")?,
            y: position("y")?,
            z: position("z")?,
        })
    }
}

pub struct DumpReader<R> {
    reader: R,
    elements: Vec<Element>,
    atom_count: usize,
    step_lines: usize,
    layout: ColumnLayout,
    periodic: [bool; 3],
    line: usize,
    step: usize,
}

impl<R: BufRead + Seek> DumpReader<R> {
    /// Scans the stream once to fix the block size, N, the static
    /// atom→element assignment, and the column layout, then rewinds.
    pub fn new(mut reader: R, type_map: &[Element], periodic: [bool; 3]) -> Result<Self, Error> {
        let (atom_count, step_lines, types, layout) = read_header(&mut reader, type_map)?;

        let mut elements = Vec::with_capacity(atom_count);
        for (idx, &type_id) in types.iter().enumerate() {
            if type_id == 0 {
                return Err(Error::parse(
                    Format::Dump,
                    0,
                    format!("atom id {} never appeared in the first step", idx + 1),
                ));
            }
            elements.push(element_for_type(type_map, type_id, 0)?);
        }

        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            elements,
            atom_count,
            step_lines,
            layout,
            periodic,
            line: 0,
            step: 0,
        })
    }
}

fn read_header<R: BufRead>(
    reader: &mut R,
    type_map: &[Element],
) -> Result<(usize, usize, Vec<usize>, ColumnLayout), Error> {
    let mut first_marker = None;
    let mut types: Vec<usize> = Vec::new();
    let mut atom_count = None;
    let mut layout = None;
    let mut section = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(kind) = LineKind::classify(&line) {
            if kind == LineKind::Atoms {
                layout = Some(ColumnLayout::from_header(&line, idx + 1)?);
            }
            section = Some(kind);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let Some(kind) = section else {
            return Err(Error::parse(
                Format::Dump,
                idx + 1,
                "data before any ITEM header",
            ));
        };
        match kind {
            LineKind::AtomCount => match first_marker {
                None => {
                    first_marker = Some(idx);
                    let n: usize = line.trim().parse().map_err(|_| {
                        Error::parse(Format::Dump, idx + 1, "unreadable atom count")
                    })?;
                    atom_count = Some(n);
                    types = vec![0usize; n];
                }
                Some(first) => {
                    let atom_count = atom_count.expect("count set with first marker");
                    let layout = layout.ok_or_else(|| {
                        Error::parse(Format::Dump, idx + 1, "no ITEM: ATOMS header before second step")
                    })?;
                    return Ok((atom_count, idx - first, types, layout));
                }
            },
            LineKind::Atoms => {
                let layout = layout.ok_or_else(|| {
                    Error::parse(Format::Dump, idx + 1, "ATOMS data without header")
                })?;
                let fields: Vec<&str> = line.split_whitespace().collect();
                let id: usize = fields
                    .get(layout.id)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::parse(Format::Dump, idx + 1, "unreadable atom id"))?;
                let type_id: usize = fields
                    .get(layout.type_id)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::parse(Format::Dump, idx + 1, "unreadable atom type"))?;
                if id == 0 || id > types.len() {
                    return Err(Error::parse(
                        Format::Dump,
                        idx + 1,
                        format!("atom id {} outside 1..={}", id, types.len()),
                    ));
                }
                element_for_type(type_map, type_id, idx + 1)?;
                types[id - 1] = type_id;
            }
            _ => {}
        }
    }

    Err(Error::Incomplete(Format::Dump))
}

impl<R: BufRead + Seek> TrajectoryReader for DumpReader<R> {
    fn format(&self) -> Format {
        Format::Dump
    }

    fn atom_count(&self) -> usize {
        self.atom_count
    }

    fn elements(&self) -> &[Element] {
        &self.elements
    }

    fn next_step(&mut self) -> Result<Option<Step>, Error> {
        let block = read_block(&mut self.reader, self.step_lines, &mut self.line)?;
        if block.iter().all(|(_, l)| l.trim().is_empty()) {
            return Ok(None);
        }
        if block.len() < self.step_lines {
            return Err(Error::parse(
                Format::Dump,
                self.line,
                "truncated step block at end of stream",
            ));
        }

        let index = self.step;
        self.step += 1;

        let mut section = None;
        let mut timestep = None;
        let mut bounds: Vec<Vec<f64>> = Vec::new();
        let mut coords: Vec<Option<[f64; 3]>> = vec![None; self.atom_count];

        for (ln, raw) in &block {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(kind) = LineKind::classify(line) {
                section = Some(kind);
                continue;
            }
            let Some(kind) = section else {
                return Err(Error::parse(Format::Dump, *ln, "data before any ITEM header"));
            };
            match kind {
                LineKind::Timestep => {
                    timestep = Some(line.parse::<i64>().map_err(|_| {
                        Error::parse(Format::Dump, *ln, "unreadable timestep")
                    })?);
                }
                LineKind::AtomCount => {
                    let declared: usize = line.parse().map_err(|_| {
                        Error::parse(Format::Dump, *ln, "unreadable atom count")
                    })?;
                    if declared != self.atom_count {
                        return Err(Error::AtomCountMismatch {
                            step: index,
                            declared,
                            found: self.atom_count,
                        });
                    }
                }
                LineKind::BoxBounds => {
                    let row: Result<Vec<f64>, _> =
                        line.split_whitespace().map(str::parse::<f64>).collect();
                    let row = row.map_err(|_| {
                        Error::parse(Format::Dump, *ln, "unreadable box bounds row")
                    })?;
                    if row.len() < 2 {
                        return Err(Error::parse(
                            Format::Dump,
                            *ln,
                            "box bounds row needs at least lo and hi",
                        ));
                    }
                    bounds.push(row);
                }
                LineKind::Atoms => {
                    let (id, position) = parse_atom_row(line, *ln, &self.layout, self.atom_count)?;
                    coords[id - 1] = Some(position);
                }
                LineKind::Other => {}
            }
        }

        let found = coords.iter().filter(|c| c.is_some()).count();
        if found != self.atom_count {
            return Err(Error::AtomCountMismatch {
                step: index,
                declared: self.atom_count,
                found,
            });
        }
        if bounds.len() != 3 {
            return Err(Error::parse(
                Format::Dump,
                self.line,
                format!("expected three box bounds rows, found {}", bounds.len()),
            ));
        }

        let cell = cell_from_bounds(&bounds, self.periodic);
        let coords = coords.into_iter().map(|c| c.expect("all rows seen")).collect();
        Ok(Some(Step {
            index,
            timestep,
            coords: Some(coords),
            cell: Some(cell),
            bonds: None,
        }))
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.line = 0;
        self.step = 0;
        Ok(())
    }
}

fn parse_atom_row(
    line: &str,
    ln: usize,
    layout: &ColumnLayout,
    atom_count: usize,
) -> Result<(usize, [f64; 3]), Error> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let field = |col: usize, what: &str| {
        fields
            .get(col)
            .copied()
            .ok_or_else(|| Error::atom_row(ln, format!("missing {} column", what)))
    };
    let id: usize = field(layout.id, "id")?
        .parse()
        .map_err(|_| Error::atom_row(ln, "unreadable atom id"))?;
    if id == 0 || id > atom_count {
        return Err(Error::atom_row(
            ln,
            format!("atom id {} outside 1..={}", id, atom_count),
        ));
    }
    let coord = |col: usize, what: &str| -> Result<f64, Error> {
        field(col, what)?
            .parse()
            .map_err(|_| Error::atom_row(ln, format!("unreadable {} coordinate", what)))
    };
    let x = coord(layout.x, "x")?;
    let y = coord(layout.y, "y")?;
    let z = coord(layout.z, "z")?;
    Ok((id, [x, y, z]))
}

/// Reconstructs the triclinic cell from LAMMPS bounds-plus-tilt rows.
///
/// With tilt factors the dumped bounds are extended; the true box edges are
/// recovered with `xlo = lo - min(0,xy,xz,xy+xz)`,
/// `xhi = hi - max(0,xy,xz,xy+xz)`, the y bounds corrected with `yz` only,
/// and z unmodified. A missing third column means an orthorhombic box.
fn cell_from_bounds(bounds: &[Vec<f64>], periodic: [bool; 3]) -> Cell {
    let (xy, xz, yz) = if bounds.iter().all(|row| row.len() > 2) {
        (bounds[0][2], bounds[1][2], bounds[2][2])
    } else {
        (0.0, 0.0, 0.0)
    };

    let xlo = bounds[0][0] - [0.0, xy, xz, xy + xz].into_iter().fold(f64::INFINITY, f64::min);
    let xhi = bounds[0][1] - [0.0, xy, xz, xy + xz].into_iter().fold(f64::NEG_INFINITY, f64::max);
    let ylo = bounds[1][0] - yz.min(0.0);
    let yhi = bounds[1][1] - yz.max(0.0);
    let zlo = bounds[2][0];
    let zhi = bounds[2][1];

    Cell::new(
        [
            [xhi - xlo, 0.0, 0.0],
            [xy, yhi - ylo, 0.0],
            [xz, yz, zhi - zlo],
        ],
        periodic,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Two steps, N = 4, methane-ish CH3 cluster; columns deliberately not in
    // id-first order.
    const DUMP: &str = "\
ITEM: TIMESTEP
0
ITEM: NUMBER OF ATOMS
4
ITEM: BOX BOUNDS pp pp pp
0.0 10.0
0.0 10.0
0.0 10.0
ITEM: ATOMS type id x y z
1 1 5.0 5.0 5.0
2 2 6.0 5.0 5.0
2 3 5.0 6.5 5.0
2 4 5.0 5.0 7.0
ITEM: TIMESTEP
100
ITEM: NUMBER OF ATOMS
4
ITEM: BOX BOUNDS pp pp pp
0.0 10.0
0.0 10.0
0.0 10.0
ITEM: ATOMS type id x y z
1 1 5.1 5.0 5.0
2 4 5.0 5.0 7.1
2 2 6.1 5.0 5.0
2 3 5.0 6.6 5.0
";

    fn type_map() -> Vec<Element> {
        vec![Element::C, Element::H]
    }

    fn open(data: &str) -> DumpReader<Cursor<Vec<u8>>> {
        DumpReader::new(Cursor::new(data.as_bytes().to_vec()), &type_map(), [true; 3]).unwrap()
    }

    #[test]
    fn classify_covers_the_closed_line_set() {
        assert_eq!(LineKind::classify("ITEM: TIMESTEP"), Some(LineKind::Timestep));
        assert_eq!(
            LineKind::classify("ITEM: NUMBER OF ATOMS"),
            Some(LineKind::AtomCount)
        );
        assert_eq!(
            LineKind::classify("ITEM: BOX BOUNDS xy xz yz pp pp pp"),
            Some(LineKind::BoxBounds)
        );
        assert_eq!(
            LineKind::classify("ITEM: ATOMS id type x y z"),
            Some(LineKind::Atoms)
        );
        assert_eq!(LineKind::classify("ITEM: TIME"), Some(LineKind::Other));
        assert_eq!(LineKind::classify("0.0 10.0"), None);
    }

    #[test]
    fn header_scan_resolves_layout_and_types() {
        let reader = open(DUMP);
        assert_eq!(reader.atom_count(), 4);
        assert_eq!(reader.step_lines, 13);
        assert_eq!(
            reader.elements(),
            &[Element::C, Element::H, Element::H, Element::H]
        );
    }

    #[test]
    fn atom_rows_are_keyed_by_id_not_file_order() {
        let mut reader = open(DUMP);
        reader.next_step().unwrap();
        let step1 = reader.next_step().unwrap().unwrap();
        let coords = step1.coords.as_ref().unwrap();
        // Atom 4 was dumped second but lands at index 3.
        assert_eq!(coords[3], [5.0, 5.0, 7.1]);
        assert_eq!(coords[1], [6.1, 5.0, 5.0]);
        assert_eq!(step1.timestep, Some(100));
    }

    #[test]
    fn orthorhombic_box_is_reconstructed() {
        let mut reader = open(DUMP);
        let step = reader.next_step().unwrap().unwrap();
        let cell = step.cell.unwrap();
        assert_eq!(
            *cell.rows(),
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]
        );
    }

    #[test]
    fn tilted_bounds_recover_the_triclinic_cell() {
        // Third columns are xy, xz, yz in row order.
        let bounds = vec![
            vec![-2.0, 12.0, 2.0],
            vec![0.0, 10.5, 0.0],
            vec![0.0, 10.0, -0.5],
        ];
        // xy=2, xz=0, yz=-0.5: xlo=-2-min(0,2,0,2)=-2, xhi=12-max(0,2,0,2)=10
        // ylo=0-min(0,-0.5)=0.5, yhi=10.5-max(0,-0.5)=10.5
        let cell = cell_from_bounds(&bounds, [true; 3]);
        let rows = cell.rows();
        assert!((rows[0][0] - 12.0).abs() < 1e-12);
        assert!((rows[1][1] - 10.0).abs() < 1e-12);
        assert!((rows[2][2] - 10.0).abs() < 1e-12);
        assert!((rows[1][0] - 2.0).abs() < 1e-12);
        assert!((rows[2][0] - 0.0).abs() < 1e-12);
        assert!((rows[2][1] - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn data_before_item_header_is_fatal() {
        let headerless = "4\nITEM: TIMESTEP\n0\n";
        let result = DumpReader::new(
            Cursor::new(headerless.as_bytes().to_vec()),
            &type_map(),
            [true; 3],
        );
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn declared_count_change_is_fatal() {
        let corrupted = DUMP.replacen(
            "ITEM: NUMBER OF ATOMS\n4\nITEM: BOX BOUNDS pp pp pp\n0.0 10.0\n0.0 10.0\n0.0 10.0\nITEM: ATOMS type id x y z\n1 1 5.1",
            "ITEM: NUMBER OF ATOMS\n5\nITEM: BOX BOUNDS pp pp pp\n0.0 10.0\n0.0 10.0\n0.0 10.0\nITEM: ATOMS type id x y z\n1 1 5.1",
            1,
        );
        let mut reader = open(&corrupted);
        reader.next_step().unwrap();
        assert!(matches!(
            reader.next_step(),
            Err(Error::AtomCountMismatch { .. })
        ));
    }

    #[test]
    fn missing_coordinate_column_is_recoverable_per_step() {
        let corrupted = DUMP.replacen("2 3 5.0 6.6 5.0", "2 3 5.0 6.6", 1);
        let mut reader = open(&corrupted);
        reader.next_step().unwrap();
        let err = reader.next_step().unwrap_err();
        assert!(err.is_recoverable());
        assert!(reader.next_step().unwrap().is_none());
    }

    #[test]
    fn missing_required_column_fails_at_open() {
        let no_type = DUMP.replace("ITEM: ATOMS type id x y z", "ITEM: ATOMS q id x y z");
        let result = DumpReader::new(Cursor::new(no_type.into_bytes()), &type_map(), [true; 3]);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }
}
