//! Reader for ReaxFF bond-list trajectories (`fix reaxff/bonds` output).
//!
//! Step boundaries are marked by the repeating `# Number of particles`
//! header; the distance between two consecutive markers fixes the block
//! size. Atom types are declared in the first step and static thereafter.
//!
//! Per-atom rows follow `id type nb n_1..n_nb mol bo_1..bo_nb ...`.

use std::io::{BufRead, Seek, SeekFrom};

use crate::model::{BondRow, Element, Step};

use super::{element_for_type, read_block, Error, Format, TrajectoryReader};

const STEP_MARKER: &str = "# Number of particles";

pub struct BondReader<R> {
    reader: R,
    elements: Vec<Element>,
    atom_count: usize,
    step_lines: usize,
    line: usize,
    step: usize,
}

impl<R: BufRead + Seek> BondReader<R> {
    /// Scans the stream once to determine the block size, N, and the static
    /// atom→element assignment, then rewinds for streaming.
    pub fn new(mut reader: R, type_map: &[Element]) -> Result<Self, Error> {
        let (atom_count, step_lines, types) = read_header(&mut reader, type_map)?;

        let mut elements = Vec::with_capacity(atom_count);
        for (idx, &type_id) in types.iter().enumerate() {
            if type_id == 0 {
                return Err(Error::parse(
                    Format::Bond,
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
            line: 0,
            step: 0,
        })
    }
}

fn read_header<R: BufRead>(
    reader: &mut R,
    type_map: &[Element],
) -> Result<(usize, usize, Vec<usize>), Error> {
    let mut atom_count = None;
    let mut first_marker = None;
    let mut types: Vec<usize> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.starts_with('#') {
            if line.starts_with(STEP_MARKER) {
                match first_marker {
                    None => {
                        first_marker = Some(idx);
                        let n = first_integer(&line).ok_or_else(|| {
                            Error::parse(Format::Bond, idx + 1, "unreadable particle count")
                        })?;
                        atom_count = Some(n);
                        types = vec![0usize; n];
                    }
                    Some(first) => {
                        let atom_count = atom_count.expect("count set with first marker");
                        return Ok((atom_count, idx - first, types));
                    }
                }
            }
        } else if !line.trim().is_empty() && first_marker.is_some() {
            let mut fields = line.split_whitespace();
            let id: usize = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::parse(Format::Bond, idx + 1, "unreadable atom id"))?;
            let type_id: usize = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::parse(Format::Bond, idx + 1, "unreadable atom type"))?;
            if id == 0 || id > types.len() {
                return Err(Error::parse(
                    Format::Bond,
                    idx + 1,
                    format!("atom id {} outside 1..={}", id, types.len()),
                ));
            }
            element_for_type(type_map, type_id, idx + 1)?;
            types[id - 1] = type_id;
        }
    }

    Err(Error::Incomplete(Format::Bond))
}

fn first_integer(line: &str) -> Option<usize> {
    line.split_whitespace()
        .filter_map(|tok| tok.parse::<usize>().ok())
        .next()
}

impl<R: BufRead + Seek> TrajectoryReader for BondReader<R> {
    fn format(&self) -> Format {
        Format::Bond
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
                Format::Bond,
                self.line,
                "truncated step block at end of stream",
            ));
        }

        let index = self.step;
        self.step += 1;

        let mut rows: Vec<Option<BondRow>> = vec![None; self.atom_count];
        for (ln, raw) in &block {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if line.starts_with(STEP_MARKER) {
                    let declared = first_integer(line).ok_or_else(|| {
                        Error::parse(Format::Bond, *ln, "unreadable particle count")
                    })?;
                    if declared != self.atom_count {
                        return Err(Error::AtomCountMismatch {
                            step: index,
                            declared,
                            found: self.atom_count,
                        });
                    }
                }
                continue;
            }
            let (id, row) = parse_bond_row(line, *ln, self.atom_count)?;
            rows[id - 1] = Some(row);
        }

        let found = rows.iter().filter(|r| r.is_some()).count();
        if found != self.atom_count {
            return Err(Error::AtomCountMismatch {
                step: index,
                declared: self.atom_count,
                found,
            });
        }

        let bonds = rows.into_iter().map(|r| r.expect("all rows seen")).collect();
        Ok(Some(Step {
            index,
            timestep: None,
            coords: None,
            cell: None,
            bonds: Some(bonds),
        }))
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.line = 0;
        self.step = 0;
        Ok(())
    }
}

/// Parses one `id type nb n_1..n_nb mol bo_1..bo_nb ...` row.
///
/// Returns [`Error::AtomRow`] on damage confined to the row, so callers can
/// skip the step without aborting the run.
fn parse_bond_row(line: &str, ln: usize, atom_count: usize) -> Result<(usize, BondRow), Error> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(Error::atom_row(ln, "expected at least id, type, nb"));
    }
    let id: usize = fields[0]
        .parse()
        .map_err(|_| Error::atom_row(ln, "unreadable atom id"))?;
    if id == 0 || id > atom_count {
        return Err(Error::atom_row(
            ln,
            format!("atom id {} outside 1..={}", id, atom_count),
        ));
    }
    let nb: usize = fields[2]
        .parse()
        .map_err(|_| Error::atom_row(ln, "unreadable neighbor count"))?;
    // Neighbor ids sit at 3..3+nb; a molecule id follows; bond orders at
    // 4+nb..4+2nb.
    if fields.len() < 4 + 2 * nb {
        return Err(Error::atom_row(
            ln,
            format!("row too short for {} bonds", nb),
        ));
    }

    let mut neighbors = Vec::with_capacity(nb);
    for tok in &fields[3..3 + nb] {
        let neighbor: usize = tok
            .parse()
            .map_err(|_| Error::atom_row(ln, "unreadable neighbor id"))?;
        if neighbor == 0 || neighbor > atom_count {
            return Err(Error::atom_row(
                ln,
                format!("neighbor id {} outside 1..={}", neighbor, atom_count),
            ));
        }
        neighbors.push(neighbor - 1);
    }

    let mut orders = Vec::with_capacity(nb);
    for tok in &fields[4 + nb..4 + 2 * nb] {
        let order: f64 = tok
            .parse()
            .map_err(|_| Error::atom_row(ln, "unreadable bond order"))?;
        orders.push(order);
    }

    Ok((id, BondRow { neighbors, orders }))
}
