//! Format adapters turning LAMMPS trajectory files into a uniform,
//! pull-based stream of [`Step`]s.
//!
//! Two variants share one contract: a single initialization scan fixes the
//! number of lines per step block, the atom count N, and the static
//! atom→element assignment; afterwards steps are parsed lazily, one block at
//! a time, with no computation beyond raw parsing.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub mod error;

pub mod bond;
pub mod dump;

pub use error::Error;

use crate::model::{Element, Step};

/// Trajectory file format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Bond-list trajectory (ReaxFF `bonds` output).
    Bond,
    /// Coordinate dump with `ITEM:`-tagged sections.
    Dump,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Bond => write!(f, "bond"),
            Format::Dump => write!(f, "dump"),
        }
    }
}

/// Pull-based, restartable stream of trajectory steps.
///
/// `atom_count` and `elements` are fixed at construction time and valid for
/// every step; `next_step` re-validates the per-step headers against them.
pub trait TrajectoryReader {
    fn format(&self) -> Format;

    /// Total atom count N, constant for the trajectory.
    fn atom_count(&self) -> usize;

    /// Static atom→element assignment, indexed by atom id − 1.
    fn elements(&self) -> &[Element];

    /// Parses the next step block, or `None` at end of stream.
    fn next_step(&mut self) -> Result<Option<Step>, Error>;

    /// Restarts the stream at the first step.
    fn rewind(&mut self) -> Result<(), Error>;
}

/// Opens a trajectory of the given format over one or more files, composed
/// by the format enum rather than by the caller picking a concrete reader.
///
/// `type_map` maps 1-based atom type ids to elements. Multiple paths are
/// streamed in order as one trajectory; every file must declare the same N.
pub fn open_trajectory(
    format: Format,
    paths: &[PathBuf],
    type_map: &[Element],
    periodic: [bool; 3],
) -> Result<Box<dyn TrajectoryReader>, Error> {
    match paths {
        [] => Err(Error::Incomplete(format)),
        [path] => open_single(format, path, type_map, periodic),
        _ => Ok(Box::new(MultiTrajectory::open(
            format, paths, type_map, periodic,
        )?)),
    }
}

fn open_single(
    format: Format,
    path: &Path,
    type_map: &[Element],
    periodic: [bool; 3],
) -> Result<Box<dyn TrajectoryReader>, Error> {
    let reader = BufReader::new(File::open(path)?);
    match format {
        Format::Bond => Ok(Box::new(bond::BondReader::new(reader, type_map)?)),
        Format::Dump => Ok(Box::new(dump::DumpReader::new(
            reader, type_map, periodic,
        )?)),
    }
}

/// Several trajectory files streamed back to back with globally increasing
/// step indices.
struct MultiTrajectory {
    format: Format,
    paths: Vec<PathBuf>,
    type_map: Vec<Element>,
    periodic: [bool; 3],
    current: Box<dyn TrajectoryReader>,
    file_index: usize,
    step_offset: usize,
    emitted_in_current: usize,
}

impl MultiTrajectory {
    fn open(
        format: Format,
        paths: &[PathBuf],
        type_map: &[Element],
        periodic: [bool; 3],
    ) -> Result<Self, Error> {
        let current = open_single(format, &paths[0], type_map, periodic)?;
        Ok(Self {
            format,
            paths: paths.to_vec(),
            type_map: type_map.to_vec(),
            periodic,
            current,
            file_index: 0,
            step_offset: 0,
            emitted_in_current: 0,
        })
    }
}

impl TrajectoryReader for MultiTrajectory {
    fn format(&self) -> Format {
        self.format
    }

    fn atom_count(&self) -> usize {
        self.current.atom_count()
    }

    fn elements(&self) -> &[Element] {
        self.current.elements()
    }

    fn next_step(&mut self) -> Result<Option<Step>, Error> {
        loop {
            if let Some(mut step) = self.current.next_step()? {
                self.emitted_in_current += 1;
                step.index += self.step_offset;
                return Ok(Some(step));
            }
            if self.file_index + 1 >= self.paths.len() {
                return Ok(None);
            }
            self.step_offset += self.emitted_in_current;
            self.emitted_in_current = 0;
            self.file_index += 1;
            let next = open_single(
                self.format,
                &self.paths[self.file_index],
                &self.type_map,
                self.periodic,
            )?;
            if next.atom_count() != self.current.atom_count() {
                return Err(Error::AtomCountMismatch {
                    step: self.step_offset,
                    declared: self.current.atom_count(),
                    found: next.atom_count(),
                });
            }
            // Same N is not enough: the atom→element assignment must also
            // carry over, or classification silently drifts mid-stream.
            if next.elements() != self.current.elements() {
                return Err(Error::ElementMismatch {
                    path: self.paths[self.file_index].clone(),
                });
            }
            self.current = next;
        }
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.current = open_single(self.format, &self.paths[0], &self.type_map, self.periodic)?;
        self.file_index = 0;
        self.step_offset = 0;
        self.emitted_in_current = 0;
        Ok(())
    }
}

/// Reads a per-atom error file: one whitespace-separated row of N floats per
/// step, aligned with the trajectory's step order.
pub fn read_error_rows<R: BufRead>(reader: R, atom_count: usize) -> Result<Vec<Vec<f64>>, Error> {
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Result<Vec<f64>, _> = line.split_whitespace().map(str::parse::<f64>).collect();
        let row = row.map_err(|_| Error::atom_row(idx + 1, "invalid float in error row"))?;
        if row.len() != atom_count {
            return Err(Error::AtomCountMismatch {
                step: rows.len(),
                declared: atom_count,
                found: row.len(),
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Reads up to `count` lines into `(absolute line number, content)` pairs.
/// Returns fewer lines only at end of stream.
pub(crate) fn read_block<R: BufRead>(
    reader: &mut R,
    count: usize,
    line_counter: &mut usize,
) -> Result<Vec<(usize, String)>, Error> {
    let mut block = Vec::with_capacity(count);
    let mut buf = String::new();
    for _ in 0..count {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            break;
        }
        *line_counter += 1;
        block.push((*line_counter, buf.trim_end().to_string()));
    }
    Ok(block)
}

/// Maps a 1-based atom type id through the configured type map.
pub(crate) fn element_for_type(
    type_map: &[Element],
    type_id: usize,
    line: usize,
) -> Result<Element, Error> {
    if type_id == 0 || type_id > type_map.len() {
        return Err(Error::UnknownAtomType {
            type_id,
            map_len: type_map.len(),
            line,
        });
    }
    Ok(type_map[type_id - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // Two-step, two-atom bond-list fixture: C1 bonded to H2.
    const TWO_STEPS: &str = "\
# Number of particles 2
 1 1 1 2 1 1.0
 2 2 1 1 1 1.0
# Number of particles 2
 1 1 1 2 1 1.0
 2 2 1 1 1 1.0
";

    // Same system shape, but the atom types are swapped.
    const TWO_STEPS_SWAPPED_TYPES: &str = "\
# Number of particles 2
 1 2 1 2 1 1.0
 2 1 1 1 1 1.0
# Number of particles 2
 1 2 1 2 1 1.0
 2 1 1 1 1 1.0
";

    fn type_map() -> Vec<Element> {
        vec![Element::C, Element::H]
    }

    #[test]
    fn chained_files_stream_with_global_step_indices() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bonds");
        let b = dir.path().join("b.bonds");
        fs::write(&a, TWO_STEPS).unwrap();
        fs::write(&b, TWO_STEPS).unwrap();

        let mut reader = open_trajectory(Format::Bond, &[a, b], &type_map(), [true; 3]).unwrap();
        let mut indices = Vec::new();
        while let Some(step) = reader.next_step().unwrap() {
            indices.push(step.index);
        }
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn chained_file_with_reassigned_elements_is_rejected() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bonds");
        let b = dir.path().join("b.bonds");
        fs::write(&a, TWO_STEPS).unwrap();
        fs::write(&b, TWO_STEPS_SWAPPED_TYPES).unwrap();

        let mut reader = open_trajectory(Format::Bond, &[a, b], &type_map(), [true; 3]).unwrap();
        reader.next_step().unwrap();
        reader.next_step().unwrap();
        // Crossing into the second file must fail, not silently keep
        // classifying with the first file's assignment.
        let result = reader.next_step();
        assert!(matches!(result, Err(Error::ElementMismatch { .. })));
    }
}
