use std::path::PathBuf;

use super::Format;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Structural damage to the stream: unknown sections, missing headers,
    /// truncated step blocks. Fatal for the whole run.
    #[error("failed to parse {format} data: {details} (at line ~{line})")]
    Parse {
        format: Format,
        line: usize,
        details: String,
    },

    /// Fewer than two step-boundary markers were found during initialization.
    #[error("incomplete {0} trajectory: fewer than two step boundaries found")]
    Incomplete(Format),

    /// The declared atom count disagrees with what a step actually contains.
    #[error("atom count mismatch at step {step}: declared {declared}, found {found}")]
    AtomCountMismatch {
        step: usize,
        declared: usize,
        found: usize,
    },

    /// A chained trajectory file assigns different elements to the atoms
    /// than the files before it.
    #[error("element assignment changed in '{}': chained files must describe the same system", path.display())]
    ElementMismatch { path: PathBuf },

    /// A malformed per-atom row inside an otherwise well-formed step.
    /// Recoverable: callers skip the affected step and continue.
    #[error("malformed atom row: {details} (at line ~{line})")]
    AtomRow { line: usize, details: String },

    /// An atom type id that falls outside the configured element map.
    #[error("atom type {type_id} is outside the configured type map of {map_len} entries (at line ~{line})")]
    UnknownAtomType {
        type_id: usize,
        map_len: usize,
        line: usize,
    },
}

impl Error {
    pub fn parse(format: Format, line: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            details: details.into(),
        }
    }

    pub fn atom_row(line: usize, details: impl Into<String>) -> Self {
        Self::AtomRow {
            line,
            details: details.into(),
        }
    }

    /// Whether scanning may skip the offending step and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::AtomRow { .. })
    }
}
