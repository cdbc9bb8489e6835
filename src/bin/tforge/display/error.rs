use std::io::{self, Write};

use anyhow::Error;

use crate::util::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    let msg = err.to_string();
    for line in wrap(&msg, 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 59) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    if let Some(hints) = collect_hints(err) {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

fn collect_hints(err: &Error) -> Option<Vec<String>> {
    let mut hints = Vec::new();

    if let Some(io_err) = err.downcast_ref::<traj_forge::io::Error>() {
        io_hints(io_err, &mut hints);
    } else if let Some(ds_err) = err.downcast_ref::<traj_forge::dataset::Error>() {
        dataset_hints(ds_err, &mut hints);
    } else {
        fallback_hints(err, &mut hints);
    }

    if hints.is_empty() {
        None
    } else {
        Some(hints)
    }
}

fn io_hints(err: &traj_forge::io::Error, hints: &mut Vec<String>) {
    use traj_forge::io::Error as IoError;

    match err {
        IoError::Io { source } => match source.kind() {
            std::io::ErrorKind::NotFound => {
                hints.push("Check the path spelling and ensure the file exists".into());
            }
            std::io::ErrorKind::PermissionDenied => {
                hints.push("Check file permissions with `ls -la`".into());
            }
            _ => {
                hints.push("Check file path, permissions, and disk space".into());
            }
        },

        IoError::Parse { format, line, .. } => {
            hints.push(format!(
                "Parser hit an issue near line {} in {} format",
                line, format
            ));
            hints.push("Inspect the file around that line for damaged entries".into());
            hints.push("Try --format to override format detection".into());
        }

        IoError::Incomplete(format) => {
            hints.push(format!(
                "A {} trajectory needs at least two step headers",
                format
            ));
            hints.push("The file may be empty, truncated, or the wrong format".into());
        }

        IoError::AtomCountMismatch { .. } => {
            hints.push("All files of one trajectory must share the same atom count".into());
            hints.push("Check that the files come from the same simulation".into());
        }

        IoError::ElementMismatch { .. } => {
            hints.push("All files of one trajectory must assign the same element to each atom".into());
            hints.push("Check that the files come from the same simulation".into());
        }

        IoError::AtomRow { line, .. } => {
            hints.push(format!("Per-atom data is malformed near line {}", line));
            hints.push("Damaged steps are normally skipped; this row was fatal here".into());
        }

        IoError::UnknownAtomType { type_id, map_len, .. } => {
            hints.push(format!(
                "The trajectory uses atom type {} but only {} names were given",
                type_id, map_len
            ));
            hints.push("Extend --atom-names to cover every type id".into());
        }
    }
}

fn dataset_hints(err: &traj_forge::dataset::Error, hints: &mut Vec<String>) {
    use traj_forge::dataset::Error as DsError;

    match err {
        DsError::EmptyTypeMap | DsError::UnknownElement(_) => {
            hints.push("Pass element names via --atom-names C,H,O or the config file".into());
        }
        DsError::MissingCoordinates(_) => {
            hints.push("Bond-list trajectories carry no coordinates".into());
            hints.push("Pass --coords with the matching LAMMPS dump file".into());
        }
        DsError::ErrorRowsExhausted { .. } => {
            hints.push("The --error-file must contain one row per trajectory step".into());
        }
        DsError::ConfigParse(_) => {
            hints.push("Check the TOML syntax of the configuration file".into());
        }
        DsError::Io(io_err) => io_hints(io_err, hints),
        _ => {}
    }
}

fn fallback_hints(err: &Error, hints: &mut Vec<String>) {
    let msg = err.to_string().to_lowercase();
    if msg.contains("no such file") || msg.contains("not found") {
        hints.push("Check that the file path is correct".into());
    } else if msg.contains("permission denied") {
        hints.push("Check file permissions with `ls -la`".into());
    }
}
