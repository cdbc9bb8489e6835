use std::io::{self, Write};

use traj_forge::dataset::{FingerprintTable, SampleReport};
use traj_forge::io::TrajectoryReader;

use crate::util::truncate;

const INDENT: &str = "      ";
const MAX_ROWS: usize = 15;

pub fn print_trajectory_info(reader: &dyn TrajectoryReader, files: usize) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let rows = vec![
        ("Format", reader.format().to_string()),
        ("Files", format!("{}", files)),
        ("Atoms", format!("{}", reader.atom_count())),
    ];
    print_kv_table(&mut out, "Trajectory", &rows);
}

/// Per-class candidate histogram with a proportional bar, largest first.
pub fn print_class_table(table: &FingerprintTable) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut counts: Vec<(String, usize)> = table
        .iter()
        .map(|(key, candidates)| (key.to_string(), candidates.len()))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let total: usize = counts.iter().map(|(_, c)| c).sum();

    let name_w = 12usize;
    let count_w = 10usize;
    let dist_w = 28usize;

    let _ = writeln!(out, "{}┌─ Environment Classes ─┐", INDENT);
    print_rule(&mut out, '┌', '┬', '┐', &[name_w, count_w, dist_w]);
    let _ = writeln!(
        out,
        "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
        INDENT, "Class", "Candidates", "Distribution"
    );
    print_rule(&mut out, '├', '┼', '┤', &[name_w, count_w, dist_w]);

    for (name, count) in counts.iter().take(MAX_ROWS) {
        let pct = if total == 0 {
            0.0
        } else {
            (*count as f64 / total as f64) * 100.0
        };
        let bar_w = ((pct / 100.0) * 18.0).round() as usize;
        let cell = format!("{}  {:>5.1}%", "█".repeat(bar_w.max(usize::from(pct > 0.0))), pct);
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            truncate(name, name_w),
            count,
            cell
        );
    }
    if counts.len() > MAX_ROWS {
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            "...",
            "...",
            format!("({} more classes)", counts.len() - MAX_ROWS)
        );
    }
    print_rule(&mut out, '└', '┴', '┘', &[name_w, count_w, dist_w]);
}

/// Candidates vs selected per class, largest first.
pub fn print_sample_table(report: &SampleReport) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut rows: Vec<(String, usize, usize)> = report
        .classes
        .iter()
        .map(|c| (c.fingerprint.to_string(), c.candidates, c.selected))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let name_w = 12usize;
    let cand_w = 10usize;
    let sel_w = 8usize;

    let _ = writeln!(out, "{}┌─ Sampling ─┐", INDENT);
    print_rule(&mut out, '┌', '┬', '┐', &[name_w, cand_w, sel_w]);
    let _ = writeln!(
        out,
        "{}│ {:<name_w$} │ {:>cand_w$} │ {:>sel_w$} │",
        INDENT, "Class", "Candidates", "Selected"
    );
    print_rule(&mut out, '├', '┼', '┤', &[name_w, cand_w, sel_w]);

    for (name, candidates, selected) in rows.iter().take(MAX_ROWS) {
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>cand_w$} │ {:>sel_w$} │",
            INDENT,
            truncate(name, name_w),
            candidates,
            selected
        );
    }
    if rows.len() > MAX_ROWS {
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>cand_w$} │ {:>sel_w$} │",
            INDENT, "...", "...", "..."
        );
    }
    print_rule(&mut out, '└', '┴', '┘', &[name_w, cand_w, sel_w]);
    let _ = writeln!(
        out,
        "{}  {} classes, {} atoms selected",
        INDENT,
        report.classes.len(),
        report.total_selected()
    );
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 12usize;
    let val_w = 28usize;

    let _ = writeln!(out, "{}┌─ {} ─┐", INDENT, title);
    print_rule(out, '┌', '┬', '┐', &[key_w, val_w]);
    for (key, value) in rows {
        let _ = writeln!(
            out,
            "{}│ {:<key_w$} │ {:<val_w$} │",
            INDENT,
            key,
            truncate(value, val_w)
        );
    }
    print_rule(out, '└', '┴', '┘', &[key_w, val_w]);
}

fn print_rule(out: &mut impl Write, left: char, mid: char, right: char, widths: &[usize]) {
    let mut line = String::from(INDENT);
    line.push(left);
    for (i, w) in widths.iter().enumerate() {
        line.push_str(&"─".repeat(w + 2));
        line.push(if i + 1 == widths.len() { right } else { mid });
    }
    let _ = writeln!(out, "{}", line);
}
