use std::io::{self, Write};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

pub struct StageSpinner {
    bar: Option<ProgressBar>,
    start: Instant,
    stage: u8,
    total_stages: u8,
    stage_start: Instant,
}

impl StageSpinner {
    pub fn new(total_stages: u8) -> Self {
        let now = Instant::now();
        Self {
            bar: None,
            start: now,
            stage: 0,
            total_stages,
            stage_start: now,
        }
    }

    pub fn stage(&mut self, description: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        self.stage += 1;
        self.stage_start = Instant::now();

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .expect("invalid template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.set_message(format!(
            "[{}/{}] {}...",
            self.stage, self.total_stages, description
        ));

        self.bar = Some(bar);
    }

    /// Refreshes the running stage's message, keeping the stage counter.
    pub fn update(&mut self, description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!(
                "[{}/{}] {}...",
                self.stage, self.total_stages, description
            ));
        }
    }

    pub fn complete(&mut self, description: &str, notes: &[&str]) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        let elapsed = self.stage_start.elapsed();
        let mut stderr = io::stderr().lock();

        let _ = writeln!(
            stderr,
            "  \x1b[32m✓\x1b[0m {:<44} {:>5.1}s",
            description,
            elapsed.as_secs_f64()
        );

        for note in notes {
            let _ = writeln!(stderr, "      \x1b[2m·\x1b[0m {}", note);
        }
    }

    pub fn finish(mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        let elapsed = self.start.elapsed();
        let mut stderr = io::stderr().lock();

        let _ = writeln!(stderr);
        let _ = writeln!(
            stderr,
            "  \x1b[32m✓\x1b[0m Dataset build complete {:>27}",
            format!("Total: {:.2}s", elapsed.as_secs_f64())
        );
        let _ = writeln!(stderr);
    }
}

pub enum Progress {
    Interactive(StageSpinner),
    Silent,
}

impl Progress {
    pub fn new(interactive: bool, total_stages: u8) -> Self {
        if interactive {
            Self::Interactive(StageSpinner::new(total_stages))
        } else {
            Self::Silent
        }
    }

    pub fn stage(&mut self, description: &str) {
        if let Self::Interactive(s) = self {
            s.stage(description);
        }
    }

    pub fn update(&mut self, description: &str) {
        if let Self::Interactive(s) = self {
            s.update(description);
        }
    }

    pub fn complete(&mut self, description: &str, notes: &[&str]) {
        if let Self::Interactive(s) = self {
            s.complete(description, notes);
        }
    }

    pub fn finish(self) {
        if let Self::Interactive(s) = self {
            s.finish();
        }
    }
}
