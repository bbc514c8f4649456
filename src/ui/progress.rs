use crate::orchestrator::JobOutcome;
use crate::ui::icons::{CHECK, CLEANUP, CROSS, PACKAGE, PROGRESS, RESUME, SKIP, SPARKLE, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Terminal UI for a running job, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Item bar: how many items have been processed
/// - Step spinner: the phase and step currently running
///
/// Structured logs go through `tracing`; this is only the operator-facing view.
pub struct JobUI {
    multi: MultiProgress,
    item_bar: ProgressBar,
    step_bar: ProgressBar,
    verbose: bool,
}

impl JobUI {
    /// Create the UI drawing to stderr.
    pub fn new(verbose: bool) -> Self {
        Self::with_target(ProgressDrawTarget::stderr(), verbose)
    }

    /// A UI that renders nothing. Used in tests and non-interactive runs.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden(), false)
    }

    fn with_target(target: ProgressDrawTarget, verbose: bool) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let item_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let item_bar = multi.add(ProgressBar::new(0));
        item_bar.set_style(item_style);
        item_bar.set_prefix(" Items");

        let step_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let step_bar = multi.add(ProgressBar::new_spinner());
        step_bar.set_style(step_style);
        step_bar.set_prefix("  Step");

        Self {
            multi,
            item_bar,
            step_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn print_header(&self, title: &str, job_id: &str, resumed: bool) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} {} {}",
            style("▶").green().bold(),
            style(title).bold(),
            style(format!("(job {})", job_id)).dim()
        ));
        if resumed {
            self.print_line(format!("{}Resuming from checkpoint", RESUME));
        }
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    pub fn set_total(&self, total: u64) {
        self.item_bar.set_length(total);
    }

    pub fn start_item(&self, index: usize, total: usize, item: &str) {
        self.item_bar.set_message(format!("{}", style(item).yellow()));
        self.print_line(format!(
            "\n{}[{}/{}] {}",
            PACKAGE,
            index + 1,
            total,
            style(item).bold()
        ));
    }

    /// Show the phase about to run and start the spinner.
    pub fn start_phase(&self, phase: &str, description: &str) {
        self.step_bar.set_message(format!(
            "{} {}",
            style(phase).cyan(),
            style(format!("({})", description)).dim()
        ));
        self.step_bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// Update the spinner with a short status string.
    ///
    /// In verbose mode the message is also printed as a dim indented line.
    pub fn log_step(&self, msg: &str) {
        self.step_bar
            .set_message(format!("{}", style(msg).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    pub fn phase_done(&self, phase: &str, skipped: bool) {
        if skipped {
            self.print_line(format!(
                "    {}{} {}",
                SKIP,
                phase,
                style("(already complete)").dim()
            ));
        } else {
            self.print_line(format!("    {}{}", CHECK, phase));
        }
    }

    pub fn warning(&self, msg: &str) {
        self.print_line(format!("    {}{}", WARN, style(msg).yellow()));
    }

    pub fn item_done(&self, item: &str, already: bool) {
        self.item_bar.inc(1);
        if already {
            self.print_line(format!(
                "{}{} {}",
                SKIP,
                item,
                style("(completed in an earlier run)").dim()
            ));
        } else {
            self.print_line(format!("{}{} complete", SPARKLE, style(item).green().bold()));
        }
    }

    pub fn item_failed(&self, item: &str, reason: &str) {
        self.item_bar.inc(1);
        self.print_line(format!(
            "{}{} failed: {}",
            CROSS,
            style(item).red().bold(),
            reason
        ));
    }

    pub fn item_skipped(&self, item: &str) {
        self.item_bar.inc(1);
        self.print_line(format!("{}{} skipped", SKIP, style(item).yellow()));
    }

    pub fn cleanup(&self, path: &str) {
        self.print_line(format!("{}Removed {}", CLEANUP, style(path).dim()));
    }

    /// Stop the bars and print the final tally.
    pub fn print_summary(&self, outcome: &JobOutcome) {
        self.step_bar.finish_and_clear();
        self.item_bar.finish_and_clear();

        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        let tally = format!("{}/{} items succeeded", outcome.succeeded, outcome.total);
        let tally = if outcome.is_success() {
            style(tally).green().bold()
        } else {
            style(tally).red().bold()
        };
        self.print_line(format!("{}{} {}", PROGRESS, tally, style(format!("(job {})", outcome.job_id)).dim()));
        if outcome.failed > 0 {
            self.print_line(format!("  {} failed", style(outcome.failed).red()));
        }
        if outcome.skipped > 0 {
            self.print_line(format!("  {} skipped", style(outcome.skipped).yellow()));
        }
        if outcome.aborted {
            self.print_line(format!("  {}", style("aborted by user").yellow()));
        }
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }
}
