use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::PhaseError;
use crate::executor::CommandRunner;
use crate::plan::PhaseWork;
use crate::ui::JobUI;

/// Runs the steps of one phase through a `CommandRunner`.
///
/// Directory preparation happens first; then steps run in order. A failed
/// required step ends the phase; a failed best-effort step is only a warning.
pub struct PhaseRunner {
    runner: Arc<dyn CommandRunner>,
}

impl PhaseRunner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn run(
        &self,
        item: &str,
        work: &PhaseWork,
        ui: Option<&JobUI>,
    ) -> Result<(), PhaseError> {
        prepare(work)?;

        for step in &work.steps {
            if let Some(ui) = ui {
                ui.log_step(&step.description);
            }
            debug!(item, step = %step.description, command = %step.command, "Running step");

            match self.runner.execute(&step.command, &step.description).await {
                Ok(output) => {
                    debug!(
                        item,
                        step = %step.description,
                        elapsed_ms = output.duration.as_millis() as u64,
                        "Step finished"
                    );
                }
                Err(e) if step.best_effort => {
                    let detail = e.stderr_tail().map(str::to_string).unwrap_or_else(|| e.to_string());
                    warn!(item, step = %step.description, error = %detail, "Optional step failed, continuing");
                    if let Some(ui) = ui {
                        ui.warning(&format!("{} failed ({}), continuing", step.description, detail));
                    }
                }
                Err(source) => {
                    return Err(PhaseError::Execution {
                        step: step.description.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

fn prepare(work: &PhaseWork) -> Result<(), PhaseError> {
    if let Some(ref dir) = work.reset_dir
        && dir.exists()
    {
        debug!(path = %dir.display(), "Removing stale output");
        std::fs::remove_dir_all(dir).map_err(|source| PhaseError::Preparation {
            path: dir.clone(),
            source,
        })?;
    }
    for dir in &work.ensure_dirs {
        std::fs::create_dir_all(dir).map_err(|source| PhaseError::Preparation {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(())
}
