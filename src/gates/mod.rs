use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};

/// A side-effecting step awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPrompt {
    pub description: String,
    /// Exact command about to run, secrets already masked
    pub command: Option<String>,
}

impl StepPrompt {
    pub fn new(description: impl Into<String>, command: Option<String>) -> Self {
        Self {
            description: description.into(),
            command,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    Approved,
    ApprovedAll, // User chose "yes to all"
    Skipped,
    Aborted,
}

impl ConfirmDecision {
    pub fn proceeds(&self) -> bool {
        matches!(self, ConfirmDecision::Approved | ConfirmDecision::ApprovedAll)
    }
}

/// Decides whether each side-effecting step may run.
pub trait Confirmer: Send {
    fn confirm(&mut self, prompt: &StepPrompt) -> Result<ConfirmDecision>;
}

/// Approves everything. Used for batch runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Confirmer for AutoApprove {
    fn confirm(&mut self, _prompt: &StepPrompt) -> Result<ConfirmDecision> {
        Ok(ConfirmDecision::Approved)
    }
}

/// Asks on the terminal before every step until the user answers "yes to all".
#[derive(Debug, Default)]
pub struct InteractiveConfirmer {
    pub skip_all: bool,
}

impl InteractiveConfirmer {
    pub fn new() -> Self {
        Self::default()
    }

    fn prompt_user(&mut self, prompt: &StepPrompt) -> Result<ConfirmDecision> {
        println!();
        println!("  {} {}", console::style("Next:").bold(), prompt.description);
        if let Some(ref command) = prompt.command {
            println!("  {} {}", console::style("Command:").dim(), command);
        }

        let options = &[
            "Yes",
            "Yes to all remaining steps",
            "No, skip this step",
            "Abort job",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Proceed?")
            .items(options)
            .default(0)
            .interact()?;

        match selection {
            0 => Ok(ConfirmDecision::Approved),
            1 => {
                self.skip_all = true;
                Ok(ConfirmDecision::ApprovedAll)
            }
            2 => Ok(ConfirmDecision::Skipped),
            _ => Ok(ConfirmDecision::Aborted),
        }
    }
}

impl Confirmer for InteractiveConfirmer {
    fn confirm(&mut self, prompt: &StepPrompt) -> Result<ConfirmDecision> {
        if self.skip_all {
            return Ok(ConfirmDecision::Approved);
        }
        self.prompt_user(prompt)
    }
}
