//! Read-only checkpoint inspection: `coldstore status`.

use anyhow::{Context, Result};
use std::path::Path;

use coldstore::checkpoint::CheckpointStore;
use coldstore::job::Phase;

const PHASES: [Phase; 4] = [Phase::Download, Phase::Archive, Phase::Upload, Phase::Extract];

pub fn cmd_status(checkpoint_file: &Path) -> Result<()> {
    let checkpoint = CheckpointStore::load(checkpoint_file)
        .with_context(|| format!("Failed to read checkpoint {}", checkpoint_file.display()))?
        .with_context(|| format!("No checkpoint at {}", checkpoint_file.display()))?;
    let config = &checkpoint.configuration;

    println!();
    println!("Job {}", checkpoint.job_id);
    println!("==================");
    println!();
    println!("Kind:        {}", config.kind);
    println!("Source:      {}", config.source);
    if !config.destination.is_empty() {
        println!("Destination: {}", config.destination);
    }
    println!("Staging:     {}", config.staging_root.display());
    println!("Started:     {}", checkpoint.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:     {}", checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    let Some(ref items) = checkpoint.discovered_items else {
        println!("Items not listed yet");
        println!();
        return Ok(());
    };

    // Only show phase columns that this job ever records
    let used: Vec<Phase> = PHASES
        .into_iter()
        .filter(|phase| {
            checkpoint
                .items
                .values()
                .any(|progress| progress.phases.contains_key(phase))
        })
        .collect();

    let width = items.iter().map(|i| i.id.len()).max().unwrap_or(4).max(4);
    let mut header = format!("{:<width$}", "Item");
    for phase in &used {
        header.push_str(&format!("  {:<8}", phase.as_str()));
    }
    println!("{}  status", header);
    println!("{}", "-".repeat(header.len() + 8));

    for item in items {
        let mut line = format!("{:<width$}", item.id);
        for phase in &used {
            let mark = if checkpoint.is_phase_complete(&item.id, *phase) {
                "done"
            } else {
                "-"
            };
            line.push_str(&format!("  {:<8}", mark));
        }
        let status = if checkpoint.is_item_complete(&item.id) {
            "complete"
        } else {
            "pending"
        };
        println!("{}  {}", line, status);
    }

    println!();
    println!(
        "{}/{} items complete",
        checkpoint.completed_items.len(),
        items.len()
    );
    println!();
    Ok(())
}
