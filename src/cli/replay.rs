use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use super::context::CliContext;
use super::output::print_structured;
use crate::replay::{load_replay, replay, ReplayReport};
use crate::session::ExplorationSession;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// JSON file holding an array of recorded observations
    pub recording: PathBuf,

    /// Exit with an error when the session ends in a dead loop
    #[arg(long)]
    pub fail_on_dead_loop: bool,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    let steps = load_replay(&args.recording)
        .await
        .with_context(|| format!("Failed to load {}", args.recording.display()))?;
    info!(steps = steps.len(), "replaying {}", args.recording.display());

    let session = ExplorationSession::new(ctx.config().clone());
    let report = replay(&session, steps).await?;

    if !print_structured(ctx.output(), &report)? {
        print_human(&report);
    }

    if report.steps.is_empty() {
        bail!("{} holds no observations", args.recording.display());
    }
    if args.fail_on_dead_loop {
        session.ensure_progress()?;
    }
    Ok(())
}

fn print_human(report: &ReplayReport) {
    for step in &report.steps {
        let marker = if step.transitioned { "->" } else { "==" };
        println!(
            "{:>4} {marker} {} [{}] visits={} | {}",
            step.index, step.relative_path, step.fingerprint, step.visit_count, step.diff
        );
        if let Some(error) = &step.error {
            println!("       capture error: {error}");
        }
    }
    println!("transitions:");
    for transition in &report.transitions {
        println!(
            "  {} -> {} ({}){}",
            transition.from.as_deref().unwrap_or("<start>"),
            transition.to,
            transition.trigger,
            transition
                .action
                .as_deref()
                .map(|action| format!(" via {action}"))
                .unwrap_or_default()
        );
    }
    println!(
        "{} state(s), {} transition(s)",
        report.states.len(),
        report.transitions.len()
    );
    match &report.dead_loop {
        Some(dead_loop) => println!(
            "dead loop: last {} transitions only visited {}",
            dead_loop.window,
            dead_loop.fingerprints.join(", ")
        ),
        None => println!("no dead loop"),
    }
}
