use anyhow::Result;

use super::commands::Commands;
use super::context::CliContext;
use super::env::CliArgs;
use super::fingerprint::cmd_fingerprint;
use super::output::{print_structured, OutputFormat};
use super::replay::cmd_replay;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Replay(args) => cmd_replay(args, ctx).await,
        Commands::Fingerprint(args) => cmd_fingerprint(args, ctx.output()),
        Commands::Config => cmd_show_config(ctx),
    }
}

fn cmd_show_config(ctx: &CliContext) -> Result<()> {
    let format = match ctx.output() {
        OutputFormat::Human => OutputFormat::Yaml,
        other => other,
    };
    if let Some(path) = ctx.config_path() {
        eprintln!("# loaded from {}", path.display());
    }
    print_structured(format, ctx.config())?;
    Ok(())
}
