use anyhow::Result;
use clap::Args;
use perceiver_structural::Observation;
use serde::Serialize;

use super::output::{print_structured, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct FingerprintArgs {
    /// Page URL, absolute or relative
    #[arg(long)]
    pub url: String,

    /// Top-level heading
    #[arg(long)]
    pub h1: Option<String>,

    /// Second-level heading
    #[arg(long)]
    pub h2: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintOutput {
    relative_path: String,
    fingerprint: String,
}

pub fn cmd_fingerprint(args: FingerprintArgs, format: OutputFormat) -> Result<()> {
    let mut observation = Observation::new(args.url);
    observation.headings.h1 = args.h1;
    observation.headings.h2 = args.h2;

    let output = FingerprintOutput {
        relative_path: observation.relative_path(),
        fingerprint: observation.fingerprint(),
    };
    if !print_structured(format, &output)? {
        println!("{}", output.fingerprint);
    }
    Ok(())
}
