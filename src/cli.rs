use clap::{Parser, Subcommand};
use pmdraft::draft::Stage;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pmdraft")]
#[command(about = "Inspect and purge offline PM checklist drafts", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides PMDRAFT_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the stored draft document as JSON
    Show(DraftArgs),
    /// Evaluate a stored draft against a checklist
    Check(CheckArgs),
    /// Delete a draft's photos, then its document
    Purge(DraftArgs),
    /// List stored drafts
    List,
}

#[derive(clap::Args, Debug)]
pub struct DraftArgs {
    /// Station or equipment id the draft belongs to
    #[arg(long)]
    pub station: String,

    /// Report discriminator, when a station has several drafts
    #[arg(long)]
    pub report: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub draft: DraftArgs,

    /// Checklist TOML (defaults to drafts.default_checklist)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    #[arg(long, default_value = "pre")]
    pub stage: Stage,
}
