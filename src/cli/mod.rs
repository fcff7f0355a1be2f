pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "scope")]
#[command(about = "Tenant scope CLI - inspect isolation policies and preview scoped operations")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Policy file to load instead of the configured one")]
    pub policy_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List the active isolation policy table")]
    Policies(commands::policies::PoliciesArgs),

    #[command(about = "Resolve an operation against a tenant context")]
    Resolve(commands::resolve::ResolveArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let mut isolation = crate::config::config().isolation.clone();
    if let Some(path) = cli.policy_file {
        isolation.policy_file = Some(path);
    }
    crate::isolation::policy::install_from_config(&isolation)?;

    match cli.command {
        Commands::Policies(args) => commands::policies::handle(args, output_format),
        Commands::Resolve(args) => commands::resolve::handle(args, output_format),
    }
}
