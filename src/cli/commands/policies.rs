use clap::Args;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::isolation::{registry, IsolationPolicy};

#[derive(Args)]
pub struct PoliciesArgs {
    #[arg(long, help = "Only show resources with this policy (shared, logical_column, physical_partition)")]
    pub policy: Option<IsolationPolicy>,

    #[arg(long, help = "Show the policy a single resource resolves to")]
    pub resource: Option<String>,
}

pub fn handle(args: PoliciesArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let table = registry().snapshot();

    if let Some(resource) = args.resource {
        let policy = table.policy(&resource);
        let registered = table.get(&resource).is_some();
        return match output_format {
            OutputFormat::Json => print_json(&json!({
                "resource": resource,
                "policy": policy,
                "registered": registered
            })),
            OutputFormat::Text => {
                let note = if registered { "" } else { " (default)" };
                println!("{}: {}{}", resource, policy, note);
                Ok(())
            }
        };
    }

    let entries: Vec<_> = table
        .sorted()
        .into_iter()
        .filter(|(_, policy)| args.policy.map_or(true, |p| p == *policy))
        .collect();

    if entries.is_empty() {
        return output_empty_collection(&output_format, "policies", "No isolation policies registered");
    }

    match output_format {
        OutputFormat::Json => {
            let policies: Vec<_> = entries
                .iter()
                .map(|(resource, policy)| json!({ "resource": resource, "policy": policy }))
                .collect();
            print_json(&json!({ "policies": policies }))
        }
        OutputFormat::Text => {
            let width = entries.iter().map(|(r, _)| r.len()).max().unwrap_or(0);
            for (resource, policy) in entries {
                println!("{:<width$}  {}", resource, policy, width = width);
            }
            Ok(())
        }
    }
}
