use anyhow::Context;
use clap::Args;
use serde_json::{json, Value};

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::context::{Platform, TenantContext};
use crate::database::Statement;
use crate::isolation::{resolver, Operation};
use crate::types::OperationKind;

#[derive(Args)]
pub struct ResolveArgs {
    #[arg(long, help = "Tenant id of the simulated request")]
    pub tenant: Option<String>,

    #[arg(long, help = "Platform of the simulated request")]
    pub platform: Option<Platform>,

    #[arg(long, conflicts_with = "tenant", help = "Resolve with a system-internal context")]
    pub system: bool,

    #[arg(long, help = "Resource (table) name")]
    pub resource: String,

    #[arg(long, default_value = "read", help = "Operation kind: read, insert, update, delete")]
    pub kind: OperationKind,

    #[arg(long = "where", value_name = "FIELD=VALUE", help = "Caller predicate (repeatable)")]
    pub predicates: Vec<String>,

    #[arg(long = "join", value_name = "RESOURCE", help = "Joined resource (repeatable)")]
    pub joins: Vec<String>,

    #[arg(long, help = "Mutation payload as a JSON object")]
    pub payload: Option<String>,

    #[arg(long, help = "Also render the resolved operation as SQL")]
    pub sql: bool,
}

pub fn handle(args: ResolveArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = build_context(&args);

    let mut op: Operation = Operation::new(&args.resource, args.kind);
    for raw in &args.predicates {
        let (field, value) = parse_predicate(raw)?;
        op = op.filter(field, value);
    }
    for join in &args.joins {
        op = op.join(join);
    }
    if let Some(payload) = &args.payload {
        let payload: Value = serde_json::from_str(payload).context("payload is not valid JSON")?;
        op = op.with_payload(payload);
    }

    let resolved = match resolver().resolve(&ctx, op) {
        Ok(resolved) => resolved,
        Err(e) => {
            if let OutputFormat::Json = output_format {
                output_error(&output_format, &e.to_string(), Some("ISOLATION_ERROR"))?;
            }
            return Err(e.into());
        }
    };

    let sql = if args.sql {
        Some(Statement::render(&resolved)?)
    } else {
        None
    };

    match output_format {
        OutputFormat::Json => {
            let mut body = json!({ "operation": resolved });
            if let Some(sql) = sql {
                body["sql"] = json!({ "query": sql.query, "params": sql.params });
            }
            print_json(&body)
        }
        OutputFormat::Text => {
            println!("{} {}", resolved.kind, resolved.resource);
            for join in &resolved.joins {
                println!("  join  {}", join);
            }
            for predicate in &resolved.predicates {
                println!("  where {}", predicate);
            }
            if let Some(payload) = &resolved.payload {
                println!("  payload {}", payload);
            }
            if let Some(sql) = sql {
                println!("{}", sql.query);
                if !sql.params.is_empty() {
                    println!("  params {}", Value::Array(sql.params));
                }
            }
            Ok(())
        }
    }
}

fn build_context(args: &ResolveArgs) -> TenantContext {
    let mut ctx = if args.system {
        TenantContext::system()
    } else {
        TenantContext::new()
    };
    if let Some(tenant) = &args.tenant {
        ctx = ctx.with_tenant_id(tenant.as_str());
    }
    if let Some(platform) = args.platform {
        ctx = ctx.with_platform(platform);
    }
    ctx
}

/// `field=value`; the value is read as JSON when it parses, otherwise as a string
fn parse_predicate(raw: &str) -> anyhow::Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("predicate '{}' must look like FIELD=VALUE", raw))?;
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("predicate '{}' has an empty field name", raw);
    }
    let value = serde_json::from_str(value.trim()).unwrap_or_else(|_| Value::String(value.trim().to_string()));
    Ok((field.to_string(), value))
}
