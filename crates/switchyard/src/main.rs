//! Switchyard CLI
//!
//! Loads a routing config and answers questions about it without running a
//! gateway.
//!
//! Usage:
//!   switchyard -c switchyard.yaml check
//!   switchyard -c switchyard.yaml rules --service ecommerce
//!   switchyard -c switchyard.yaml resolve GET /api/v1/orders/1 -H x-api-version:v2 --explain

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use switchyard::config::Config;
use switchyard::logging::init_tracing;
use switchyard::{InboundRequest, Router};

#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(author, version, about = "Inspect and test gateway routing rules")]
struct Cli {
    /// Routing config file (YAML)
    #[arg(short, long, env = "SWITCHYARD_CONFIG", default_value = "switchyard.yaml")]
    config: PathBuf,

    /// Log filter, overriding RUST_LOG and the configured level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the config and print rule statistics
    Check,
    /// List rules in evaluation order
    Rules {
        /// Only rules of this service
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Route a single request
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// HTTP method
    method: String,

    /// Request path, optionally with a query string
    path: String,

    /// Request header as name:value (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query")]
    query: Vec<String>,

    /// JSON request body
    #[arg(long)]
    body: Option<String>,

    /// JSON authenticated user projection
    #[arg(long)]
    user: Option<String>,

    /// Print the outcome of every rule considered
    #[arg(long)]
    explain: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing first so validation warnings are visible
    let config = Config::read_file(&cli.config)?;
    init_tracing(&config.logging, cli.log_level.as_deref())?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", cli.config.display()))?;

    let service_count = config.services.len();
    let router = Router::from_config(config).context("Failed to build router")?;

    match cli.command {
        Command::Check => print_json(&json!({
            "config": cli.config.display().to_string(),
            "services": service_count,
            "stats": router.get_stats(),
        })),
        Command::Rules { service } => {
            let rules = match service {
                Some(service_id) => router.get_service_routing_rules(&service_id),
                None => router.get_all_routing_rules(),
            };
            print_json(&rules)
        }
        Command::Resolve(args) => {
            let request = build_request(&args)?;
            if args.explain {
                return print_json(&router.explain_route(&request));
            }
            match router.resolve_route(&request) {
                Some(route) => print_json(&route),
                None => {
                    print_json(&Value::Null)?;
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_request(args: &ResolveArgs) -> Result<InboundRequest> {
    let mut request = InboundRequest::new(args.method.to_uppercase(), &args.path);

    for header in &args.headers {
        let (name, value) = split_pair(header, ':')
            .with_context(|| format!("Invalid header '{}', expected name:value", header))?;
        request = request.with_header(name, value);
    }
    for param in &args.query {
        let (key, value) = split_pair(param, '=')
            .with_context(|| format!("Invalid query parameter '{}', expected key=value", param))?;
        request = request.with_query(key, value);
    }
    if let Some(body) = &args.body {
        request = request.with_body(parse_json("body", body)?);
    }
    if let Some(user) = &args.user {
        request = request.with_user(parse_json("user", user)?);
    }

    Ok(request)
}

fn split_pair(raw: &str, separator: char) -> Result<(&str, &str)> {
    let Some((name, value)) = raw.split_once(separator) else {
        bail!("missing '{}'", separator);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("empty name");
    }
    Ok((name, value.trim()))
}

fn parse_json(what: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", what))
}
