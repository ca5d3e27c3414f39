//! NixDeck command line

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use deck_core::{ActionExtractor, DeckConfig, PresetCatalog};
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("nixdeck")
        .version(deck_core::VERSION)
        .about("NixDeck operation and preset inspector")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("extract")
                .about("List operation markers found in advisory text")
                .arg(
                    Arg::new("file")
                        .help("File to scan; reads stdin when omitted"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("presets").about("List schedule presets"))
        .subcommand(
            Command::new("templates")
                .about("List job and service unit templates")
                .arg(
                    Arg::new("show")
                        .long("show")
                        .help("Print the body of one unit template"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("show")
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("reload-commands").about("List component reload commands"))
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<DeckConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => DeckConfig::load(Path::new(path))
            .with_context(|| format!("loading configuration from {path}")),
        None => Ok(DeckConfig::default()),
    }
}

fn read_input(file: Option<&String>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}")),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

fn run_extract(args: &ArgMatches) -> Result<()> {
    let text = read_input(args.get_one::<String>("file"))?;
    let markers: Vec<_> = ActionExtractor::new().extract(&text).collect();
    tracing::debug!(count = markers.len(), bytes = text.len(), "scanned input");

    if args.get_flag("json") {
        let rows: Vec<serde_json::Value> = markers
            .iter()
            .map(|m| {
                serde_json::json!({
                    "kind": m.kind,
                    "label": m.label,
                    "start": m.span.start,
                    "end": m.span.end,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if markers.is_empty() {
        println!("No operations found.");
    }
    for m in &markers {
        println!("{:<12} {:<32} @{}..{}", m.kind, m.label, m.span.start, m.span.end);
    }
    Ok(())
}

fn run_templates(args: &ArgMatches, presets: &PresetCatalog) -> Result<()> {
    if let Some(id) = args.get_one::<String>("show") {
        let template = presets.unit_template(id)?;
        print!("{}", template.content);
        return Ok(());
    }

    if args.get_flag("json") {
        let jobs: Vec<_> = presets.job_templates().collect();
        let units: Vec<_> = presets.unit_templates().collect();
        let body = serde_json::json!({ "jobs": jobs, "units": units });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Job templates:");
    for t in presets.job_templates() {
        println!("  {:<18} {:<14} {}", t.id, t.schedule, t.name);
    }
    println!();
    println!("Service unit templates:");
    for t in presets.unit_templates() {
        println!("  {}", t.id);
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"), matches.get_flag("log-json"));

    let config = load_config(&matches)?;
    let presets = PresetCatalog::new();

    match matches.subcommand() {
        Some(("extract", args)) => run_extract(args)?,
        Some(("presets", _)) => {
            for (description, schedule) in presets.schedule_presets() {
                println!("{schedule:<14} {description}");
            }
        }
        Some(("templates", args)) => run_templates(args, &presets)?,
        Some(("reload-commands", _)) => {
            for (component, command) in presets.reload_commands() {
                println!("{component:<10} {command}");
            }
        }
        Some(("config", _)) => print!("{}", config.to_toml_string()?),
        _ => {}
    }
    Ok(())
}
