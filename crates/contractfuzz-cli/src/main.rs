//! contractfuzz CLI - negative and boundary testing driven by an OpenAPI contract

use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use contractfuzz_core::dryrun::validate_config;
use contractfuzz_core::stats::EXIT_FATAL;
use contractfuzz_core::{Config, OverrideSet, RunReport, RunStatistics};
use contractfuzz_runner::fuzzers::listing;
use contractfuzz_runner::{
    CatalogFilter, ConsoleReporter, DefaultAssembler, FuzzerRegistry, HttpInvoker,
    OperationCatalog, Scheduler, VersionCheck, load_contract, plan,
};

const CONFIG_FILE: &str = ".contractfuzz.toml";

#[derive(Parser)]
#[command(name = "contractfuzz")]
#[command(about = "Negative and boundary testing of HTTP APIs from their OpenAPI contract")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuzz every selected operation of the contract
    Run {
        /// Config file (default: .contractfuzz.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Show the schedule without sending requests
        #[arg(long)]
        dry_run: bool,

        /// Server URL, overriding the config
        #[arg(long)]
        server: Option<String>,

        /// Extra header for every path, as NAME=VALUE (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Initialize config file
    Init,

    /// List built-in fuzzers
    List,

    /// Export JSON Schema for the run report
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Write the example config, refusing to overwrite an existing file.
fn write_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, Config::example())
        .with_context(|| format!("failed to write {}", path.display()))
}

fn terminal_summary(report: &RunReport) -> String {
    let summary = &report.summary;
    let icon = if summary.is_clean() { "PASS" } else { "FAIL" };
    let mut out = format!("\n{icon}: {summary}\n  Exit code: {}\n", summary.exit_code());
    for suggestion in &report.suggestions {
        out.push_str(&format!("  Suggestion: {suggestion}\n"));
    }
    out
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(u8::try_from(EXIT_FATAL).unwrap_or(3))
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            config,
            dry_run,
            server,
            headers,
        } => {
            let mut cfg = if let Some(path) = config {
                Config::load(Path::new(&path))?
            } else {
                Config::load_default()?
            };
            if let Some(server) = server {
                cfg.server = server;
            }
            cfg.headers.extend(headers);

            let update = VersionCheck::spawn(
                cfg.check_update && !dry_run,
                env!("CARGO_PKG_VERSION"),
            );

            let contract = load_contract(&cfg.contract)?;
            let overrides = OverrideSet::load(&cfg)?;
            let catalog =
                OperationCatalog::select(&contract, &CatalogFilter::from_config(&cfg.filter));
            let registry = FuzzerRegistry::from_config(&cfg);
            let assembler = DefaultAssembler::new(overrides, cfg.seed);

            // Dry run: show plan and exit
            if dry_run {
                let mut schedule = plan(&registry, &catalog, &assembler);
                schedule.validations = validate_config(&cfg);
                match cli.output {
                    OutputFormat::Terminal => println!("{}", schedule.to_terminal()),
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&schedule)?);
                    }
                    OutputFormat::Silent => {}
                }
                return Ok(i32::from(schedule.has_errors()));
            }

            if cli.output == OutputFormat::Terminal {
                eprintln!("Config:");
                eprintln!("  contract: {}", cfg.contract.display());
                eprintln!("  server:   {}", cfg.server);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                eprintln!(
                    "  paths:    {} selected, {} operations skipped",
                    catalog.paths.len(),
                    catalog.skipped.len()
                );
                eprintln!();
            }

            if catalog.is_empty() {
                tracing::warn!("No operation matches the configured filters");
            }
            if registry.is_empty() {
                tracing::warn!("No fuzzer is enabled for this configuration");
            }

            let invoker = HttpInvoker::new(&cfg.server, Duration::from_secs(cfg.timeout_secs))
                .context("failed to initialize HTTP client")?;
            let stats = RunStatistics::new();
            let mut reporter = ConsoleReporter::new(cli.output == OutputFormat::Terminal);

            let started = Instant::now();
            let summary =
                Scheduler::new(&registry, &invoker, &stats).run(&catalog, &assembler, &mut reporter);
            let elapsed = started.elapsed();
            tracing::info!("Run finished in {:.1}s", elapsed.as_secs_f64());

            let report = RunReport::new(summary, reporter.into_records());
            match cli.output {
                OutputFormat::Terminal => print!("{}", terminal_summary(&report)),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Silent => {}
            }
            if cli.output != OutputFormat::Terminal {
                for suggestion in &report.suggestions {
                    tracing::warn!("{suggestion}");
                }
            }

            if let Some(latest) = update.finish() {
                if cli.output != OutputFormat::Silent {
                    eprintln!("A new version is available: {latest}");
                }
            }

            Ok(summary.exit_code())
        }

        Commands::Init => {
            write_config(Path::new(CONFIG_FILE))?;
            println!("Created {CONFIG_FILE}");
            println!("\nEdit the file to configure:");
            println!("  - contract: path to your OpenAPI contract");
            println!("  - server: service to test");
            println!("  - headers: auth tokens, API keys");
            println!("  - url_params: entity IDs for path placeholders");
            Ok(0)
        }

        Commands::List => {
            let rows = listing();
            match cli.output {
                OutputFormat::Terminal => {
                    for row in &rows {
                        let skip: Vec<&str> = row.skip_methods.iter().map(|m| m.as_str()).collect();
                        println!("[phase {}] {}", row.phase, row.name);
                        println!("          {}", row.scenario);
                        if !skip.is_empty() {
                            println!("          skips: {}", skip.join(", "));
                        }
                    }
                    println!("\n{} fuzzers", rows.len());
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Schema => {
            let schema = contractfuzz_core::schema::generate_schema()?;
            println!("{schema}");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_flag_splits_on_first_equals() {
        assert_eq!(
            parse_header("Authorization=Bearer a=b").unwrap(),
            ("Authorization".to_string(), "Bearer a=b".to_string())
        );
        assert!(parse_header("NoValue").is_err());
        assert!(parse_header("=x").is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        write_config(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("server"));

        let err = write_config(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn terminal_summary_lists_each_suggestion_once() {
        let summary = contractfuzz_core::RunSummary {
            total_executed: 4,
            io_errors: 4,
            execution_errors: 4,
            ..contractfuzz_core::RunSummary::default()
        };
        let report = RunReport::new(summary, Vec::new());
        assert_eq!(report.suggestions.len(), 1);
        let text = terminal_summary(&report);
        assert_eq!(text.matches("Suggestion:").count(), 1);
        assert!(text.contains("FAIL"));
        assert!(text.contains("Exit code: 2"));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "contractfuzz",
            "--output",
            "json",
            "run",
            "--dry-run",
            "-H",
            "X-Key=1",
        ])
        .unwrap();
        assert!(cli.output == OutputFormat::Json);
        match cli.command {
            Commands::Run {
                dry_run, headers, ..
            } => {
                assert!(dry_run);
                assert_eq!(headers, vec![("X-Key".to_string(), "1".to_string())]);
            }
            _ => panic!("expected run"),
        }
    }
}
