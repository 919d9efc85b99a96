use clap::{Parser, Subcommand};
use image_rules::audit::audit;
use image_rules::config::{self, DEFAULT_STORAGE};
use image_rules::output;
use image_rules::registry::ValidatorRegistry;
use image_rules::request::VariantRequest;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "image-rules")]
#[command(about = "Check requested image sizes against a resize whitelist")]
#[command(long_about = "\
Check requested image sizes against a resize whitelist

Rules are read from images.toml. Each rule allows one width x height,
optionally restricted to one resize algorithm. With no rules configured
every variant is allowed; once any rule exists, only matching variants are.

  [[rules]]
  width = 800
  height = 600
  algorithm = \"fit\"

  [storage.avatars]
  rules = [{ width = 64, height = 64, algorithm = \"crop\" }]

Pass --config more than once to layer files; later files override earlier
ones. Run 'image-rules gen-config' to print a documented images.toml.")]
#[command(version)]
struct Cli {
    /// Config file(s), applied in order; each must exist. Without any,
    /// images.toml is read if present
    #[arg(long = "config", global = true)]
    configs: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether one variant is allowed (exit status 1 if denied)
    Check {
        /// Requested size, e.g. 800x600
        size: String,
        /// Requested resize algorithm
        algorithm: Option<String>,
        /// Storage backend whose rules apply
        #[arg(long, default_value = DEFAULT_STORAGE)]
        storage: String,
    },
    /// List configured rules for every storage
    Rules {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check every `SIZE [ALGORITHM]` line of a file (exit status 1 if any denied)
    Audit {
        file: PathBuf,
        /// Storage backend whose rules apply
        #[arg(long, default_value = DEFAULT_STORAGE)]
        storage: String,
    },
    /// Print a stock images.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let rules_config = if cli.configs.is_empty() {
        config::load_config(Path::new(config::DEFAULT_CONFIG_FILE))?
    } else {
        config::load_layered(&cli.configs)?
    };
    let registry = ValidatorRegistry::from_config(&rules_config)?;

    match cli.command {
        Command::Check {
            size,
            algorithm,
            storage,
        } => {
            let validator = storage_validator(&registry, &storage)?;
            let request = VariantRequest::from_segments(&size, algorithm.as_deref());
            let permitted = request.is_permitted(validator);
            output::print_check(&storage, &request, permitted);
            Ok(exit_status(permitted))
        }
        Command::Rules { json } => {
            if json {
                let listing: std::collections::BTreeMap<&str, _> = registry
                    .storages()
                    .filter_map(|name| registry.get(name).map(|v| (name, v.rules())))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                output::print_rules(&registry);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Audit { file, storage } => {
            let validator = storage_validator(&registry, &storage)?;
            let content = std::fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
            let mut line_numbers = Vec::new();
            let mut requests = Vec::new();
            for (i, line) in content.lines().enumerate() {
                let parsed = VariantRequest::parse_line(line)
                    .map_err(|e| format!("{}:{}: {e}", file.display(), i + 1))?;
                if let Some(request) = parsed {
                    line_numbers.push(i + 1);
                    requests.push(request);
                }
            }

            init_thread_pool(&rules_config.processing);
            let report = audit(validator, &requests);
            output::print_audit(&report, &line_numbers);
            Ok(exit_status(report.all_allowed()))
        }
        Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

fn storage_validator<'a>(
    registry: &'a ValidatorRegistry,
    storage: &str,
) -> Result<&'a Arc<image_rules::rules::RuleValidator>, String> {
    registry.get(storage).ok_or_else(|| {
        let known: Vec<&str> = registry.storages().collect();
        format!("unknown storage '{storage}'. Configured: {known:?}")
    })
}

fn exit_status(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
