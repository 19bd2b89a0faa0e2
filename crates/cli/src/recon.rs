//! `folio recon`: config-driven structural reconciliation of a document pair.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use folio_recon::config::ThresholdOverrides;
use folio_recon::model::{Document, ReconResult};
use folio_recon::{ReconConfig, ReconInput};

use crate::exit_codes::{recon_exit_code, EXIT_RECON_REVIEW, EXIT_RECON_RUNTIME, EXIT_USAGE};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run one reconciliation pass from a TOML config file
    #[command(after_help = "\
Examples:
  folio recon run handbook.recon.toml
  folio recon run handbook.recon.toml --json
  folio recon run handbook.recon.toml --output result.json
  folio recon run handbook.recon.toml --source scan.json --target tree.json --resolution 0.8
  folio recon run handbook.recon.toml --strict")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Source document (overrides [inputs].source)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Target document (overrides [inputs].target)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Override thresholds.resolution for this run
        #[arg(long)]
        resolution: Option<f64>,

        /// Override thresholds.dedup for this run
        #[arg(long)]
        dedup: Option<f64>,

        /// Override thresholds.placement_floor for this run
        #[arg(long, allow_hyphen_values = true)]
        placement_floor: Option<i32>,

        /// Override thresholds.tie_margin for this run
        #[arg(long)]
        tie_margin: Option<f64>,

        /// Exit 5 when ambiguous, unresolved or fallback-placed items remain
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  folio recon validate handbook.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            json,
            output,
            source,
            target,
            resolution,
            dedup,
            placement_floor,
            tie_margin,
            strict,
        } => {
            let overrides = ThresholdOverrides {
                resolution,
                dedup,
                placement_floor,
                tie_margin,
            };
            cmd_recon_run(RunArgs {
                config_path: config,
                json_output: json,
                output_file: output,
                source,
                target,
                overrides,
                strict,
            })
        }
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

struct RunArgs {
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    overrides: ThresholdOverrides,
    strict: bool,
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(|e| recon_err(recon_exit_code(&e), e.to_string()))
}

/// Pick the document path: an explicit flag (relative to the working
/// directory) wins over the config entry (relative to the config file).
fn input_path(
    flag: Option<PathBuf>,
    from_config: Option<&str>,
    base_dir: &Path,
    role: &str,
) -> Result<PathBuf, CliError> {
    match (flag, from_config) {
        (Some(path), _) => Ok(path),
        (None, Some(rel)) => Ok(base_dir.join(rel)),
        (None, None) => Err(recon_err(EXIT_USAGE, format!("no {role} document given"))
            .with_hint(format!("pass --{role} FILE or set [inputs].{role} in the config"))),
    }
}

fn read_document(path: &Path) -> Result<Document, CliError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", path.display())))?;
    Document::from_json(&data)
        .map_err(|e| recon_err(recon_exit_code(&e), format!("{}: {e}", path.display())))
}

fn cmd_recon_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config_path)?.with_overrides(&args.overrides);

    // Resolve file paths relative to config file's directory
    let base_dir = args.config_path.parent().unwrap_or_else(|| Path::new("."));
    let source_path = input_path(args.source, config.inputs.source.as_deref(), base_dir, "source")?;
    let target_path = input_path(args.target, config.inputs.target.as_deref(), base_dir, "target")?;

    let input = ReconInput {
        source: read_document(&source_path)?,
        target: read_document(&target_path)?,
    };

    let result = folio_recon::run(&config, &input)
        .map_err(|e| recon_err(recon_exit_code(&e), e.to_string()))?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    let review = result.summary.needs_review();
    if args.strict && review > 0 {
        return Err(recon_err(EXIT_RECON_REVIEW, format!("{review} item(s) need review (--strict)")));
    }

    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "recon '{}': {} chapter(s), {} reference(s): {} exact, {} fuzzy ({} escalated), {} ambiguous, {} no match",
        result.meta.config_name,
        s.chapters,
        s.references,
        s.resolved_exact,
        s.resolved_fuzzy,
        s.resolved_escalated,
        s.ambiguous,
        s.no_match,
    );
    eprintln!(
        "dedup: {} group(s), {} duplicate(s) removed",
        s.duplicate_groups, s.duplicates_removed
    );
    eprintln!(
        "placement: {} anchored, {} appended at section end",
        s.placed, s.fallback_placed
    );
    if s.malformed_skipped > 0 {
        eprintln!("skipped {} malformed element(s)", s.malformed_skipped);
    }
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let t = &config.thresholds;
    eprintln!("config ok: \"{}\"", config.name);
    eprintln!(
        "  thresholds: resolution {}, dedup {}, placement floor {}, tie margin {}",
        t.resolution, t.dedup, t.placement_floor, t.tie_margin
    );
    let w = &config.weights;
    eprintln!(
        "  weights: title {}, content {}, shape {}, substring bonus {}",
        w.title, w.content, w.shape, w.substring_bonus
    );
    eprintln!(
        "  pass: parallel {}, escalate to book scope {}",
        config.pass.parallel, config.pass.escalate_to_book_scope
    );

    match (&config.inputs.source, &config.inputs.target) {
        (Some(_), Some(_)) => {}
        _ => eprintln!("  note: [inputs] incomplete; pass --source/--target to `recon run`"),
    }

    Ok(())
}
