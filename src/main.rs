use anyhow::{Context, Result};
use api_migrator::config::{load_from_path, JobConfig};
use api_migrator::driver::{self, FileDiff, Job, RunSummary};
use api_migrator::profiles;
use api_migrator::transcript::LogLevel;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "api-migrator")]
#[command(about = "Rule-driven source-to-source rewriting for C codebases", long_about = None)]
#[command(version)]
struct Cli {
    /// Log progress to stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Built-in profile to run (see `api-migrator profiles`)
    #[arg(short, long)]
    profile: Option<String>,

    /// TOML job file with profile, paths and options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository root (defaults to $API_MIGRATOR_ROOT, then the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Source directory, relative to the root
    #[arg(long)]
    source: Option<PathBuf>,

    /// Destination directory for mirror profiles, relative to the root
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Report path, relative to the root
    #[arg(long)]
    report: Option<PathBuf>,

    /// Skip the before/after parse comparison
    #[arg(long)]
    no_syntax_check: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite the source tree and write the report
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the written output has converged
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// Print pending changes as JSON
        #[arg(long)]
        json: bool,
    },

    /// List built-in profiles
    Profiles,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            target,
            dry_run,
            diff,
            json,
        } => cmd_run(target, dry_run, diff, json),

        Commands::Verify { target, json } => cmd_verify(target, json),

        Commands::Profiles => cmd_profiles(),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the repository root.
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. `root` in the job file (relative to the job file)
/// 3. API_MIGRATOR_ROOT environment variable
/// 4. Current directory
fn resolve_root(cli_root: Option<PathBuf>, config: &JobConfig) -> Result<PathBuf> {
    if let Some(path) = cli_root.or_else(|| config.root.clone()) {
        return path
            .canonicalize()
            .with_context(|| format!("root does not exist: {}", path.display()));
    }

    if let Ok(env_root) = env::var("API_MIGRATOR_ROOT") {
        let path = PathBuf::from(&env_root);
        if path.is_dir() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: API_MIGRATOR_ROOT is set but path doesn't exist: {}",
                env_root
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?)
}

/// CLI flags override the job file, which overrides profile defaults.
fn build_job(target: TargetArgs, dry_run: bool) -> Result<Job> {
    let config = match &target.config {
        Some(path) => load_from_path(path)?,
        None => JobConfig::default(),
    };

    let Some(name) = target.profile.clone().or_else(|| config.profile.clone()) else {
        anyhow::bail!(
            "{}\n  {}",
            "No profile selected.".red(),
            "Pass --profile <NAME> or set `profile` in the job file (see `api-migrator profiles`)"
        );
    };
    let profile = profiles::find(&name)?;
    let root = resolve_root(target.root, &config)?;

    let mut job = Job::new(profile, root);
    if let Some(source) = target.source.or_else(|| config.paths.source.map(PathBuf::from)) {
        job = job.with_source(source);
    }
    if let Some(destination) = target
        .destination
        .or_else(|| config.paths.destination.map(PathBuf::from))
    {
        if job.profile.layout == profiles::OutputLayout::InPlace {
            anyhow::bail!(
                "profile '{}' rewrites in place; --destination is not supported",
                job.profile.name
            );
        }
        job = job.with_destination(destination);
    }
    if let Some(report) = target.report.or_else(|| config.paths.report.map(PathBuf::from)) {
        job = job.with_report(report);
    }

    let syntax_check = !target.no_syntax_check && config.options.syntax_check.unwrap_or(true);
    let dry_run = dry_run || config.options.dry_run.unwrap_or(false);
    Ok(job.dry_run(dry_run).syntax_check(syntax_check))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(diff: &FileDiff) {
    println!("\n{}", format!("--- {} (original)", diff.path).dimmed());
    println!("{}", format!("+++ {} (rewritten)", diff.path).dimmed());

    let text_diff = TextDiff::from_lines(&diff.before, &diff.after);
    for change in text_diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", line);
    }
}

fn print_summary(summary: &RunSummary) {
    let stats = &summary.stats;
    if summary.dry_run {
        println!("{}", "[DRY RUN - no files were written]".cyan());
    }
    println!("{}", "Summary:".bold());
    println!("  {} files scanned", stats.files_scanned);
    println!("  {} files processed", stats.files_processed);
    println!("  {} files modified", format!("{}", stats.files_modified).green());
    println!("  {} files written", stats.files_written);
    println!("  {} substitutions", format!("{}", stats.substitutions).green());

    let errors = summary.log.count(LogLevel::Error);
    let warnings = summary.log.count(LogLevel::Warn);
    if warnings > 0 {
        println!("  {} warnings", format!("{warnings}").yellow());
    }
    if errors > 0 {
        println!("  {} errors", format!("{errors}").red());
        for entry in summary.log.entries() {
            if entry.level == LogLevel::Error {
                eprintln!("{} {}", "✗".red(), entry.message);
            }
        }
    }
    println!("Report: {}", summary.report.display());
}

fn cmd_run(target: TargetArgs, dry_run: bool, show_diff: bool, json: bool) -> Result<()> {
    let job = build_job(target, dry_run)?.capture_diffs(show_diff);

    if !json {
        println!("Profile: {}", job.profile.name);
        println!("Root: {}", job.root.display());
        println!();
    }

    let summary = driver::run(&job);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        if show_diff {
            for diff in &summary.diffs {
                display_diff(diff);
            }
            println!();
        }
        print_summary(&summary);
    }

    if let Some(error) = &summary.report_error {
        anyhow::bail!("failed to write report {}: {error}", summary.report.display());
    }
    Ok(())
}

fn cmd_verify(target: TargetArgs, json: bool) -> Result<()> {
    let job = build_job(target, false)?;
    let pending = driver::verify(&job)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else if pending.is_empty() {
        println!("{} output has converged", "✓".green());
    } else {
        for file in &pending {
            if file.missing {
                println!("{} {}: output missing", "✗".red(), file.file);
                continue;
            }
            println!("{} {}: pending changes", "⊙".yellow(), file.file);
            for record in &file.records {
                println!("    {} ({})", record.description, record.count());
            }
        }
    }

    if !pending.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_profiles() -> Result<()> {
    for profile in profiles::builtin() {
        println!("{}", profile.name.bold());
        println!("  {}", profile.summary);
        println!("  source: {}", profile.source);
        match &profile.layout {
            profiles::OutputLayout::InPlace => println!("  output: in place"),
            profiles::OutputLayout::Mirror { destination, .. } => {
                println!("  output: {destination}")
            }
        }
        println!("  report: {}", profile.report);
        println!(
            "  rules: {}, hooks: {}",
            profile.rules.rules.len(),
            profile.rules.hooks.len()
        );
    }
    Ok(())
}
