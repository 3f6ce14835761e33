use annolint::analysis::{CancellationToken, Issue, LintEngine, Severity};
use annolint::baseline::Baseline;
use annolint::config::Config;
use annolint::discovery::FileFinder;
use annolint::parser::load_units;
use annolint::report::{self, Reporter, SourceMap};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// annolint - Annotation checks for Android (Kotlin/Java)
#[derive(Parser, Debug)]
#[command(name = "annolint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the project directory to analyze
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output file (text and json formats)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only report these issue ids (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    enable: Vec<String>,

    /// Never report these issue ids (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    disable: Vec<String>,

    /// Patterns to exclude (can be specified multiple times)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Print suggested quick fixes after the report
    #[arg(long)]
    show_fixes: bool,

    /// Baseline file for ignoring existing issues
    /// New issues not in baseline will be reported
    #[arg(long, value_name = "FILE")]
    baseline: Option<PathBuf>,

    /// Write a baseline file from current results
    #[arg(long, value_name = "FILE")]
    write_baseline: Option<PathBuf>,

    /// Stop analyzing new files after this many seconds
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Enable parallel processing (enabled by default)
    #[arg(long, action = clap::ArgAction::Set)]
    parallel: Option<bool>,

    /// List the known issues and exit
    #[arg(long)]
    list_issues: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Text,
    Compact,
    Json,
}

impl From<&OutputFormat> for report::ReportFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Text => report::ReportFormat::Text,
            OutputFormat::Compact => report::ReportFormat::Compact,
            OutputFormat::Json => report::ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle shell completions
    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    if cli.list_issues {
        list_issues();
        return Ok(());
    }

    init_logging(cli.verbose, cli.quiet);

    info!("annolint v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let has_errors = run_analysis(&config, &cli)?;
    if has_errors {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list_issues() {
    for issue in Issue::ALL {
        let label = format!("{:<8}", issue.default_severity().as_str());
        let severity = match issue.default_severity() {
            Severity::Error => label.red(),
            Severity::Warning => label.yellow(),
            Severity::Info => label.blue(),
        };
        println!("{} {} {}", format!("{:<24}", issue.id()).bold(), severity, issue.brief());
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from default locations
        Config::from_default_locations(&cli.path)?
    };

    // Override with CLI arguments
    if !cli.enable.is_empty() {
        config.enable = cli.enable.clone();
    }
    if !cli.disable.is_empty() {
        config.disable.extend(cli.disable.clone());
    }
    if !cli.exclude.is_empty() {
        config.exclude.extend(cli.exclude.clone());
    }
    if let Some(parallel) = cli.parallel {
        config.parallel = parallel;
    }
    if cli.deadline.is_some() {
        config.deadline_secs = cli.deadline;
    }

    for id in config.enable.iter().chain(config.disable.iter()) {
        if Issue::from_id(id).is_none() {
            return Err(miette::miette!(
                help = "run with --list-issues to see the known issue ids",
                "Unknown issue id '{}'",
                id
            ));
        }
    }

    Ok(config)
}

/// Run the whole pipeline; returns whether errors remain after the baseline
fn run_analysis(config: &Config, cli: &Cli) -> Result<bool> {
    use indicatif::{ProgressBar, ProgressStyle};

    let start_time = Instant::now();

    // Step 1: Discover files
    info!("Discovering files...");
    let finder = FileFinder::new(config);
    let files = finder.find_files(&cli.path)?;

    info!("Found {} files to analyze", files.len());

    if files.is_empty() {
        if !cli.quiet {
            eprintln!("{}", "No Kotlin or Java files found.".yellow());
        }
        return Ok(false);
    }

    // Step 2: Parse files
    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(files.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .into_diagnostic()?
            .progress_chars("#>-"),
    );

    info!("Parsing files...");
    let units = load_units(&files, config, &cli.path, Some(&pb));
    pb.finish_and_clear();
    info!(
        "Parsed {} files in {:.2}s",
        units.len(),
        start_time.elapsed().as_secs_f64()
    );

    // Step 3: Analyze
    let token = match config.deadline_secs {
        Some(secs) => CancellationToken::with_deadline(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };
    let engine = LintEngine::new(config.clone());
    let result = engine.analyze(&units, &token);
    if result.cancelled && !cli.quiet {
        eprintln!(
            "{}",
            format!(
                "Deadline reached: analyzed {} of {} files",
                result.files_analyzed,
                units.len()
            )
            .yellow()
        );
    }

    // Step 4: Write baseline if requested
    if let Some(baseline_path) = &cli.write_baseline {
        info!("Writing baseline file...");
        let baseline = Baseline::from_findings(&result.findings, &cli.path);
        baseline.save(baseline_path)?;
        if !cli.quiet {
            eprintln!(
                "{}",
                format!(
                    "Baseline written: {} ({} issues)",
                    baseline_path.display(),
                    result.findings.len()
                )
                .green()
            );
        }
    }

    // Step 5: Filter by baseline if provided
    let findings = if let Some(baseline_path) = &cli.baseline {
        let baseline = Baseline::load(baseline_path)?;
        let stats = baseline.stats(&result.findings, &cli.path);
        if !cli.quiet {
            eprintln!("{}", format!("Baseline: {}", stats).cyan());
        }
        baseline
            .filter_new(&result.findings, &cli.path)
            .into_iter()
            .cloned()
            .collect()
    } else {
        result.findings
    };

    // Step 6: Report results
    let options = report::ReportOptions {
        output_path: cli.output.clone(),
        base_path: Some(cli.path.clone()),
        show_fixes: cli.show_fixes,
        files_count: Some(result.files_analyzed),
    };
    let reporter = Reporter::with_options((&cli.format).into(), options);
    reporter.report(&findings, &SourceMap::from_units(&units))?;

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(findings.iter().any(|f| f.severity == Severity::Error))
}
