use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use pgx_guard::config::{ExplainerSettings, Settings};
use pgx_guard::explain::{ExplanationService, OfflineExplainer};
use pgx_guard::parsers::ReaderChoice;
use pgx_guard::risk::supported_drugs;
use pgx_guard::{
    output, parse_drug_list, AnalysisReport, FileDiscovery, PharmacogenomicAnalyzer,
    ReaderBackend, ReportFormat, ReportGenerator, VariantExtractor,
};

/// Pharmacogenomic drug risk assessment from annotated VCF files
#[derive(Parser, Debug)]
#[command(
    name = "pgx-guard",
    version,
    about = "Pharmacogenomic drug risk assessment from star-allele annotated VCF files",
    long_about = r#"
Reads GENE/STAR annotations from one or more VCF files (plain, gzip, bzip2 or xz),
builds diplotypes for CYP2D6, CYP2C19, CYP2C9, SLCO1B1, TPMT and DPYD, classifies
metabolizer phenotypes and reports drug risk for each requested drug.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Variant files or directories (space-separated, supports tab completion)
    #[arg(long, value_name = "FILES", num_args = 1.., value_hint = ValueHint::AnyPath)]
    vcf: Vec<PathBuf>,

    /// Comma-separated drug names, e.g. "codeine,warfarin"
    #[arg(short, long, value_name = "LIST")]
    drug: Option<String>,

    /// Recursive search for variant files
    #[arg(short, long, help = "Recursively search directories")]
    recursive: bool,

    /// TOML settings file
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Patient identifier (defaults to each file's name)
    #[arg(long, env = "PGX_GUARD_PATIENT_ID")]
    patient_id: Option<String>,

    /// Variant reader backend
    #[arg(long, value_enum)]
    reader: Option<ReaderChoice>,

    /// Key for the explanation service; offline text is used without one
    #[arg(long, env = "PGX_GUARD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, help = "Number of threads (0 = auto)")]
    threads: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Output directory for reports
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Print JSON reports to stdout instead of writing files
    #[arg(long)]
    stdout: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions { shell: Shell },
    /// List supported drugs and their governing genes
    Drugs,
}

/// Effective run configuration after merging settings and flags
struct AppConfig {
    inputs: Vec<PathBuf>,
    drugs: Vec<String>,
    recursive: bool,
    patient_id: Option<String>,
    reader: ReaderChoice,
    threads: usize,
    format: ReportFormat,
    output: PathBuf,
    stdout: bool,
    explainer: ExplainerSettings,
}

impl AppConfig {
    fn from_cli(cli: Cli, settings: Settings) -> Result<Self> {
        let drugs = cli.drug.as_deref().map(parse_drug_list).unwrap_or_default();
        if drugs.is_empty() {
            bail!("No drugs given; pass --drug with a comma-separated list");
        }
        if cli.vcf.is_empty() {
            bail!("No variant files given; pass --vcf FILE...");
        }

        let mut explainer = settings.explainer;
        if cli.api_key.is_some() {
            explainer.api_key = cli.api_key;
        }

        Ok(Self {
            inputs: cli.vcf,
            drugs,
            recursive: cli.recursive,
            patient_id: cli.patient_id.or(settings.patient_id),
            reader: cli.reader.unwrap_or(settings.reader),
            threads: cli.threads.unwrap_or(settings.threads),
            format: cli.format.unwrap_or(settings.format),
            output: cli.output.unwrap_or(settings.output_dir),
            stdout: cli.stdout,
            explainer,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    if let Some(Commands::Drugs) = cli.command {
        list_drugs();
        return Ok(());
    }

    // Initialize logging
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let config = AppConfig::from_cli(cli, settings)?;

    // Initialize thread pool
    init_thread_pool(config.threads)?;

    info!("Starting pharmacogenomic analysis...");
    info!("Using {} threads", rayon::current_num_threads());

    run_analysis(config)
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn list_drugs() {
    println!("{}", style("Supported Drugs:").bold().cyan());
    println!();

    for (name, rule) in supported_drugs() {
        println!(
            "  {} - {}",
            style(name).green().bold(),
            style(rule.gene).yellow()
        );
        for (phenotype, risk, severity) in rule.outcomes {
            println!(
                "         {:<4} {} ({})",
                phenotype.abbreviation(),
                risk,
                style(severity).dim()
            );
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("pgx_guard={}", level))
        .with_writer(io::stderr)
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

fn build_explainer(settings: &ExplainerSettings) -> Box<dyn ExplanationService> {
    let Some(key) = settings.api_key.as_deref() else {
        return Box::new(OfflineExplainer);
    };

    #[cfg(feature = "http")]
    {
        match pgx_guard::explain::HttpExplainer::new(settings, key) {
            Ok(explainer) => return Box::new(explainer),
            Err(e) => warn!("Falling back to offline explanations: {}", e),
        }
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = key;
        warn!("Built without the http feature; ignoring API key");
    }

    Box::new(OfflineExplainer)
}

fn run_analysis(config: AppConfig) -> Result<()> {
    // Step 1: Discover files
    let discovery = FileDiscovery::new(config.recursive);
    let files = discovery.discover(&config.inputs)?;
    if files.is_empty() {
        bail!("No variant files found in the given paths");
    }
    info!("Found {} files to analyze", files.len());

    let backend = ReaderBackend::resolve(config.reader);
    let mut analyzer = PharmacogenomicAnalyzer::new(
        VariantExtractor::new(backend),
        build_explainer(&config.explainer),
    );
    if let Some(patient_id) = config.patient_id.clone() {
        analyzer = analyzer.with_patient_id(patient_id);
    }
    info!("Reading variants with the {:?} backend", backend);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Analyzing variant files...");

    // Step 2: Each file is an independent pipeline run
    let reports: Vec<AnalysisReport> = files
        .par_iter()
        .map(|path| {
            let reports = analyzer.analyze(path, &config.drugs);
            pb.inc(1);
            reports
        })
        .flatten()
        .collect();

    for report in reports.iter().filter(|r| !r.quality_metrics.vcf_parsing_success) {
        warn!(
            "{}: variant file could not be parsed, genes defaulted to *1/*1",
            report.patient_id
        );
    }

    // Step 3: Emit reports
    if config.stdout {
        pb.finish_and_clear();
        println!("{}", output::to_json_string(&reports)?);
        return Ok(());
    }

    pb.set_message("Generating reports...");
    let generator = ReportGenerator::new(&config.output)?;
    let written = generator.generate(&reports, config.format)?;
    pb.finish_with_message("Analysis complete!");

    println!();
    println!("{}", style("Analysis Summary:").bold().cyan());
    for report in &reports {
        println!(
            "  {} {} {} [{}] {}",
            style(&report.patient_id).bold(),
            style(&report.drug).green(),
            style(&report.pharmacogenomic_profile.diplotype).yellow(),
            report.pharmacogenomic_profile.phenotype.abbreviation(),
            style(report.risk_assessment.risk_label).bold()
        );
    }
    println!();
    for path in written {
        println!("  Report written to {}", style(path.display()).green());
    }

    Ok(())
}
