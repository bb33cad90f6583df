use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use poolscan::aggregation::{join_variants, PopulationSchema, WindowAggregator};
use poolscan::allele_counts::{extract_allele_counts, AlleleCounts};
use poolscan::config::{self, AggregateConfig, FilterConfig, RawFilterOptions};
use poolscan::genome::{ContigIndex, CoordinateMapper, WindowAnchor, WindowAssigner};
use poolscan::{csv_reader, filters, output, vcf_parser};
use std::path::{Path, PathBuf};

const VARIANTS_OUTFILE_SUFFIX: &str = "formated_variants.csv";
const GROUPED_VARIANTS_OUTFILE_SUFFIX: &str = "grouped_variants.csv";
const RO_OUTFILE: &str = "RO_counts.csv";
const AO_OUTFILE: &str = "AO_counts.csv";

#[derive(Parser)]
#[command(name = "poolscan")]
#[command(version)]
#[command(about = "Filter pool-seq SNVs and aggregate association statistics by genomic window", long_about = None)]
struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Number of threads for parallel processing
    #[arg(long, global = true, default_value_t = num_cpus())]
    threads: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract per-sample RO and AO counts from a VCF
    AlleleCounts(AlleleCountsArgs),
    /// Join variants, p-values and counts, and summarize them by window
    Aggregate(AggregateArgs),
    /// Apply depth, frequency and quality filters to a VCF
    Filter(FilterArgs),
    /// Draw a Manhattan plot from a report table
    Plot(PlotArgs),
}

#[derive(Args)]
struct AlleleCountsArgs {
    /// Input VCF file (can be gzipped)
    #[arg(long)]
    vcf: PathBuf,

    /// Directory receiving RO_counts.csv and AO_counts.csv
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct AggregateArgs {
    /// Variant table (VCF, can be gzipped)
    #[arg(long)]
    variants: PathBuf,

    /// P-values, one per line, aligned with the variants
    #[arg(long)]
    pvalues: PathBuf,

    /// RO count table; counts are read from the VCF when omitted
    #[arg(long = "ro", requires = "ao_file")]
    ro_file: Option<PathBuf>,

    /// AO count table; counts are read from the VCF when omitted
    #[arg(long = "ao", requires = "ro_file")]
    ao_file: Option<PathBuf>,

    /// Design table with a `population` column
    #[arg(long)]
    design: PathBuf,

    /// Reference index (.fai); windows are then computed genome-wide
    #[arg(long)]
    fai: Option<PathBuf>,

    /// Output prefix
    #[arg(long)]
    prefix: String,

    /// Window size in bp
    #[arg(long)]
    window_size: String,

    /// Quantile of the p-values reported per window
    #[arg(long, default_value = "0.05")]
    pvalue_quantile: String,
}

#[derive(Args)]
struct FilterArgs {
    /// Input VCF file (can be gzipped)
    #[arg(long)]
    vcf: PathBuf,

    /// Reference index (.fai); enables the SNP density table
    #[arg(long)]
    fai: Option<PathBuf>,

    /// Filtered VCF path (defaults to <input stem>.filtered.vcf)
    #[arg(long)]
    out: Option<PathBuf>,

    /// At least one sample must reach this depth
    #[arg(long, default_value = "10")]
    min_depth: String,

    /// Per-sample depth quantile above which a variant is dropped
    #[arg(long, default_value = "0.9")]
    max_depth_quantile: String,

    #[arg(long = "min-freq", default_value = "0.1")]
    min_frequency: String,

    #[arg(long = "max-freq", default_value = "0.99")]
    max_frequency: String,

    #[arg(long = "min-qual", default_value = "10")]
    min_quality: String,

    /// Window size of the SNP density table
    #[arg(long, default_value = "1e6")]
    window_size: String,

    /// Also draw the SNP density scatter (requires --fai)
    #[arg(long)]
    plot: bool,

    /// Plot output format: "png" (default) or "svg"
    #[arg(long, default_value = "png")]
    plot_format: String,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    Variants,
    Windows,
}

#[derive(Args)]
struct PlotArgs {
    /// Per-variant report (`*.formated_variants.csv`)
    #[arg(long)]
    variants: Option<PathBuf>,

    /// Per-window report (`*.grouped_variants.csv`)
    #[arg(long)]
    windows: Option<PathBuf>,

    /// Which report to draw
    #[arg(long, value_enum, default_value = "windows")]
    table: ReportKind,

    /// Number of largest chromosomes to draw
    #[arg(long, default_value = "20")]
    top: usize,

    /// Draw a single chromosome instead of the largest ones
    #[arg(long, conflicts_with = "top")]
    chromosome: Option<String>,

    /// Keep p-values between these two quantiles, e.g. 0.0,0.05
    #[arg(long, value_delimiter = ',', num_args = 2)]
    pvalue_quantiles: Option<Vec<String>>,

    /// Output image
    #[arg(long)]
    out: PathBuf,

    /// Plot output format: "png" (default) or "svg"
    #[arg(long, default_value = "png")]
    plot_format: String,
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

macro_rules! progress {
    ($quiet:expr) => {
        if !$quiet {
            eprintln!();
        }
    };
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

fn make_progress_bar(quiet: bool, len: u64) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("  [{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb
}

#[cfg(feature = "plotting")]
fn parse_plot_format(s: &str) -> Result<poolscan::plotting::PlotFormat> {
    match s.to_lowercase().as_str() {
        "png" => Ok(poolscan::plotting::PlotFormat::Png),
        "svg" => Ok(poolscan::plotting::PlotFormat::Svg),
        other => anyhow::bail!("Invalid --plot-format '{}'. Must be 'png' or 'svg'", other),
    }
}

/// `sample.vcf.gz` -> `sample`
fn vcf_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.strip_suffix(".vcf").unwrap_or(name).to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.quiet { "warn" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .context("Failed to configure thread pool")?;

    match &cli.command {
        Command::AlleleCounts(args) => run_allele_counts(args, cli.quiet),
        Command::Aggregate(args) => run_aggregate(args, cli.quiet),
        Command::Filter(args) => run_filter(args, cli.quiet),
        Command::Plot(args) => run_plot(args, cli.quiet),
    }
}

fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(())
}

fn run_allele_counts(args: &AlleleCountsArgs, quiet: bool) -> Result<()> {
    require_file(&args.vcf)?;
    progress!(quiet, "Allele count extraction");
    progress!(quiet, "=========================================");
    progress!(quiet, "Input VCF: {}", args.vcf.display());
    progress!(quiet, "Output directory: {}", args.out_dir.display());
    progress!(quiet);

    let spinner = make_spinner(quiet);
    spinner.set_message("parsing VCF");
    let table = vcf_parser::parse_vcf(&args.vcf)?;
    spinner.finish_and_clear();

    let counts = extract_allele_counts(&table)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
    output::write_count_matrix(&counts.reference, &args.out_dir.join(RO_OUTFILE))?;
    output::write_count_matrix(&counts.alternate, &args.out_dir.join(AO_OUTFILE))?;

    progress!(quiet, "Done! Counts written to: {}", args.out_dir.display());
    Ok(())
}

fn run_aggregate(args: &AggregateArgs, quiet: bool) -> Result<()> {
    // Options are validated before any table is opened
    let config = AggregateConfig::from_raw(&args.window_size, &args.pvalue_quantile)?;
    let aggregator = WindowAggregator::new(config.pvalue_quantile)?;
    let windows = WindowAssigner::new(config.window_size, config.anchor)?;

    for path in [&args.variants, &args.pvalues, &args.design] {
        require_file(path)?;
    }

    progress!(quiet, "Windowed aggregation");
    progress!(quiet, "=========================================");
    progress!(quiet, "Variants: {}", args.variants.display());
    progress!(quiet, "P-values: {}", args.pvalues.display());
    progress!(quiet, "Design: {}", args.design.display());
    progress!(quiet, "Window size: {} bp", config.window_size);
    progress!(quiet, "P-value quantile: {}", config.pvalue_quantile);
    if let Some(fai) = &args.fai {
        progress!(quiet, "Reference index: {}", fai.display());
    }
    progress!(quiet);

    progress!(quiet, "Step 1: Loading inputs...");
    let spinner = make_spinner(quiet);
    spinner.set_message("parsing variants");
    let table = vcf_parser::parse_vcf(&args.variants)?;
    spinner.set_message("parsing p-values");
    let pvalues = vcf_parser::parse_pvalues(&args.pvalues)?;
    spinner.set_message("loading allele counts");
    let counts = match (&args.ro_file, &args.ao_file) {
        (Some(ro), Some(ao)) => AlleleCounts {
            reference: csv_reader::read_count_table(ro)?,
            alternate: csv_reader::read_count_table(ao)?,
        },
        _ => extract_allele_counts(&table)?,
    };
    let populations = csv_reader::read_design_populations(&args.design)?;
    let index: Option<ContigIndex> = args.fai.as_deref().map(csv_reader::read_fai).transpose()?;
    spinner.finish_and_clear();

    let schema = PopulationSchema::new(populations)?;
    progress!(quiet, "  Populations: {}", schema.populations().join(", "));

    let mapper = match &index {
        Some(index) => CoordinateMapper::absolute(index, windows),
        None => CoordinateMapper::relative(windows),
    };
    let sites = table.records.into_iter().map(|r| r.site).collect();
    let joined = join_variants(sites, pvalues, &counts, &schema, &mapper)?;

    progress!(quiet, "Step 2: Aggregating {} variants by contig and window...", joined.len());
    let pb = make_progress_bar(quiet, 0);
    pb.set_message("contigs");
    let tables = aggregator.aggregate(&joined, &schema, Some(&pb))?;
    pb.finish_and_clear();

    progress!(quiet, "Step 3: Writing reports...");
    let variants_path = PathBuf::from(format!("{}.{}", args.prefix, VARIANTS_OUTFILE_SUFFIX));
    let windows_path = PathBuf::from(format!("{}.{}", args.prefix, GROUPED_VARIANTS_OUTFILE_SUFFIX));
    output::write_report(&tables.variants, &variants_path)?;
    output::write_report(&tables.windows, &windows_path)?;

    progress!(quiet, "  {} variant rows, {} window rows", tables.variants.len(), tables.windows.len());
    progress!(quiet);
    progress!(quiet, "Done! Results written to: {} and {}", variants_path.display(), windows_path.display());
    Ok(())
}

fn run_filter(args: &FilterArgs, quiet: bool) -> Result<()> {
    let config = FilterConfig::from_raw(&RawFilterOptions {
        min_depth: args.min_depth.clone(),
        max_depth_quantile: args.max_depth_quantile.clone(),
        min_frequency: args.min_frequency.clone(),
        max_frequency: args.max_frequency.clone(),
        min_quality: args.min_quality.clone(),
        window_size: args.window_size.clone(),
    })?;
    #[cfg(feature = "plotting")]
    let plot_format = parse_plot_format(&args.plot_format)?;

    require_file(&args.vcf)?;
    let out_path = match &args.out {
        Some(out) => out.clone(),
        None => {
            let dir = args.vcf.parent().unwrap_or_else(|| Path::new("."));
            dir.join(format!("{}.filtered.vcf", vcf_stem(&args.vcf)))
        }
    };

    progress!(quiet, "Variant filtering");
    progress!(quiet, "=========================================");
    progress!(quiet, "Input VCF: {}", args.vcf.display());
    progress!(quiet, "Output VCF: {}", out_path.display());
    progress!(quiet, "Min depth: {}", config.min_depth);
    progress!(quiet, "Max depth quantile: {}", config.max_depth_quantile);
    progress!(quiet, "Frequency band: [{}, {}]", config.min_frequency, config.max_frequency);
    progress!(quiet, "Min quality: {}", config.min_quality);
    progress!(quiet);

    progress!(quiet, "Step 1: Parsing VCF...");
    let spinner = make_spinner(quiet);
    spinner.set_message("parsing VCF");
    let table = vcf_parser::parse_vcf(&args.vcf)?;
    let counts = extract_allele_counts(&table)?;
    spinner.finish_and_clear();

    progress!(quiet, "Step 2: Computing filter masks...");
    let quality: Vec<Option<f64>> = table.sites().map(|s| s.quality).collect();
    let outcome = filters::compute_filter_mask(&counts, &quality, &config)?;
    progress!(quiet, "  Kept {} / {} SNPs", outcome.report.kept, outcome.report.total);
    if outcome.report.kept == 0 {
        log::warn!("No variant passed the filters; writing header only");
    }

    progress!(quiet, "Step 3: Writing filtered VCF...");
    output::write_filtered_vcf(&table, &outcome.mask, &out_path)?;

    if let Some(fai) = &args.fai {
        progress!(quiet, "Step 4: Computing SNP density per {} bp window...", config.window_size);
        let index = csv_reader::read_fai(fai)?;
        let mapper = CoordinateMapper::absolute(&index, WindowAssigner::new(config.window_size, WindowAnchor::Start)?);
        let density = filters::density_by_window(table.sites(), &outcome.mask, &mapper);

        let density_path = out_path.with_file_name(format!("{}.snp_density.csv", vcf_stem(&args.vcf)));
        output::write_density_table(&density, &density_path)?;
        progress!(quiet, "  Density table written to: {}", density_path.display());

        #[cfg(feature = "plotting")]
        if args.plot {
            use poolscan::plotting;
            let plot_config = plotting::PlotConfig {
                format: plot_format,
                ..Default::default()
            };
            let plot_path = density_path.with_extension(plot_format.extension());
            plotting::plot_filter_effect(&density, &plot_path, &plot_config)?;
        }
    } else if args.plot {
        log::warn!("--plot needs --fai to place variants on the genome; skipping");
    }

    progress!(quiet);
    progress!(quiet, "Done! Filtered VCF written to: {}", out_path.display());
    Ok(())
}

#[cfg(feature = "plotting")]
fn run_plot(args: &PlotArgs, quiet: bool) -> Result<()> {
    use poolscan::dashboard::{ChromosomeSelection, DashboardContext, ManhattanLayout, ManhattanQuery, TableKind};
    use poolscan::plotting;

    let format = parse_plot_format(&args.plot_format)?;
    let pvalue_quantiles = match &args.pvalue_quantiles {
        Some(bounds) => Some((
            config::parse_quantile("lower p-value quantile", &bounds[0])?,
            config::parse_quantile("upper p-value quantile", &bounds[1])?,
        )),
        None => None,
    };
    let kind = match args.table {
        ReportKind::Variants => TableKind::Variants,
        ReportKind::Windows => TableKind::Windows,
    };

    progress!(quiet, "Manhattan plot");
    progress!(quiet, "=========================================");

    let ctx = DashboardContext::load(args.variants.as_deref(), args.windows.as_deref())?;
    let table = ctx
        .table(kind)
        .context("The requested report table was not loaded; pass --variants or --windows")?;

    let selection = match &args.chromosome {
        Some(chrom) => ChromosomeSelection::Single(chrom.clone()),
        None => ChromosomeSelection::Top(args.top),
    };
    let mut query = ManhattanQuery::full_range(table, selection);
    query.pvalue_quantiles = pvalue_quantiles;

    let rows = ctx.manhattan(kind, &query);
    progress!(quiet, "  {} rows selected over {} chromosomes", rows.len(), table.chromosomes().len());
    let layout = ManhattanLayout::new(&rows);

    let plot_config = plotting::PlotConfig {
        format,
        ..Default::default()
    };
    let title = match kind {
        TableKind::Variants => "Variants - -log10(p) across genome",
        TableKind::Windows => "Windows - -log10(p) across genome",
    };
    plotting::plot_manhattan(&layout, title, &args.out, &plot_config)?;

    progress!(quiet, "Done! Plot written to: {}", args.out.display());
    Ok(())
}

#[cfg(not(feature = "plotting"))]
fn run_plot(_args: &PlotArgs, _quiet: bool) -> Result<()> {
    anyhow::bail!("plotting feature not enabled. Rebuild with default features to enable plots.")
}
