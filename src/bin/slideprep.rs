use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use slideprep::app::{App, FetchOptions, ProgressSink, SplitOptions};
use slideprep::catalog::GdcHttpClient;
use slideprep::config::ConfigLoader;
use slideprep::container::SlideContainerReader;
use slideprep::download::GdcDownloader;
use slideprep::error::PrepError;
use slideprep::output::{ConsoleOutput, JsonOutput, OutputMode};
use slideprep::split::SplitThresholds;

type PrepApp = App<GdcHttpClient, SlideContainerReader, GdcDownloader>;

#[derive(Parser)]
#[command(name = "slideprep")]
#[command(about = "Prepare paired frozen/FFPE slide datasets and fetch slides from the GDC")]
#[command(version, author)]
struct Cli {
    /// Print JSON results instead of progress and summaries.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Config file (defaults to ./slideprep.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Split shared patients into train/val/test and export their images")]
    Split(SplitArgs),
    #[command(about = "Keep manifest rows of cases with both diagnostic and frozen slides")]
    FilterManifest(FilterArgs),
    #[command(about = "Resolve slide ids to GDC file ids into the resolution cache")]
    Resolve(ResolveArgs),
    #[command(about = "Write a download manifest from the resolution cache")]
    Manifest(ManifestArgs),
    #[command(about = "Run the GDC download client on a manifest")]
    Download(DownloadArgs),
    #[command(about = "Resolve, write the manifest and download in one go")]
    Fetch(FetchArgs),
}

#[derive(Args)]
struct SplitArgs {
    #[arg(long)]
    frozen_dir: PathBuf,

    #[arg(long)]
    ffpe_dir: PathBuf,

    #[arg(long)]
    output_dir: PathBuf,

    #[arg(long)]
    train_thresh: Option<f64>,

    #[arg(long)]
    test_thresh: Option<f64>,

    /// Container file pattern inside each directory (`.h5` or `.zip` files).
    #[arg(long)]
    pattern: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(short, long)]
    input: PathBuf,

    /// Defaults to <input stem>_filtered.txt next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ResolveArgs {
    /// Slide id list, one per line.
    #[arg(long)]
    ids: PathBuf,

    #[arg(long)]
    cache: PathBuf,

    /// Maximum number of catalog queries in this run; 0 means no limit.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct ManifestArgs {
    #[arg(long)]
    cache: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// Leave slides without a file id out of the manifest.
    #[arg(long)]
    skip_unresolved: bool,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(long)]
    manifest: PathBuf,

    #[arg(long)]
    output_dir: PathBuf,

    #[arg(long)]
    client: Option<String>,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    ids: PathBuf,

    #[arg(long)]
    cache: PathBuf,

    #[arg(long)]
    manifest: PathBuf,

    #[arg(long)]
    output_dir: PathBuf,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    skip_unresolved: bool,

    #[arg(long)]
    client: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(prep) = report.downcast_ref::<PrepError>() {
            return ExitCode::from(map_exit_code(prep));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PrepError) -> u8 {
    match error {
        PrepError::InvalidSlideId(_)
        | PrepError::InvalidPattern(_)
        | PrepError::ConfigRead(_)
        | PrepError::ConfigParse(_)
        | PrepError::SlideListRead(_)
        | PrepError::CacheParse(_)
        | PrepError::Manifest(_) => 2,
        PrepError::CatalogHttp(_)
        | PrepError::CatalogStatus { .. }
        | PrepError::CatalogResponse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    let client_override = match &cli.command {
        Commands::Download(args) => args.client.clone(),
        Commands::Fetch(args) => args.client.clone(),
        _ => None,
    };
    if let Some(client) = client_override {
        config.download.client = client.into();
    }

    let catalog = GdcHttpClient::new(&config.catalog)?;
    let downloader = GdcDownloader::new(config.download.client.as_std_path());
    let app = App::new(config, catalog, SlideContainerReader, downloader);

    match cli.command {
        Commands::Split(args) => run_split(args, &app, output_mode),
        Commands::FilterManifest(args) => run_filter(args, &app, output_mode),
        Commands::Resolve(args) => run_resolve(args, &app, output_mode),
        Commands::Manifest(args) => run_manifest(args, &app, output_mode),
        Commands::Download(args) => run_download(args, &app, output_mode),
        Commands::Fetch(args) => run_fetch(args, &app, output_mode),
    }
}

fn sink_for(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &ConsoleOutput,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn run_split(args: SplitArgs, app: &PrepApp, output_mode: OutputMode) -> miette::Result<()> {
    let defaults = &app.config().split;
    let options = SplitOptions {
        frozen_dir: args.frozen_dir,
        ffpe_dir: args.ffpe_dir,
        output_dir: args.output_dir,
        thresholds: SplitThresholds {
            train: args.train_thresh.unwrap_or(defaults.thresholds.train),
            test: args.test_thresh.unwrap_or(defaults.thresholds.test),
        },
        pattern: args.pattern.unwrap_or_else(|| defaults.pattern.clone()),
    };
    let result = app.split(options, sink_for(output_mode))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_split(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_split(&result),
    }
    Ok(())
}

fn run_filter(args: FilterArgs, app: &PrepApp, output_mode: OutputMode) -> miette::Result<()> {
    let result = app.filter_manifest(&args.input, args.output.as_deref(), sink_for(output_mode))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_filter(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_filter(&result),
    }
    Ok(())
}

fn run_resolve(args: ResolveArgs, app: &PrepApp, output_mode: OutputMode) -> miette::Result<()> {
    let result = app.resolve(&args.ids, &args.cache, args.limit, sink_for(output_mode))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_resolve(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_resolve(&result),
    }
    Ok(())
}

fn run_manifest(args: ManifestArgs, app: &PrepApp, output_mode: OutputMode) -> miette::Result<()> {
    let include_unresolved = app.config().manifest.include_unresolved && !args.skip_unresolved;
    let result = app.emit_manifest(
        &args.cache,
        &args.output,
        include_unresolved,
        sink_for(output_mode),
    )?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_manifest(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_manifest(&result),
    }
    Ok(())
}

fn run_download(args: DownloadArgs, app: &PrepApp, output_mode: OutputMode) -> miette::Result<()> {
    let result = app.download(&args.manifest, &args.output_dir, sink_for(output_mode))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_download(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_download(&result),
    }
    Ok(())
}

fn run_fetch(args: FetchArgs, app: &PrepApp, output_mode: OutputMode) -> miette::Result<()> {
    let options = FetchOptions {
        ids: args.ids,
        cache: args.cache,
        manifest: args.manifest,
        output_dir: args.output_dir,
        limit: args.limit,
        include_unresolved: app.config().manifest.include_unresolved && !args.skip_unresolved,
    };
    let result = app.fetch(options, sink_for(output_mode))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_fetch(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_fetch(&result),
    }
    Ok(())
}
