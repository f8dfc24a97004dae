//! svnfi command-line front end.
//!
//! Reads an SVN dump stream and writes a `git fast-import` stream,
//! configured either from a TOML file or from flags mirroring the
//! pipeline's option surface.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use svnfi_core::dump::{parse, ByteLexer};
use svnfi_core::options::Options;
use svnfi_core::output::write_events;
use svnfi_core::pipeline::{self, PipelineContext, RunOutcome};
use svnfi_core::progress::ProgressSink;

/// Translate an SVN dump stream into a Git fast-import stream.
#[derive(Parser, Debug)]
#[command(name = "svnfi", version, about = "Translate an SVN dump into a Git fast-import stream")]
struct Cli {
    /// SVN dump file to read. Reads stdin if omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Fast-import stream destination. Writes stdout if omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with pipeline options; flags below override its fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Show a progress bar on stderr.
    #[arg(long)]
    progress: bool,

    /// Skip phases 6-9 and A; emit everything on one branch.
    #[arg(long)]
    nobranch: bool,

    /// Keep commits on refs/deleted/* instead of pruning them.
    #[arg(long)]
    preserve: bool,

    /// Suppress warnings about properties dropped in phase 2.
    #[arg(long)]
    ignore_properties: bool,

    /// Skip phase B (ignore-property conversion) entirely.
    #[arg(long)]
    no_automatic_ignores: bool,

    /// Pass through user-created .gitignore files.
    #[arg(long)]
    user_ignores: bool,

    /// Pass through .cvsignore files.
    #[arg(long)]
    cvsignores: bool,

    /// Synthesize committer emails as name@<repo-uuid>.
    #[arg(long)]
    use_uuid: bool,

    /// Disable all parallel execution.
    #[arg(long)]
    serial: bool,

    /// Replace committer identity and timestamp with fixed test values.
    #[arg(long)]
    testmode: bool,

    /// Branch pattern, repeatable. Replaces the default set if given.
    #[arg(long = "branchify")]
    branchify: Vec<String>,

    /// `regex=replacement` branch mapping, repeatable.
    #[arg(long = "branch-mapping")]
    branch_mappings: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log_level.clone()))
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_options(cli: &Cli) -> Result<Options> {
    let mut options = match &cli.config {
        Some(path) => Options::load(path).context("failed to load configuration file")?,
        None => Options::default(),
    };

    if cli.nobranch {
        options.nobranch = true;
    }
    if cli.preserve {
        options.preserve = true;
    }
    if cli.ignore_properties {
        options.ignore_properties = true;
    }
    if cli.no_automatic_ignores {
        options.no_automatic_ignores = true;
    }
    if cli.user_ignores {
        options.user_ignores = true;
    }
    if cli.cvsignores {
        options.cvsignores = true;
    }
    if cli.use_uuid {
        options.use_uuid = true;
    }
    if cli.serial {
        options.serial = true;
    }
    if cli.testmode {
        options.testmode = true;
    }
    if !cli.branchify.is_empty() {
        options.branchify = cli.branchify.clone();
    }
    for raw in &cli.branch_mappings {
        let (pattern, replacement) = raw
            .split_once('=')
            .with_context(|| format!("invalid --branch-mapping {raw:?}, expected regex=replacement"))?;
        options.branch_mappings.push((pattern.to_string(), replacement.to_string()));
    }

    options.validate().context("invalid configuration")?;
    Ok(options)
}

struct IndicatifProgress {
    bar: ProgressBar,
}

impl ProgressSink for IndicatifProgress {
    fn start_phase(&self, name: &str, total: u64) {
        self.bar.set_length(total.max(1));
        self.bar.set_position(0);
        self.bar.set_message(name.to_string());
    }

    fn advance(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish_phase(&self) {
        self.bar.set_position(self.bar.length().unwrap_or(0));
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = load_options(&cli)?;

    let mut input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(File::open(path).with_context(|| format!("failed to open {}", path.display()))?),
        None => Box::new(io::stdin()),
    };
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes).context("failed to read dump stream")?;

    let parsed = parse(ByteLexer::new(io::Cursor::new(bytes))).context("failed to parse SVN dump")?;
    let repo_uuid = parsed.uuid.clone();

    let progress: Arc<dyn ProgressSink> = if cli.progress {
        let bar = ProgressBar::new(1);
        bar.set_style(
            ProgressStyle::with_template("{msg:<20} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Arc::new(IndicatifProgress { bar })
    } else {
        Arc::new(svnfi_core::progress::NullProgress)
    };

    let ctx = PipelineContext::new(options, progress, repo_uuid);
    let outcome = pipeline::run(&ctx, parsed);

    let events = match outcome {
        RunOutcome::Completed(events) => events,
        RunOutcome::Cancelled => {
            anyhow::bail!("pipeline cancelled");
        }
    };

    let mut output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    write_events(&mut output, &events).context("failed to write fast-import stream")?;
    output.flush().context("failed to flush output")?;

    Ok(())
}
