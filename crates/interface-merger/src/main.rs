use std::{fs::File, path::PathBuf};

use anyhow::Context;
use clap::*;
use colored::Colorize;
use interface_merger::merge::{execute, GeneralConfig};
use log::{debug, LevelFilter};
use merge_analysis::{options::MergeArgs, target_filter::TargetFilterOptions};
use simplelog::{CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use termcolor::{ColorChoice, StandardStream};

#[derive(Parser)]
#[clap(
    name = env!("CARGO_BIN_NAME"),
    about = "Splices interfaces contributed to a scope onto the merge targets of that scope, and reports the supertypes each target gains",
    rename_all = "kebab-case",
    author,
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Args {
    /// Declaration sources, or directories searched for `*.kt` files
    #[clap(required = true)]
    pub inputs: Vec<PathBuf>,

    /// General options
    #[clap(flatten)]
    pub general_config: GeneralConfig,

    /// Merge options
    #[clap(flatten)]
    pub merge_args: MergeArgs,

    /// Filtering options
    #[clap(flatten)]
    pub filter_config: TargetFilterOptions,
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(general_config: &GeneralConfig) -> anyhow::Result<()> {
    let level = level_for(general_config.verbose);
    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![TermLogger::new(level, Config::default(), TerminalMode::Stderr)];
    if let Some(path) = &general_config.log_file {
        let file = File::create(path)
            .with_context(|| format!("creating log file `{}`", path.display()))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug.max(level), Config::default(), file));
    }
    CombinedLogger::init(loggers).context("initializing logger")
}

fn run(args: Args) -> anyhow::Result<()> {
    init_logging(&args.general_config)?;
    debug!("Interface merger CLI version: {}", env!("CARGO_PKG_VERSION"));

    let mut error_writer = StandardStream::stderr(ColorChoice::Auto);
    execute(
        &args.inputs,
        &args.general_config,
        args.merge_args,
        &args.filter_config,
        &mut std::io::stdout(),
        &mut error_writer,
    )
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    let args = Args::parse();
    if let Err(err) = run(args) {
        let err = format!("{:?}", err);
        eprintln!("{}", err.bold().red());
        std::process::exit(1);
    }
}
