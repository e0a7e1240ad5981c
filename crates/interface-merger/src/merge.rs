use std::{
    fmt::{Display, Formatter},
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Args, ValueEnum};
use itertools::Itertools;
use log::{debug, info};
use merge_analysis::{
    merge_target_pipeline::MergeReport,
    options::{DiagnosticsFormat, MergeArgs, MergeOptions},
    pipeline_factory::{default_pipeline, prepare_targets},
    reporter::DiagnosticReporter,
    target_filter::TargetFilterOptions,
    ResolvedMerge,
};
use merge_model::{scan, DeclarationEnv};
use serde::Serialize;
use termcolor::WriteColor;

use crate::sources::collect_sources;

/// General merge options
#[derive(Args, Debug, Default)]
#[clap(next_help_heading = "General Options")]
pub struct GeneralConfig {
    /// TOML file with merge options. Options given on the command line take precedence
    #[clap(name = "config", long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Output format of the resolved merges
    #[clap(name = "format", long, short = 'f', global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Dump the state of all merge targets after each pipeline step to `<BASE>_<step>_<name>.merge`
    #[clap(name = "dump-pipeline", long, global = true)]
    pub dump_pipeline: Option<String>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[clap(name = "verbose", long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Also write the log to this file
    #[clap(name = "log-file", long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    resolved: &'a [ResolvedMerge],
}

/// Reads the options file, if any, and applies the command line options on top of it.
pub fn load_options(config: Option<&Path>, cli: MergeArgs) -> anyhow::Result<MergeOptions> {
    let mut options = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config `{}`", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("parsing config `{}`", path.display()))?
        }
        None => MergeOptions::default(),
    };
    options.merge_from(cli);
    debug!("merge options: {:?}", options);
    Ok(options)
}

/// Scans `sources` and resolves the targets selected by `filter`. With `dump_pipeline` set, the
/// state after each processor is written next to the given base name.
pub fn run_merge<I, N, S>(
    sources: I,
    options: MergeOptions,
    filter: &TargetFilterOptions,
    dump_pipeline: Option<&str>,
) -> anyhow::Result<(DeclarationEnv, MergeReport)>
where
    I: IntoIterator<Item = (N, S)>,
    N: Into<String>,
    S: Into<String>,
{
    let env = scan(sources);
    if !env.has_errors() {
        if let Some(msg) = filter.check_filter_correctness(&env) {
            bail!(msg);
        }
    }
    let report = match prepare_targets(&env, options, filter) {
        Ok(mut holder) => {
            let pipeline = default_pipeline();
            match dump_pipeline {
                Some(base) => pipeline.run_with_dump(&env, &mut holder, base)?,
                None => pipeline.run(&env, &mut holder),
            }
            holder.into_report(&env)
        }
        Err(report) => report,
    };
    Ok((env, report))
}

/// Renders the resolved merges, one `<target>: <added>, ...` line per target in text format.
pub fn render_resolved(report: &MergeReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(report
            .resolved
            .iter()
            .map(|merge| {
                let added = if merge.added_supertypes.is_empty() {
                    "<none>".to_string()
                } else {
                    merge.added_supertypes.iter().join(", ")
                };
                format!("{}: {}\n", merge.target_type, added)
            })
            .collect()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonOutput {
                resolved: &report.resolved,
            })?;
            Ok(format!("{}\n", json))
        }
    }
}

/// Reports the diagnostics of `report` to `error_writer` and fails with `msg` if there were any.
pub fn check_errors<W: WriteColor>(
    env: &DeclarationEnv,
    report: &MergeReport,
    format: DiagnosticsFormat,
    error_writer: &mut W,
    msg: &'static str,
) -> anyhow::Result<()> {
    let mut reporter = DiagnosticReporter::new(env);
    reporter.extend(report.diagnostics.iter().cloned());
    reporter.render(error_writer, format)?;
    if reporter.has_errors() {
        Err(anyhow!(msg))
    } else {
        Ok(())
    }
}

pub fn execute<O: Write, E: WriteColor>(
    inputs: &[PathBuf],
    general_config: &GeneralConfig,
    merge_args: MergeArgs,
    filter: &TargetFilterOptions,
    out: &mut O,
    error_writer: &mut E,
) -> anyhow::Result<()> {
    let options = load_options(general_config.config.as_deref(), merge_args)?;
    let diagnostics = options.diagnostics;
    let sources = collect_sources(inputs)?;
    info!("scanning {} sources", sources.len());
    if sources.is_empty() {
        bail!("no sources found");
    }

    let (env, report) = run_merge(
        sources,
        options,
        filter,
        general_config.dump_pipeline.as_deref(),
    )?;
    check_errors(
        &env,
        &report,
        diagnostics,
        error_writer,
        "exiting with merge errors",
    )?;
    write!(out, "{}", render_resolved(&report, general_config.format)?)?;
    Ok(())
}
