use std::fmt::{Display, Formatter};

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

/// How diagnostics are rendered.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticsFormat {
    /// `<file>: (<line>, <column>) <message>`, one line per diagnostic.
    #[default]
    Plain,
    /// Source snippets with labels.
    Rich,
}

impl Display for DiagnosticsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticsFormat::Plain => write!(f, "plain"),
            DiagnosticsFormat::Rich => write!(f, "rich"),
        }
    }
}

/// Options of the merge resolution, read from a TOML file and overridden by [`MergeArgs`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeOptions {
    /// Package roots contributions and merge targets must live in. Empty allows every package.
    /// The policy applies to both sides: a merge target outside the roots is not resolved, and
    /// a contribution outside them is never added.
    pub allowed_namespaces: Vec<String>,
    pub parallel: bool,
    pub diagnostics: DiagnosticsFormat,
}

/// Command line side of [`MergeOptions`]. Only the options actually given override the file.
#[derive(Args, Debug, Clone, Default)]
#[clap(next_help_heading = "Merge Options")]
pub struct MergeArgs {
    /// Package root contributions and merge targets must live in. Repeat for several roots
    #[clap(long = "allowed-namespace", global = true)]
    pub allowed_namespaces: Vec<String>,

    /// Process merge targets on a thread pool (`--parallel=false` turns it off)
    #[clap(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub parallel: Option<bool>,

    /// Diagnostics rendering [default: plain]
    #[clap(long, global = true, value_enum)]
    pub diagnostics: Option<DiagnosticsFormat>,
}

impl MergeOptions {
    /// Whether `package` is inside one of the allowed namespace roots.
    pub fn is_namespace_allowed(&self, package: &str) -> bool {
        self.allowed_namespaces.is_empty()
            || self.allowed_namespaces.iter().any(|root| {
                package == root
                    || package
                        .strip_prefix(root.as_str())
                        .map_or(false, |rest| rest.starts_with('.'))
            })
    }

    /// Applies the values given on the command line on top of `self`.
    pub fn merge_from(&mut self, cli: MergeArgs) {
        if !cli.allowed_namespaces.is_empty() {
            self.allowed_namespaces = cli.allowed_namespaces;
        }
        if let Some(parallel) = cli.parallel {
            self.parallel = parallel;
        }
        if let Some(diagnostics) = cli.diagnostics {
            self.diagnostics = diagnostics;
        }
    }
}
