use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::debug;

pub const SOURCE_EXTENSION: &str = "kt";

/// Expands directories to the declaration sources below them, sorted by path. Files are taken
/// as given.
pub fn source_paths(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for input in inputs {
        if input.is_dir() {
            let pattern = input.join("**").join(format!("*.{}", SOURCE_EXTENSION));
            let mut found = glob::glob(&pattern.to_string_lossy())
                .with_context(|| format!("invalid source directory `{}`", input.display()))?
                .collect::<Result<Vec<_>, _>>()?;
            found.sort();
            debug!("found {} sources in `{}`", found.len(), input.display());
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

pub fn read_source(path: &Path) -> anyhow::Result<(String, String)> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))?;
    Ok((path.display().to_string(), text))
}

/// Reads all sources named by `inputs` as `(label, text)` pairs.
pub fn collect_sources(inputs: &[PathBuf]) -> anyhow::Result<Vec<(String, String)>> {
    source_paths(inputs)?
        .iter()
        .map(|path| read_source(path))
        .collect()
}
