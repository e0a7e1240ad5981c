//! Collection and rendering of diagnostics.

use std::collections::HashSet;

use codespan_reporting::{
    diagnostic::{Diagnostic as CodespanDiagnostic, Label},
    term::{emit, Config},
};
use merge_model::{diagnostics::Diagnostic, model::DeclarationEnv};
use termcolor::WriteColor;

use crate::options::DiagnosticsFormat;

/// Accumulates diagnostics in report order. Identical diagnostics, e.g. a non-public
/// contribution seen by several targets, are kept once.
pub struct DiagnosticReporter<'env> {
    env: &'env DeclarationEnv,
    seen: HashSet<Diagnostic>,
    diagnostics: Vec<Diagnostic>,
}

impl<'env> DiagnosticReporter<'env> {
    pub fn new(env: &'env DeclarationEnv) -> Self {
        Self {
            env,
            seen: HashSet::new(),
            diagnostics: vec![],
        }
    }

    pub fn add(&mut self, diag: Diagnostic) {
        if self.seen.insert(diag.clone()) {
            self.diagnostics.push(diag);
        }
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.add(diag);
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// `<file>: (<line>, <column>) <message>` with 1-based line and column.
    pub fn format_plain(&self, diag: &Diagnostic) -> String {
        let (line, column) = self.env.line_column(&diag.loc);
        format!(
            "{}: ({}, {}) {}",
            self.env.file_name(diag.loc.file_id()),
            line,
            column,
            diag.message
        )
    }

    pub fn render<W: WriteColor>(
        &self,
        writer: &mut W,
        format: DiagnosticsFormat,
    ) -> anyhow::Result<()> {
        match format {
            DiagnosticsFormat::Plain => {
                for diag in &self.diagnostics {
                    writeln!(writer, "{}", self.format_plain(diag))?;
                }
            }
            DiagnosticsFormat::Rich => {
                let config = Config::default();
                for diag in &self.diagnostics {
                    let rich = CodespanDiagnostic::error()
                        .with_code(diag.kind.to_string())
                        .with_message(&diag.message)
                        .with_labels(vec![Label::primary(
                            diag.loc.file_id(),
                            diag.loc.byte_range(),
                        )]);
                    emit(writer, &config, self.env.files(), &rich)?;
                }
            }
        }
        Ok(())
    }
}
