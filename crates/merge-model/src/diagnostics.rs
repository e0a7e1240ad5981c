use std::fmt;

use serde::Serialize;

use crate::model::Loc;

/// The kinds of failures the scan and the merge resolution can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticKind {
    /// Input the declaration scanner cannot make sense of.
    SyntaxError,
    /// A recognized annotation whose arguments don't have the required shape.
    MalformedAnnotation,
    /// A merge annotation on something other than an interface.
    InvalidMergeAnnotationTarget,
    /// A contribution referenced from a merge target's scope is not public.
    NonPublicContribution,
    /// A replaced type isn't contributed to the scope of the contribution replacing it.
    InvalidReplaceTarget,
    /// A replaced type is contributed, but it is a class.
    ReplaceTargetNotInterface,
    /// Merging would make a type its own supertype.
    CyclicMerge,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::SyntaxError => "SyntaxError",
            DiagnosticKind::MalformedAnnotation => "MalformedAnnotation",
            DiagnosticKind::InvalidMergeAnnotationTarget => "InvalidMergeAnnotationTarget",
            DiagnosticKind::NonPublicContribution => "NonPublicContribution",
            DiagnosticKind::InvalidReplaceTarget => "InvalidReplaceTarget",
            DiagnosticKind::ReplaceTargetNotInterface => "ReplaceTargetNotInterface",
            DiagnosticKind::CyclicMerge => "CyclicMerge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub loc: Loc,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, loc: Loc, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            kind,
            message: message.into(),
            loc,
        }
    }
}
