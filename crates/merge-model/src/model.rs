// Copyright (c) The Diem Core Contributors
// Copyright (c) The Move Contributors
// SPDX-License-Identifier: Apache-2.0

//! The declaration model: an immutable snapshot of every type declaration visible to one
//! compilation, together with the contribution and merge-target records extracted from their
//! annotations.

use std::{collections::BTreeMap, fmt, sync::Arc};

use codespan::Span;
use codespan_reporting::files::{Files, SimpleFiles};
use serde::Serialize;

use crate::diagnostics::Diagnostic;

pub type FileId = usize;

/// A location in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Loc {
    file_id: FileId,
    span: Span,
}

impl Loc {
    pub fn new(file_id: FileId, span: Span) -> Loc {
        Loc { file_id, span }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.span.start().to_usize()..self.span.end().to_usize()
    }
}

/// The identity of a declared (or referenced) type, i.e. its fully qualified name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeRef(Arc<str>);

impl TypeRef {
    pub fn new(name: impl AsRef<str>) -> TypeRef {
        TypeRef(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

/// Scopes are opaque grouping tokens. They are written as class literals and therefore share
/// the identity type of declarations, but nothing ever looks inside them.
pub type ScopeKey = TypeRef;

macro_rules! define_id {
    ($name:ident, $display:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(usize);

        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index)
            }

            pub fn as_usize(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($display, "#{}"), self.0)
            }
        }
    };
}

define_id!(DeclId, "decl");
define_id!(ContributionId, "contribution");
define_id!(MergeTargetId, "target");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Interface,
    Class,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Interface => write!(f, "interface"),
            DeclKind::Class => write!(f, "class"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Protected,
    Private,
}

impl Visibility {
    pub fn from_modifier(modifier: &str) -> Option<Visibility> {
        match modifier {
            "public" => Some(Visibility::Public),
            "internal" => Some(Visibility::Internal),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Visibility::Public => 3,
            Visibility::Internal => 2,
            Visibility::Protected => 1,
            Visibility::Private => 0,
        }
    }

    /// The visibility a declaration with visibility `self` has when nested in a declaration
    /// whose effective visibility is `enclosing`.
    pub fn restrict(self, enclosing: Visibility) -> Visibility {
        if enclosing.rank() < self.rank() {
            enclosing
        } else {
            self
        }
    }

    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Which merge annotation declared a merge target scope. All three behave identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MergeAnnotationKind {
    MergeComponent,
    MergeSubcomponent,
    MergeInterfaces,
}

impl MergeAnnotationKind {
    pub fn from_simple_name(name: &str) -> Option<MergeAnnotationKind> {
        match name {
            "MergeComponent" => Some(MergeAnnotationKind::MergeComponent),
            "MergeSubcomponent" => Some(MergeAnnotationKind::MergeSubcomponent),
            "MergeInterfaces" => Some(MergeAnnotationKind::MergeInterfaces),
            _ => None,
        }
    }
}

impl fmt::Display for MergeAnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeAnnotationKind::MergeComponent => write!(f, "@MergeComponent"),
            MergeAnnotationKind::MergeSubcomponent => write!(f, "@MergeSubcomponent"),
            MergeAnnotationKind::MergeInterfaces => write!(f, "@MergeInterfaces"),
        }
    }
}

/// Metadata for every declared type, annotated or not.
#[derive(Debug, Clone)]
pub struct DeclarationData {
    pub id: DeclId,
    pub type_ref: TypeRef,
    pub kind: DeclKind,
    pub is_abstract: bool,
    /// Visibility after applying the visibility of all enclosing declarations.
    pub visibility: Visibility,
    pub package: String,
    pub parent: Option<DeclId>,
    /// Directly declared supertypes, in declaration order.
    pub supertypes: Vec<TypeRef>,
    /// Location of the declaration's name.
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct ContributionRecord {
    pub id: ContributionId,
    pub decl: DeclId,
    pub contributed_type: TypeRef,
    pub kind: DeclKind,
    pub scope: ScopeKey,
    pub replaces: Vec<TypeRef>,
    pub visibility: Visibility,
    pub declared_supertypes: Vec<TypeRef>,
    pub package: String,
    pub loc: Loc,
}

/// One merge annotation on a merge target.
#[derive(Debug, Clone)]
pub struct MergeScope {
    pub annotation: MergeAnnotationKind,
    pub scope: ScopeKey,
    pub exclude: Vec<TypeRef>,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct MergeTargetRecord {
    pub id: MergeTargetId,
    pub decl: DeclId,
    pub target_type: TypeRef,
    pub kind: DeclKind,
    pub merges: Vec<MergeScope>,
    pub existing_supertypes: Vec<TypeRef>,
    pub package: String,
    pub loc: Loc,
}

impl MergeTargetRecord {
    /// The distinct scopes of this target, in annotation order.
    pub fn scopes(&self) -> Vec<&ScopeKey> {
        let mut scopes: Vec<&ScopeKey> = vec![];
        for merge in &self.merges {
            if !scopes.contains(&&merge.scope) {
                scopes.push(&merge.scope);
            }
        }
        scopes
    }

    pub fn has_scope(&self, scope: &ScopeKey) -> bool {
        self.merges.iter().any(|m| &m.scope == scope)
    }

    /// Whether `ty` is excluded for contributions of `scope`. With several annotations for the
    /// same scope each is resolved independently and the results are unioned, so a type is
    /// only excluded when every one of them excludes it.
    pub fn excludes(&self, scope: &ScopeKey, ty: &TypeRef) -> bool {
        let mut merges = self.merges.iter().filter(|m| &m.scope == scope).peekable();
        merges.peek().is_some() && merges.all(|m| m.exclude.contains(ty))
    }

    pub fn is_predefined(&self, ty: &TypeRef) -> bool {
        self.existing_supertypes.contains(ty)
    }
}

/// The global environment of one compilation: source files, declarations, and the records
/// extracted from their annotations. Built once by [`crate::index::scan`] and immutable
/// afterwards.
#[derive(Debug)]
pub struct DeclarationEnv {
    pub(crate) files: SimpleFiles<String, String>,
    pub(crate) declarations: Vec<DeclarationData>,
    pub(crate) decls_by_type: BTreeMap<TypeRef, DeclId>,
    pub(crate) contributions: Vec<ContributionRecord>,
    pub(crate) merge_targets: Vec<MergeTargetRecord>,
    pub(crate) diags: Vec<Diagnostic>,
}

impl Default for DeclarationEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationEnv {
    pub fn new() -> DeclarationEnv {
        DeclarationEnv {
            files: SimpleFiles::new(),
            declarations: vec![],
            decls_by_type: BTreeMap::new(),
            contributions: vec![],
            merge_targets: vec![],
            diags: vec![],
        }
    }

    pub fn files(&self) -> &SimpleFiles<String, String> {
        &self.files
    }

    pub fn file_name(&self, file_id: FileId) -> String {
        self.files.name(file_id).unwrap_or_else(|_| "<unknown>".to_string())
    }

    /// Returns the 1-based (line, column) of the start of `loc`.
    pub fn line_column(&self, loc: &Loc) -> (usize, usize) {
        match self.files.location(loc.file_id(), loc.span().start().to_usize()) {
            Ok(location) => (location.line_number, location.column_number),
            Err(_) => (0, 0),
        }
    }

    pub fn get_declarations(&self) -> impl Iterator<Item = &DeclarationData> {
        self.declarations.iter()
    }

    pub fn get_declaration(&self, id: DeclId) -> &DeclarationData {
        &self.declarations[id.as_usize()]
    }

    pub fn find_declaration(&self, ty: &TypeRef) -> Option<&DeclarationData> {
        self.decls_by_type
            .get(ty)
            .map(|id| self.get_declaration(*id))
    }

    pub fn get_contributions(&self) -> impl Iterator<Item = &ContributionRecord> {
        self.contributions.iter()
    }

    pub fn get_contribution(&self, id: ContributionId) -> &ContributionRecord {
        &self.contributions[id.as_usize()]
    }

    pub fn get_merge_targets(&self) -> impl Iterator<Item = &MergeTargetRecord> {
        self.merge_targets.iter()
    }

    pub fn get_merge_target(&self, id: MergeTargetId) -> &MergeTargetRecord {
        &self.merge_targets[id.as_usize()]
    }

    pub fn find_merge_target(&self, ty: &TypeRef) -> Option<&MergeTargetRecord> {
        self.merge_targets.iter().find(|t| &t.target_type == ty)
    }

    /// Diagnostics produced while scanning sources, i.e. input the host compiler would reject.
    pub fn scan_diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    pub fn has_errors(&self) -> bool {
        !self.diags.is_empty()
    }
}
