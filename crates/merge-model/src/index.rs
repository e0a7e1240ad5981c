//! Builds the declaration index from source files.
//!
//! Indexing is a one-shot pure scan: every declaration is registered in discovery order (files
//! in the order given, declarations in source order, parents before their nested children),
//! then type references are resolved and contribution and merge-target records are extracted
//! from annotations. Checks on the records themselves are left to the merge analysis so that
//! its diagnostics can refer to the full picture.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    ast::{Annotation, DeclKeyword, SourceFile, TypeDecl, TypeName},
    diagnostics::{Diagnostic, DiagnosticKind},
    model::{
        ContributionId, ContributionRecord, DeclId, DeclKind, DeclarationData, DeclarationEnv,
        MergeAnnotationKind, MergeScope, MergeTargetId, MergeTargetRecord, TypeRef, Visibility,
    },
    parser::parse_file,
};

pub const CONTRIBUTES_TO: &str = "ContributesTo";

/// Names usable without an import.
const PRELUDE: &[&str] = &["Any", "Unit", "Nothing"];
const PRELUDE_PACKAGE: &str = "kotlin";

/// Scans the given `(file name, source)` pairs into a [`DeclarationEnv`].
pub fn scan<I, N, S>(sources: I) -> DeclarationEnv
where
    I: IntoIterator<Item = (N, S)>,
    N: Into<String>,
    S: Into<String>,
{
    let mut env = DeclarationEnv::new();
    let mut files = vec![];
    for (name, source) in sources {
        let file_id = env.files.add(name.into(), source.into());
        let (file, diags) = match env.files.get(file_id) {
            Ok(file) => parse_file(file_id, file.source()),
            Err(_) => continue,
        };
        env.diags.extend(diags);
        files.push(file);
    }

    let mut builder = IndexBuilder {
        env: &mut env,
        pending: vec![],
    };
    for file in &files {
        for decl in &file.declarations {
            builder.register(file, decl, None, vec![], false);
        }
    }
    builder.extract_records();

    info!(
        "indexed {} declarations: {} contributions, {} merge targets",
        env.declarations.len(),
        env.contributions.len(),
        env.merge_targets.len()
    );
    env
}

struct PendingDecl<'a> {
    id: DeclId,
    decl: &'a TypeDecl,
    file: &'a SourceFile,
    /// Fully qualified names of the enclosing declarations, innermost first.
    enclosing: Vec<TypeRef>,
    in_merge_target: bool,
}

struct IndexBuilder<'env, 'a> {
    env: &'env mut DeclarationEnv,
    pending: Vec<PendingDecl<'a>>,
}

impl<'env, 'a> IndexBuilder<'env, 'a> {
    fn register(
        &mut self,
        file: &'a SourceFile,
        decl: &'a TypeDecl,
        parent: Option<DeclId>,
        enclosing: Vec<TypeRef>,
        in_merge_target: bool,
    ) {
        let package = file.package_name();
        let type_ref = match enclosing.first() {
            Some(outer) => TypeRef::new(format!("{}.{}", outer, decl.name)),
            None if package.is_empty() => TypeRef::new(&decl.name),
            None => TypeRef::new(format!("{}.{}", package, decl.name)),
        };
        if self.env.decls_by_type.contains_key(&type_ref) {
            self.env.diags.push(Diagnostic::new(
                DiagnosticKind::SyntaxError,
                decl.loc,
                format!("redeclaration of `{}`", type_ref),
            ));
            return;
        }

        let own_visibility = decl
            .modifiers
            .iter()
            .find_map(|m| Visibility::from_modifier(m))
            .unwrap_or(Visibility::Public);
        let visibility = match parent {
            Some(parent) => own_visibility.restrict(self.env.get_declaration(parent).visibility),
            None => own_visibility,
        };

        let id = DeclId::new(self.env.declarations.len());
        self.env.declarations.push(DeclarationData {
            id,
            type_ref: type_ref.clone(),
            kind: match decl.keyword {
                DeclKeyword::Interface => DeclKind::Interface,
                DeclKeyword::Class | DeclKeyword::Object => DeclKind::Class,
            },
            is_abstract: decl.has_modifier("abstract"),
            visibility,
            package,
            parent,
            supertypes: vec![],
            loc: decl.loc,
        });
        self.env.decls_by_type.insert(type_ref.clone(), id);

        let is_merge_target = decl.annotations.iter().any(|a| {
            MergeAnnotationKind::from_simple_name(&annotation_simple_name(file, a)).is_some()
        });
        self.pending.push(PendingDecl {
            id,
            decl,
            file,
            enclosing: enclosing.clone(),
            in_merge_target,
        });

        let mut nested_enclosing = vec![type_ref];
        nested_enclosing.extend(enclosing);
        for member in &decl.members {
            self.register(
                file,
                member,
                Some(id),
                nested_enclosing.clone(),
                in_merge_target || is_merge_target,
            );
        }
    }

    fn extract_records(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for item in &pending {
            let resolver = NameResolver {
                decls: &self.env.decls_by_type,
                file: item.file,
                enclosing: &item.enclosing,
            };
            let supertypes = item
                .decl
                .supertypes
                .iter()
                .map(|name| resolver.resolve(&name.path))
                .collect_vec();

            let mut contributions = vec![];
            let mut merges = vec![];
            let mut diags = vec![];
            for annotation in &item.decl.annotations {
                let simple_name = annotation_simple_name(item.file, annotation);
                if simple_name == CONTRIBUTES_TO {
                    if item.in_merge_target {
                        debug!(
                            "ignoring {} on `{}`: it is nested in a merge target",
                            CONTRIBUTES_TO, item.decl.name
                        );
                        continue;
                    }
                    match contribution_args(&resolver, annotation) {
                        Ok(args) => contributions.push(args),
                        Err(diag) => diags.push(diag),
                    }
                } else if let Some(kind) = MergeAnnotationKind::from_simple_name(&simple_name) {
                    match merge_scope(&resolver, annotation, kind) {
                        Ok(scope) => merges.push(scope),
                        Err(diag) => diags.push(diag),
                    }
                }
            }

            self.env.diags.extend(diags);
            let data = &mut self.env.declarations[item.id.as_usize()];
            data.supertypes = supertypes;
            let data = data.clone();

            for (scope, replaces) in contributions {
                let id = ContributionId::new(self.env.contributions.len());
                debug!("`{}` contributes to `{}`", data.type_ref, scope);
                self.env.contributions.push(ContributionRecord {
                    id,
                    decl: data.id,
                    contributed_type: data.type_ref.clone(),
                    kind: data.kind,
                    scope,
                    replaces,
                    visibility: data.visibility,
                    declared_supertypes: data.supertypes.clone(),
                    package: data.package.clone(),
                    loc: data.loc,
                });
            }
            if !merges.is_empty() {
                let id = MergeTargetId::new(self.env.merge_targets.len());
                self.env.merge_targets.push(MergeTargetRecord {
                    id,
                    decl: data.id,
                    target_type: data.type_ref.clone(),
                    kind: data.kind,
                    merges,
                    existing_supertypes: data.supertypes.clone(),
                    package: data.package.clone(),
                    loc: data.loc,
                });
            }
        }
    }
}

/// Resolves type names written in one declaration's context.
struct NameResolver<'r> {
    decls: &'r BTreeMap<TypeRef, DeclId>,
    file: &'r SourceFile,
    enclosing: &'r [TypeRef],
}

impl NameResolver<'_> {
    /// Resolves `path` by trying, in order: nested types of the enclosing declarations, explicit
    /// imports, the current package, star imports, a fully qualified name and the prelude.
    /// A name that resolves nowhere stays as written; it still works as an identity.
    fn resolve(&self, path: &[String]) -> TypeRef {
        let written = path.join(".");
        let known = |name: &str| self.decls.contains_key(&TypeRef::new(name));

        for outer in self.enclosing {
            let candidate = format!("{}.{}", outer, written);
            if known(&candidate) {
                return TypeRef::new(candidate);
            }
        }
        if let Some(first) = path.first() {
            if let Some(import) = self
                .file
                .imports
                .iter()
                .find(|i| i.visible_name() == Some(first.as_str()))
            {
                let full = import.path.iter().chain(&path[1..]).join(".");
                return TypeRef::new(full);
            }
        }
        let package = self.file.package_name();
        if !package.is_empty() {
            let candidate = format!("{}.{}", package, written);
            if known(&candidate) {
                return TypeRef::new(candidate);
            }
        }
        for import in self.file.imports.iter().filter(|i| i.is_star) {
            let candidate = format!("{}.{}", import.path.join("."), written);
            if known(&candidate) {
                return TypeRef::new(candidate);
            }
        }
        if known(&written) {
            return TypeRef::new(written);
        }
        if path.len() == 1 && PRELUDE.contains(&path[0].as_str()) {
            return TypeRef::new(format!("{}.{}", PRELUDE_PACKAGE, written));
        }
        TypeRef::new(written)
    }

    fn resolve_all(&self, names: &[&TypeName]) -> Vec<TypeRef> {
        names
            .iter()
            .map(|name| self.resolve(&name.path))
            .unique()
            .collect()
    }
}

/// The simple name of an annotation after following an import alias.
fn annotation_simple_name(file: &SourceFile, annotation: &Annotation) -> String {
    if let [single] = annotation.path.as_slice() {
        if let Some(import) = file
            .imports
            .iter()
            .find(|i| i.alias.as_deref() == Some(single.as_str()))
        {
            if let Some(last) = import.path.last() {
                return last.clone();
            }
        }
    }
    annotation.path.last().cloned().unwrap_or_default()
}

fn scope_arg(
    resolver: &NameResolver<'_>,
    annotation: &Annotation,
    annotation_name: &str,
) -> Result<TypeRef, Diagnostic> {
    let scope = annotation
        .argument("scope", 0)
        .and_then(|arg| arg.value.class_literals())
        .filter(|names| names.len() == 1);
    match scope {
        Some(names) => Ok(resolver.resolve(&names[0].path)),
        None => Err(Diagnostic::new(
            DiagnosticKind::MalformedAnnotation,
            annotation.loc,
            format!("@{} requires a scope given as a class literal", annotation_name),
        )),
    }
}

fn type_list_arg(
    resolver: &NameResolver<'_>,
    annotation: &Annotation,
    name: &str,
    position: usize,
) -> Result<Vec<TypeRef>, Diagnostic> {
    let Some(arg) = annotation.argument(name, position) else {
        return Ok(vec![]);
    };
    match arg.value.class_literals() {
        Some(names) => Ok(resolver.resolve_all(&names)),
        None => Err(Diagnostic::new(
            DiagnosticKind::MalformedAnnotation,
            arg.loc,
            format!(
                "`{}` must be a class literal or an array of class literals",
                name
            ),
        )),
    }
}

fn contribution_args(
    resolver: &NameResolver<'_>,
    annotation: &Annotation,
) -> Result<(TypeRef, Vec<TypeRef>), Diagnostic> {
    let scope = scope_arg(resolver, annotation, CONTRIBUTES_TO)?;
    let replaces = type_list_arg(resolver, annotation, "replaces", 1)?;
    Ok((scope, replaces))
}

fn merge_scope(
    resolver: &NameResolver<'_>,
    annotation: &Annotation,
    kind: MergeAnnotationKind,
) -> Result<MergeScope, Diagnostic> {
    let scope = scope_arg(resolver, annotation, &format!("{:?}", kind))?;
    // `exclude` follows the module lists of the component annotations.
    let exclude_position = match kind {
        MergeAnnotationKind::MergeComponent => 3,
        MergeAnnotationKind::MergeSubcomponent => 2,
        MergeAnnotationKind::MergeInterfaces => 1,
    };
    let exclude = type_list_arg(resolver, annotation, "exclude", exclude_position)?;
    Ok(MergeScope {
        annotation: kind,
        scope,
        exclude,
        loc: annotation.loc,
    })
}
