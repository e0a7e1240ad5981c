use std::{
    collections::BTreeSet,
    fmt::{self, Formatter},
};

use itertools::Itertools;
use log::debug;
use merge_model::{
    diagnostics::{Diagnostic, DiagnosticKind},
    model::{ContributionRecord, DeclKind, DeclarationEnv, MergeTargetRecord, ScopeKey, TypeRef},
};

use crate::{
    merge_target_pipeline::{MergeState, MergeTargetData, MergeTargetProcessor, MergeTargetsHolder},
    options::MergeOptions,
};

/// The outcome of validating the `replaces` edges of one scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeReplacements {
    /// Types replaced away in this scope.
    pub replaced: BTreeSet<TypeRef>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Computes the replaced-away set of `scope`. A replaced type must be contributed to the same
/// scope, and it must be an interface. Replacement is set based, so several contributions may
/// replace the same type.
pub fn analyze_scope<'a, I>(
    options: &MergeOptions,
    scope: &ScopeKey,
    contributions: I,
) -> ScopeReplacements
where
    I: IntoIterator<Item = &'a ContributionRecord>,
{
    let in_scope = contributions
        .into_iter()
        .filter(|c| &c.scope == scope && options.is_namespace_allowed(&c.package))
        .collect_vec();
    let mut result = ScopeReplacements::default();
    for contribution in &in_scope {
        for replaced in &contribution.replaces {
            match in_scope.iter().find(|c| &c.contributed_type == replaced) {
                None => result.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidReplaceTarget,
                    contribution.loc,
                    format!(
                        "`{}` replaces `{}`, but `{}` is not contributed to the scope `{}`",
                        contribution.contributed_type, replaced, replaced, scope
                    ),
                )),
                Some(target) if target.kind != DeclKind::Interface => {
                    result.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ReplaceTargetNotInterface,
                        contribution.loc,
                        format!(
                            "`{}` replaces `{}`, but only interfaces can be replaced and `{}` is a class",
                            contribution.contributed_type, replaced, replaced
                        ),
                    ))
                }
                Some(_) => {
                    result.replaced.insert(replaced.clone());
                }
            }
        }
    }
    result
}

/// Removes replaced-away contributions from the candidates. Replace validation is computed once
/// per scope in `initialize`; its diagnostics are attached to every target using the scope.
pub struct ReplacementAnalysisProcessor();

impl ReplacementAnalysisProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

impl MergeTargetProcessor for ReplacementAnalysisProcessor {
    fn initialize(&self, env: &DeclarationEnv, holder: &mut MergeTargetsHolder) {
        let scopes = holder.referenced_scopes(env);
        for scope in scopes {
            let contributions = holder
                .scope_groups()
                .contributions(scope)
                .iter()
                .map(|id| env.get_contribution(*id));
            let replacements = analyze_scope(holder.options(), scope, contributions);
            debug!(
                "scope `{}`: {} replaced, {} invalid replacements",
                scope,
                replacements.replaced.len(),
                replacements.diagnostics.len()
            );
            holder.set_scope_replacements(scope.clone(), replacements);
        }
    }

    fn process(
        &self,
        holder: &MergeTargetsHolder,
        env: &DeclarationEnv,
        target: &MergeTargetRecord,
        mut data: MergeTargetData,
    ) -> MergeTargetData {
        for scope in target.scopes() {
            if let Some(replacements) = holder.scope_replacements(scope) {
                data.diagnostics
                    .extend(replacements.diagnostics.iter().cloned());
            }
        }
        data.remove_candidates(|id| {
            let contribution = env.get_contribution(id);
            holder
                .scope_replacements(&contribution.scope)
                .map_or(false, |r| r.replaced.contains(&contribution.contributed_type))
        });
        data.advance(MergeState::ReplacementApplied);
        data
    }

    fn name(&self) -> String {
        "replacement_analysis".to_string()
    }

    fn dump_result(
        &self,
        f: &mut Formatter<'_>,
        env: &DeclarationEnv,
        holder: &MergeTargetsHolder,
    ) -> fmt::Result {
        writeln!(f, "replaced per scope:")?;
        for scope in holder.referenced_scopes(env) {
            if let Some(replacements) = holder.scope_replacements(scope) {
                writeln!(
                    f,
                    "  {}: {}",
                    scope,
                    replacements.replaced.iter().join(", ")
                )?;
            }
        }
        Ok(())
    }
}
