use log::trace;
use merge_model::{
    diagnostics::{Diagnostic, DiagnosticKind},
    model::{DeclKind, DeclarationEnv, MergeTargetRecord},
};

use crate::merge_target_pipeline::{
    MergeState, MergeTargetData, MergeTargetProcessor, MergeTargetsHolder,
};

/// Collects the candidate contributions of a target from the scope groups of its scopes.
///
/// Only interfaces are candidates; contributed classes matter solely as replace targets.
/// Contributions outside the allowed namespaces are treated as absent. A candidate that is not
/// public is reported at its own declaration and dropped.
pub struct ScopeResolutionProcessor();

impl ScopeResolutionProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

impl MergeTargetProcessor for ScopeResolutionProcessor {
    fn process(
        &self,
        holder: &MergeTargetsHolder,
        env: &DeclarationEnv,
        target: &MergeTargetRecord,
        mut data: MergeTargetData,
    ) -> MergeTargetData {
        for scope in target.scopes() {
            for id in holder.scope_groups().contributions(scope) {
                let contribution = env.get_contribution(*id);
                if contribution.kind != DeclKind::Interface {
                    continue;
                }
                if !holder
                    .options()
                    .is_namespace_allowed(&contribution.package)
                {
                    trace!(
                        "`{}` is outside the allowed namespaces",
                        contribution.contributed_type
                    );
                    continue;
                }
                if !contribution.visibility.is_public() {
                    data.report(Diagnostic::new(
                        DiagnosticKind::NonPublicContribution,
                        contribution.loc,
                        format!(
                            "`{}` is contributed to the scope `{}` and must be public, but it is {}",
                            contribution.contributed_type, scope, contribution.visibility
                        ),
                    ));
                    continue;
                }
                data.candidates.push(*id);
            }
        }
        data.candidates.sort();
        data.candidates.dedup();
        data.advance(MergeState::ScopeResolved);
        data
    }

    fn name(&self) -> String {
        "scope_resolution".to_string()
    }
}
