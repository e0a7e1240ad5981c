use merge_model::{
    diagnostics::{Diagnostic, DiagnosticKind},
    model::{DeclKind, DeclarationEnv, MergeTargetRecord},
};

use crate::merge_target_pipeline::{MergeTargetData, MergeTargetProcessor, MergeTargetsHolder};

/// Rejects merge annotations on anything but interfaces. A rejected target is not processed
/// any further.
pub struct TargetValidationProcessor();

impl TargetValidationProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

impl MergeTargetProcessor for TargetValidationProcessor {
    fn process(
        &self,
        _holder: &MergeTargetsHolder,
        env: &DeclarationEnv,
        target: &MergeTargetRecord,
        mut data: MergeTargetData,
    ) -> MergeTargetData {
        if target.kind == DeclKind::Interface {
            return data;
        }
        let decl = env.get_declaration(target.decl);
        let what = if decl.is_abstract {
            "an abstract class"
        } else {
            "a class"
        };
        let annotation = target
            .merges
            .first()
            .map(|m| m.annotation.to_string())
            .unwrap_or_default();
        data.fail(Diagnostic::new(
            DiagnosticKind::InvalidMergeAnnotationTarget,
            target.loc,
            format!(
                "{} can only be used on interfaces, but `{}` is {}",
                annotation, target.target_type, what
            ),
        ));
        data
    }

    fn name(&self) -> String {
        "target_validation".to_string()
    }
}
