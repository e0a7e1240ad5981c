use log::debug;
use merge_model::model::{DeclarationEnv, MergeTargetRecord};

use crate::merge_target_pipeline::{
    MergeState, MergeTargetData, MergeTargetProcessor, MergeTargetsHolder,
};

/// Drops the candidates a target excludes. Exclusion only affects the target declaring it.
pub struct ExclusionFilterProcessor();

impl ExclusionFilterProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

impl MergeTargetProcessor for ExclusionFilterProcessor {
    fn process(
        &self,
        _holder: &MergeTargetsHolder,
        env: &DeclarationEnv,
        target: &MergeTargetRecord,
        mut data: MergeTargetData,
    ) -> MergeTargetData {
        let excluded = data.remove_candidates(|id| {
            let contribution = env.get_contribution(id);
            target.excludes(&contribution.scope, &contribution.contributed_type)
        });
        if !excluded.is_empty() {
            debug!(
                "`{}` excludes {} contributions",
                target.target_type,
                excluded.len()
            );
        }
        data.advance(MergeState::ExclusionApplied);
        data
    }

    fn name(&self) -> String {
        "exclusion_filter".to_string()
    }
}
