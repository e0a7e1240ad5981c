use itertools::Itertools;
use merge_model::model::{DeclarationEnv, MergeTargetRecord};

use crate::merge_target_pipeline::{
    MergeState, MergeTargetData, MergeTargetProcessor, MergeTargetsHolder,
};

/// Turns the remaining candidates into the added supertypes, in contribution discovery order
/// and without duplicates. A target with diagnostics fails.
pub struct MergeFinalizationProcessor();

impl MergeFinalizationProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

impl MergeTargetProcessor for MergeFinalizationProcessor {
    fn process(
        &self,
        _holder: &MergeTargetsHolder,
        env: &DeclarationEnv,
        _target: &MergeTargetRecord,
        mut data: MergeTargetData,
    ) -> MergeTargetData {
        if !data.diagnostics.is_empty() {
            data.added_supertypes.clear();
            data.state = MergeState::Failed;
            return data;
        }
        data.added_supertypes = data
            .candidates
            .iter()
            .sorted()
            .map(|id| env.get_contribution(*id).contributed_type.clone())
            .unique()
            .collect();
        data.advance(MergeState::Resolved);
        data
    }

    fn name(&self) -> String {
        "finalization".to_string()
    }
}
