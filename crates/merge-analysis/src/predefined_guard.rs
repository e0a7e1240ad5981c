use log::debug;
use merge_model::model::{DeclarationEnv, MergeTargetRecord};

use crate::merge_target_pipeline::{
    MergeState, MergeTargetData, MergeTargetProcessor, MergeTargetsHolder,
};

/// Re-admits removed contributions the target already declares as supertypes. Neither
/// replacement nor exclusion may undo a supertype written on the target itself.
pub struct PredefinedSupertypeGuardProcessor();

impl PredefinedSupertypeGuardProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

impl MergeTargetProcessor for PredefinedSupertypeGuardProcessor {
    fn process(
        &self,
        _holder: &MergeTargetsHolder,
        env: &DeclarationEnv,
        target: &MergeTargetRecord,
        mut data: MergeTargetData,
    ) -> MergeTargetData {
        let (readmitted, removed): (Vec<_>, Vec<_>) = data
            .removed
            .iter()
            .copied()
            .partition(|id| target.is_predefined(&env.get_contribution(*id).contributed_type));
        for id in &readmitted {
            debug!(
                "`{}` keeps predefined supertype `{}`",
                target.target_type,
                env.get_contribution(*id).contributed_type
            );
        }
        data.removed = removed;
        data.candidates.extend(readmitted);
        data.candidates.sort();
        data.advance(MergeState::GuardApplied);
        data
    }

    fn name(&self) -> String {
        "predefined_guard".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exclusion_filter::ExclusionFilterProcessor, merge_target_pipeline::MergeTargetPipeline,
        options::MergeOptions, replacement_analysis::ReplacementAnalysisProcessor,
        scope_resolution::ScopeResolutionProcessor, target_filter::TargetFilterOptions,
    };
    use indoc::indoc;
    use merge_model::scan;

    #[test]
    fn predefined_supertypes_survive_replace_and_exclude() {
        let env = scan([(
            "Source.kt",
            indoc! {"
                @ContributesTo(Any::class) interface A
                @ContributesTo(Any::class, replaces = A::class) interface B
                @ContributesTo(Any::class) interface C

                @MergeComponent(scope = Any::class, exclude = [C::class])
                interface Target : A, C
            "},
        )]);
        let mut pipeline = MergeTargetPipeline::default();
        pipeline.add_processor(ScopeResolutionProcessor::new());
        pipeline.add_processor(ReplacementAnalysisProcessor::new());
        pipeline.add_processor(ExclusionFilterProcessor::new());
        pipeline.add_processor(PredefinedSupertypeGuardProcessor::new());
        let mut holder =
            MergeTargetsHolder::new(&env, MergeOptions::default(), &TargetFilterOptions::default());
        pipeline.run(&env, &mut holder);

        let data = holder.get_targets().next().unwrap();
        assert_eq!(data.state, MergeState::GuardApplied);
        assert!(data.removed.is_empty());
        let candidates: Vec<_> = data
            .candidates
            .iter()
            .map(|id| env.get_contribution(*id).contributed_type.as_str())
            .collect();
        assert_eq!(candidates, vec!["A", "B", "C"]);
    }
}
