// Copyright (c) The Diem Core Contributors
// Copyright (c) The Move Contributors
// SPDX-License-Identifier: Apache-2.0

use log::warn;
use merge_model::model::DeclarationEnv;

use crate::{
    exclusion_filter::ExclusionFilterProcessor,
    hierarchy_analysis::HierarchyAnalysisProcessor,
    merge_finalization::MergeFinalizationProcessor,
    merge_target_pipeline::{
        MergeReport, MergeTargetPipeline, MergeTargetProcessor, MergeTargetsHolder,
    },
    options::MergeOptions,
    predefined_guard::PredefinedSupertypeGuardProcessor,
    replacement_analysis::ReplacementAnalysisProcessor,
    scope_resolution::ScopeResolutionProcessor,
    target_filter::TargetFilterOptions,
    target_validation::TargetValidationProcessor,
};

pub fn default_pipeline() -> MergeTargetPipeline {
    // NOTE: the order of these processors is important!
    let processors: Vec<Box<dyn MergeTargetProcessor>> = vec![
        TargetValidationProcessor::new(),
        ScopeResolutionProcessor::new(),
        ReplacementAnalysisProcessor::new(),
        ExclusionFilterProcessor::new(),
        // the guard overrides both replacement and exclusion
        PredefinedSupertypeGuardProcessor::new(),
        MergeFinalizationProcessor::new(),
        // whole-pass check over all resolved targets
        HierarchyAnalysisProcessor::new(),
    ];

    let mut res = MergeTargetPipeline::default();
    for p in processors {
        res.add_processor(p);
    }
    res
}

/// Creates the holder for `env`, or returns the scan diagnostics as a failed report if the
/// sources are not valid input.
pub fn prepare_targets(
    env: &DeclarationEnv,
    options: MergeOptions,
    filter: &TargetFilterOptions,
) -> Result<MergeTargetsHolder, MergeReport> {
    if env.has_errors() {
        warn!("sources have errors, skipping merge resolution");
        return Err(MergeReport {
            resolved: vec![],
            diagnostics: env.scan_diagnostics().to_vec(),
        });
    }
    Ok(MergeTargetsHolder::new(env, options, filter))
}

/// Resolves every merge target of `env` with the default pipeline.
pub fn resolve_merges(
    env: &DeclarationEnv,
    options: MergeOptions,
    filter: &TargetFilterOptions,
) -> MergeReport {
    match prepare_targets(env, options, filter) {
        Ok(mut holder) => {
            default_pipeline().run(env, &mut holder);
            holder.into_report(env)
        }
        Err(report) => report,
    }
}
