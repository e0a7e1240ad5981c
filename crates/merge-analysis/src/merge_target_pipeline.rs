// Copyright (c) The Diem Core Contributors
// Copyright (c) The Move Contributors
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fmt::{Formatter, Write as _},
    fs,
};

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use merge_model::{
    diagnostics::Diagnostic,
    model::{ContributionId, DeclarationEnv, MergeTargetId, MergeTargetRecord, ScopeKey, TypeRef},
};

use crate::{
    options::MergeOptions, replacement_analysis::ScopeReplacements, scope_grouping::ScopeGroups,
    target_filter::TargetFilterOptions,
};

/// The resolution state of one merge target. Every target starts `Indexed` and ends either
/// `Resolved` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeState {
    Indexed,
    ScopeResolved,
    ReplacementApplied,
    ExclusionApplied,
    GuardApplied,
    Resolved,
    Failed,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The supertypes added to one merge target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMerge {
    pub target_type: TypeRef,
    /// Added supertypes in contribution discovery order.
    pub added_supertypes: Vec<TypeRef>,
}

impl ResolvedMerge {
    /// The supertype list of the target after splicing: `existing` followed by every added
    /// supertype not already in it.
    pub fn spliced_supertypes(&self, existing: &[TypeRef]) -> Vec<TypeRef> {
        let mut supertypes = existing.to_vec();
        for ty in &self.added_supertypes {
            if !supertypes.contains(ty) {
                supertypes.push(ty.clone());
            }
        }
        supertypes
    }
}

/// The outcome of a whole resolution pass.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Resolved targets in discovery order.
    pub resolved: Vec<ResolvedMerge>,
    /// Diagnostics in report order, without duplicates.
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeReport {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn find(&self, target_type: &str) -> Option<&ResolvedMerge> {
        self.resolved
            .iter()
            .find(|r| r.target_type.as_str() == target_type)
    }
}

/// Per-target data flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct MergeTargetData {
    pub id: MergeTargetId,
    pub state: MergeState,
    /// Contributions that currently would be added, sorted by id.
    pub candidates: Vec<ContributionId>,
    /// Contributions dropped by replacement or exclusion.
    pub removed: Vec<ContributionId>,
    pub added_supertypes: Vec<TypeRef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeTargetData {
    pub fn new(id: MergeTargetId) -> Self {
        Self {
            id,
            state: MergeState::Indexed,
            candidates: vec![],
            removed: vec![],
            added_supertypes: vec![],
            diagnostics: vec![],
        }
    }

    /// Whether no further processing applies to this target.
    pub fn is_halted(&self) -> bool {
        self.state == MergeState::Failed
    }

    /// Records a diagnostic; the target keeps moving through the pipeline.
    pub fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    /// Records a diagnostic and stops processing of this target.
    pub fn fail(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
        self.added_supertypes.clear();
        self.state = MergeState::Failed;
    }

    pub fn advance(&mut self, state: MergeState) {
        if !self.is_halted() {
            self.state = state;
        }
    }

    /// Moves candidates matching `pred` to the removed list.
    pub fn remove_candidates<P>(&mut self, mut pred: P) -> Vec<ContributionId>
    where
        P: FnMut(ContributionId) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.candidates.iter().copied().partition(|id| pred(*id));
        self.candidates = kept;
        self.removed.extend(removed.iter().copied());
        self.removed.sort();
        removed
    }

    pub fn result(&self, env: &DeclarationEnv) -> Result<ResolvedMerge, Vec<Diagnostic>> {
        match self.state {
            MergeState::Resolved => Ok(ResolvedMerge {
                target_type: env.get_merge_target(self.id).target_type.clone(),
                added_supertypes: self.added_supertypes.clone(),
            }),
            _ => Err(self.diagnostics.clone()),
        }
    }
}

/// Holds the data of all merge targets of one pass together with the shared read-only indices
/// the processors consult.
#[derive(Debug, Clone)]
pub struct MergeTargetsHolder {
    options: MergeOptions,
    scope_groups: ScopeGroups,
    scope_replacements: BTreeMap<ScopeKey, ScopeReplacements>,
    targets: BTreeMap<MergeTargetId, MergeTargetData>,
}

impl MergeTargetsHolder {
    pub fn new(env: &DeclarationEnv, options: MergeOptions, filter: &TargetFilterOptions) -> Self {
        let mut targets = BTreeMap::new();
        for target in env.get_merge_targets() {
            if !filter.is_targeted(target) {
                debug!("`{}` is filtered out", target.target_type);
                continue;
            }
            if !options.is_namespace_allowed(&target.package) {
                debug!(
                    "skipping `{}`: package `{}` is outside the allowed namespaces",
                    target.target_type, target.package
                );
                continue;
            }
            targets.insert(target.id, MergeTargetData::new(target.id));
        }
        Self {
            options,
            scope_groups: ScopeGroups::new(env),
            scope_replacements: BTreeMap::new(),
            targets,
        }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    pub fn scope_groups(&self) -> &ScopeGroups {
        &self.scope_groups
    }

    pub fn scope_replacements(&self, scope: &ScopeKey) -> Option<&ScopeReplacements> {
        self.scope_replacements.get(scope)
    }

    pub fn set_scope_replacements(&mut self, scope: ScopeKey, replacements: ScopeReplacements) {
        self.scope_replacements.insert(scope, replacements);
    }

    /// The distinct scopes declared by the targets of this holder.
    pub fn referenced_scopes<'env>(&self, env: &'env DeclarationEnv) -> BTreeSet<&'env ScopeKey> {
        self.targets
            .keys()
            .flat_map(|id| env.get_merge_target(*id).scopes())
            .collect()
    }

    pub fn get_targets(&self) -> impl Iterator<Item = &MergeTargetData> {
        self.targets.values()
    }

    pub fn get_targets_mut(&mut self) -> impl Iterator<Item = &mut MergeTargetData> {
        self.targets.values_mut()
    }

    pub fn get_target(&self, id: MergeTargetId) -> Option<&MergeTargetData> {
        self.targets.get(&id)
    }

    /// Runs `processor` on every target. While a target is processed its data is owned by the
    /// processor; the holder itself is only read, which lets targets run in parallel.
    pub fn process(&mut self, env: &DeclarationEnv, processor: &dyn MergeTargetProcessor) {
        let targets = std::mem::take(&mut self.targets);
        let holder = &*self;
        let step = |(id, data): (MergeTargetId, MergeTargetData)| {
            if data.is_halted() {
                return (id, data);
            }
            let target = env.get_merge_target(id);
            (id, processor.process(holder, env, target, data))
        };
        let processed: Vec<_> = if holder.options.parallel {
            targets.into_par_iter().map(step).collect()
        } else {
            targets.into_iter().map(step).collect()
        };
        self.targets = processed.into_iter().collect();
    }

    /// Folds the per-target results into one report.
    pub fn into_report(self, env: &DeclarationEnv) -> MergeReport {
        let mut report = MergeReport::default();
        for data in self.targets.values() {
            match data.result(env) {
                Ok(resolved) => report.resolved.push(resolved),
                Err(diags) => report.diagnostics.extend(diags),
            }
        }
        report.diagnostics = report.diagnostics.into_iter().unique().collect();
        info!(
            "resolved {} merge targets with {} diagnostics",
            report.resolved.len(),
            report.diagnostics.len()
        );
        report
    }

    /// A textual rendering of every target's state, for debugging.
    pub fn dump(&self, env: &DeclarationEnv) -> String {
        let names = |ids: &[ContributionId]| {
            ids.iter()
                .map(|id| env.get_contribution(*id).contributed_type.to_string())
                .join(", ")
        };
        let mut out = String::new();
        for data in self.targets.values() {
            let target = env.get_merge_target(data.id);
            let _ = writeln!(out, "{} `{}` [{}]", data.id, target.target_type, data.state);
            let _ = writeln!(out, "  candidates: {}", names(&data.candidates));
            if !data.removed.is_empty() {
                let _ = writeln!(out, "  removed: {}", names(&data.removed));
            }
            if !data.added_supertypes.is_empty() {
                let _ = writeln!(out, "  added: {}", data.added_supertypes.iter().join(", "));
            }
            for diag in &data.diagnostics {
                let _ = writeln!(out, "  {}: {}", diag.kind, diag.message);
            }
        }
        out
    }
}

pub trait MergeTargetProcessor: Send + Sync {
    /// Processes one merge target. The data is taken out of the holder for the duration of the
    /// call and put back afterwards. Targets that already failed are not passed in.
    fn process(
        &self,
        _holder: &MergeTargetsHolder,
        _env: &DeclarationEnv,
        _target: &MergeTargetRecord,
        data: MergeTargetData,
    ) -> MergeTargetData {
        data
    }

    /// Returns a name for this processor. This should be suitable as a file suffix.
    fn name(&self) -> String;

    /// A function which is called once before any `process` call is issued.
    fn initialize(&self, _env: &DeclarationEnv, _holder: &mut MergeTargetsHolder) {}

    /// A function which is called once after the last `process` call.
    fn finalize(&self, _env: &DeclarationEnv, _holder: &mut MergeTargetsHolder) {}

    /// Whether this processor analyzes all targets at once in `run` instead of being called
    /// per target.
    fn is_single_run(&self) -> bool {
        false
    }

    /// To be implemented if `is_single_run()` is true.
    fn run(&self, _env: &DeclarationEnv, _holder: &mut MergeTargetsHolder) {}

    /// A function which creates a dump of the processors results, for debugging.
    fn dump_result(
        &self,
        _f: &mut Formatter<'_>,
        _env: &DeclarationEnv,
        _holder: &MergeTargetsHolder,
    ) -> fmt::Result {
        Ok(())
    }
}

pub struct ProcessorResultDisplay<'a> {
    pub env: &'a DeclarationEnv,
    pub holder: &'a MergeTargetsHolder,
    pub processor: &'a dyn MergeTargetProcessor,
}

impl fmt::Display for ProcessorResultDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.processor.dump_result(f, self.env, self.holder)
    }
}

/// A processing pipeline for merge targets.
#[derive(Default)]
pub struct MergeTargetPipeline {
    processors: Vec<Box<dyn MergeTargetProcessor>>,
}

impl MergeTargetPipeline {
    /// Adds a processor to this pipeline. Processor will be called in the order they have been
    /// added.
    pub fn add_processor(&mut self, processor: Box<dyn MergeTargetProcessor>) {
        self.processors.push(processor)
    }

    pub fn processor_names(&self) -> Vec<String> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Runs the pipeline on all targets in the holder. Processors run breadth-first; i.e. a
    /// processor can expect that processors preceding it in the pipeline have been executed for
    /// all targets before it is called.
    pub fn run_with_hook<H1, H2>(
        &self,
        env: &DeclarationEnv,
        holder: &mut MergeTargetsHolder,
        hook_before_pipeline: H1,
        hook_after_each_processor: H2,
    ) where
        H1: Fn(&MergeTargetsHolder),
        H2: Fn(usize, &dyn MergeTargetProcessor, &MergeTargetsHolder),
    {
        hook_before_pipeline(holder);
        for (step_count, processor) in self.processors.iter().enumerate() {
            debug!("running `{}`", processor.name());
            if processor.is_single_run() {
                processor.run(env, holder);
            } else {
                processor.initialize(env, holder);
                holder.process(env, processor.as_ref());
                processor.finalize(env, holder);
            }
            hook_after_each_processor(step_count + 1, processor.as_ref(), holder);
        }
    }

    /// Run the pipeline on all targets in the holder, with no hooks in effect
    pub fn run(&self, env: &DeclarationEnv, holder: &mut MergeTargetsHolder) {
        self.run_with_hook(env, holder, |_| {}, |_, _, _| {})
    }

    /// Runs the pipeline and dumps the state of all targets before the pipeline as well as
    /// after each processor to `<dump_base_name>_<step>_<processor>.merge`.
    pub fn run_with_dump(
        &self,
        env: &DeclarationEnv,
        holder: &mut MergeTargetsHolder,
        dump_base_name: &str,
    ) -> anyhow::Result<()> {
        let dumps = RefCell::new(vec![]);
        self.run_with_hook(
            env,
            holder,
            |holder| {
                dumps.borrow_mut().push((
                    Self::dump_file_name(dump_base_name, 0, "indexed"),
                    holder.dump(env),
                ))
            },
            |step_count, processor, holder| {
                dumps.borrow_mut().push((
                    Self::dump_file_name(dump_base_name, step_count, &processor.name()),
                    Self::get_per_processor_dump(env, holder, processor),
                ))
            },
        );
        for (file_name, content) in dumps.into_inner() {
            debug!("dumping pipeline state to `{}`", file_name);
            fs::write(&file_name, format!("{}\n", content.trim()))
                .with_context(|| format!("writing `{}`", file_name))?;
        }
        Ok(())
    }

    fn dump_file_name(base_name: &str, step_count: usize, suffix: &str) -> String {
        format!("{}_{}_{}.merge", base_name, step_count, suffix)
    }

    fn get_per_processor_dump(
        env: &DeclarationEnv,
        holder: &MergeTargetsHolder,
        processor: &dyn MergeTargetProcessor,
    ) -> String {
        let mut dump = format!(
            "{}",
            ProcessorResultDisplay {
                env,
                holder,
                processor,
            }
        );
        if !dump.is_empty() {
            dump.push_str("\n\n");
        }
        dump.push_str(&format!("after processor `{}`\n", processor.name()));
        dump.push_str(&holder.dump(env));
        dump
    }
}
