// Copyright (c) The Diem Core Contributors
// Copyright (c) The Move Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resolution of contributed supertypes onto merge targets, as a pipeline of processors over
//! the immutable declaration environment.

pub mod exclusion_filter;
pub mod hierarchy_analysis;
pub mod merge_finalization;
pub mod merge_target_pipeline;
pub mod options;
pub mod pipeline_factory;
pub mod predefined_guard;
pub mod replacement_analysis;
pub mod reporter;
pub mod scope_grouping;
pub mod scope_resolution;
pub mod target_filter;
pub mod target_validation;

pub use merge_target_pipeline::{MergeReport, MergeState, ResolvedMerge};
pub use pipeline_factory::resolve_merges;
