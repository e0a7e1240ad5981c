use std::collections::BTreeMap;

use log::debug;
use merge_model::{
    diagnostics::{Diagnostic, DiagnosticKind},
    model::{DeclarationEnv, TypeRef},
};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::merge_target_pipeline::{MergeState, MergeTargetProcessor, MergeTargetsHolder};

/// Checks that splicing the resolved supertypes keeps the type hierarchy acyclic. The graph
/// holds every declared supertype edge plus the edges added by resolved targets; a target whose
/// added edge closes a cycle fails.
pub struct HierarchyAnalysisProcessor();

impl HierarchyAnalysisProcessor {
    pub fn new() -> Box<Self> {
        Box::new(Self())
    }
}

#[derive(Default)]
struct HierarchyGraph {
    graph: DiGraph<TypeRef, ()>,
    nodes: BTreeMap<TypeRef, NodeIndex>,
}

impl HierarchyGraph {
    fn node(&mut self, ty: &TypeRef) -> NodeIndex {
        if let Some(idx) = self.nodes.get(ty) {
            return *idx;
        }
        let idx = self.graph.add_node(ty.clone());
        self.nodes.insert(ty.clone(), idx);
        idx
    }

    fn add_edge(&mut self, sub: &TypeRef, sup: &TypeRef) {
        let src = self.node(sub);
        let dst = self.node(sup);
        self.graph.add_edge(src, dst, ());
    }
}

impl MergeTargetProcessor for HierarchyAnalysisProcessor {
    fn name(&self) -> String {
        "hierarchy_analysis".to_string()
    }

    fn is_single_run(&self) -> bool {
        true
    }

    fn run(&self, env: &DeclarationEnv, holder: &mut MergeTargetsHolder) {
        let mut hierarchy = HierarchyGraph::default();
        for decl in env.get_declarations() {
            for sup in &decl.supertypes {
                hierarchy.add_edge(&decl.type_ref, sup);
            }
        }
        for data in holder.get_targets() {
            if data.state != MergeState::Resolved {
                continue;
            }
            let target = env.get_merge_target(data.id);
            for added in &data.added_supertypes {
                hierarchy.add_edge(&target.target_type, added);
            }
        }

        // Map each node to its strongly connected component; a component with more than one
        // member is a cycle.
        let mut component = BTreeMap::new();
        let mut component_size = vec![];
        for (idx, scc) in petgraph::algo::kosaraju_scc(&hierarchy.graph)
            .into_iter()
            .enumerate()
        {
            component_size.push(scc.len());
            for node in scc {
                component.insert(node, idx);
            }
        }
        let on_cycle = |sub: &TypeRef, sup: &TypeRef| {
            if sub == sup {
                return true;
            }
            match (hierarchy.nodes.get(sub), hierarchy.nodes.get(sup)) {
                (Some(a), Some(b)) => match (component.get(a), component.get(b)) {
                    (Some(ca), Some(cb)) => ca == cb && component_size[*ca] > 1,
                    _ => false,
                },
                _ => false,
            }
        };

        for data in holder.get_targets_mut() {
            if data.state != MergeState::Resolved {
                continue;
            }
            let target = env.get_merge_target(data.id);
            let cyclic = data
                .added_supertypes
                .iter()
                .find(|added| on_cycle(&target.target_type, added))
                .cloned();
            if let Some(added) = cyclic {
                debug!("`{}` would inherit from itself", target.target_type);
                data.fail(Diagnostic::new(
                    DiagnosticKind::CyclicMerge,
                    target.loc,
                    format!(
                        "merging `{}` into `{}` makes `{}` its own supertype",
                        added, target.target_type, target.target_type
                    ),
                ));
            }
        }
    }
}
