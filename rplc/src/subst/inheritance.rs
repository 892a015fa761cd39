//! The inheritance DAG.
//!
//! Each edge records how a derived class binds the region parameters of a
//! direct base (its `base_arg` clause, or the scheme default). Walking the
//! DAG composes those bindings so that any ancestor's parameters can be
//! expressed in the vocabulary of the derived class.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use super::Substitution;
use crate::hir::DeclId;

/// `derived` inherits from `base`, binding the base's parameters with `subst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceEdge {
    pub derived: DeclId,
    pub base: DeclId,
    /// Maps the base's parameters into the derived class's vocabulary.
    pub subst: Substitution,
    pub is_virtual: bool,
}

/// All inheritance edges of a program.
#[derive(Debug, Clone, Default)]
pub struct InheritanceGraph {
    edges: FxHashMap<DeclId, Vec<InheritanceEdge>>,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: InheritanceEdge) {
        self.edges.entry(edge.derived).or_default().push(edge);
    }

    /// The direct bases of `class`, in declaration order.
    pub fn bases(&self, class: DeclId) -> &[InheritanceEdge] {
        self.edges.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every proper ancestor of `class`, nearest first, with the substitution
    /// that rewrites the ancestor's parameters into `class`'s vocabulary.
    ///
    /// When an ancestor is reachable along several paths (diamonds) the
    /// first path found wins.
    pub fn ancestors(&self, class: DeclId) -> Vec<(DeclId, Substitution)> {
        let mut found = Vec::new();
        let mut visited = FxHashSet::default();
        visited.insert(class);
        let mut worklist: VecDeque<(DeclId, Substitution)> = VecDeque::new();
        worklist.push_back((class, Substitution::new()));

        while let Some((current, to_class)) = worklist.pop_front() {
            for edge in self.bases(current) {
                if !visited.insert(edge.base) {
                    continue;
                }
                let composed = edge.subst.then(&to_class);
                found.push((edge.base, composed.clone()));
                worklist.push_back((edge.base, composed));
            }
        }
        found
    }

    pub fn is_ancestor(&self, ancestor: DeclId, class: DeclId) -> bool {
        self.ancestors(class).iter().any(|(id, _)| *id == ancestor)
    }

    /// How to rewrite `ancestor`'s parameters into `class`'s vocabulary.
    ///
    /// A class is its own ancestor with the empty substitution.
    pub fn path_substitution(&self, class: DeclId, ancestor: DeclId) -> Option<Substitution> {
        if class == ancestor {
            return Some(Substitution::new());
        }
        self.ancestors(class)
            .into_iter()
            .find(|(id, _)| *id == ancestor)
            .map(|(_, subst)| subst)
    }

    /// For each inheritance path out of `class`, the nearest ancestor
    /// satisfying `matches`. Paths stop at the first match.
    pub fn nearest_on_each_path(&self, class: DeclId, matches: impl Fn(DeclId) -> bool) -> Vec<DeclId> {
        let mut found = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack: Vec<DeclId> = self.bases(class).iter().rev().map(|e| e.base).collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if matches(current) {
                found.push(current);
                continue;
            }
            stack.extend(self.bases(current).iter().rev().map(|e| e.base));
        }
        found
    }

    /// Number of ancestors; bases always sort before their descendants.
    pub fn depth(&self, class: DeclId) -> usize {
        self.ancestors(class).len()
    }
}
