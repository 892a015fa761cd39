//! Call graph over the functions awaiting inference.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::check::collect::Facts;
use crate::hir::DeclId;

/// Directed caller → callee edges, restricted to a node set.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    nodes: Vec<DeclId>,
    callees: FxHashMap<DeclId, Vec<DeclId>>,
    callers: FxHashMap<DeclId, Vec<DeclId>>,
}

impl CallGraph {
    /// Edges from the call sites of `nodes` to other members of `nodes`.
    pub fn build(nodes: &[DeclId], facts: &Facts) -> Self {
        let members: FxHashSet<DeclId> = nodes.iter().copied().collect();
        let mut graph = CallGraph {
            nodes: nodes.to_vec(),
            ..CallGraph::default()
        };
        for &caller in nodes {
            let Some(body) = facts.bodies.get(&caller) else {
                continue;
            };
            for call in &body.calls {
                if members.contains(&call.callee) {
                    graph.add_edge(caller, call.callee);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, caller: DeclId, callee: DeclId) {
        let callees = self.callees.entry(caller).or_default();
        if !callees.contains(&callee) {
            callees.push(callee);
            self.callers.entry(callee).or_default().push(caller);
        }
    }

    pub fn callees(&self, function: DeclId) -> &[DeclId] {
        self.callees.get(&function).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn callers(&self, function: DeclId) -> &[DeclId] {
        self.callers.get(&function).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strongly connected components, callees before callers.
    ///
    /// Tarjan's algorithm with an explicit stack so deep call chains cannot
    /// overflow the native one.
    pub fn sccs(&self) -> Vec<Vec<DeclId>> {
        let mut discovered: FxHashMap<DeclId, usize> = FxHashMap::default();
        let mut lowlink: FxHashMap<DeclId, usize> = FxHashMap::default();
        let mut on_stack: FxHashSet<DeclId> = FxHashSet::default();
        let mut stack: Vec<DeclId> = Vec::new();
        let mut components = Vec::new();
        let mut next = 0;

        for &root in &self.nodes {
            if discovered.contains_key(&root) {
                continue;
            }
            // (node, index of the next callee to visit)
            let mut frames: Vec<(DeclId, usize)> = vec![(root, 0)];
            discovered.insert(root, next);
            lowlink.insert(root, next);
            next += 1;
            stack.push(root);
            on_stack.insert(root);

            while let Some(&(node, edge)) = frames.last() {
                let callees = self.callees(node);
                if let Some(&callee) = callees.get(edge) {
                    if let Some(frame) = frames.last_mut() {
                        frame.1 += 1;
                    }
                    match discovered.get(&callee) {
                        None => {
                            discovered.insert(callee, next);
                            lowlink.insert(callee, next);
                            next += 1;
                            stack.push(callee);
                            on_stack.insert(callee);
                            frames.push((callee, 0));
                        }
                        Some(&index) if on_stack.contains(&callee) => {
                            let low = lowlink.entry(node).or_insert(index);
                            *low = (*low).min(index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                frames.pop();
                let node_low = lowlink.get(&node).copied().unwrap_or(0);
                if let Some(&(parent, _)) = frames.last() {
                    let low = lowlink.entry(parent).or_insert(node_low);
                    *low = (*low).min(node_low);
                }
                if discovered.get(&node) == Some(&node_low) {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack.remove(&member);
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    component.reverse();
                    components.push(component);
                }
            }
        }
        components
    }
}
