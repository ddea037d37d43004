//! Commit ordering: topological sort over reference edges.

use crate::document::DocumentRef;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Directed graph of reference edges among the documents of one commit.
///
/// An edge `before -> after` records that `before` must be dispatched before
/// `after`. Nodes keep their insertion order, and the sort is stable with
/// respect to it: among nodes whose dependencies are satisfied, the earliest
/// registered one dispatches first, so commits are deterministic.
pub(crate) struct DependencyGraph {
    nodes: Vec<DocumentRef>,
    index: HashMap<DocumentRef, usize>,
    // successors[i] holds the nodes that must dispatch after node i
    successors: Vec<SmallVec<[usize; 4]>>,
    in_degree: Vec<usize>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        DependencyGraph {
            nodes: Vec::new(),
            index: HashMap::new(),
            successors: Vec::new(),
            in_degree: Vec::new(),
        }
    }

    /// Adds a node, keeping insertion order. Idempotent.
    pub(crate) fn add_node(&mut self, doc_ref: DocumentRef) -> usize {
        if let Some(&i) = self.index.get(&doc_ref) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(doc_ref.clone(), i);
        self.nodes.push(doc_ref);
        self.successors.push(SmallVec::new());
        self.in_degree.push(0);
        i
    }

    /// Returns `true` if the ref is a node of this graph.
    pub(crate) fn contains(&self, doc_ref: &DocumentRef) -> bool {
        self.index.contains_key(doc_ref)
    }

    /// Records that `before` must be dispatched before `after`.
    ///
    /// Both refs must already be nodes. Parallel edges are collapsed.
    pub(crate) fn add_edge(&mut self, before: &DocumentRef, after: &DocumentRef) {
        let (Some(&b), Some(&a)) = (self.index.get(before), self.index.get(after)) else {
            return;
        };
        if self.successors[b].contains(&a) {
            return;
        }
        self.successors[b].push(a);
        self.in_degree[a] += 1;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Orders the nodes so every edge points forward (Kahn's algorithm).
    ///
    /// # Errors
    /// Returns the refs participating in (or downstream of) a cycle when no
    /// valid order exists.
    pub(crate) fn topo_sort(&self) -> Result<Vec<DocumentRef>, Vec<DocumentRef>> {
        let (sorted, remaining) = self.kahn();
        if remaining.is_empty() {
            Ok(sorted)
        } else {
            Err(remaining)
        }
    }

    /// Orders the nodes like [Self::topo_sort], but tolerates cycles by
    /// appending the cyclic remainder in insertion order. Used for delete
    /// ordering, where cycles among already-persisted documents are legal.
    pub(crate) fn topo_sort_tolerant(&self) -> Vec<DocumentRef> {
        let (mut sorted, remaining) = self.kahn();
        if !remaining.is_empty() {
            log::debug!(
                "Reference cycle among {} documents; falling back to registration order",
                remaining.len()
            );
            sorted.extend(remaining);
        }
        sorted
    }

    fn kahn(&self) -> (Vec<DocumentRef>, Vec<DocumentRef>) {
        let n = self.nodes.len();
        let mut in_degree = self.in_degree.clone();
        let mut emitted = vec![false; n];
        let mut sorted = Vec::with_capacity(n);

        loop {
            // Lowest-index ready node first: stable w.r.t. insertion order.
            let next = (0..n).find(|&i| !emitted[i] && in_degree[i] == 0);
            let Some(i) = next else {
                break;
            };
            emitted[i] = true;
            sorted.push(self.nodes[i].clone());
            for &succ in &self.successors[i] {
                in_degree[succ] -= 1;
            }
        }

        let remaining = (0..n)
            .filter(|&i| !emitted[i])
            .map(|i| self.nodes[i].clone())
            .collect();
        (sorted, remaining)
    }
}
