//! In-memory transaction graph.
//!
//! Transactions live in an arena indexed by [`NodeHandle`]; a hash map
//! resolves external ids to handles and each node keeps its parent and
//! child adjacency lists by handle. Arena order is insertion order.
//!
//! Nodes are only ever appended. The one removal path is the rollback
//! inside [`GraphIndex::admit`], which pops the node that the failing
//! admission just added.

use crate::error::{LedgerError, LedgerResult};
use crate::signature::SignaturePolicy;
use crate::transaction::Transaction;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// Stable arena index of an admitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(usize);

impl NodeHandle {
    /// Position in insertion order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Node {
    tx: Transaction,
    parents: Vec<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// The authoritative structural state of the ledger.
#[derive(Debug, Default)]
pub struct GraphIndex {
    nodes: Vec<Node>,
    handles: HashMap<String, NodeHandle>,
    edge_count: usize,
}

impl GraphIndex {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of distinct parent→child edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether a transaction with this id has been admitted.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.handles.contains_key(id)
    }

    /// Resolves an id to its handle.
    #[must_use]
    pub fn handle(&self, id: &str) -> Option<NodeHandle> {
        self.handles.get(id).copied()
    }

    /// Looks up a transaction by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.handle(id).map(|h| &self.nodes[h.0].tx)
    }

    /// All transactions in insertion order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.nodes.iter().map(|n| &n.tx)
    }

    /// Every edge as `(parent_id, child_id)`, grouped by child in
    /// insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.nodes.iter().flat_map(move |child| {
            child
                .parents
                .iter()
                .map(move |p| (self.id_of(*p), child.tx.id()))
        })
    }

    fn id_of(&self, handle: NodeHandle) -> &str {
        self.nodes[handle.0].tx.id()
    }

    fn ids(&self, handles: &[NodeHandle]) -> Vec<String> {
        handles.iter().map(|h| self.id_of(*h).to_string()).collect()
    }

    /// Validates `tx` against the graph invariants and admits it.
    ///
    /// Checks run in this order, and the first failure wins:
    /// 1. every parent id is already admitted (`MissingParent`)
    /// 2. the id is new (`DuplicateTransaction`)
    /// 3. the payload is storable (`InvalidPayload`)
    /// 4. the node and its edges are inserted tentatively
    /// 5. no cycle runs through the new node (`CycleDetected`)
    /// 6. the signature satisfies `policy` (`InvalidSignature`)
    ///
    /// Any failure after step 4 rolls the tentative node back, so on
    /// error the graph is exactly as it was before the call.
    ///
    /// A transaction naming itself as a parent fails step 1, since its
    /// own id is not yet admitted.
    pub fn admit(
        &mut self,
        tx: Transaction,
        policy: &dyn SignaturePolicy,
    ) -> LedgerResult<NodeHandle> {
        if let Some(missing) = tx.parent_ids().iter().find(|pid| !self.contains(pid)) {
            return Err(LedgerError::missing_parent(tx.id(), missing.as_str()));
        }
        if self.contains(tx.id()) {
            return Err(LedgerError::duplicate(tx.id()));
        }
        if let Err(reason) = tx.check_payload() {
            return Err(LedgerError::invalid_payload(tx.id(), reason));
        }

        let handle = self.insert_tentative(tx);

        if self.closes_cycle(handle) {
            let err = LedgerError::cycle(self.id_of(handle));
            self.rollback_tentative();
            return Err(err);
        }

        if !policy.accepts(&self.nodes[handle.0].tx) {
            let err = LedgerError::invalid_signature(self.id_of(handle));
            self.rollback_tentative();
            return Err(err);
        }

        debug!(
            id = %self.id_of(handle),
            parents = self.nodes[handle.0].parents.len(),
            "transaction admitted to graph"
        );
        Ok(handle)
    }

    /// Appends `tx` as a node and links it to whichever of its parents
    /// resolve, including itself. Duplicate parent ids yield one edge.
    fn insert_tentative(&mut self, tx: Transaction) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len());
        self.handles.insert(tx.id().to_string(), handle);

        let mut parents: Vec<NodeHandle> = Vec::with_capacity(tx.parent_ids().len());
        for pid in tx.parent_ids() {
            if let Some(p) = self.handle(pid) {
                if !parents.contains(&p) {
                    parents.push(p);
                }
            }
        }

        self.nodes.push(Node {
            tx,
            parents: parents.clone(),
            children: Vec::new(),
        });
        for p in &parents {
            self.nodes[p.0].children.push(handle);
        }
        self.edge_count += parents.len();
        handle
    }

    /// Removes the most recently inserted node and its edges.
    ///
    /// Only valid for the node added by the admission in progress: no
    /// later node can reference it yet.
    fn rollback_tentative(&mut self) -> Option<Transaction> {
        let node = self.nodes.pop()?;
        let handle = NodeHandle(self.nodes.len());

        for p in &node.parents {
            if *p != handle {
                let children = &mut self.nodes[p.0].children;
                if let Some(pos) = children.iter().rposition(|c| *c == handle) {
                    children.remove(pos);
                }
            }
        }
        self.edge_count -= node.parents.len();
        self.handles.remove(node.tx.id());
        Some(node.tx)
    }

    /// Whether any parent of `handle` is reachable from `handle` itself,
    /// which is exactly the condition for a cycle through the new edges.
    fn closes_cycle(&self, handle: NodeHandle) -> bool {
        self.nodes[handle.0]
            .parents
            .iter()
            .any(|p| self.reaches(handle, *p))
    }

    /// Depth-first search along child edges.
    fn reaches(&self, from: NodeHandle, to: NodeHandle) -> bool {
        if from == to {
            return true;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        visited[from.0] = true;

        while let Some(current) = stack.pop() {
            for child in &self.nodes[current.0].children {
                if *child == to {
                    return true;
                }
                if !visited[child.0] {
                    visited[child.0] = true;
                    stack.push(*child);
                }
            }
        }
        false
    }

    /// Direct parents of `id`, deduplicated, in `parent_ids` order.
    #[must_use]
    pub fn parents(&self, id: &str) -> Vec<String> {
        self.handle(id)
            .map(|h| self.ids(&self.nodes[h.0].parents))
            .unwrap_or_default()
    }

    /// Direct children of `id`, in the order they were admitted.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<String> {
        self.handle(id)
            .map(|h| self.ids(&self.nodes[h.0].children))
            .unwrap_or_default()
    }

    /// Transitive closure of parents. Excludes `id` itself.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> BTreeSet<String> {
        self.closure(id, |node| &node.parents)
    }

    /// Transitive closure of children. Excludes `id` itself.
    #[must_use]
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        self.closure(id, |node| &node.children)
    }

    fn closure<F>(&self, id: &str, next: F) -> BTreeSet<String>
    where
        F: Fn(&Node) -> &Vec<NodeHandle>,
    {
        let Some(start) = self.handle(id) else {
            return BTreeSet::new();
        };

        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        let mut found = BTreeSet::new();

        while let Some(current) = stack.pop() {
            for n in next(&self.nodes[current.0]) {
                if !visited[n.0] {
                    visited[n.0] = true;
                    found.insert(self.id_of(*n).to_string());
                    stack.push(*n);
                }
            }
        }
        found
    }

    /// Kahn's algorithm over the whole graph.
    ///
    /// Ready nodes are taken in insertion order, so the result is
    /// deterministic for a given admission history. Returns `None` if a
    /// cycle prevents a complete order.
    fn kahn_order(&self) -> Option<Vec<NodeHandle>> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut ready: VecDeque<NodeHandle> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| NodeHandle(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop_front() {
            order.push(current);
            for child in &self.nodes[current.0].children {
                in_degree[child.0] -= 1;
                if in_degree[child.0] == 0 {
                    ready.push_back(*child);
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Every id exactly once, parents before children.
    ///
    /// The graph is acyclic by construction; if that were ever violated
    /// the nodes caught in a cycle would be left out.
    #[must_use]
    pub fn topological_order(&self) -> Vec<String> {
        match self.kahn_order() {
            Some(order) => self.ids(&order),
            None => Vec::new(),
        }
    }

    /// Full acyclicity check over the whole graph.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.kahn_order().is_some()
    }

    /// Ids with no parents, in insertion order.
    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.parents.is_empty())
            .map(|n| n.tx.id().to_string())
            .collect()
    }

    /// Ids with no children (the frontier), in insertion order.
    #[must_use]
    pub fn tips(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.children.is_empty())
            .map(|n| n.tx.id().to_string())
            .collect()
    }

    /// Re-checks every structural invariant and the signature policy.
    ///
    /// Returns one human-readable line per problem; empty means healthy.
    #[must_use]
    pub fn check_invariants(&self, policy: &dyn SignaturePolicy) -> Vec<String> {
        let mut problems = Vec::new();

        if self.handles.len() != self.nodes.len() {
            problems.push(format!(
                "{} ids map to {} nodes",
                self.handles.len(),
                self.nodes.len()
            ));
        }

        let mut edges = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            let id = node.tx.id();
            if self.handle(id) != Some(NodeHandle(i)) {
                problems.push(format!("{id}: id does not resolve to its own node"));
            }
            for pid in node.tx.parent_ids() {
                if !self.contains(pid) {
                    problems.push(format!("{id}: parent {pid} is missing"));
                }
            }
            for p in &node.parents {
                if p.0 >= i {
                    problems.push(format!("{id}: parent {} admitted after child", self.id_of(*p)));
                }
                if !self.nodes[p.0].children.contains(&NodeHandle(i)) {
                    problems.push(format!("{id}: edge from {} not mirrored", self.id_of(*p)));
                }
            }
            if !policy.accepts(&node.tx) {
                problems.push(format!("{id}: signature rejected by {}", policy.describe()));
            }
            edges += node.parents.len();
        }

        if edges != self.edge_count {
            problems.push(format!(
                "edge count {} does not match adjacency ({edges})",
                self.edge_count
            ));
        }
        if !self.is_acyclic() {
            problems.push("graph contains a cycle".to_string());
        }
        problems
    }
}
