//! Dependency graph construction and ordered execution.
//!
//! The builder performs a depth-first inclusion walk from filter-matched
//! items: transitive dependencies are pulled in even when they do not match
//! the filter themselves, since their outcome gates their dependents. A
//! visiting stack turns cyclic `dependsOn` chains into a configuration error
//! instead of unbounded recursion.
//!
//! Execution state lives in a [`GraphState`] arena owned by the caller, one
//! per walk, so a graph can be shared across concurrent evaluations.

use std::collections::HashMap;

use tracing::debug;

use ruleguard_types::ResourceId;

use crate::error::ConfigError;

/// An item that can participate in a dependency graph.
pub trait DependencyTarget {
    fn id(&self) -> &ResourceId;
    fn dependencies(&self) -> &[ResourceId];
}

/// Items indexed by id, pending graph construction.
#[derive(Debug)]
pub struct DependencyTargetCollection<T> {
    items: Vec<T>,
    index: HashMap<ResourceId, usize>,
}

impl<T: DependencyTarget> DependencyTargetCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Result<(), ConfigError> {
        let id = item.id().clone();
        if self.index.contains_key(&id) {
            return Err(ConfigError::DuplicateResourceId { id });
        }
        self.index.insert(id, self.items.len());
        self.items.push(item);
        Ok(())
    }
}

impl<T: DependencyTarget> Default for DependencyTargetCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a [`DependencyGraph`] by selecting items and their transitive
/// dependencies in dependency-first order.
pub struct DependencyGraphBuilder<T> {
    collection: DependencyTargetCollection<T>,
    order: Vec<usize>,
    included: Vec<bool>,
    visiting: Vec<usize>,
}

impl<T: DependencyTarget> DependencyGraphBuilder<T> {
    pub fn new(collection: DependencyTargetCollection<T>) -> Self {
        let len = collection.items.len();
        Self {
            collection,
            order: Vec::new(),
            included: vec![false; len],
            visiting: Vec::new(),
        }
    }

    /// Include every item the filter accepts, plus transitive dependencies.
    pub fn include_matching(&mut self, filter: impl Fn(&T) -> bool) -> Result<(), ConfigError> {
        for at in 0..self.collection.items.len() {
            if filter(&self.collection.items[at]) {
                self.include_at(at)?;
            }
        }
        Ok(())
    }

    /// Include one item by id, plus transitive dependencies.
    pub fn include(&mut self, id: &ResourceId) -> Result<(), ConfigError> {
        let at = *self
            .collection
            .index
            .get(id)
            .ok_or_else(|| ConfigError::NotARule(id.clone()))?;
        self.include_at(at)
    }

    fn include_at(&mut self, at: usize) -> Result<(), ConfigError> {
        if self.included[at] {
            return Ok(());
        }
        if self.visiting.contains(&at) {
            let from = self.visiting[self.visiting.len() - 1];
            return Err(ConfigError::CircularDependency {
                from: self.collection.items[from].id().clone(),
                to: self.collection.items[at].id().clone(),
            });
        }
        self.visiting.push(at);
        for i in 0..self.collection.items[at].dependencies().len() {
            let dep = self.collection.items[at].dependencies()[i].clone();
            let dep_at = *self.collection.index.get(&dep).ok_or_else(|| {
                ConfigError::DependencyNotFound {
                    rule: self.collection.items[at].id().clone(),
                    dependency: dep.clone(),
                }
            })?;
            self.include_at(dep_at)?;
        }
        self.visiting.pop();
        self.included[at] = true;
        self.order.push(at);
        Ok(())
    }

    /// Finish, moving the included items into execution order.
    pub fn build(self) -> DependencyGraph<T> {
        // Map collection positions to graph positions.
        let mut position = HashMap::new();
        for (graph_at, &at) in self.order.iter().enumerate() {
            position.insert(at, graph_at);
        }

        let mut slots: Vec<Option<T>> = self.collection.items.into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(self.order.len());
        let index = self.collection.index;
        for &at in &self.order {
            let item = slots[at].take();
            let item = match item {
                Some(item) => item,
                None => continue,
            };
            let deps = item
                .dependencies()
                .iter()
                .filter_map(|id| index.get(id))
                .filter_map(|at| position.get(at))
                .copied()
                .collect();
            nodes.push(Node { item, deps });
        }
        DependencyGraph { nodes }
    }
}

#[derive(Debug)]
struct Node<T> {
    item: T,
    // Graph positions of this node's dependencies; always earlier positions.
    deps: Vec<usize>,
}

/// Items in execution order: every dependency precedes its dependents.
#[derive(Debug)]
pub struct DependencyGraph<T> {
    nodes: Vec<Node<T>>,
}

impl<T: DependencyTarget> DependencyGraph<T> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().map(|n| &n.item)
    }

    /// A fresh state arena for one walk of this graph.
    pub fn new_state(&self) -> GraphState {
        GraphState(vec![ExecutionState::None; self.nodes.len()])
    }

    /// Walk nodes in execution order, marking dependency failures in `state`
    /// as it goes. The caller finalizes each yielded node with
    /// [`GraphState::pass`] or [`GraphState::fail`] before advancing.
    pub fn walk<'a>(&'a self, state: &'a mut GraphState) -> Walk<'a, T> {
        Walk {
            graph: self,
            state,
            at: 0,
        }
    }
}

/// Per-walk execution state of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionState {
    #[default]
    None,
    Pass,
    Fail,
    DependencyFail,
}

impl ExecutionState {
    fn failed(&self) -> bool {
        matches!(self, ExecutionState::Fail | ExecutionState::DependencyFail)
    }
}

/// State arena for one walk. Transitions are monotonic: a node leaves `None`
/// once and never reverts.
#[derive(Debug)]
pub struct GraphState(Vec<ExecutionState>);

impl GraphState {
    pub fn get(&self, at: usize) -> ExecutionState {
        self.0[at]
    }

    pub fn pass(&mut self, at: usize) {
        self.transition(at, ExecutionState::Pass);
    }

    pub fn fail(&mut self, at: usize) {
        self.transition(at, ExecutionState::Fail);
    }

    fn skip(&mut self, at: usize) {
        self.transition(at, ExecutionState::DependencyFail);
    }

    fn transition(&mut self, at: usize, next: ExecutionState) {
        if self.0[at] == ExecutionState::None {
            self.0[at] = next;
        }
    }
}

/// One step of a graph walk.
#[derive(Debug)]
pub struct WalkItem<'a, T> {
    pub index: usize,
    pub item: &'a T,
    /// True when a dependency failed; the node was marked `DependencyFail`
    /// and must not be evaluated.
    pub skipped: bool,
}

pub struct Walk<'a, T> {
    graph: &'a DependencyGraph<T>,
    state: &'a mut GraphState,
    at: usize,
}

impl<T> Walk<'_, T> {
    /// Finalize a yielded node as passed.
    pub fn pass(&mut self, at: usize) {
        self.state.pass(at);
    }

    /// Finalize a yielded node as failed; dependents will be skipped.
    pub fn fail(&mut self, at: usize) {
        self.state.fail(at);
    }
}

impl<'a, T: DependencyTarget> Iterator for Walk<'a, T> {
    type Item = WalkItem<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.at;
        let node = self.graph.nodes.get(at)?;
        self.at += 1;

        let skipped = node.deps.iter().any(|&dep| self.state.get(dep).failed());
        if skipped {
            self.state.skip(at);
            debug!(rule = %node.item.id(), "dependency failed, skipping");
        }
        Some(WalkItem {
            index: at,
            item: &node.item,
            skipped,
        })
    }
}
