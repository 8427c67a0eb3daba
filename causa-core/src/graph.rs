//! Causal graph over a flat event log.
//!
//! The log is treated as an arena: events live in one append-ordered
//! vector and every relation (parents, children, universe and store
//! partitions, the chronological index) is expressed as indices into it.
//! A graph is a read-only snapshot; stores rebuild it after any write
//! instead of patching it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{CausalError, Result};
use crate::event::CausalEvent;

/// Read-only adjacency index over a set of causal events.
#[derive(Debug, Clone)]
pub struct CausalGraph<T> {
    events: Vec<CausalEvent<T>>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    by_universe: BTreeMap<String, Vec<usize>>,
    by_store: BTreeMap<String, Vec<usize>>,
    chronological: Vec<usize>,
}

/// Builds the graph in O(n) over the input (plus the chronological sort).
///
/// Parent ids that do not resolve inside `events` are ignored; use
/// [`crate::validate_history`] when dangling references must be rejected.
pub fn build_causal_graph<T: Clone>(events: &[CausalEvent<T>]) -> CausalGraph<T> {
    let events = events.to_vec();
    let mut index = HashMap::with_capacity(events.len());
    for (i, event) in events.iter().enumerate() {
        index.entry(event.id.clone()).or_insert(i);
    }

    let mut parents = vec![Vec::new(); events.len()];
    let mut children = vec![Vec::new(); events.len()];
    let mut by_universe: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut by_store: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (i, event) in events.iter().enumerate() {
        for parent_id in &event.caused_by {
            if let Some(&p) = index.get(parent_id) {
                if p != i && !parents[i].contains(&p) {
                    parents[i].push(p);
                    children[p].push(i);
                }
            }
        }
        by_universe
            .entry(event.universe_id.clone())
            .or_default()
            .push(i);
        by_store.entry(event.store_key.clone()).or_default().push(i);
    }

    let mut chronological: Vec<usize> = (0..events.len()).collect();
    // Stable: equal timestamps keep append order.
    chronological.sort_by_key(|&i| events[i].timestamp);
    for list in by_universe.values_mut().chain(by_store.values_mut()) {
        list.sort_by_key(|&i| events[i].timestamp);
    }

    CausalGraph {
        events,
        index,
        parents,
        children,
        by_universe,
        by_store,
        chronological,
    }
}

impl<T> CausalGraph<T> {
    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the graph holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in append order.
    pub fn events(&self) -> &[CausalEvent<T>] {
        &self.events
    }

    /// Looks up an event by id.
    pub fn get(&self, id: &str) -> Option<&CausalEvent<T>> {
        self.index.get(id).map(|&i| &self.events[i])
    }

    /// True when the id is part of the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Distinct universe ids, sorted.
    pub fn universes(&self) -> impl Iterator<Item = &str> {
        self.by_universe.keys().map(String::as_str)
    }

    /// Distinct store keys, sorted.
    pub fn store_keys(&self) -> impl Iterator<Item = &str> {
        self.by_store.keys().map(String::as_str)
    }

    /// Events of one universe ordered by timestamp (ties in append order).
    pub fn events_in_universe(&self, universe: &str) -> Vec<&CausalEvent<T>> {
        self.resolve(self.by_universe.get(universe))
    }

    /// Events of one store ordered by timestamp.
    pub fn events_for_store(&self, store_key: &str) -> Vec<&CausalEvent<T>> {
        self.resolve(self.by_store.get(store_key))
    }

    /// All events ordered by timestamp.
    pub fn chronological(&self) -> Vec<&CausalEvent<T>> {
        self.chronological.iter().map(|&i| &self.events[i]).collect()
    }

    /// Most recent event of a universe; timestamp ties go to the later append.
    pub fn latest_in_universe(&self, universe: &str) -> Option<&CausalEvent<T>> {
        self.by_universe
            .get(universe)
            .and_then(|list| list.last())
            .map(|&i| &self.events[i])
    }

    /// Latest event of a universe with `timestamp <= at`.
    pub fn latest_at(&self, universe: &str, at: u64) -> Option<&CausalEvent<T>> {
        let list = self.by_universe.get(universe)?;
        let upper = list.partition_point(|&i| self.events[i].timestamp <= at);
        upper.checked_sub(1).map(|pos| &self.events[list[pos]])
    }

    /// Direct parents of an event.
    pub fn parents_of(&self, id: &str) -> Result<Vec<&CausalEvent<T>>> {
        let i = self.position(id)?;
        Ok(self.parents[i].iter().map(|&p| &self.events[p]).collect())
    }

    /// Direct children of an event.
    pub fn children_of(&self, id: &str) -> Result<Vec<&CausalEvent<T>>> {
        let i = self.position(id)?;
        Ok(self.children[i].iter().map(|&c| &self.events[c]).collect())
    }

    /// Events without resolvable parents.
    pub fn roots(&self) -> Vec<&CausalEvent<T>> {
        (0..self.events.len())
            .filter(|&i| self.parents[i].is_empty())
            .map(|i| &self.events[i])
            .collect()
    }

    /// Events of a universe that have no child in that same universe.
    pub fn heads(&self, universe: &str) -> Vec<&CausalEvent<T>> {
        self.by_universe
            .get(universe)
            .map(|list| {
                list.iter()
                    .filter(|&&i| {
                        !self.children[i]
                            .iter()
                            .any(|&c| self.events[c].universe_id == universe)
                    })
                    .map(|&i| &self.events[i])
                    .collect()
            })
            .unwrap_or_default()
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| CausalError::UnknownEvent(id.to_string()))
    }

    fn resolve(&self, list: Option<&Vec<usize>>) -> Vec<&CausalEvent<T>> {
        list.map(|l| l.iter().map(|&i| &self.events[i]).collect())
            .unwrap_or_default()
    }

    /// Breadth-first walk over `edges`, visiting shared nodes once.
    fn walk(&self, start: usize, edges: &[Vec<usize>]) -> Vec<usize> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(i) = queue.pop_front() {
            for &next in &edges[i] {
                if visited.insert(next) {
                    found.push(next);
                    queue.push_back(next);
                }
            }
        }

        found.sort_by_key(|&i| (self.events[i].timestamp, i));
        found
    }

    /// Longest parent chain ending at each event (roots have depth 0).
    fn depths(&self) -> Vec<usize> {
        let n = self.events.len();
        let mut depth = vec![0usize; n];
        let mut pending: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();

        while let Some(i) = queue.pop_front() {
            for &c in &self.children[i] {
                depth[c] = depth[c].max(depth[i] + 1);
                pending[c] -= 1;
                if pending[c] == 0 {
                    queue.push_back(c);
                }
            }
        }

        depth
    }
}

/// Filters for [`query_events`]. Every supplied filter must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    /// Inclusive `(start, end)` timestamp range.
    pub time_range: Option<(u64, u64)>,
    pub universe_ids: Option<Vec<String>>,
    pub event_ids: Option<Vec<String>>,
    pub store_keys: Option<Vec<String>>,
}

impl EventQuery {
    /// Query restricted to a time range.
    pub fn between(start: u64, end: u64) -> Self {
        Self {
            time_range: Some((start, end)),
            ..Self::default()
        }
    }

    /// Restricts the query to the given universes.
    pub fn in_universes<I, S>(mut self, universes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.universe_ids = Some(universes.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts the query to the given event ids.
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// Returns events matching every supplied filter, ordered by timestamp.
pub fn query_events<'g, T>(graph: &'g CausalGraph<T>, query: &EventQuery) -> Vec<&'g CausalEvent<T>> {
    let universes: Option<HashSet<&str>> = query
        .universe_ids
        .as_ref()
        .map(|u| u.iter().map(String::as_str).collect());
    let ids: Option<HashSet<&str>> = query
        .event_ids
        .as_ref()
        .map(|u| u.iter().map(String::as_str).collect());
    let stores: Option<HashSet<&str>> = query
        .store_keys
        .as_ref()
        .map(|u| u.iter().map(String::as_str).collect());

    graph
        .chronological
        .iter()
        .map(|&i| &graph.events[i])
        .filter(|e| match query.time_range {
            Some((start, end)) => e.timestamp >= start && e.timestamp <= end,
            None => true,
        })
        .filter(|e| universes.as_ref().map_or(true, |u| u.contains(e.universe_id.as_str())))
        .filter(|e| ids.as_ref().map_or(true, |ids| ids.contains(e.id.as_str())))
        .filter(|e| stores.as_ref().map_or(true, |s| s.contains(e.store_key.as_str())))
        .collect()
}

/// Every event the given one transitively depends on, ordered by timestamp.
///
/// # Errors
/// Returns `CausalError::UnknownEvent` if the id is not in the graph.
pub fn find_ancestors<'g, T>(graph: &'g CausalGraph<T>, id: &str) -> Result<Vec<&'g CausalEvent<T>>> {
    let start = graph.position(id)?;
    Ok(graph
        .walk(start, &graph.parents)
        .into_iter()
        .map(|i| &graph.events[i])
        .collect())
}

/// Every event that transitively depends on the given one, ordered by timestamp.
///
/// # Errors
/// Returns `CausalError::UnknownEvent` if the id is not in the graph.
pub fn find_descendants<'g, T>(graph: &'g CausalGraph<T>, id: &str) -> Result<Vec<&'g CausalEvent<T>>> {
    let start = graph.position(id)?;
    Ok(graph
        .walk(start, &graph.children)
        .into_iter()
        .map(|i| &graph.events[i])
        .collect())
}

/// Most recent event that is an ancestor-or-self of both `a` and `b`.
///
/// # Errors
/// Returns `CausalError::UnknownEvent` if either id is not in the graph.
pub fn common_ancestor<'g, T>(
    graph: &'g CausalGraph<T>,
    a: &str,
    b: &str,
) -> Result<Option<&'g CausalEvent<T>>> {
    let ia = graph.position(a)?;
    let ib = graph.position(b)?;

    let mut left: BTreeSet<usize> = graph.walk(ia, &graph.parents).into_iter().collect();
    left.insert(ia);
    let mut right: HashSet<usize> = graph.walk(ib, &graph.parents).into_iter().collect();
    right.insert(ib);

    Ok(left
        .into_iter()
        .filter(|i| right.contains(i))
        .max_by_key(|&i| (graph.events[i].timestamp, i))
        .map(|i| &graph.events[i]))
}

/// Aggregate figures over a causal graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CausalStats {
    pub total_events: usize,
    pub unique_universes: usize,
    pub unique_stores: usize,
    /// Longest parent chain, counted in edges.
    pub max_depth: usize,
    /// Mean out-degree over events that have at least one child.
    pub avg_branching_factor: f64,
    pub merge_nodes: usize,
    pub root_count: usize,
}

/// Computes [`CausalStats`] for a graph.
pub fn calculate_causal_stats<T>(graph: &CausalGraph<T>) -> CausalStats {
    let (edges, non_leaves) = graph
        .children
        .iter()
        .filter(|c| !c.is_empty())
        .fold((0usize, 0usize), |(e, n), c| (e + c.len(), n + 1));

    CausalStats {
        total_events: graph.len(),
        unique_universes: graph.by_universe.len(),
        unique_stores: graph.by_store.len(),
        max_depth: graph.depths().into_iter().max().unwrap_or(0),
        avg_branching_factor: if non_leaves == 0 {
            0.0
        } else {
            edges as f64 / non_leaves as f64
        },
        merge_nodes: graph.parents.iter().filter(|p| p.len() > 1).count(),
        root_count: graph.parents.iter().filter(|p| p.is_empty()).count(),
    }
}
