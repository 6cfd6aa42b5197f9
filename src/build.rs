//! Greedy topology construction.
//!
//! Repeatedly joins the globally closest active pair under the
//! neighbor-join criterion until one node remains. Candidate pairs come
//! from a min-heap keyed by best-known distances; each iteration pulls a
//! small pool off the heap, rescores it against fresh distances, then
//! hill-climbs through the winners' top-hits lists before committing the
//! join.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::{BuildConfig, Diagnostics};
use crate::error::{FastNjError, Result};
use crate::tree::{NodeId, Tree};

/// Heap key: best-known distance at push time, node id as tie-break.
/// Wrapped in `Reverse` by the caller to get min-heap behavior.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    distance: f64,
    node: NodeId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance.total_cmp(&other.distance) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.node.cmp(&other.node))
    }
}

impl Tree {
    fn heap_key(&self, id: NodeId) -> HeapEntry {
        HeapEntry {
            distance: self
                .node(id)
                .best_known
                .map_or(f64::INFINITY, |h| h.distance),
            node: id,
        }
    }

    /// Join active nodes pairwise until one remains, then record it as the
    /// root. Returns the root id.
    pub fn construct_initial_topology(
        &mut self,
        config: &BuildConfig,
        diag: &dyn Diagnostics,
    ) -> Result<NodeId> {
        if self.active_count() < 2 {
            return Err(FastNjError::Topology(
                "topology construction needs at least two active nodes".into(),
            ));
        }
        self.seed_top_hits();

        let mut heap: BinaryHeap<std::cmp::Reverse<HeapEntry>> = BinaryHeap::new();
        for &id in self.active_nodes() {
            heap.push(std::cmp::Reverse(self.heap_key(id)));
        }

        while self.active_count() > 1 {
            // Pull up to m distinct active nodes; stale best-known records
            // are repaired as they surface.
            let mut pool: Vec<NodeId> = Vec::with_capacity(self.m);
            while pool.len() < self.m {
                match heap.pop() {
                    Some(std::cmp::Reverse(entry)) => {
                        if !self.node(entry.node).active || pool.contains(&entry.node) {
                            continue;
                        }
                        self.repair_best_known(entry.node);
                        pool.push(entry.node);
                    }
                    None => break,
                }
            }
            if pool.is_empty() {
                // Every queued entry pointed at a joined node. Requeue the
                // whole active set and retry.
                for &id in self.active_nodes() {
                    heap.push(std::cmp::Reverse(self.heap_key(id)));
                }
                continue;
            }

            // Rescore the pool with fresh distances and pick the global
            // minimum. Strict < keeps the earliest candidate on ties.
            let mut n1 = pool[0];
            let mut n2 = 0;
            let mut least = f64::INFINITY;
            for &id in &pool {
                let partner = match self.node(id).best_known {
                    Some(hit) => hit.node,
                    None => continue,
                };
                let d = self.neighbor_join_distance(id, partner);
                self.note_distance(id, partner, d);
                if d < least {
                    least = d;
                    n1 = id;
                    n2 = partner;
                }
            }
            if least.is_infinite() {
                return Err(FastNjError::Topology(
                    "no join candidate found in pooled nodes".into(),
                ));
            }

            // Hill-climb: the winners' own top-hits lists may hold a still
            // closer pair. The threshold tightens as improvements land.
            self.ensure_top_hits(n1);
            self.ensure_top_hits(n2);
            let (first, second) = (n1, n2);
            for &(cand, _) in self.node(first).top_hits.clone().iter() {
                if !self.node(cand).active || cand == first {
                    continue;
                }
                let d = self.neighbor_join_distance(first, cand);
                if d < least {
                    least = d;
                    n1 = first;
                    n2 = cand;
                }
            }
            for &(cand, _) in self.node(second).top_hits.clone().iter() {
                if !self.node(cand).active || cand == second {
                    continue;
                }
                let d = self.neighbor_join_distance(second, cand);
                if d < least {
                    least = d;
                    n1 = second;
                    n2 = cand;
                }
            }

            let new = self.join(n1, n2)?;
            self.seed_top_hits_for_join(new);
            let needs_scan = match self.node(new).best_known {
                Some(hit) => !self.node(hit.node).active,
                None => true,
            };
            if needs_scan && self.active_count() > 1 {
                self.rescan_best_known(new);
            }
            self.purge_joined(n1, n2, new);

            if config.refresh_interval > 0 && self.joins() % config.refresh_interval == 0 {
                self.refresh_total_profile()?;
                diag.event(&format!("refreshed total profile at join {}", self.joins()));
            }

            for id in pool {
                if self.node(id).active {
                    heap.push(std::cmp::Reverse(self.heap_key(id)));
                }
            }
            heap.push(std::cmp::Reverse(self.heap_key(new)));
        }

        let root = self.active_nodes()[0];
        self.set_root(root);
        diag.event(&format!(
            "initial topology complete after {} joins",
            self.joins()
        ));
        Ok(root)
    }
}
