//! Top-hits candidate lists and best-known-neighbor maintenance.
//!
//! Every node carries a bounded list of its `m` most similar other nodes
//! under the neighbor-join criterion. Seeding is amortized: one full scan
//! for a node also seeds the lists of the nodes inside its `2m` candidate
//! pool, and every distance computed anywhere updates both endpoints'
//! best-known records. Ties keep the earliest-found candidate (strict `<`
//! comparisons only).

use crate::tree::{BestHit, NodeId, Tree};

impl Tree {
    /// Record an observed neighbor-join distance on both endpoints,
    /// updating each best-known record when the new distance is strictly
    /// smaller.
    pub(crate) fn note_distance(&mut self, a: NodeId, b: NodeId, d: f64) {
        let bk = &mut self.node_mut(a).best_known;
        match bk {
            Some(hit) if d >= hit.distance => {}
            _ => *bk = Some(BestHit { node: b, distance: d }),
        }
        let bk = &mut self.node_mut(b).best_known;
        match bk {
            Some(hit) if d >= hit.distance => {}
            _ => *bk = Some(BestHit { node: a, distance: d }),
        }
    }

    /// Seed top-hits lists for every active node that lacks one.
    ///
    /// For a node without a list: scan all other active nodes, retain the
    /// best `2m` as a candidate pool and the best `m` as the node's own
    /// list, then seed the still-unseeded pool members from within the
    /// pool. This amortizes the expensive full scans across many nodes.
    pub fn seed_top_hits(&mut self) {
        let order: Vec<NodeId> = self.active_nodes().to_vec();
        for &cur in &order {
            if !self.node(cur).top_hits.is_empty() {
                continue;
            }

            let mut dists: Vec<(NodeId, f64)> = Vec::with_capacity(order.len());
            for &other in &order {
                if other == cur || !self.node(other).active {
                    continue;
                }
                let d = self.neighbor_join_distance(cur, other);
                self.note_distance(cur, other, d);
                dists.push((other, d));
            }
            // Stable sort: equal distances keep scan order.
            dists.sort_by(|a, b| a.1.total_cmp(&b.1));
            dists.truncate(2 * self.m);
            let pool = dists;
            self.node_mut(cur).top_hits = pool.iter().take(self.m).copied().collect();

            // Seed the unseeded pool members from within the pool.
            for &(cand, _) in &pool {
                if !self.node(cand).top_hits.is_empty() {
                    continue;
                }
                let mut inner: Vec<(NodeId, f64)> = Vec::with_capacity(pool.len());
                for &(other, _) in &pool {
                    if other == cand {
                        continue;
                    }
                    let d = self.neighbor_join_distance(cand, other);
                    self.note_distance(cand, other, d);
                    inner.push((other, d));
                }
                inner.sort_by(|a, b| a.1.total_cmp(&b.1));
                inner.truncate(self.m);
                self.node_mut(cand).top_hits = inner;
            }
        }
    }

    /// Seed a freshly joined node's top-hits list from the union of its
    /// children's candidate sets.
    pub fn seed_top_hits_for_join(&mut self, new: NodeId) {
        let children = self.node(new).children.clone();
        let mut pool: Vec<NodeId> = Vec::new();
        for c in children {
            for &(cand, _) in &self.node(c).top_hits {
                if cand != new && self.node(cand).active && !pool.contains(&cand) {
                    pool.push(cand);
                }
            }
        }
        let mut dists: Vec<(NodeId, f64)> = Vec::with_capacity(pool.len());
        for cand in pool {
            let d = self.neighbor_join_distance(new, cand);
            self.note_distance(new, cand, d);
            dists.push((cand, d));
        }
        dists.sort_by(|a, b| a.1.total_cmp(&b.1));
        dists.truncate(self.m);
        self.node_mut(new).top_hits = dists;
    }

    /// Repair a stale best-known record: if the recorded neighbor has been
    /// joined away, walk up its ancestor chain to the first active node
    /// and recompute the distance. Falls back to a full scan when the walk
    /// ends at the node itself.
    pub fn repair_best_known(&mut self, id: NodeId) {
        let target = match self.node(id).best_known {
            Some(hit) if self.node(hit.node).active => return,
            Some(hit) => {
                let mut cur = hit.node;
                while !self.node(cur).active {
                    match self.node(cur).parent {
                        Some(p) => cur = p,
                        None => break,
                    }
                }
                if self.node(cur).active && cur != id {
                    Some(cur)
                } else {
                    None
                }
            }
            None => None,
        };
        match target {
            Some(t) => {
                let d = self.neighbor_join_distance(id, t);
                self.node_mut(id).best_known = Some(BestHit { node: t, distance: d });
            }
            None => self.rescan_best_known(id),
        }
    }

    /// Recompute a node's best-known record by scanning all other active
    /// nodes.
    pub fn rescan_best_known(&mut self, id: NodeId) {
        let order: Vec<NodeId> = self.active_nodes().to_vec();
        let mut best: Option<BestHit> = None;
        for other in order {
            if other == id {
                continue;
            }
            let d = self.neighbor_join_distance(id, other);
            match best {
                Some(hit) if d >= hit.distance => {}
                _ => best = Some(BestHit { node: other, distance: d }),
            }
        }
        self.node_mut(id).best_known = best;
    }

    /// Lazily repopulate an empty top-hits list from the active set.
    pub fn ensure_top_hits(&mut self, id: NodeId) {
        if !self.node(id).top_hits.is_empty() {
            return;
        }
        let order: Vec<NodeId> = self.active_nodes().to_vec();
        let mut dists: Vec<(NodeId, f64)> = Vec::with_capacity(order.len());
        for other in order {
            if other == id {
                continue;
            }
            let d = self.neighbor_join_distance(id, other);
            self.note_distance(id, other, d);
            dists.push((other, d));
        }
        dists.sort_by(|a, b| a.1.total_cmp(&b.1));
        dists.truncate(self.m);
        self.node_mut(id).top_hits = dists;
    }

    /// Drop the two just-joined nodes from every remaining top-hits list;
    /// any list that referenced either gains the new joined node as a
    /// replacement candidate with a freshly computed distance.
    pub fn purge_joined(&mut self, a: NodeId, b: NodeId, new: NodeId) {
        let order: Vec<NodeId> = self.active_nodes().to_vec();
        for id in order {
            if id == new {
                continue;
            }
            let before = self.node(id).top_hits.len();
            self.node_mut(id)
                .top_hits
                .retain(|&(n, _)| n != a && n != b);
            if self.node(id).top_hits.len() == before {
                continue;
            }
            if self.node(id).top_hits.iter().any(|&(n, _)| n == new) {
                continue;
            }
            let d = self.neighbor_join_distance(id, new);
            self.note_distance(id, new, d);
            let m = self.m;
            let hits = &mut self.node_mut(id).top_hits;
            // Ascending insert; ties go after existing entries.
            let pos = hits.partition_point(|&(_, hd)| hd <= d);
            hits.insert(pos, (new, d));
            hits.truncate(m);
        }
    }
}
