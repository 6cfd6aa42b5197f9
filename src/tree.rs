//! Arena-based binary tree of profile-carrying nodes.
//!
//! Nodes live in a flat `Vec<Node>` and reference each other by
//! [`NodeId`] (a `usize` index), so the parent/child back-references never
//! form ownership cycles. The arena keeps every node ever created; joining
//! only moves nodes out of the *active* set, which shrinks until a single
//! active node — the root — remains.

use crate::config::BuildConfig;
use crate::distance::profile_distance;
use crate::error::{FastNjError, Result};
use crate::profile::{Profile, TotalProfile};
use crate::SequenceRecord;

/// Index into the tree's node arena.
pub type NodeId = usize;

/// The closest other node discovered so far for a node, with its
/// neighbor-join distance at the time of discovery.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestHit {
    pub node: NodeId,
    pub distance: f64,
}

/// A single node: a leaf built from an input sequence, or an internal node
/// created by joining two children.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Index of this node in the arena.
    pub id: NodeId,
    /// Leaf name, or concatenated descendant leaf names for internal nodes.
    pub name: String,
    /// Parent node (None for the root and for still-unjoined nodes).
    pub parent: Option<NodeId>,
    /// Zero children (leaf) or exactly two (internal).
    pub children: Vec<NodeId>,
    /// Frequency profile of this node's subtree.
    pub profile: Profile,
    pub is_leaf: bool,
    /// Still eligible for joining.
    pub active: bool,
    /// Branch length to the parent; finalized after NNI refinement.
    pub branch_length: f64,
    /// Cached up-distance: 0 for leaves, half the children's profile
    /// distance for internal nodes.
    pub up_dist: f64,
    /// Best-known neighbor discovered so far.
    pub best_known: Option<BestHit>,
    /// Bounded candidate list, ascending by neighbor-join distance.
    pub top_hits: Vec<(NodeId, f64)>,
    /// Bootstrap support for the split below this node, when estimated.
    pub support: Option<f64>,
}

/// Binary tree under construction, plus the bookkeeping the top-hits
/// heuristic needs: the active set, the total profile, and the running sum
/// of active up-distances.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tree {
    nodes: Vec<Node>,
    active: Vec<NodeId>,
    total: TotalProfile,
    /// Sum of `up_dist` over active nodes, kept incrementally so the
    /// out-distance term Σu(j) costs O(1).
    up_sum: f64,
    /// Top-hits list bound m.
    pub(crate) m: usize,
    /// Saturation fallback for log-corrected distances.
    pub(crate) saturation: f64,
    joins: usize,
    root: Option<NodeId>,
}

impl Tree {
    /// Build leaf nodes from the input alignment and initialize the total
    /// profile. Fails on fewer than 2 sequences, unequal alignment
    /// lengths, or duplicate names.
    pub fn from_records(records: &[SequenceRecord], config: &BuildConfig) -> Result<Self> {
        if records.len() < 2 {
            return Err(FastNjError::InvalidInput(format!(
                "need at least 2 sequences to build a tree, got {}",
                records.len()
            )));
        }
        let columns = records[0].alignment.len();
        for r in records {
            if r.alignment.len() != columns {
                return Err(FastNjError::InvalidInput(format!(
                    "sequence '{}' has length {}, expected {}",
                    r.name,
                    r.alignment.len(),
                    columns
                )));
            }
        }
        for (i, r) in records.iter().enumerate() {
            if records[..i].iter().any(|other| other.name == r.name) {
                return Err(FastNjError::InvalidInput(format!(
                    "duplicate sequence name '{}'",
                    r.name
                )));
            }
        }

        let mut nodes = Vec::with_capacity(2 * records.len() - 1);
        let mut active = Vec::with_capacity(records.len());
        for (id, r) in records.iter().enumerate() {
            nodes.push(Node {
                id,
                name: r.name.clone(),
                parent: None,
                children: Vec::new(),
                profile: Profile::from_sequence(&r.alignment)?,
                is_leaf: true,
                active: true,
                branch_length: 1.0,
                up_dist: 0.0,
                best_known: None,
                top_hits: Vec::new(),
                support: None,
            });
            active.push(id);
        }

        let total = TotalProfile::new(nodes.iter().map(|n| &n.profile))?;
        Ok(Self {
            nodes,
            active,
            total,
            up_sum: 0.0,
            m: config.resolved_top_hits_size(records.len()),
            saturation: config.saturation_distance,
            joins: 0,
            root: None,
        })
    }

    /// Access a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Total number of nodes ever created.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of currently active nodes, in creation order.
    pub fn active_nodes(&self) -> &[NodeId] {
        &self.active
    }

    /// Number of currently active nodes.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of joins performed so far.
    pub fn joins(&self) -> usize {
        self.joins
    }

    /// The root, once construction has finished.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Join two active nodes into a new internal node: mean profile,
    /// two-way parent/child links, children deactivated, the new node
    /// activated and counted.
    ///
    /// The caller seeds the new node's top-hits list afterwards (the seed
    /// pool is the union of both children's candidate sets).
    pub fn join(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        if a == b {
            return Err(FastNjError::Topology(format!(
                "cannot join node {} with itself",
                a
            )));
        }
        if !self.nodes[a].active || !self.nodes[b].active {
            return Err(FastNjError::Topology(format!(
                "join attempted on inactive node ({} or {})",
                a, b
            )));
        }

        let id = self.nodes.len();
        let profile = Profile::mean(&self.nodes[a].profile, &self.nodes[b].profile);
        let up_dist = profile_distance(&self.nodes[a].profile, &self.nodes[b].profile) / 2.0;
        let name = format!("{}{}", self.nodes[a].name, self.nodes[b].name);

        self.nodes.push(Node {
            id,
            name,
            parent: None,
            children: vec![a, b],
            profile,
            is_leaf: false,
            active: true,
            branch_length: 1.0,
            up_dist,
            best_known: None,
            top_hits: Vec::new(),
            support: None,
        });
        self.nodes[a].parent = Some(id);
        self.nodes[b].parent = Some(id);
        self.deactivate(a);
        self.deactivate(b);
        self.activate(id);
        self.joins += 1;
        Ok(id)
    }

    fn activate(&mut self, id: NodeId) {
        self.nodes[id].active = true;
        self.active.push(id);
        self.up_sum += self.nodes[id].up_dist;
    }

    fn deactivate(&mut self, id: NodeId) {
        self.nodes[id].active = false;
        self.active.retain(|&n| n != id);
        self.up_sum -= self.nodes[id].up_dist;
    }

    /// The other child of `id`'s parent.
    pub fn sibling(&self, id: NodeId) -> Result<NodeId> {
        let parent = self.nodes[id].parent.ok_or_else(|| {
            FastNjError::Topology(format!("node {} has no parent", id))
        })?;
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| c != id)
            .ok_or_else(|| {
                FastNjError::Topology(format!(
                    "parent {} of node {} has no other child",
                    parent, id
                ))
            })
    }

    /// Reassign a node's profile (and cached up-distance) as the mean of
    /// its current children. Used after an NNI swap changes the children.
    pub fn recompute_profile(&mut self, id: NodeId) -> Result<()> {
        let children = self.nodes[id].children.clone();
        if children.len() != 2 {
            return Err(FastNjError::Topology(format!(
                "internal node {} has {} children, expected 2",
                id,
                children.len()
            )));
        }
        let (a, b) = (children[0], children[1]);
        let profile = Profile::mean(&self.nodes[a].profile, &self.nodes[b].profile);
        let up = profile_distance(&self.nodes[a].profile, &self.nodes[b].profile) / 2.0;
        let node = &mut self.nodes[id];
        node.profile = profile;
        node.up_dist = up;
        Ok(())
    }

    /// Recompute the profiles along the path from `id`'s parent to the
    /// root, bottom-up. Called after a subtree switch.
    pub fn recompute_profiles_upward(&mut self, id: NodeId) -> Result<()> {
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            self.recompute_profile(p)?;
            cur = self.nodes[p].parent;
        }
        Ok(())
    }

    /// Recursively recompute a node's name as the concatenation of its
    /// descendant leaf names in traversal order.
    pub fn rename(&mut self, id: NodeId) {
        let children = self.nodes[id].children.clone();
        if children.is_empty() {
            return;
        }
        let mut name = String::new();
        for c in children {
            self.rename(c);
            name.push_str(&self.nodes[c].name);
        }
        self.nodes[id].name = name;
    }

    /// Exchange the positions of two subtrees: each takes the other's
    /// parent and child slot. Profiles and names along both paths to the
    /// root are stale afterwards; callers recompute them.
    pub fn switch_nodes(&mut self, x: NodeId, y: NodeId) -> Result<()> {
        let px = self.nodes[x].parent.ok_or_else(|| {
            FastNjError::Topology(format!("cannot switch the root (node {})", x))
        })?;
        let py = self.nodes[y].parent.ok_or_else(|| {
            FastNjError::Topology(format!("cannot switch the root (node {})", y))
        })?;
        if self.is_ancestor(x, y) || self.is_ancestor(y, x) {
            return Err(FastNjError::Topology(format!(
                "cannot switch nested subtrees ({} and {})",
                x, y
            )));
        }

        for c in &mut self.nodes[px].children {
            if *c == x {
                *c = y;
            }
        }
        for c in &mut self.nodes[py].children {
            if *c == y {
                *c = x;
            }
        }
        self.nodes[x].parent = Some(py);
        self.nodes[y].parent = Some(px);
        Ok(())
    }

    fn is_ancestor(&self, anc: NodeId, mut id: NodeId) -> bool {
        while let Some(p) = self.nodes[id].parent {
            if p == anc {
                return true;
            }
            id = p;
        }
        false
    }

    /// Δ(i,i): average profile distance between every ordered pair of a
    /// node's children, including self-pairs. 0 for leaves.
    pub fn average_children_distance(&self, id: NodeId) -> f64 {
        let children = &self.nodes[id].children;
        if children.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        for &a in children {
            for &b in children {
                sum += profile_distance(&self.nodes[a].profile, &self.nodes[b].profile);
            }
        }
        sum / (children.len() * children.len()) as f64
    }

    /// r(i): approximate out-distance of a node, computed from its
    /// distance to the total profile instead of a pairwise sum:
    /// `(n·D(i,T) − Δ(i,i) − (n−2)·u(i) − Σu(j)) / (n−2)`, with divisor
    /// `n` when `n ≤ 2` to avoid division by zero.
    pub fn out_distance(&self, id: NodeId) -> f64 {
        let n = self.active.len() as f64;
        let d_to_total = profile_distance(&self.nodes[id].profile, self.total.profile());
        let numerator = n * d_to_total
            - self.average_children_distance(id)
            - (n - 2.0) * self.nodes[id].up_dist
            - self.up_sum;
        let divisor = if self.active.len() > 2 { n - 2.0 } else { n };
        numerator / divisor
    }

    /// The neighbor-joining ranking criterion; lower is better.
    ///
    /// `D(i,j) − u(i) − u(j) − r(i) − r(j)`
    pub fn neighbor_join_distance(&self, i: NodeId, j: NodeId) -> f64 {
        profile_distance(&self.nodes[i].profile, &self.nodes[j].profile)
            - self.nodes[i].up_dist
            - self.nodes[j].up_dist
            - self.out_distance(i)
            - self.out_distance(j)
    }

    /// Refresh the total profile and the active up-distance sum from the
    /// current active set. The total drifts by O(1/N) per join, so this is
    /// called periodically rather than after every join.
    pub fn refresh_total_profile(&mut self) -> Result<()> {
        let profiles = self.active.iter().map(|&id| &self.nodes[id].profile);
        // Borrow juggling: collect the sum first, then store.
        let mut total = self.total.clone();
        total.recompute(profiles)?;
        self.total = total;
        self.up_sum = self.active.iter().map(|&id| self.nodes[id].up_dist).sum();
        Ok(())
    }

    /// Node ids of the subtree under `from`, children before parents.
    pub fn postorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend_from_slice(&self.nodes[id].children);
        }
        out.reverse();
        out
    }
}
