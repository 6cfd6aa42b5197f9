//! Branch length assignment from log-corrected profile distances.
//!
//! Lengths are estimated per sibling pair from the four-point quantities
//! around the pair and its surroundings. A negative estimate is clamped
//! to zero with the deficit moved onto the sibling, so the pair's summed
//! length is conserved whenever the sum itself is non-negative.

use crate::distance::log_corrected_profile_distance;
use crate::error::{FastNjError, Result};
use crate::tree::{NodeId, Tree};

/// Clamp negatives while conserving the pair sum where possible.
fn conserve_pair(mut a: f64, mut b: f64) -> (f64, f64) {
    if a < 0.0 {
        b += a;
        a = 0.0;
    }
    if b < 0.0 {
        a = (a + b).max(0.0);
        b = 0.0;
    }
    (a, b)
}

impl Tree {
    fn corrected(&self, i: NodeId, j: NodeId) -> f64 {
        log_corrected_profile_distance(
            &self.node(i).profile,
            &self.node(j).profile,
            self.saturation,
        )
    }

    /// Raw length estimate for the branch above `x`, before clamping.
    ///
    /// For a leaf the estimate triangulates against the sibling and the
    /// root; for an internal node it averages over the node's two
    /// children against the sibling and the root.
    fn raw_branch_length(&self, x: NodeId, root: NodeId) -> Result<f64> {
        let sib = self.sibling(x)?;
        let node = self.node(x);
        if node.is_leaf {
            let d_xr = self.corrected(x, root);
            let d_xs = self.corrected(x, sib);
            let d_sr = self.corrected(sib, root);
            Ok((d_xr + d_xs - d_sr) / 2.0)
        } else {
            if node.children.len() != 2 {
                return Err(FastNjError::Topology(format!(
                    "node {} has {} children, expected 2",
                    x,
                    node.children.len()
                )));
            }
            let a = node.children[0];
            let b = node.children[1];
            let outer = (self.corrected(a, root)
                + self.corrected(a, sib)
                + self.corrected(b, root)
                + self.corrected(b, sib))
                / 4.0;
            let inner = (self.corrected(a, b) + self.corrected(root, sib)) / 2.0;
            Ok(outer - inner)
        }
    }

    /// Assign a branch length to every node. The root gets zero; every
    /// other node is estimated jointly with its sibling.
    pub fn calculate_branch_lengths(&mut self) -> Result<()> {
        let root = self.root().ok_or_else(|| {
            FastNjError::Topology("branch lengths before topology construction".into())
        })?;
        self.node_mut(root).branch_length = 0.0;
        for id in self.postorder(root) {
            let children = self.node(id).children.clone();
            if children.len() != 2 {
                continue;
            }
            let raw_x = self.raw_branch_length(children[0], root)?;
            let raw_y = self.raw_branch_length(children[1], root)?;
            let (lx, ly) = conserve_pair(raw_x, raw_y);
            self.node_mut(children[0]).branch_length = lx;
            self.node_mut(children[1]).branch_length = ly;
        }
        Ok(())
    }
}
