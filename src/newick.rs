//! Newick serialization of a finished tree.
//!
//! Leaves render as `name:length`; internal nodes render their children
//! in parentheses (leaf children before subtree children) followed by an
//! optional support value and the branch length. Lengths print with at
//! most ten decimal places, trailing zeros trimmed.

use crate::error::{FastNjError, Result};
use crate::tree::{NodeId, Tree};

/// Fixed-precision float with trailing zeros (and a bare trailing dot)
/// removed, so `0.25` renders as `0.25` and `0.0` as `0`.
fn format_value(v: f64) -> String {
    let mut s = format!("{:.10}", v);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
    let node = tree.node(id);
    if node.is_leaf {
        out.push_str(&node.name);
    } else {
        // Leaf children print before subtree children; ties keep the
        // stored child order.
        let mut children = node.children.clone();
        children.sort_by_key(|&c| !tree.node(c).is_leaf);
        out.push('(');
        for (i, &child) in children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_node(tree, child, out);
        }
        out.push(')');
        if let Some(support) = node.support {
            out.push_str(&format_value(support));
        }
    }
    out.push(':');
    out.push_str(&format_value(node.branch_length));
}

/// Serialize the tree rooted at its recorded root, terminated with `;`.
pub fn write(tree: &Tree) -> Result<String> {
    let root = tree.root().ok_or_else(|| {
        FastNjError::Topology("serialization before topology construction".into())
    })?;
    let mut out = String::new();
    write_node(tree, root, &mut out);
    out.push(';');
    Ok(out)
}
