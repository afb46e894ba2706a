use palette::Srgb;
use tracing::debug;

use super::opaque_rgb;
use crate::color_space::Rgb;

/// Depth at which nodes stop branching. Levels `0..LEAF_LEVEL` each consume one
/// bit of every channel, most significant first.
pub const LEAF_LEVEL: u8 = 7;

#[derive(Debug, Clone, Default)]
struct OctreeNode {
    level: u8,
    pixel_count: u64,
    sums: [u64; 3],
    /// Indices into the arena.
    children: [Option<usize>; 8],
}

impl OctreeNode {
    fn mean(&self) -> Rgb {
        let channel = |sum: u64| (sum as f64 / self.pixel_count as f64).round().min(255.0) as u8;
        Srgb::new(channel(self.sums[0]), channel(self.sums[1]), channel(self.sums[2]))
    }
}

#[inline]
fn child_index(color: [u8; 3], level: u8) -> usize {
    let shift = 7 - level;
    let [r, g, b] = color.map(|c| ((c >> shift) & 1) as usize);
    (r << 2) | (g << 1) | b
}

/// Color-frequency trie over RGB bit planes, stored as a flat arena.
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
}

impl Default for Octree {
    fn default() -> Self {
        Self::new()
    }
}

impl Octree {
    pub fn new() -> Self {
        Self {
            nodes: vec![OctreeNode::default()],
        }
    }

    /// Record one pixel on every node along its path, creating nodes as needed.
    pub fn add_color(&mut self, color: [u8; 3]) {
        let mut node = 0;
        loop {
            let current = &mut self.nodes[node];
            current.pixel_count += 1;
            for (sum, c) in current.sums.iter_mut().zip(color) {
                *sum += c as u64;
            }

            let level = current.level;
            if level == LEAF_LEVEL {
                break;
            }

            let slot = child_index(color, level);
            let existing = self.nodes[node].children[slot];
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(OctreeNode {
                        level: level + 1,
                        ..OctreeNode::default()
                    });
                    self.nodes[node].children[slot] = Some(child);
                    child
                }
            };
        }
    }

    /// Leaf indices in depth-first, child-slot order.
    fn leaves(&self) -> Vec<usize> {
        let mut leaves = Vec::new();
        if self.nodes[0].pixel_count == 0 {
            return leaves;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.level == LEAF_LEVEL {
                leaves.push(index);
                continue;
            }
            stack.extend(node.children.iter().rev().flatten());
        }
        leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Mean colors of the `k` most populated leaves, most populated first.
    /// Ties keep depth-first order.
    pub fn palette(&self, k: usize) -> Vec<Rgb> {
        let mut leaves = self.leaves();
        leaves.sort_by(|&a, &b| self.nodes[b].pixel_count.cmp(&self.nodes[a].pixel_count));
        leaves
            .into_iter()
            .take(k)
            .map(|i| self.nodes[i].mean())
            .collect()
    }
}

/// Octree quantization of the opaque pixels of an RGBA buffer. Returns fewer
/// than `k` colors when the image has fewer populated leaves.
pub fn quantize(rgba: &[u8], k: usize) -> Vec<Rgb> {
    let mut tree = Octree::new();
    for color in opaque_rgb(rgba) {
        tree.add_color(color);
    }
    let palette = tree.palette(k);
    debug!(
        nodes = tree.nodes.len(),
        centroids = palette.len(),
        "octree built"
    );
    palette
}
