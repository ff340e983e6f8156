//! Max-flow / min-cut on a two-terminal network.
//!
//! Boykov-Kolmogorov algorithm: a source tree and a sink tree are grown
//! towards each other until an arc joins them, flow is pushed along the
//! joined path, and the trees are repaired by re-parenting the orphans the
//! push created instead of being rebuilt. On pixel grids, where most
//! augmenting paths are short, this beats phase-based algorithms by a wide
//! margin. All walks use explicit loops, so long paths cannot overflow the
//! call stack.
//!
//! Arcs between inner nodes are stored in pairs: arc `a` and its residual
//! twin `a ^ 1`. Terminal arcs are folded into one signed residual per node.

use std::collections::VecDeque;

/// End of an adjacency list, or no parent arc.
const NO_ARC: u32 = u32::MAX;
/// Parent marker of a node attached directly to its terminal.
const TERMINAL: u32 = u32::MAX - 1;
/// Parent marker of a node that lost its parent during augmentation.
const ORPHAN: u32 = u32::MAX - 2;
/// Residual capacities at or below this are treated as saturated.
const CAPACITY_EPSILON: f64 = 1e-9;

/// Side of the minimum cut a node ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutSide {
    /// Reachable from the source in the residual network
    Source,
    /// Can reach the sink in the residual network
    Sink,
    /// Connected to neither terminal after the flow saturated
    Orphan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tree {
    Source,
    Sink,
}

impl Tree {
    /// Arc parity that points along the tree's flow direction.
    #[inline]
    const fn bit(self) -> u32 {
        match self {
            Self::Source => 0,
            Self::Sink => 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Vertex {
    first: u32,
    /// Residual terminal capacity: positive towards the source, negative towards the sink
    terminal: f64,
    /// Arc from this node to its parent in the search tree
    parent: u32,
    tree: Tree,
    timestamp: u32,
    dist: u32,
    active: bool,
}

impl Vertex {
    const fn new() -> Self {
        Self {
            first: NO_ARC,
            terminal: 0.0,
            parent: NO_ARC,
            tree: Tree::Source,
            timestamp: 0,
            dist: 0,
            active: false,
        }
    }
}

/// Flow network over `nodes` inner nodes plus a source and a sink terminal.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    vertices: Vec<Vertex>,
    head: Vec<u32>,
    next: Vec<u32>,
    capacity: Vec<f64>,
    flow: f64,
}

impl FlowNetwork {
    /// Network with `nodes` inner nodes and room for `arc_pairs` inner edges.
    pub fn with_capacity(nodes: usize, arc_pairs: usize) -> Self {
        Self {
            vertices: vec![Vertex::new(); nodes],
            head: Vec::with_capacity(arc_pairs * 2),
            next: Vec::with_capacity(arc_pairs * 2),
            capacity: Vec::with_capacity(arc_pairs * 2),
            flow: 0.0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.vertices.len()
    }

    /// Connects `node` to the terminals. Repeated calls accumulate.
    ///
    /// The common part of both capacities is pushed straight from source to
    /// sink, so only the difference stays in the network.
    pub fn add_terminal_weights(&mut self, node: usize, source_capacity: f64, sink_capacity: f64) {
        let residual = self.vertices[node].terminal;
        let (mut source, mut sink) = (source_capacity, sink_capacity);
        if residual > 0.0 {
            source += residual;
        } else {
            sink -= residual;
        }
        self.flow += source.min(sink);
        self.vertices[node].terminal = source - sink;
    }

    /// Adds an edge between two inner nodes with independent capacities per direction.
    pub fn add_edge(&mut self, a: usize, b: usize, capacity: f64, reverse_capacity: f64) {
        let arc = self.head.len() as u32;

        self.head.push(b as u32);
        self.capacity.push(capacity);
        self.next.push(self.vertices[a].first);
        self.vertices[a].first = arc;

        self.head.push(a as u32);
        self.capacity.push(reverse_capacity);
        self.next.push(self.vertices[b].first);
        self.vertices[b].first = arc + 1;
    }

    /// Saturates the network and returns the total flow pushed, including
    /// the flow pushed directly by [`add_terminal_weights`](Self::add_terminal_weights).
    pub fn max_flow(&mut self) -> f64 {
        let mut active = VecDeque::new();
        let mut orphans = Vec::new();

        for (index, vertex) in self.vertices.iter_mut().enumerate() {
            vertex.timestamp = 0;
            vertex.active = false;
            if vertex.terminal.abs() > CAPACITY_EPSILON {
                vertex.parent = TERMINAL;
                vertex.tree = if vertex.terminal > 0.0 {
                    Tree::Source
                } else {
                    Tree::Sink
                };
                vertex.dist = 1;
                vertex.active = true;
                active.push_back(index as u32);
            } else {
                vertex.parent = NO_ARC;
            }
        }

        let mut time = 0;
        while let Some(bridge) = self.grow(&mut active) {
            self.augment(bridge, &mut orphans);
            time += 1;
            self.adopt(&mut orphans, &mut active, time);
        }
        self.flow
    }

    /// Expands both trees from the active nodes until an arc joins them.
    ///
    /// The returned arc leads from a source-tree node to a sink-tree node.
    fn grow(&mut self, active: &mut VecDeque<u32>) -> Option<u32> {
        while let Some(&front) = active.front() {
            let v = front as usize;
            if self.vertices[v].parent != NO_ARC {
                let tree = self.vertices[v].tree;
                let bit = tree.bit();
                let (stamp, dist) = (self.vertices[v].timestamp, self.vertices[v].dist);

                let mut arc = self.vertices[v].first;
                while arc != NO_ARC {
                    if self.capacity[(arc ^ bit) as usize] > CAPACITY_EPSILON {
                        let u = self.head[arc as usize] as usize;
                        let neighbor = &mut self.vertices[u];
                        if neighbor.parent == NO_ARC {
                            neighbor.tree = tree;
                            neighbor.parent = arc ^ 1;
                            neighbor.timestamp = stamp;
                            neighbor.dist = dist + 1;
                            if !neighbor.active {
                                neighbor.active = true;
                                active.push_back(u as u32);
                            }
                        } else if neighbor.tree != tree {
                            return Some(arc ^ bit);
                        } else if neighbor.dist > dist + 1 && neighbor.timestamp <= stamp {
                            // shorter route to the root
                            neighbor.parent = arc ^ 1;
                            neighbor.timestamp = stamp;
                            neighbor.dist = dist + 1;
                        }
                    }
                    arc = self.next[arc as usize];
                }
            }
            active.pop_front();
            self.vertices[v].active = false;
        }
        None
    }

    /// Pushes the bottleneck along the path through `bridge` and collects
    /// the nodes whose parent link saturated.
    fn augment(&mut self, bridge: u32, orphans: &mut Vec<u32>) {
        // k = 1 walks the source side from the bridge tail, k = 0 the sink side from its head
        let mut bottleneck = self.capacity[bridge as usize];
        for k in [1, 0] {
            let mut v = self.head[(bridge ^ k) as usize] as usize;
            loop {
                let parent = self.vertices[v].parent;
                if parent >= ORPHAN {
                    break;
                }
                bottleneck = bottleneck.min(self.capacity[(parent ^ k) as usize]);
                v = self.head[parent as usize] as usize;
            }
            bottleneck = bottleneck.min(self.vertices[v].terminal.abs());
        }

        self.capacity[bridge as usize] -= bottleneck;
        self.capacity[(bridge ^ 1) as usize] += bottleneck;
        self.flow += bottleneck;

        for k in [1, 0] {
            let mut v = self.head[(bridge ^ k) as usize] as usize;
            loop {
                let parent = self.vertices[v].parent;
                if parent >= ORPHAN {
                    break;
                }
                self.capacity[(parent ^ k ^ 1) as usize] += bottleneck;
                let forward = (parent ^ k) as usize;
                self.capacity[forward] -= bottleneck;
                if self.capacity[forward] <= CAPACITY_EPSILON {
                    self.vertices[v].parent = ORPHAN;
                    orphans.push(v as u32);
                }
                v = self.head[parent as usize] as usize;
            }

            let root = &mut self.vertices[v];
            if k == 1 {
                root.terminal -= bottleneck;
            } else {
                root.terminal += bottleneck;
            }
            if root.terminal.abs() <= CAPACITY_EPSILON {
                root.parent = ORPHAN;
                orphans.push(v as u32);
            }
        }
    }

    /// Finds new parents for orphans, freeing the ones that have none.
    fn adopt(&mut self, orphans: &mut Vec<u32>, active: &mut VecDeque<u32>, time: u32) {
        while let Some(orphan) = orphans.pop() {
            let orphan = orphan as usize;
            let tree = self.vertices[orphan].tree;
            // parity of the arc from the orphan whose residual feeds the tree link
            let link = tree.bit() ^ 1;

            let mut best = NO_ARC;
            let mut best_dist = u32::MAX;
            let mut arc = self.vertices[orphan].first;
            while arc != NO_ARC {
                let u = self.head[arc as usize] as usize;
                if self.capacity[(arc ^ link) as usize] > CAPACITY_EPSILON
                    && self.vertices[u].tree == tree
                    && self.vertices[u].parent != NO_ARC
                {
                    if let Some(depth) = self.root_distance(u, time) {
                        if depth + 1 < best_dist {
                            best_dist = depth + 1;
                            best = arc;
                        }
                        self.stamp_path(u, depth, time);
                    }
                }
                arc = self.next[arc as usize];
            }

            if best != NO_ARC {
                let vertex = &mut self.vertices[orphan];
                vertex.parent = best;
                vertex.timestamp = time;
                vertex.dist = best_dist;
                continue;
            }

            self.vertices[orphan].parent = NO_ARC;
            self.vertices[orphan].timestamp = 0;
            let mut arc = self.vertices[orphan].first;
            while arc != NO_ARC {
                let u = self.head[arc as usize] as usize;
                let parent = self.vertices[u].parent;
                if self.vertices[u].tree == tree && parent != NO_ARC {
                    if self.capacity[(arc ^ link) as usize] > CAPACITY_EPSILON
                        && !self.vertices[u].active
                    {
                        self.vertices[u].active = true;
                        active.push_back(u as u32);
                    }
                    if parent < ORPHAN && self.head[parent as usize] as usize == orphan {
                        self.vertices[u].parent = ORPHAN;
                        orphans.push(u as u32);
                    }
                }
                arc = self.next[arc as usize];
            }
        }
    }

    /// Number of nodes from `start` up to its terminal, or `None` when the
    /// chain runs into an orphan.
    fn root_distance(&mut self, start: usize, time: u32) -> Option<u32> {
        let mut node = start;
        let mut depth = 0;
        loop {
            let vertex = &mut self.vertices[node];
            if vertex.timestamp == time {
                return Some(depth + vertex.dist);
            }
            depth += 1;
            match vertex.parent {
                TERMINAL => {
                    vertex.timestamp = time;
                    vertex.dist = 1;
                    return Some(depth);
                }
                ORPHAN | NO_ARC => return None,
                arc => node = self.head[arc as usize] as usize,
            }
        }
    }

    /// Caches the root distances found by [`root_distance`](Self::root_distance) along the chain.
    fn stamp_path(&mut self, start: usize, depth: u32, time: u32) {
        let mut node = start;
        let mut dist = depth;
        while self.vertices[node].timestamp != time {
            let vertex = &mut self.vertices[node];
            vertex.timestamp = time;
            vertex.dist = dist;
            dist -= 1;
            node = self.head[vertex.parent as usize] as usize;
        }
    }

    /// Side of the cut for every inner node, after [`max_flow`](Self::max_flow).
    pub fn cut_sides(&self) -> Vec<CutSide> {
        let from_source = self.residual_reach(Tree::Source);
        let to_sink = self.residual_reach(Tree::Sink);

        (0..self.vertices.len())
            .map(|node| {
                if from_source[node] {
                    CutSide::Source
                } else if to_sink[node] {
                    CutSide::Sink
                } else {
                    CutSide::Orphan
                }
            })
            .collect()
    }

    /// Nodes reachable from the source through unsaturated arcs, or for
    /// the sink, nodes that can still reach it.
    fn residual_reach(&self, terminal: Tree) -> Vec<bool> {
        let bit = terminal.bit();
        let mut seen: Vec<bool> = self
            .vertices
            .iter()
            .map(|vertex| match terminal {
                Tree::Source => vertex.terminal > CAPACITY_EPSILON,
                Tree::Sink => vertex.terminal < -CAPACITY_EPSILON,
            })
            .collect();
        let mut queue: VecDeque<usize> = (0..seen.len()).filter(|&node| seen[node]).collect();

        while let Some(node) = queue.pop_front() {
            let mut arc = self.vertices[node].first;
            while arc != NO_ARC {
                let to = self.head[arc as usize] as usize;
                if self.capacity[(arc ^ bit) as usize] > CAPACITY_EPSILON && !seen[to] {
                    seen[to] = true;
                    queue.push_back(to);
                }
                arc = self.next[arc as usize];
            }
        }
        seen
    }
}
