use hashbrown::HashSet;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use petgraph::Direction;

use crate::model::Robot;

/// Link-index digraph of a robot: one node per link, one edge per joint
/// (parent -> child), weighted with the joint index.
///
/// Joints naming a link that does not exist contribute no edge.
#[derive(Debug)]
pub struct KinematicGraph {
    graph: DiGraphMap<usize, usize>,
}

impl KinematicGraph {
    pub fn new(robot: &Robot) -> Self {
        let mut graph = DiGraphMap::new();

        // add all nodes to graph
        for i in 0..robot.links().len() {
            graph.add_node(i);
        }

        // add all edges to graph
        for (joint_index, joint) in robot.joints().iter().enumerate() {
            if let (Some(parent), Some(child)) =
                (robot.link_index(&joint.parent), robot.link_index(&joint.child))
            {
                graph.add_edge(parent, child, joint_index);
            }
        }

        Self { graph }
    }

    /// Links without an incoming edge, in declaration order.
    pub fn roots(&self) -> Vec<usize> {
        let mut roots = self
            .graph
            .nodes()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect::<Vec<_>>();
        roots.sort_unstable();
        roots
    }

    // BFS traversal from `start`, `start` included
    // every parent node is visited before its children
    pub fn bfs(&self, start: usize) -> Vec<usize> {
        if !self.graph.contains_node(start) {
            return Vec::new();
        }
        let mut bfs = Bfs::new(&self.graph, start);
        let mut order = Vec::new();
        while let Some(node) = bfs.next(&self.graph) {
            order.push(node);
        }
        order
    }

    /// Every link reachable from `start` along outgoing joints, `start` included.
    pub fn successors(&self, start: usize) -> HashSet<usize> {
        self.bfs(start).into_iter().collect()
    }

    pub fn parent(&self, link: usize) -> Option<usize> {
        self.graph
            .neighbors_directed(link, Direction::Incoming)
            .next()
    }
}

impl Robot {
    /// Name of the root link of the kinematic tree.
    ///
    /// With several candidates (a forest) the first one in declaration order
    /// is returned; with none (every link is some joint's child) `None`.
    /// A joint's child counts as non-root even if its parent is unknown.
    pub fn base_link(&self) -> Option<&str> {
        let children = self
            .joints()
            .iter()
            .map(|j| j.child.as_str())
            .collect::<HashSet<_>>();
        self.links()
            .iter()
            .map(|l| l.name.as_str())
            .find(|name| !children.contains(name))
    }
}
