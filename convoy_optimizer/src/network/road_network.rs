use fxhash::FxHashMap;

use crate::problem::{DEPOT_ID_OFFSET, Distance, EXTRA_TASK_ID_OFFSET, NodeId};

/// Default congestion factor applied to every edge during peak windows
/// unless the instance overrides it.
pub const DEFAULT_PEAK_FACTOR: f64 = 0.3;

/// An undirected road segment between two network nodes.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub node_a: NodeId,
    pub node_b: NodeId,
    /// Length in kilometers.
    pub length: Distance,
    pub morning_factor: f64,
    pub evening_factor: f64,
}

impl Edge {
    pub fn new(node_a: NodeId, node_b: NodeId, length: Distance) -> Self {
        Self {
            node_a,
            node_b,
            length,
            morning_factor: DEFAULT_PEAK_FACTOR,
            evening_factor: DEFAULT_PEAK_FACTOR,
        }
    }
}

/// The road graph trucks travel on, with all-pairs shortest distances
/// precomputed by Floyd-Warshall into a flat `slot * n + slot` matrix.
///
/// Node ids follow the instance-file offset scheme (extra tasks +10000,
/// depots +20000). An id that is not a node verbatim is retried with its
/// range offset stripped; a pair that still cannot be resolved is
/// unreachable for trucks.
pub struct RoadNetwork {
    slots: FxHashMap<NodeId, usize>,
    num_nodes: usize,
    shortest: Vec<Distance>,
    peak_factors: FxHashMap<(NodeId, NodeId), (f64, f64)>,
}

impl RoadNetwork {
    pub fn new(edges: &[Edge]) -> Self {
        let mut slots = FxHashMap::default();
        for edge in edges {
            let next = slots.len();
            slots.entry(edge.node_a).or_insert(next);
            let next = slots.len();
            slots.entry(edge.node_b).or_insert(next);
        }

        let n = slots.len();
        let mut shortest = vec![Distance::INFINITY; n * n];
        for i in 0..n {
            shortest[i * n + i] = 0.0;
        }

        let mut peak_factors = FxHashMap::default();
        for edge in edges {
            let a = slots[&edge.node_a];
            let b = slots[&edge.node_b];
            if edge.length < shortest[a * n + b] {
                shortest[a * n + b] = edge.length;
                shortest[b * n + a] = edge.length;
            }
            let factors = (edge.morning_factor, edge.evening_factor);
            peak_factors.insert((edge.node_a, edge.node_b), factors);
            peak_factors.insert((edge.node_b, edge.node_a), factors);
        }

        for k in 0..n {
            for i in 0..n {
                let ik = shortest[i * n + k];
                if ik.is_infinite() {
                    continue;
                }
                for j in 0..n {
                    let through_k = ik + shortest[k * n + j];
                    if through_k < shortest[i * n + j] {
                        shortest[i * n + j] = through_k;
                    }
                }
            }
        }

        Self {
            slots,
            num_nodes: n,
            shortest,
            peak_factors,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Shortest road distance between two node ids, or `None` when either
    /// endpoint is off the network or no path connects them.
    pub fn shortest_distance(&self, from: NodeId, to: NodeId) -> Option<Distance> {
        if from == to {
            return Some(0.0);
        }

        let a = self.resolve(from)?;
        let b = self.resolve(to)?;
        let distance = self.shortest[a * self.num_nodes + b];

        distance.is_finite().then_some(distance)
    }

    /// Per-directed-pair (morning, evening) congestion factors; `None` for
    /// pairs that are not adjacent on the network.
    pub fn peak_factors(&self, from: NodeId, to: NodeId) -> Option<(f64, f64)> {
        for from in id_variants(from) {
            for to in id_variants(to) {
                if let Some(&factors) = self.peak_factors.get(&(from, to)) {
                    return Some(factors);
                }
            }
        }
        None
    }

    /// Overrides the congestion factors of a pair, in both directions.
    pub fn set_peak_factors(&mut self, a: NodeId, b: NodeId, morning: f64, evening: f64) {
        self.peak_factors.insert((a, b), (morning, evening));
        self.peak_factors.insert((b, a), (morning, evening));
    }

    fn resolve(&self, id: NodeId) -> Option<usize> {
        id_variants(id).find_map(|id| self.slots.get(&id).copied())
    }
}

/// The id as given, then with its range offset stripped. Edge lists refer
/// to nodes by their raw file ids, while tasks and depots carry offset ids
/// after load; both spellings must find the same node.
fn id_variants(id: NodeId) -> impl Iterator<Item = NodeId> {
    let stripped = if id >= DEPOT_ID_OFFSET {
        Some(id - DEPOT_ID_OFFSET)
    } else if id >= EXTRA_TASK_ID_OFFSET {
        Some(id - EXTRA_TASK_ID_OFFSET)
    } else {
        None
    };

    std::iter::once(id).chain(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_network() -> RoadNetwork {
        // 1 -- 2 -- 3, with a long bypass 1 -- 3.
        RoadNetwork::new(&[
            Edge::new(1, 2, 4.0),
            Edge::new(2, 3, 5.0),
            Edge::new(1, 3, 20.0),
        ])
    }

    #[test]
    fn test_shortest_distance_via_intermediate() {
        let network = line_network();
        assert_eq!(network.shortest_distance(1, 3), Some(9.0));
        assert_eq!(network.shortest_distance(3, 1), Some(9.0));
    }

    #[test]
    fn test_self_distance_is_zero() {
        let network = line_network();
        assert_eq!(network.shortest_distance(2, 2), Some(0.0));
        // Even for ids the network has never seen.
        assert_eq!(network.shortest_distance(99, 99), Some(0.0));
    }

    #[test]
    fn test_unknown_node_is_unreachable() {
        let network = line_network();
        assert_eq!(network.shortest_distance(1, 99), None);
    }

    #[test]
    fn test_offset_ids_resolve_to_raw_nodes() {
        let network = line_network();
        // Depot 20001 sits on node 1; extra task 10003 on node 3.
        assert_eq!(network.shortest_distance(20001, 3), Some(9.0));
        assert_eq!(network.shortest_distance(20001, 10003), Some(9.0));
    }

    #[test]
    fn test_peak_factor_override() {
        let mut network = line_network();
        assert_eq!(
            network.peak_factors(1, 2),
            Some((DEFAULT_PEAK_FACTOR, DEFAULT_PEAK_FACTOR))
        );

        network.set_peak_factors(1, 2, 0.5, 0.8);
        assert_eq!(network.peak_factors(2, 1), Some((0.5, 0.8)));
        // Non-adjacent pair carries no factor.
        assert_eq!(network.peak_factors(1, 3), Some((DEFAULT_PEAK_FACTOR, DEFAULT_PEAK_FACTOR)));
        assert_eq!(network.peak_factors(2, 99), None);
    }
}
