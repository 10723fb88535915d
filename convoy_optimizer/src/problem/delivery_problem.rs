use fxhash::FxHashMap;

use crate::{
    network::{road_network::RoadNetwork, traffic::TrafficModel},
    problem::{
        Distance, NodeId, RENDEZVOUS_ID_OFFSET, Time,
        depot::{Depot, DepotIdx},
        location::Location,
        task::{Task, TaskIdx},
        vehicle::{Vehicle, VehicleIdx},
    },
};

pub struct DeliveryProblemParams {
    pub tasks: Vec<Task>,
    pub vehicles: Vec<Vehicle>,
    pub depots: Vec<Depot>,
    pub network: RoadNetwork,
    pub traffic: TrafficModel,
    pub time_weight: f64,
    pub initial_task_count: usize,
}

/// The immutable problem instance: demand points, fleet, depots and the
/// road network, plus the distance / travel-time oracle everything else
/// queries. Tasks are ordered initial-first, extras after.
pub struct DeliveryProblem {
    tasks: Vec<Task>,
    vehicles: Vec<Vehicle>,
    depots: Vec<Depot>,
    network: RoadNetwork,
    traffic: TrafficModel,
    time_weight: f64,
    initial_task_count: usize,

    task_index: FxHashMap<NodeId, TaskIdx>,
    depot_index: FxHashMap<NodeId, DepotIdx>,
}

impl DeliveryProblem {
    pub fn new(params: DeliveryProblemParams) -> Self {
        debug_assert!(params.initial_task_count <= params.tasks.len());
        debug_assert!(
            params.tasks[..params.initial_task_count]
                .iter()
                .all(|task| !task.is_extra())
        );

        let task_index = params
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.external_id(), TaskIdx::new(i)))
            .collect();

        let depot_index = params
            .depots
            .iter()
            .enumerate()
            .map(|(i, depot)| (depot.external_id(), DepotIdx::new(i)))
            .collect();

        Self {
            tasks: params.tasks,
            vehicles: params.vehicles,
            depots: params.depots,
            network: params.network,
            traffic: params.traffic,
            time_weight: params.time_weight,
            initial_task_count: params.initial_task_count,
            task_index,
            depot_index,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, idx: TaskIdx) -> &Task {
        &self.tasks[idx]
    }

    pub fn task_idx(&self, external_id: NodeId) -> Option<TaskIdx> {
        self.task_index.get(&external_id).copied()
    }

    pub fn initial_task_count(&self) -> usize {
        self.initial_task_count
    }

    pub fn initial_task_indices(&self) -> impl Iterator<Item = TaskIdx> {
        (0..self.initial_task_count).map(TaskIdx::new)
    }

    pub fn extra_task_indices(&self) -> impl Iterator<Item = TaskIdx> {
        (self.initial_task_count..self.tasks.len()).map(TaskIdx::new)
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, idx: VehicleIdx) -> &Vehicle {
        &self.vehicles[idx]
    }

    pub fn vehicle_indices(&self) -> impl Iterator<Item = VehicleIdx> {
        (0..self.vehicles.len()).map(VehicleIdx::new)
    }

    pub fn depots(&self) -> &[Depot] {
        &self.depots
    }

    pub fn depot(&self, idx: DepotIdx) -> &Depot {
        &self.depots[idx]
    }

    pub fn depot_idx(&self, external_id: NodeId) -> Option<DepotIdx> {
        self.depot_index.get(&external_id).copied()
    }

    pub fn is_depot_id(&self, external_id: NodeId) -> bool {
        self.depot_index.contains_key(&external_id)
    }

    /// True when the depot bases drones. Depots are homogeneous in the
    /// instances we load, so the first vehicle decides.
    pub fn depot_is_drone_base(&self, idx: DepotIdx) -> bool {
        self.depot(idx)
            .vehicles()
            .first()
            .is_some_and(|&v| self.vehicle(v).is_drone())
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn traffic(&self) -> &TrafficModel {
        &self.traffic
    }

    /// Weight of the makespan term in the fitness; the cost term gets the
    /// complement.
    pub fn time_weight(&self) -> f64 {
        self.time_weight
    }

    fn location_of(&self, id: NodeId) -> Option<&Location> {
        if let Some(&task) = self.task_index.get(&id) {
            return Some(self.tasks[task].location());
        }
        if let Some(&depot) = self.depot_index.get(&id) {
            return Some(self.depots[depot].location());
        }
        None
    }

    /// Physical distance between two stops: straight-line for drones, road
    /// network shortest path for trucks (infinite when unconnected).
    /// Rendezvous markers are stripped before lookup.
    pub fn distance(&self, from: NodeId, to: NodeId, is_drone: bool) -> Distance {
        let from = strip_rendezvous_marker(from);
        let to = strip_rendezvous_marker(to);

        if from == to {
            return 0.0;
        }

        if is_drone {
            match (self.location_of(from), self.location_of(to)) {
                (Some(a), Some(b)) => a.euclidean_distance(b),
                _ => Distance::INFINITY,
            }
        } else {
            self.network
                .shortest_distance(from, to)
                .unwrap_or(Distance::INFINITY)
        }
    }

    /// Travel time of one segment starting at `start_time`. Drones fly
    /// straight lines and ignore congestion; trucks follow the network and,
    /// when `consider_traffic` is set, the peak-window speed factors.
    pub fn travel_time(
        &self,
        from: NodeId,
        to: NodeId,
        start_time: Time,
        vehicle: &Vehicle,
        consider_traffic: bool,
    ) -> Time {
        let is_drone = vehicle.is_drone();
        let distance = self.distance(from, to, is_drone);

        if is_drone || !consider_traffic {
            return distance / vehicle.speed();
        }

        let factors = self.network.peak_factors(
            strip_rendezvous_marker(from),
            strip_rendezvous_marker(to),
        );
        self.traffic
            .segment_travel_time(distance, start_time, vehicle.speed(), factors)
    }
}

fn strip_rendezvous_marker(id: NodeId) -> NodeId {
    if id >= RENDEZVOUS_ID_OFFSET {
        id - RENDEZVOUS_ID_OFFSET
    } else {
        id
    }
}
