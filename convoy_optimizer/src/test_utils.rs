use crate::{
    network::{
        road_network::{Edge, RoadNetwork},
        traffic::TrafficModel,
    },
    problem::{
        DEPOT_ID_OFFSET, EXTRA_TASK_ID_OFFSET, NodeId, Time, Weight,
        delivery_problem::{DeliveryProblem, DeliveryProblemParams},
        depot::{Depot, DepotIdx},
        location::Location,
        task::Task,
        vehicle::{Vehicle, VehicleIdx, VehicleKind},
    },
};

/// In-code instance assembly for tests. Coordinates are plain cartesian km
/// so distances are easy to reason about; ids follow the same offset
/// scheme the parser applies.
pub struct ProblemBuilder {
    tasks: Vec<Task>,
    extras: Vec<Task>,
    depots: Vec<Depot>,
    depot_fleets: Vec<(usize, VehicleKind)>,
    edges: Vec<Edge>,
    truck_speed: f64,
    drone_speed: f64,
    truck_cost: f64,
    drone_cost: f64,
    time_weight: f64,
}

impl Default for ProblemBuilder {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            extras: Vec::new(),
            depots: Vec::new(),
            depot_fleets: Vec::new(),
            edges: Vec::new(),
            truck_speed: 50.0,
            drone_speed: 10.0,
            truck_cost: 1.0,
            drone_cost: 1.0,
            time_weight: 0.5,
        }
    }
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn truck_speed(mut self, speed: f64) -> Self {
        self.truck_speed = speed;
        self
    }

    pub fn drone_speed(mut self, speed: f64) -> Self {
        self.drone_speed = speed;
        self
    }

    pub fn costs(mut self, truck: f64, drone: f64) -> Self {
        self.truck_cost = truck;
        self.drone_cost = drone;
        self
    }

    pub fn time_weight(mut self, weight: f64) -> Self {
        self.time_weight = weight;
        self
    }

    /// An initial task with no demand weight.
    pub fn task(self, id: NodeId, x: f64, y: f64) -> Self {
        self.task_with_weights(id, x, y, 0.0, 0.0)
    }

    pub fn task_with_weights(
        mut self,
        id: NodeId,
        x: f64,
        y: f64,
        pickup: Weight,
        delivery: Weight,
    ) -> Self {
        self.tasks.push(Task::new(
            id,
            Location::from_cartesian(x, y),
            0.0,
            pickup,
            delivery,
        ));
        self
    }

    /// An extra task; `id` is the raw file id, offset on build.
    pub fn extra_task(mut self, id: NodeId, x: f64, y: f64, release: Time) -> Self {
        self.extras.push(Task::new(
            id + EXTRA_TASK_ID_OFFSET,
            Location::from_cartesian(x, y),
            release,
            0.0,
            0.0,
        ));
        self
    }

    /// A depot of trucks; `id` is the raw file id, offset on build.
    pub fn truck_depot(mut self, id: NodeId, x: f64, y: f64, count: usize) -> Self {
        self.depots.push(Depot::new(
            id + DEPOT_ID_OFFSET,
            Location::from_cartesian(x, y),
        ));
        self.depot_fleets.push((count, VehicleKind::Truck));
        self
    }

    pub fn drone_depot(
        mut self,
        id: NodeId,
        x: f64,
        y: f64,
        count: usize,
        max_load: Weight,
        max_battery: Time,
    ) -> Self {
        self.depots.push(Depot::new(
            id + DEPOT_ID_OFFSET,
            Location::from_cartesian(x, y),
        ));
        self.depot_fleets.push((
            count,
            VehicleKind::Drone {
                max_load,
                max_battery,
            },
        ));
        self
    }

    pub fn edge(mut self, a: NodeId, b: NodeId, length: f64) -> Self {
        self.edges.push(Edge::new(a, b, length));
        self
    }

    pub fn build(self) -> DeliveryProblem {
        let mut tasks = self.tasks;
        let initial_task_count = tasks.len();
        tasks.extend(self.extras);

        let mut depots = self.depots;
        let mut vehicles = Vec::new();
        let mut vehicle_id = 1;
        for (depot_slot, (count, kind)) in self.depot_fleets.into_iter().enumerate() {
            for _ in 0..count {
                let (speed, cost) = match kind {
                    VehicleKind::Truck => (self.truck_speed, self.truck_cost),
                    VehicleKind::Drone { .. } => (self.drone_speed, self.drone_cost),
                };
                let idx = VehicleIdx::new(vehicles.len());
                vehicles.push(Vehicle::new(
                    vehicle_id,
                    kind,
                    speed,
                    cost,
                    DepotIdx::new(depot_slot),
                ));
                depots[depot_slot].add_vehicle(idx);
                vehicle_id += 1;
            }
        }

        DeliveryProblem::new(DeliveryProblemParams {
            tasks,
            vehicles,
            depots,
            network: RoadNetwork::new(&self.edges),
            traffic: TrafficModel::default(),
            time_weight: self.time_weight,
            initial_task_count,
        })
    }
}
