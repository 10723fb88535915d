use std::path::Path;

use tracing::{debug, info};

use crate::{
    network::{
        road_network::{Edge, RoadNetwork},
        traffic::TrafficModel,
    },
    problem::{
        DEPOT_ID_OFFSET, EXTRA_TASK_ID_OFFSET, NodeId,
        delivery_problem::{DeliveryProblem, DeliveryProblemParams},
        depot::{Depot, DepotIdx},
        location::Location,
        task::Task,
        vehicle::{Vehicle, VehicleIdx, VehicleKind},
    },
};

/// Loads a whitespace-token instance file:
///
/// counts, fleet parameters, the edge list (lengths in meters), the
/// initial demand, truck depots, drone depots, the extra demand (release
/// in minutes), and optional trailing per-edge peak-factor overrides
/// until EOF. Ids are offset on load: extra tasks +10000, depots +20000.
pub fn load_instance<P: AsRef<Path>>(path: P) -> Result<DeliveryProblem, anyhow::Error> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(text: &str) -> Result<DeliveryProblem, anyhow::Error> {
    let mut tokens = Tokens::new(text);

    let initial_count = tokens.next_usize("initial demand count")?;
    let extra_count = tokens.next_usize("extra demand count")?;
    let truck_depot_count = tokens.next_usize("truck depot count")?;
    let drone_depot_count = tokens.next_usize("drone depot count")?;

    let drone_speed = tokens.next_f64("drone speed")?;
    let truck_speed = tokens.next_f64("truck speed")?;
    let drone_unit_cost = tokens.next_f64("drone unit cost")?;
    let truck_unit_cost = tokens.next_f64("truck unit cost")?;
    let drone_max_load = tokens.next_f64("drone max load")?;
    let drone_max_battery = tokens.next_f64("drone max battery")?;
    let time_weight = tokens.next_f64("time weight")?;

    let edge_count = tokens.next_usize("edge count")?;
    let mut edges = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let node_a = tokens.next_id("edge endpoint")?;
        let node_b = tokens.next_id("edge endpoint")?;
        let meters = tokens.next_f64("edge length")?;
        edges.push(Edge::new(node_a, node_b, meters / 1000.0));
    }

    let mut tasks = Vec::with_capacity(initial_count + extra_count);
    for _ in 0..initial_count {
        let id = tokens.next_id("task id")?;
        let lon = tokens.next_f64("task longitude")?;
        let lat = tokens.next_f64("task latitude")?;
        let pickup = tokens.next_f64("task pickup weight")?;
        let delivery = tokens.next_f64("task delivery weight")?;
        let location = Location::from_lon_lat(lon, lat);
        debug!(id, x = location.x(), y = location.y(), "initial task");
        tasks.push(Task::new(id, location, 0.0, pickup, delivery));
    }

    let mut depots = Vec::with_capacity(truck_depot_count + drone_depot_count);
    let mut vehicles: Vec<Vehicle> = Vec::new();
    let mut vehicle_id: NodeId = 1;

    let mut read_depots = |tokens: &mut Tokens<'_>,
                           depots: &mut Vec<Depot>,
                           vehicles: &mut Vec<Vehicle>,
                           count: usize,
                           drones: bool|
     -> Result<(), anyhow::Error> {
        for _ in 0..count {
            let id = tokens.next_id("depot id")?;
            let lon = tokens.next_f64("depot longitude")?;
            let lat = tokens.next_f64("depot latitude")?;
            let fleet_size = tokens.next_usize("depot fleet size")?;

            let location = Location::from_lon_lat(lon, lat);
            debug!(id, x = location.x(), y = location.y(), fleet_size, drones, "depot");

            let depot_idx = DepotIdx::new(depots.len());
            let mut depot = Depot::new(id + DEPOT_ID_OFFSET, location);
            for _ in 0..fleet_size {
                let (kind, speed, cost) = if drones {
                    let kind = VehicleKind::Drone {
                        max_load: drone_max_load,
                        max_battery: drone_max_battery,
                    };
                    (kind, drone_speed, drone_unit_cost)
                } else {
                    (VehicleKind::Truck, truck_speed, truck_unit_cost)
                };
                depot.add_vehicle(VehicleIdx::new(vehicles.len()));
                vehicles.push(Vehicle::new(vehicle_id, kind, speed, cost, depot_idx));
                vehicle_id += 1;
            }
            depots.push(depot);
        }
        Ok(())
    };

    read_depots(&mut tokens, &mut depots, &mut vehicles, truck_depot_count, false)?;
    read_depots(&mut tokens, &mut depots, &mut vehicles, drone_depot_count, true)?;

    for _ in 0..extra_count {
        let id = tokens.next_id("extra task id")?;
        let lon = tokens.next_f64("extra task longitude")?;
        let lat = tokens.next_f64("extra task latitude")?;
        let pickup = tokens.next_f64("extra task pickup weight")?;
        let delivery = tokens.next_f64("extra task delivery weight")?;
        let release_minutes = tokens.next_f64("extra task release time")?;

        let location = Location::from_lon_lat(lon, lat);
        debug!(id, x = location.x(), y = location.y(), "extra task");
        tasks.push(Task::new(
            id + EXTRA_TASK_ID_OFFSET,
            location,
            release_minutes / 60.0,
            pickup,
            delivery,
        ));
    }

    let mut network = RoadNetwork::new(&edges);

    // Trailing per-edge peak-factor overrides, until the tokens run out.
    while let Some(node_a) = tokens.try_next_id()? {
        let node_b = tokens.next_id("peak factor endpoint")?;
        let morning = tokens.next_f64("morning peak factor")?;
        let evening = tokens.next_f64("evening peak factor")?;
        network.set_peak_factors(node_a, node_b, morning, evening);
    }

    let drone_count = vehicles.iter().filter(|v| v.is_drone()).count();
    info!(
        initial = initial_count,
        extra = extra_count,
        depots = depots.len(),
        trucks = vehicles.len() - drone_count,
        drones = drone_count,
        edges = edges.len(),
        "instance loaded"
    );

    Ok(DeliveryProblem::new(DeliveryProblemParams {
        tasks,
        vehicles,
        depots,
        network,
        traffic: TrafficModel::default(),
        time_weight,
        initial_task_count: initial_count,
    }))
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next_token(&mut self, what: &str) -> Result<&'a str, anyhow::Error> {
        self.inner
            .next()
            .ok_or_else(|| anyhow::anyhow!("unexpected end of input, expected {what}"))
    }

    fn next_usize(&mut self, what: &str) -> Result<usize, anyhow::Error> {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {what}: {token}"))
    }

    fn next_id(&mut self, what: &str) -> Result<NodeId, anyhow::Error> {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {what}: {token}"))
    }

    fn try_next_id(&mut self) -> Result<Option<NodeId>, anyhow::Error> {
        match self.inner.next() {
            None => Ok(None),
            Some(token) => token
                .parse()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("invalid node id: {token}")),
        }
    }

    fn next_f64(&mut self, what: &str) -> Result<f64, anyhow::Error> {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {what}: {token}"))
    }
}
