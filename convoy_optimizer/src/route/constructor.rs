use crate::{
    problem::{Distance, NodeId, Time, Weight, delivery_problem::DeliveryProblem, task::TaskIdx,
        vehicle::{Vehicle, VehicleIdx},
    },
    route::{plan::Route, stop::Stop},
};

/// Fraction of the battery a drone must still hold after reaching a
/// candidate task.
pub const BATTERY_RESERVE_RATIO: f64 = 0.10;

/// Outer-loop cap, as a multiple of the task count.
const MAX_ITERATION_FACTOR: usize = 3;

/// Static construction times routes without congestion and sees no release
/// times (every task is already known); dynamic construction is peak-aware
/// for trucks and gates extra tasks on their release time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionMode {
    Static,
    Dynamic,
}

impl ConstructionMode {
    pub fn consider_traffic(&self) -> bool {
        matches!(self, ConstructionMode::Dynamic)
    }

    pub fn gates_release(&self) -> bool {
        matches!(self, ConstructionMode::Dynamic)
    }
}

/// Builds a feasible route serving every task in `tasks`, or `None` when
/// the constraints cannot all be met. Greedy nearest-neighbor with a
/// feasibility filter, the route re-entering the depot where a drone must
/// reset battery or payload.
pub fn build_route(
    problem: &DeliveryProblem,
    vehicle_idx: VehicleIdx,
    tasks: &[TaskIdx],
    mode: ConstructionMode,
) -> Option<Route> {
    if tasks.is_empty() {
        return Some(Route::idle(problem, vehicle_idx));
    }

    let vehicle = problem.vehicle(vehicle_idx);
    if vehicle.is_drone() {
        build_drone_route(problem, vehicle_idx, tasks, mode)
    } else {
        build_truck_route(problem, vehicle_idx, tasks, mode)
    }
}

fn build_truck_route(
    problem: &DeliveryProblem,
    vehicle_idx: VehicleIdx,
    tasks: &[TaskIdx],
    mode: ConstructionMode,
) -> Option<Route> {
    let vehicle = problem.vehicle(vehicle_idx);
    let depot = vehicle.depot();
    let depot_id = problem.depot(depot).external_id();

    let mut stops = vec![Stop::Depot(depot)];
    let mut arrivals: Vec<Time> = vec![0.0];
    let mut visited = vec![false; tasks.len()];
    let mut remaining = tasks.len();
    let mut current_id = depot_id;
    let mut clock: Time = 0.0;

    let max_iterations = MAX_ITERATION_FACTOR * tasks.len();
    let mut iterations = 0;

    while remaining > 0 {
        iterations += 1;
        if iterations > max_iterations {
            return None;
        }

        let mut nearest: Option<(usize, Distance)> = None;
        for (i, &task_idx) in tasks.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let task = problem.task(task_idx);
            let distance = problem.distance(current_id, task.external_id(), false);
            if !distance.is_finite() {
                continue;
            }
            if mode.gates_release() && task.is_extra() {
                let travel = problem.travel_time(
                    current_id,
                    task.external_id(),
                    clock,
                    vehicle,
                    mode.consider_traffic(),
                );
                if clock + travel < task.release_time() {
                    continue;
                }
            }
            if nearest.is_none_or(|(_, best)| distance < best) {
                nearest = Some((i, distance));
            }
        }

        // All remaining tasks are gated on their release time: wait for the
        // earliest one instead of spinning.
        let chosen = nearest.map(|(i, _)| i).or_else(|| {
            mode.gates_release()
                .then(|| earliest_released_pending(problem, tasks, &visited, current_id, false))
                .flatten()
        })?;

        let task = problem.task(tasks[chosen]);
        let travel = problem.travel_time(
            current_id,
            task.external_id(),
            clock,
            vehicle,
            mode.consider_traffic(),
        );
        let mut arrival = clock + travel;
        if mode.gates_release() {
            arrival = arrival.max(task.release_time());
        }

        visited[chosen] = true;
        remaining -= 1;
        stops.push(Stop::Task(tasks[chosen]));
        arrivals.push(arrival);
        current_id = task.external_id();
        clock = arrival;
    }

    let back = problem.travel_time(current_id, depot_id, clock, vehicle, mode.consider_traffic());
    if !back.is_finite() {
        return None;
    }
    stops.push(Stop::Depot(depot));
    arrivals.push(clock + back);

    Some(Route::new(vehicle_idx, stops, arrivals))
}

/// Payload and battery state of one drone sortie. The payload window
/// `[lo, hi]` is the interval of initial loads the drone could have left
/// the reset point with and still satisfy every stop seen so far; the
/// sortie is infeasible exactly when the window empties.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortieState {
    pub battery: Time,
    max_battery: Time,
    max_load: Weight,
    net_load: Weight,
    lo: Weight,
    hi: Weight,
}

impl SortieState {
    pub fn fresh(vehicle: &Vehicle) -> Self {
        let max_battery = vehicle.max_battery().unwrap_or(Time::INFINITY);
        let max_load = vehicle.max_load().unwrap_or(Weight::INFINITY);
        Self {
            battery: max_battery,
            max_battery,
            max_load,
            net_load: 0.0,
            lo: 0.0,
            hi: max_load,
        }
    }

    pub fn reset(&mut self) {
        self.battery = self.max_battery;
        self.net_load = 0.0;
        self.lo = 0.0;
        self.hi = self.max_load;
    }

    pub fn reserve(&self) -> Time {
        BATTERY_RESERVE_RATIO * self.max_battery
    }

    fn window_after(&self, pickup: Weight, delivery: Weight) -> (Weight, Weight) {
        let lo = self.lo.max(delivery - self.net_load);
        let hi = self
            .hi
            .min(self.max_load - self.net_load - pickup + delivery);
        (lo, hi)
    }

    pub fn payload_feasible(&self, pickup: Weight, delivery: Weight) -> bool {
        let (lo, hi) = self.window_after(pickup, delivery);
        lo <= hi
    }

    pub fn serve(&mut self, pickup: Weight, delivery: Weight) {
        let (lo, hi) = self.window_after(pickup, delivery);
        self.lo = lo;
        self.hi = hi;
        self.net_load += pickup - delivery;
    }

    pub fn fly(&mut self, duration: Time) {
        self.battery -= duration;
    }
}

fn build_drone_route(
    problem: &DeliveryProblem,
    vehicle_idx: VehicleIdx,
    tasks: &[TaskIdx],
    mode: ConstructionMode,
) -> Option<Route> {
    let vehicle = problem.vehicle(vehicle_idx);
    let depot = vehicle.depot();
    let depot_id = problem.depot(depot).external_id();
    let speed = vehicle.speed();

    let mut stops = vec![Stop::Depot(depot)];
    let mut arrivals: Vec<Time> = vec![0.0];
    let mut visited = vec![false; tasks.len()];
    let mut remaining = tasks.len();
    let mut current_id = depot_id;
    let mut clock: Time = 0.0;
    let mut sortie = SortieState::fresh(vehicle);

    let max_iterations = MAX_ITERATION_FACTOR * tasks.len();
    let mut iterations = 0;

    while remaining > 0 {
        iterations += 1;
        if iterations > max_iterations {
            return None;
        }

        let mut nearest: Option<(usize, Distance)> = None;
        for (i, &task_idx) in tasks.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let task = problem.task(task_idx);
            let to_task = problem.distance(current_id, task.external_id(), true);
            let flight = to_task / speed;
            let back = problem.distance(task.external_id(), depot_id, true) / speed;

            if flight + back > sortie.battery {
                continue;
            }
            if sortie.battery - flight < sortie.reserve() {
                continue;
            }
            if !sortie.payload_feasible(task.pickup_weight(), task.delivery_weight()) {
                continue;
            }
            if mode.gates_release() && task.is_extra() && clock + flight < task.release_time() {
                continue;
            }

            if nearest.is_none_or(|(_, best)| to_task < best) {
                nearest = Some((i, to_task));
            }
        }

        if let Some((i, to_task)) = nearest {
            let task = problem.task(tasks[i]);
            let flight = to_task / speed;

            visited[i] = true;
            remaining -= 1;
            sortie.fly(flight);
            sortie.serve(task.pickup_weight(), task.delivery_weight());
            clock += flight;
            stops.push(Stop::Task(tasks[i]));
            arrivals.push(clock);
            current_id = task.external_id();
            continue;
        }

        // Extras the drone is merely too early for: wait in place for the
        // earliest release. The wait burns no battery.
        if mode.gates_release()
            && let Some(i) = earliest_released_pending_drone(
                problem, tasks, &visited, current_id, depot_id, &sortie, speed,
            )
        {
            let task = problem.task(tasks[i]);
            let flight = problem.distance(current_id, task.external_id(), true) / speed;

            visited[i] = true;
            remaining -= 1;
            sortie.fly(flight);
            sortie.serve(task.pickup_weight(), task.delivery_weight());
            clock = (clock + flight).max(task.release_time());
            stops.push(Stop::Task(tasks[i]));
            arrivals.push(clock);
            current_id = task.external_id();
            continue;
        }

        // Nothing feasible mid-sortie: return to the depot for a full
        // reset. If the drone is already there, no reset can help.
        if current_id == depot_id {
            return None;
        }
        let back = problem.distance(current_id, depot_id, true) / speed;
        if back > sortie.battery {
            return None;
        }
        clock += back;
        sortie.reset();
        stops.push(Stop::Depot(depot));
        arrivals.push(clock);
        current_id = depot_id;
    }

    if current_id != depot_id {
        let back = problem.distance(current_id, depot_id, true) / speed;
        if back > sortie.battery {
            return None;
        }
        clock += back;
        stops.push(Stop::Depot(depot));
        arrivals.push(clock);
    }

    Some(Route::new(vehicle_idx, stops, arrivals))
}

/// Earliest-release unvisited extra a truck can reach at all.
fn earliest_released_pending(
    problem: &DeliveryProblem,
    tasks: &[TaskIdx],
    visited: &[bool],
    current_id: NodeId,
    is_drone: bool,
) -> Option<usize> {
    tasks
        .iter()
        .enumerate()
        .filter(|&(i, &task_idx)| {
            let task = problem.task(task_idx);
            !visited[i]
                && task.is_extra()
                && problem
                    .distance(current_id, task.external_id(), is_drone)
                    .is_finite()
        })
        .min_by(|&(_, &a), &(_, &b)| {
            problem
                .task(a)
                .release_time()
                .total_cmp(&problem.task(b).release_time())
        })
        .map(|(i, _)| i)
}

/// Earliest-release unvisited extra the drone can serve within battery,
/// reserve and payload limits once it releases.
fn earliest_released_pending_drone(
    problem: &DeliveryProblem,
    tasks: &[TaskIdx],
    visited: &[bool],
    current_id: NodeId,
    depot_id: NodeId,
    sortie: &SortieState,
    speed: f64,
) -> Option<usize> {
    tasks
        .iter()
        .enumerate()
        .filter(|&(i, &task_idx)| {
            if visited[i] {
                return false;
            }
            let task = problem.task(task_idx);
            if !task.is_extra() {
                return false;
            }
            let flight = problem.distance(current_id, task.external_id(), true) / speed;
            let back = problem.distance(task.external_id(), depot_id, true) / speed;
            flight + back <= sortie.battery
                && sortie.battery - flight >= sortie.reserve()
                && sortie.payload_feasible(task.pickup_weight(), task.delivery_weight())
        })
        .min_by(|&(_, &a), &(_, &b)| {
            problem
                .task(a)
                .release_time()
                .total_cmp(&problem.task(b).release_time())
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ProblemBuilder;

    #[test]
    fn test_truck_visits_nearest_first() {
        // Two tasks on a line east of the depot; the truck sweeps out and
        // back: depot -> 10 km -> 25 km -> depot at 50 km/h.
        let problem = ProblemBuilder::new()
            .truck_speed(50.0)
            .task(1, 10.0, 0.0)
            .task(2, 25.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            .edge(101, 1, 10.0)
            .edge(1, 2, 15.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.initial_task_indices().collect();

        let route = build_route(&problem, vehicle, &tasks, ConstructionMode::Static).unwrap();

        let ids: Vec<_> = route
            .stops()
            .iter()
            .map(|stop| stop.external_id(&problem))
            .collect();
        assert_eq!(ids, vec![20101, 1, 2, 20101]);

        let expected = [0.0, 0.2, 0.5, 1.0];
        for (&arrival, &want) in route.arrivals().iter().zip(&expected) {
            assert!((arrival - want).abs() < 1e-9, "{arrival} != {want}");
        }
        assert_eq!(route.cost(&problem), 2.0);
        assert_eq!(route.last_task_arrival(), Some(0.5));
    }

    #[test]
    fn test_drone_pickup_then_delivery_within_capacity() {
        // 6 kg pickup then 6 kg delivery against a 10 kg limit: feasible
        // in one sortie because the payload window never empties.
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .task_with_weights(1, 1.0, 0.0, 6.0, 0.0)
            .task_with_weights(2, 2.0, 0.0, 0.0, 6.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.initial_task_indices().collect();

        let route = build_route(&problem, vehicle, &tasks, ConstructionMode::Static).unwrap();

        let ids: Vec<_> = route
            .stops()
            .iter()
            .map(|stop| stop.external_id(&problem))
            .collect();
        // Single sortie, no depot re-entry between the two stops.
        assert_eq!(ids, vec![20101, 1, 2, 20101]);
    }

    #[test]
    fn test_drone_splits_sorties_when_window_empties() {
        // Two 6 kg deliveries against a 10 kg limit cannot share a sortie;
        // the drone must re-enter the depot between them.
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .task_with_weights(1, 1.0, 0.0, 0.0, 6.0)
            .task_with_weights(2, 2.0, 0.0, 0.0, 6.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.initial_task_indices().collect();

        let route = build_route(&problem, vehicle, &tasks, ConstructionMode::Static).unwrap();

        let depot_stops = route.stops().iter().filter(|stop| stop.is_depot()).count();
        assert_eq!(depot_stops, 3);
        assert_eq!(route.task_count(), 2);
    }

    #[test]
    fn test_battery_reserve_excludes_marginal_task() {
        // The task sits 0.95 h of flight away with a 1 h battery: even
        // ignoring the return it would land under the 10% reserve.
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .task(1, 9.5, 0.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 1.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.initial_task_indices().collect();

        assert!(build_route(&problem, vehicle, &tasks, ConstructionMode::Static).is_none());
    }

    #[test]
    fn test_extra_task_waits_for_release() {
        // The drone could arrive at 1.4 h but the demand only exists from
        // 2 h; the clock fast-forwards and the arrival is stamped 2 h.
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .extra_task(7, 14.0, 0.0, 2.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.extra_task_indices().collect();

        let route = build_route(&problem, vehicle, &tasks, ConstructionMode::Dynamic).unwrap();

        assert_eq!(route.stops().len(), 3);
        assert!((route.arrivals()[1] - 2.0).abs() < 1e-9);
        assert!((route.arrivals()[2] - 3.4).abs() < 1e-9);
    }

    #[test]
    fn test_release_gating_ignored_in_static_mode() {
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .extra_task(7, 14.0, 0.0, 2.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.extra_task_indices().collect();

        let route = build_route(&problem, vehicle, &tasks, ConstructionMode::Static).unwrap();
        assert!((route.arrivals()[1] - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_truck_fails_on_unreachable_task() {
        let problem = ProblemBuilder::new()
            .task(1, 10.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            // The network knows the depot but not the task.
            .edge(101, 55, 1.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];
        let tasks: Vec<_> = problem.initial_task_indices().collect();

        assert!(build_route(&problem, vehicle, &tasks, ConstructionMode::Static).is_none());
    }

    #[test]
    fn test_empty_task_list_yields_idle_route() {
        let problem = ProblemBuilder::new()
            .truck_depot(101, 0.0, 0.0, 1)
            .edge(101, 55, 1.0)
            .build();
        let vehicle = problem.depots()[0].vehicles()[0];

        let route = build_route(&problem, vehicle, &[], ConstructionMode::Static).unwrap();
        assert!(route.is_idle());
    }

    #[test]
    fn test_payload_window_updates() {
        let problem = ProblemBuilder::new().drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0).build();
        let vehicle = problem.vehicle(crate::problem::vehicle::VehicleIdx::new(0));
        let mut sortie = SortieState::fresh(vehicle);

        // 6 kg pickup narrows the window to [0, 4].
        assert!(sortie.payload_feasible(6.0, 0.0));
        sortie.serve(6.0, 0.0);
        assert!((sortie.lo - 0.0).abs() < 1e-12);
        assert!((sortie.hi - 4.0).abs() < 1e-12);

        // The matching 6 kg delivery keeps the window at [0, 4].
        assert!(sortie.payload_feasible(0.0, 6.0));
        sortie.serve(0.0, 6.0);
        assert!((sortie.lo - 0.0).abs() < 1e-12);
        assert!((sortie.hi - 4.0).abs() < 1e-12);

        // An 11 kg delivery cannot fit any initial load.
        assert!(!sortie.payload_feasible(0.0, 11.0));
    }
}
