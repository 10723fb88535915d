use fxhash::FxHashMap;
use tracing::warn;

use crate::{
    problem::{NodeId, Time, delivery_problem::DeliveryProblem, task::TaskIdx,
        vehicle::VehicleIdx,
    },
    route::{
        constructor::{ConstructionMode, SortieState, build_route},
        plan::{Plan, Route},
        stop::Stop,
    },
};

const MAX_ITERATION_FACTOR: usize = 3;

/// Earliest truck arrival per task, collected from the truck routes of a
/// plan. A drone may end a sortie at any of these points, provided it
/// lands strictly before the truck does.
pub struct TruckVisits {
    arrivals: FxHashMap<TaskIdx, Time>,
}

impl TruckVisits {
    pub fn from_routes<'a>(routes: impl IntoIterator<Item = &'a Route>) -> Self {
        let mut arrivals: FxHashMap<TaskIdx, Time> = FxHashMap::default();
        for route in routes {
            for (stop, &arrival) in route.stops().iter().zip(route.arrivals()) {
                if let Some(task) = stop.served_task() {
                    arrivals
                        .entry(task)
                        .and_modify(|earliest| *earliest = arrival.min(*earliest))
                        .or_insert(arrival);
                }
            }
        }
        Self { arrivals }
    }

    pub fn arrival(&self, task: TaskIdx) -> Option<Time> {
        self.arrivals.get(&task).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskIdx, Time)> + '_ {
        self.arrivals.iter().map(|(&task, &time)| (task, time))
    }
}

/// Where a drone may terminate the current sortie, and when the
/// termination completes.
#[derive(Debug, Clone, Copy)]
enum SortieReturn {
    Depot { completion: Time },
    Rendezvous { task: TaskIdx, completion: Time },
}

impl SortieReturn {
    fn completion(&self) -> Time {
        match self {
            SortieReturn::Depot { completion } => *completion,
            SortieReturn::Rendezvous { completion, .. } => *completion,
        }
    }
}

/// Plans the whole fleet for the dynamic phase: trucks first with the
/// plain peak-aware constructor, then each drone with the rendezvous-aware
/// builder against the recorded truck arrivals.
///
/// With `allow_fallback`, a drone whose cooperative sortie plan fails is
/// retried with the plain constructor before the whole plan is abandoned.
/// Fitness evaluation passes `false`: an infeasible genome must score as
/// such rather than being silently repaired.
pub fn plan_cooperative(
    problem: &DeliveryProblem,
    vehicle_tasks: &[Vec<TaskIdx>],
    allow_fallback: bool,
) -> Option<Plan> {
    debug_assert_eq!(vehicle_tasks.len(), problem.vehicles().len());

    let mut routes: Vec<Route> = Vec::with_capacity(vehicle_tasks.len());

    for vehicle_idx in problem.vehicle_indices() {
        if problem.vehicle(vehicle_idx).is_drone() {
            continue;
        }
        let route = build_route(
            problem,
            vehicle_idx,
            &vehicle_tasks[vehicle_idx.get()],
            ConstructionMode::Dynamic,
        )?;
        routes.push(route);
    }

    let visits = TruckVisits::from_routes(&routes);

    for vehicle_idx in problem.vehicle_indices() {
        if !problem.vehicle(vehicle_idx).is_drone() {
            continue;
        }
        let tasks = &vehicle_tasks[vehicle_idx.get()];
        let route = match build_drone_route_with_rendezvous(problem, vehicle_idx, tasks, &visits) {
            Some(route) => route,
            None if allow_fallback => {
                warn!(
                    vehicle = problem.vehicle(vehicle_idx).external_id(),
                    "cooperative sortie plan failed, falling back to plain construction"
                );
                build_route(problem, vehicle_idx, tasks, ConstructionMode::Dynamic)?
            }
            None => return None,
        };
        routes.push(route);
    }

    routes.sort_by_key(|route| route.vehicle());
    Some(Plan::new(routes))
}

/// Extends the dynamic drone constructor with sortie termination at truck
/// rendezvous points. A candidate task is only considered when some
/// termination (home depot or a rendezvous the drone reaches before the
/// truck) remains reachable after serving it.
pub fn build_drone_route_with_rendezvous(
    problem: &DeliveryProblem,
    vehicle_idx: VehicleIdx,
    tasks: &[TaskIdx],
    visits: &TruckVisits,
) -> Option<Route> {
    if tasks.is_empty() {
        return Some(Route::idle(problem, vehicle_idx));
    }

    let vehicle = problem.vehicle(vehicle_idx);
    debug_assert!(vehicle.is_drone());
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

        let mut nearest: Option<(usize, f64)> = None;
        for (i, &task_idx) in tasks.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let task = problem.task(task_idx);
            let to_task = problem.distance(current_id, task.external_id(), true);
            let flight = to_task / speed;

            if flight > sortie.battery || sortie.battery - flight < sortie.reserve() {
                continue;
            }
            if !sortie.payload_feasible(task.pickup_weight(), task.delivery_weight()) {
                continue;
            }
            if task.is_extra() && clock + flight < task.release_time() {
                continue;
            }
            let after_battery = sortie.battery - flight;
            if best_return(
                problem,
                task.external_id(),
                Some(task_idx),
                clock + flight,
                after_battery,
                depot_id,
                speed,
                visits,
            )
            .is_none()
            {
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

        // Too early for every remaining extra: wait in place for the
        // earliest one that stays within battery and payload limits and
        // still leaves some way home.
        if let Some(i) = earliest_waitable_extra(
            problem, tasks, &visited, current_id, clock, &sortie, depot_id, speed, visits,
        ) {
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

        // End the sortie at whichever reset point completes first.
        if current_id == depot_id {
            return None;
        }
        let chosen = best_return(
            problem,
            current_id,
            None,
            clock,
            sortie.battery,
            depot_id,
            speed,
            visits,
        )?;
        clock = chosen.completion();
        sortie.reset();
        match chosen {
            SortieReturn::Depot { .. } => {
                stops.push(Stop::Depot(depot));
                current_id = depot_id;
            }
            SortieReturn::Rendezvous { task, .. } => {
                stops.push(Stop::Rendezvous(task));
                current_id = problem.task(task).external_id();
            }
        }
        arrivals.push(clock);
    }

    // Closing legs: a sortie may end at a rendezvous, which resets the
    // battery but leaves the drone away from home, so keep returning
    // until the depot is reached.
    let mut closing_legs = 0;
    while current_id != depot_id {
        closing_legs += 1;
        if closing_legs > max_iterations.max(4) {
            return None;
        }
        let chosen = best_return(
            problem,
            current_id,
            None,
            clock,
            sortie.battery,
            depot_id,
            speed,
            visits,
        )?;
        clock = chosen.completion();
        sortie.reset();
        match chosen {
            SortieReturn::Depot { .. } => {
                stops.push(Stop::Depot(depot));
                current_id = depot_id;
            }
            SortieReturn::Rendezvous { task, .. } => {
                stops.push(Stop::Rendezvous(task));
                current_id = problem.task(task).external_id();
            }
        }
        arrivals.push(clock);
    }

    Some(Route::new(vehicle_idx, stops, arrivals))
}

/// Cheapest way to end a sortie from `from_id` with `battery` hours left:
/// the home depot, or a truck-visited point reached strictly before the
/// truck. Returns the option with the earliest completion time.
#[allow(clippy::too_many_arguments)]
fn best_return(
    problem: &DeliveryProblem,
    from_id: NodeId,
    exclude: Option<TaskIdx>,
    clock: Time,
    battery: Time,
    depot_id: NodeId,
    speed: f64,
    visits: &TruckVisits,
) -> Option<SortieReturn> {
    let mut best: Option<SortieReturn> = None;

    let home_flight = problem.distance(from_id, depot_id, true) / speed;
    if home_flight <= battery {
        best = Some(SortieReturn::Depot {
            completion: clock + home_flight,
        });
    }

    for (task, truck_arrival) in visits.iter() {
        if exclude == Some(task) {
            continue;
        }
        let flight = problem.distance(from_id, problem.task(task).external_id(), true) / speed;
        if flight > battery {
            continue;
        }
        let drone_arrival = clock + flight;
        if drone_arrival >= truck_arrival {
            continue;
        }
        let completion = drone_arrival.max(truck_arrival);
        if best.is_none_or(|b| completion < b.completion()) {
            best = Some(SortieReturn::Rendezvous { task, completion });
        }
    }

    best
}

#[allow(clippy::too_many_arguments)]
fn earliest_waitable_extra(
    problem: &DeliveryProblem,
    tasks: &[TaskIdx],
    visited: &[bool],
    current_id: NodeId,
    clock: Time,
    sortie: &SortieState,
    depot_id: NodeId,
    speed: f64,
    visits: &TruckVisits,
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
            if flight > sortie.battery || sortie.battery - flight < sortie.reserve() {
                return false;
            }
            if !sortie.payload_feasible(task.pickup_weight(), task.delivery_weight()) {
                return false;
            }
            let release_arrival = (clock + flight).max(task.release_time());
            best_return(
                problem,
                task.external_id(),
                Some(task_idx),
                release_arrival,
                sortie.battery - flight,
                depot_id,
                speed,
                visits,
            )
            .is_some()
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
    use crate::{
        problem::vehicle::VehicleIdx,
        test_utils::ProblemBuilder,
    };

    /// Task 1 is the drone's (25 km east); task 2 belongs to a truck that
    /// reaches it late enough for the drone to land first.
    fn rendezvous_problem() -> crate::problem::delivery_problem::DeliveryProblem {
        ProblemBuilder::new()
            .drone_speed(50.0)
            .task(1, 25.0, 0.0)
            .task(2, 20.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            .drone_depot(102, 0.0, 0.0, 1, 10.0, 0.9)
            .edge(101, 2, 35.0)
            .build()
    }

    #[test]
    fn test_truck_visits_keep_earliest_arrival() {
        let problem = rendezvous_problem();
        let truck = VehicleIdx::new(0);
        let task = problem.task_idx(2).unwrap();

        let depot = problem.vehicle(truck).depot();
        let late = Route::new(
            truck,
            vec![Stop::Depot(depot), Stop::Task(task), Stop::Depot(depot)],
            vec![0.0, 1.4, 2.8],
        );
        let early = Route::new(
            truck,
            vec![Stop::Depot(depot), Stop::Task(task), Stop::Depot(depot)],
            vec![0.0, 0.7, 1.4],
        );

        let visits = TruckVisits::from_routes([&late, &early]);
        assert_eq!(visits.arrival(task), Some(0.7));
    }

    #[test]
    fn test_drone_ends_sortie_at_rendezvous() {
        let problem = rendezvous_problem();
        let truck = VehicleIdx::new(0);
        let drone = VehicleIdx::new(1);
        let drone_task = problem.task_idx(1).unwrap();
        let truck_task = problem.task_idx(2).unwrap();

        let truck_depot = problem.vehicle(truck).depot();
        let truck_route = Route::new(
            truck,
            vec![
                Stop::Depot(truck_depot),
                Stop::Task(truck_task),
                Stop::Depot(truck_depot),
            ],
            vec![0.0, 0.7, 1.4],
        );
        let visits = TruckVisits::from_routes([&truck_route]);

        let route =
            build_drone_route_with_rendezvous(&problem, drone, &[drone_task], &visits).unwrap();

        // Out of battery for the direct way home, the drone lands at the
        // truck's task, waits for it, resets, then flies home.
        assert_eq!(
            route.stops(),
            &[
                Stop::Depot(problem.vehicle(drone).depot()),
                Stop::Task(drone_task),
                Stop::Rendezvous(truck_task),
                Stop::Depot(problem.vehicle(drone).depot()),
            ]
        );
        let expected = [0.0, 0.5, 0.7, 1.1];
        for (&arrival, &want) in route.arrivals().iter().zip(&expected) {
            assert!((arrival - want).abs() < 1e-9, "{arrival} != {want}");
        }
    }

    #[test]
    fn test_rendezvous_requires_landing_before_truck() {
        let problem = rendezvous_problem();
        let drone = VehicleIdx::new(1);
        let drone_task = problem.task_idx(1).unwrap();
        let truck_task = problem.task_idx(2).unwrap();

        // Truck already gone by the time the drone could land there.
        let truck = VehicleIdx::new(0);
        let truck_depot = problem.vehicle(truck).depot();
        let truck_route = Route::new(
            truck,
            vec![
                Stop::Depot(truck_depot),
                Stop::Task(truck_task),
                Stop::Depot(truck_depot),
            ],
            vec![0.0, 0.4, 0.8],
        );
        let visits = TruckVisits::from_routes([&truck_route]);

        assert!(build_drone_route_with_rendezvous(&problem, drone, &[drone_task], &visits).is_none());
    }

    #[test]
    fn test_plan_cooperative_full_fleet() {
        let problem = rendezvous_problem();
        let drone_task = problem.task_idx(1).unwrap();
        let truck_task = problem.task_idx(2).unwrap();

        let groups = vec![vec![truck_task], vec![drone_task]];
        let plan = plan_cooperative(&problem, &groups, false).unwrap();

        assert_eq!(plan.total_tasks_served(), 2);
        let drone_route = plan.route(VehicleIdx::new(1));
        assert!(drone_route.stops().iter().any(Stop::is_rendezvous));
    }
}
