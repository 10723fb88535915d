use crate::{
    problem::{Cost, Time, delivery_problem::DeliveryProblem, vehicle::VehicleIdx},
    route::stop::Stop,
};

/// An ordered stop sequence for one vehicle with the arrival time at each
/// stop. Starts and ends at the vehicle's home depot; drones may re-enter
/// the depot (or a rendezvous point) mid-route to reset battery and load.
#[derive(Debug, Clone)]
pub struct Route {
    vehicle: VehicleIdx,
    stops: Vec<Stop>,
    arrivals: Vec<Time>,
}

impl Route {
    pub fn new(vehicle: VehicleIdx, stops: Vec<Stop>, arrivals: Vec<Time>) -> Self {
        debug_assert_eq!(stops.len(), arrivals.len());
        Self {
            vehicle,
            stops,
            arrivals,
        }
    }

    /// The depot -> depot route of a vehicle with nothing to do.
    pub fn idle(problem: &DeliveryProblem, vehicle: VehicleIdx) -> Self {
        let depot = Stop::Depot(problem.vehicle(vehicle).depot());
        Self {
            vehicle,
            stops: vec![depot, depot],
            arrivals: vec![0.0, 0.0],
        }
    }

    pub fn vehicle(&self) -> VehicleIdx {
        self.vehicle
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn arrivals(&self) -> &[Time] {
        &self.arrivals
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// True when the route serves no task.
    pub fn is_idle(&self) -> bool {
        self.stops.iter().all(|stop| stop.is_depot())
    }

    pub fn served_tasks(&self) -> impl Iterator<Item = crate::problem::task::TaskIdx> + '_ {
        self.stops.iter().filter_map(Stop::served_task)
    }

    pub fn task_count(&self) -> usize {
        self.served_tasks().count()
    }

    /// Arrival at the last served task; the fitness makespan contribution
    /// of this route.
    pub fn last_task_arrival(&self) -> Option<Time> {
        self.stops
            .iter()
            .zip(&self.arrivals)
            .rev()
            .find(|(stop, _)| stop.served_task().is_some())
            .map(|(_, &arrival)| arrival)
    }

    /// Arrival back at the depot, the true end of the route.
    pub fn completion_time(&self) -> Time {
        self.arrivals.last().copied().unwrap_or(0.0)
    }

    pub fn cost(&self, problem: &DeliveryProblem) -> Cost {
        problem.vehicle(self.vehicle).unit_cost() * self.task_count() as Cost
    }

    /// Re-derives the arrival times of this stop sequence, optionally
    /// peak-aware. Waiting for an extra task's release is reproduced;
    /// rendezvous waits are not (the truck timetable is not known here),
    /// so this is only meaningful for routes without rendezvous stops.
    pub fn retimed_arrivals(&self, problem: &DeliveryProblem, consider_traffic: bool) -> Vec<Time> {
        let vehicle = problem.vehicle(self.vehicle);
        let mut arrivals = Vec::with_capacity(self.stops.len());
        let mut clock: Time = 0.0;
        arrivals.push(clock);

        for window in self.stops.windows(2) {
            let from = window[0].external_id(problem);
            let to = window[1].external_id(problem);
            clock += problem.travel_time(from, to, clock, vehicle, consider_traffic);
            if let Some(task) = window[1].served_task() {
                clock = clock.max(problem.task(task).release_time());
            }
            arrivals.push(clock);
        }

        arrivals
    }
}

/// The routes of one planning phase, indexed by vehicle.
#[derive(Debug, Clone)]
pub struct Plan {
    routes: Vec<Route>,
}

impl Plan {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, vehicle: VehicleIdx) -> &Route {
        &self.routes[vehicle.get()]
    }

    /// Max over vehicles of the arrival at their final served task.
    pub fn makespan(&self) -> Time {
        self.routes
            .iter()
            .filter_map(Route::last_task_arrival)
            .fold(0.0, Time::max)
    }

    /// Max over vehicles of the return-to-depot time.
    pub fn max_completion_time(&self) -> Time {
        self.routes
            .iter()
            .map(Route::completion_time)
            .fold(0.0, Time::max)
    }

    pub fn total_cost(&self, problem: &DeliveryProblem) -> Cost {
        self.routes.iter().map(|route| route.cost(problem)).sum()
    }

    pub fn total_tasks_served(&self) -> usize {
        self.routes.iter().map(Route::task_count).sum()
    }
}
