use fxhash::FxHashMap;
use thiserror::Error;

use crate::{
    problem::{NodeId, Time, Weight, delivery_problem::DeliveryProblem, task::TaskIdx},
    route::{cooperative::TruckVisits, plan::Plan, stop::Stop},
};

/// Arrival tolerance of the static phase: one millisecond, in hours.
pub const STATIC_TOLERANCE: Time = 0.001 / 3600.0;
/// Arrival tolerance of the dynamic phase: ten milliseconds, in hours.
pub const DYNAMIC_TOLERANCE: Time = 0.010 / 3600.0;

const BATTERY_EPSILON: Time = 1e-9;
const WEIGHT_EPSILON: Weight = 1e-9;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("vehicle {vehicle}: route must start and end at its home depot")]
    RouteEndpoints { vehicle: NodeId },

    #[error("task {task}: served {count} times")]
    TaskServedMultipleTimes { task: NodeId, count: usize },

    #[error("task {task}: never served")]
    TaskNotServed { task: NodeId },

    #[error("task {task}: extra demand present in the static phase")]
    ExtraTaskInStaticPlan { task: NodeId },

    #[error(
        "vehicle {vehicle}, stop {stop}: recorded arrival {recorded:.7} h but recomputed {expected:.7} h"
    )]
    ArrivalMismatch {
        vehicle: NodeId,
        stop: NodeId,
        recorded: Time,
        expected: Time,
    },

    #[error("vehicle {vehicle}, stop {stop}: battery down to {battery:.7} h")]
    BatteryExhausted {
        vehicle: NodeId,
        stop: NodeId,
        battery: Time,
    },

    #[error("vehicle {vehicle}, stop {stop}: no feasible initial load remains for the sortie")]
    PayloadWindowEmpty { vehicle: NodeId, stop: NodeId },

    #[error("task {task}: visited at {arrival:.7} h before its release at {release:.7} h")]
    VisitedBeforeRelease {
        task: NodeId,
        arrival: Time,
        release: Time,
    },

    #[error("vehicle {vehicle}: rendezvous at task {task} but no truck visits it")]
    RendezvousWithoutTruck { vehicle: NodeId, task: NodeId },

    #[error("task {task}: moved from depot {expected} to depot {actual} although it was on time")]
    DepotNotRetained {
        task: NodeId,
        expected: NodeId,
        actual: NodeId,
    },
}

/// What the dynamic phase is validated against.
pub struct StaticBaseline<'a> {
    pub plan: &'a Plan,
    pub makespan: Time,
}

pub fn validate_static(problem: &DeliveryProblem, plan: &Plan) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_coverage(problem, plan, false, &mut errors);
    check_routes(problem, plan, false, STATIC_TOLERANCE, &mut errors);
    errors
}

pub fn validate_dynamic(
    problem: &DeliveryProblem,
    plan: &Plan,
    baseline: &StaticBaseline<'_>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_coverage(problem, plan, true, &mut errors);
    check_routes(problem, plan, true, DYNAMIC_TOLERANCE, &mut errors);
    check_depot_retention(problem, plan, baseline, &mut errors);
    errors
}

/// Every expected task exactly once across the phase, rendezvous markers
/// excluded.
fn check_coverage(
    problem: &DeliveryProblem,
    plan: &Plan,
    include_extras: bool,
    errors: &mut Vec<ValidationError>,
) {
    let mut counts: FxHashMap<TaskIdx, usize> = FxHashMap::default();
    for route in plan.routes() {
        for task in route.served_tasks() {
            *counts.entry(task).or_insert(0) += 1;
        }
    }

    for (i, task) in problem.tasks().iter().enumerate() {
        let task_idx = TaskIdx::new(i);
        let count = counts.get(&task_idx).copied().unwrap_or(0);

        if task.is_extra() && !include_extras {
            if count > 0 {
                errors.push(ValidationError::ExtraTaskInStaticPlan {
                    task: task.external_id(),
                });
            }
            continue;
        }

        match count {
            0 => errors.push(ValidationError::TaskNotServed {
                task: task.external_id(),
            }),
            1 => {}
            count => errors.push(ValidationError::TaskServedMultipleTimes {
                task: task.external_id(),
                count,
            }),
        }
    }
}

/// Re-derives every route from scratch: endpoint depots, arrival times
/// (peak-aware in the dynamic phase), release gating, battery and payload
/// trajectories, rendezvous completion times.
fn check_routes(
    problem: &DeliveryProblem,
    plan: &Plan,
    dynamic: bool,
    tolerance: Time,
    errors: &mut Vec<ValidationError>,
) {
    let truck_visits = TruckVisits::from_routes(
        plan.routes()
            .iter()
            .filter(|route| !problem.vehicle(route.vehicle()).is_drone()),
    );

    for route in plan.routes() {
        let vehicle = problem.vehicle(route.vehicle());
        let vehicle_id = vehicle.external_id();
        let home = Stop::Depot(vehicle.depot());

        if route.is_empty()
            || route.stops().first() != Some(&home)
            || route.stops().last() != Some(&home)
        {
            errors.push(ValidationError::RouteEndpoints {
                vehicle: vehicle_id,
            });
            continue;
        }

        let max_battery = vehicle.max_battery().unwrap_or(Time::INFINITY);
        let max_load = vehicle.max_load().unwrap_or(Weight::INFINITY);
        let mut battery = max_battery;
        let mut net_load: Weight = 0.0;
        let mut window: (Weight, Weight) = (0.0, max_load);

        for i in 1..route.stops().len() {
            let prev = route.stops()[i - 1];
            let stop = route.stops()[i];
            let recorded_prev = route.arrivals()[i - 1];
            let recorded = route.arrivals()[i];
            let stop_id = stop.external_id(problem);

            let travel = problem.travel_time(
                prev.external_id(problem),
                stop_id,
                recorded_prev,
                vehicle,
                dynamic,
            );
            let mut expected = recorded_prev + travel;

            match stop {
                Stop::Task(task_idx) => {
                    let task = problem.task(task_idx);
                    if dynamic {
                        expected = expected.max(task.release_time());
                    }
                    if task.is_extra() && recorded < task.release_time() - tolerance {
                        errors.push(ValidationError::VisitedBeforeRelease {
                            task: task.external_id(),
                            arrival: recorded,
                            release: task.release_time(),
                        });
                    }
                }
                Stop::Rendezvous(task_idx) => match truck_visits.arrival(task_idx) {
                    Some(truck_arrival) => expected = expected.max(truck_arrival),
                    None => errors.push(ValidationError::RendezvousWithoutTruck {
                        vehicle: vehicle_id,
                        task: problem.task(task_idx).external_id(),
                    }),
                },
                Stop::Depot(_) => {}
            }

            if (recorded - expected).abs() > tolerance {
                errors.push(ValidationError::ArrivalMismatch {
                    vehicle: vehicle_id,
                    stop: stop_id,
                    recorded,
                    expected,
                });
            }

            if vehicle.is_drone() {
                // Flight time alone drains the battery; waiting does not.
                battery -= travel;
                if battery < -BATTERY_EPSILON {
                    errors.push(ValidationError::BatteryExhausted {
                        vehicle: vehicle_id,
                        stop: stop_id,
                        battery,
                    });
                }

                match stop {
                    Stop::Task(task_idx) => {
                        let task = problem.task(task_idx);
                        let (lo, hi) = window;
                        let lo = lo.max(task.delivery_weight() - net_load);
                        let hi = hi.min(
                            max_load - net_load - task.pickup_weight() + task.delivery_weight(),
                        );
                        if lo > hi + WEIGHT_EPSILON {
                            errors.push(ValidationError::PayloadWindowEmpty {
                                vehicle: vehicle_id,
                                stop: stop_id,
                            });
                        }
                        window = (lo, hi);
                        net_load += task.pickup_weight() - task.delivery_weight();
                    }
                    Stop::Depot(_) | Stop::Rendezvous(_) => {
                        battery = max_battery;
                        net_load = 0.0;
                        window = (0.0, max_load);
                    }
                }
            }
        }
    }
}

/// A task that stayed on time once congestion was revealed keeps its
/// original depot in the dynamic phase; only slipped tasks (and extras)
/// are free to move.
fn check_depot_retention(
    problem: &DeliveryProblem,
    plan: &Plan,
    baseline: &StaticBaseline<'_>,
    errors: &mut Vec<ValidationError>,
) {
    let mut on_time_depot: FxHashMap<TaskIdx, NodeId> = FxHashMap::default();
    for route in baseline.plan.routes() {
        let depot = problem.vehicle(route.vehicle()).depot();
        let peak_arrivals = route.retimed_arrivals(problem, true);
        for (stop, &arrival) in route.stops().iter().zip(&peak_arrivals) {
            if let Some(task) = stop.served_task()
                && arrival <= baseline.makespan
            {
                on_time_depot.insert(task, problem.depot(depot).external_id());
            }
        }
    }

    for route in plan.routes() {
        let depot = problem.vehicle(route.vehicle()).depot();
        let depot_id = problem.depot(depot).external_id();
        for task in route.served_tasks() {
            if let Some(&expected) = on_time_depot.get(&task)
                && expected != depot_id
            {
                errors.push(ValidationError::DepotNotRetained {
                    task: problem.task(task).external_id(),
                    expected,
                    actual: depot_id,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::vehicle::VehicleIdx,
        route::{
            constructor::{ConstructionMode, build_route},
            plan::Route,
        },
        test_utils::ProblemBuilder,
    };

    fn truck_problem() -> DeliveryProblem {
        ProblemBuilder::new()
            .truck_speed(50.0)
            .task(1, 10.0, 0.0)
            .task(2, 25.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            .edge(101, 1, 10.0)
            .edge(1, 2, 15.0)
            .build()
    }

    fn constructed_plan(problem: &DeliveryProblem) -> Plan {
        let vehicle = VehicleIdx::new(0);
        let tasks: Vec<_> = problem.initial_task_indices().collect();
        let route = build_route(problem, vehicle, &tasks, ConstructionMode::Static).unwrap();
        Plan::new(vec![route])
    }

    #[test]
    fn test_constructed_static_plan_validates() {
        let problem = truck_problem();
        let plan = constructed_plan(&problem);
        assert!(validate_static(&problem, &plan).is_empty());
    }

    #[test]
    fn test_tampered_arrival_is_caught() {
        let problem = truck_problem();
        let plan = constructed_plan(&problem);
        let route = &plan.routes()[0];

        let mut arrivals = route.arrivals().to_vec();
        arrivals[2] += 0.25;
        let tampered = Plan::new(vec![Route::new(
            route.vehicle(),
            route.stops().to_vec(),
            arrivals,
        )]);

        let errors = validate_static(&problem, &tampered);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::ArrivalMismatch { .. })),
            "{errors:?}"
        );
    }

    #[test]
    fn test_missing_and_duplicate_tasks_are_caught() {
        let problem = truck_problem();
        let vehicle = VehicleIdx::new(0);
        let depot = problem.vehicle(vehicle).depot();
        let task = problem.task_idx(1).unwrap();

        let route = Route::new(
            vehicle,
            vec![
                Stop::Depot(depot),
                Stop::Task(task),
                Stop::Task(task),
                Stop::Depot(depot),
            ],
            vec![0.0, 0.2, 0.2, 0.4],
        );
        let errors = validate_static(&problem, &Plan::new(vec![route]));

        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::TaskServedMultipleTimes { count: 2, .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::TaskNotServed { task: 2 })));
    }

    #[test]
    fn test_route_must_close_at_home_depot() {
        let problem = truck_problem();
        let vehicle = VehicleIdx::new(0);
        let depot = problem.vehicle(vehicle).depot();
        let route = Route::new(
            vehicle,
            vec![
                Stop::Depot(depot),
                Stop::Task(problem.task_idx(1).unwrap()),
            ],
            vec![0.0, 0.2],
        );
        let errors = validate_static(&problem, &Plan::new(vec![route]));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RouteEndpoints { .. })));
    }

    #[test]
    fn test_rendezvous_needs_a_truck_visit() {
        let problem = ProblemBuilder::new()
            .drone_speed(50.0)
            .task(1, 5.0, 0.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0)
            .build();
        let drone = VehicleIdx::new(0);
        let depot = problem.vehicle(drone).depot();
        let task = problem.task_idx(1).unwrap();

        let route = Route::new(
            drone,
            vec![
                Stop::Depot(depot),
                Stop::Rendezvous(task),
                Stop::Depot(depot),
            ],
            vec![0.0, 0.1, 0.2],
        );
        let baseline_plan = Plan::new(vec![]);
        let baseline = StaticBaseline {
            plan: &baseline_plan,
            makespan: 0.0,
        };
        let errors = validate_dynamic(&problem, &Plan::new(vec![route]), &baseline);

        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RendezvousWithoutTruck { .. })));
    }

    #[test]
    fn test_extra_task_visited_early_is_caught() {
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .extra_task(7, 5.0, 0.0, 2.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 10.0)
            .build();
        let drone = VehicleIdx::new(0);
        let depot = problem.vehicle(drone).depot();
        let task = problem.task_idx(10007).unwrap();

        let route = Route::new(
            drone,
            vec![Stop::Depot(depot), Stop::Task(task), Stop::Depot(depot)],
            vec![0.0, 0.5, 1.0],
        );
        let baseline_plan = Plan::new(vec![]);
        let baseline = StaticBaseline {
            plan: &baseline_plan,
            makespan: 0.0,
        };
        let errors = validate_dynamic(&problem, &Plan::new(vec![route]), &baseline);

        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::VisitedBeforeRelease { .. })));
    }

    #[test]
    fn test_battery_overrun_is_caught() {
        // 30 km of flight each way on a 1 h battery at 10 km/h.
        let problem = ProblemBuilder::new()
            .drone_speed(10.0)
            .task(1, 30.0, 0.0)
            .drone_depot(101, 0.0, 0.0, 1, 10.0, 1.0)
            .build();
        let drone = VehicleIdx::new(0);
        let depot = problem.vehicle(drone).depot();
        let task = problem.task_idx(1).unwrap();

        let route = Route::new(
            drone,
            vec![Stop::Depot(depot), Stop::Task(task), Stop::Depot(depot)],
            vec![0.0, 3.0, 6.0],
        );
        let errors = validate_static(&problem, &Plan::new(vec![route]));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BatteryExhausted { .. })));
    }

    #[test]
    fn test_on_time_task_must_keep_its_depot() {
        // Two truck depots, one truck each; the task completes on time in
        // the static phase at depot 20101 but moves to 20102 dynamically.
        let problem = ProblemBuilder::new()
            .truck_speed(50.0)
            .task(1, 5.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            .truck_depot(102, 10.0, 0.0, 1)
            .edge(101, 1, 5.0)
            .edge(102, 1, 5.0)
            .build();
        let task = problem.task_idx(1).unwrap();
        let first = VehicleIdx::new(0);
        let second = VehicleIdx::new(1);

        let static_route = Route::new(
            first,
            vec![
                Stop::Depot(problem.vehicle(first).depot()),
                Stop::Task(task),
                Stop::Depot(problem.vehicle(first).depot()),
            ],
            vec![0.0, 0.1, 0.2],
        );
        let static_plan = Plan::new(vec![static_route, Route::idle(&problem, second)]);

        let dynamic_route = Route::new(
            second,
            vec![
                Stop::Depot(problem.vehicle(second).depot()),
                Stop::Task(task),
                Stop::Depot(problem.vehicle(second).depot()),
            ],
            vec![0.0, 0.1, 0.2],
        );
        let dynamic_plan = Plan::new(vec![Route::idle(&problem, first), dynamic_route]);

        let baseline = StaticBaseline {
            plan: &static_plan,
            makespan: 0.5,
        };
        let errors = validate_dynamic(&problem, &dynamic_plan, &baseline);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DepotNotRetained { .. })));
    }
}
