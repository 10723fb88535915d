use rand::rngs::SmallRng;
use tracing::{info, warn};

use crate::{
    assignment::assign_to_depots,
    ga::{
        TaskAssignment,
        dynamic_search::{identify_delayed_tasks, run_dynamic_ga},
        params::GaParams,
        static_search::run_static_ga,
    },
    problem::{Time, delivery_problem::DeliveryProblem},
    route::{
        constructor::{ConstructionMode, build_route},
        cooperative::plan_cooperative,
        plan::{Plan, Route},
    },
};

/// The static phase output: the routes, the winning task -> vehicle
/// mapping, and the congestion-free makespan the dynamic phase measures
/// slippage against.
pub struct StaticSolution {
    pub plan: Plan,
    pub assignment: TaskAssignment,
    pub makespan: Time,
}

pub struct DynamicSolution {
    pub plan: Plan,
    /// True when the re-plan fell back to the static routes.
    pub degraded: bool,
}

/// Assigns the initial demand to depots, partitions each depot's demand
/// among its vehicles with the genetic search, and materializes the
/// winning routes.
pub fn solve_static(
    problem: &DeliveryProblem,
    params: &GaParams,
    rng: &mut SmallRng,
) -> StaticSolution {
    let depot_assignment = assign_to_depots(problem);
    let assignment = run_static_ga(problem, &depot_assignment, params, rng);

    let groups = assignment.group_by_vehicle(problem);
    let routes: Vec<Route> = problem
        .vehicle_indices()
        .map(|vehicle| {
            build_route(
                problem,
                vehicle,
                &groups[vehicle.get()],
                ConstructionMode::Static,
            )
            .unwrap_or_else(|| {
                // The search only emits construction-feasible genomes, so
                // this is unreachable short of a fitness/construction skew.
                warn!(
                    vehicle = problem.vehicle(vehicle).external_id(),
                    "winning static genome failed construction, idling vehicle"
                );
                Route::idle(problem, vehicle)
            })
        })
        .collect();

    let plan = Plan::new(routes);
    let makespan = plan.makespan();
    info!(
        makespan,
        cost = plan.total_cost(problem),
        tasks = plan.total_tasks_served(),
        "static phase solved"
    );

    StaticSolution {
        plan,
        assignment,
        makespan,
    }
}

/// Reveals congestion over the static plan, re-plans the delayed and
/// extra demand across the whole fleet, and builds the cooperative route
/// set. Degrades to the (re-timed) static routes when the search cannot
/// run.
pub fn solve_dynamic(
    problem: &DeliveryProblem,
    static_solution: &StaticSolution,
    params: &GaParams,
    rng: &mut SmallRng,
) -> DynamicSolution {
    let delayed = identify_delayed_tasks(problem, &static_solution.plan, static_solution.makespan);
    let has_extras = problem.tasks().len() > problem.initial_task_count();

    if delayed.is_empty() && !has_extras {
        info!("nothing to re-plan, keeping static routes");
        return DynamicSolution {
            plan: retime_plan(problem, &static_solution.plan),
            degraded: false,
        };
    }

    info!(
        delayed = delayed.len(),
        extras = problem.tasks().len() - problem.initial_task_count(),
        "re-planning"
    );

    let Some(assignment) = run_dynamic_ga(
        problem,
        &static_solution.assignment,
        &delayed,
        static_solution.makespan,
        params,
        rng,
    ) else {
        warn!("dynamic search failed, degrading to the static solution");
        return DynamicSolution {
            plan: retime_plan(problem, &static_solution.plan),
            degraded: true,
        };
    };

    let groups = assignment.group_by_vehicle(problem);
    match plan_cooperative(problem, &groups, true) {
        Some(plan) => {
            info!(
                makespan = plan.makespan(),
                cost = plan.total_cost(problem),
                tasks = plan.total_tasks_served(),
                "dynamic phase solved"
            );
            DynamicSolution {
                plan,
                degraded: false,
            }
        }
        None => {
            warn!("winning re-plan failed materialization, degrading to the static solution");
            DynamicSolution {
                plan: retime_plan(problem, &static_solution.plan),
                degraded: true,
            }
        }
    }
}

/// The static stop sequences with arrivals recomputed under congestion.
fn retime_plan(problem: &DeliveryProblem, plan: &Plan) -> Plan {
    let routes = plan
        .routes()
        .iter()
        .map(|route| {
            let arrivals = route.retimed_arrivals(problem, true);
            Route::new(route.vehicle(), route.stops().to_vec(), arrivals)
        })
        .collect();
    Plan::new(routes)
}
