use convoy_optimizer::{
    problem::delivery_problem::DeliveryProblem,
    route::{
        plan::{Plan, Route},
        stop::Stop,
    },
};

/// Stop token in route listings: `depot#id`, `task#id` or `meet#id`, the
/// last carrying the rendezvous marker offset.
fn stop_token(problem: &DeliveryProblem, stop: &Stop) -> String {
    let id = stop.external_id(problem);
    match stop {
        Stop::Depot(_) => format!("depot#{id}"),
        Stop::Task(_) => format!("task#{id}"),
        Stop::Rendezvous(_) => format!("meet#{id}"),
    }
}

fn print_route(problem: &DeliveryProblem, route: &Route, indent: &str) {
    let tokens: Vec<String> = route
        .stops()
        .iter()
        .map(|stop| stop_token(problem, stop))
        .collect();
    println!("{indent}stops:    {}", tokens.join(" -> "));

    let times: Vec<String> = route
        .arrivals()
        .iter()
        .map(|time| format!("{time:.3}h"))
        .collect();
    println!("{indent}arrivals: {}", times.join(", "));
    println!(
        "{indent}tasks: {}, cost: {:.2}",
        route.task_count(),
        route.cost(problem)
    );
}

fn vehicle_heading(problem: &DeliveryProblem, route: &Route) -> String {
    let vehicle = problem.vehicle(route.vehicle());
    if vehicle.is_drone() {
        format!(
            "drone #{} (load {:.1} kg, battery {:.1} h)",
            vehicle.external_id(),
            vehicle.max_load().unwrap_or(0.0),
            vehicle.max_battery().unwrap_or(0.0),
        )
    } else {
        format!("truck #{}", vehicle.external_id())
    }
}

pub fn print_static(problem: &DeliveryProblem, plan: &Plan) {
    println!("=== static routes ===");
    for route in plan.routes() {
        if route.is_idle() {
            continue;
        }
        println!("{}", vehicle_heading(problem, route));
        print_route(problem, route, "  ");
    }
    print_stats(problem, plan);
}

/// Dynamic listing grouped under each depot, with the per-vehicle shift
/// against the static phase.
pub fn print_dynamic(problem: &DeliveryProblem, static_plan: &Plan, plan: &Plan) {
    println!("\n=== dynamic routes ===");

    let mut depot_order: Vec<usize> = (0..problem.depots().len()).collect();
    depot_order.sort_by_key(|&slot| problem.depots()[slot].external_id());

    for slot in depot_order {
        let depot = &problem.depots()[slot];
        let kind = if problem.depot_is_drone_base(slot.into()) {
            "drone base"
        } else {
            "truck base"
        };
        println!("depot #{} ({kind})", depot.external_id());

        for &vehicle_idx in depot.vehicles() {
            let route = plan.route(vehicle_idx);
            if route.is_idle() {
                continue;
            }
            println!("  {}", vehicle_heading(problem, route));
            print_route(problem, route, "    ");

            let static_route = static_plan.route(vehicle_idx);
            if !static_route.is_idle() {
                let time_shift = route.completion_time() - static_route.completion_time();
                let task_shift = route.task_count() as i64 - static_route.task_count() as i64;
                println!(
                    "    vs static: {:+.3}h completion, {task_shift:+} task(s)",
                    time_shift
                );
            }
        }
    }
    print_stats(problem, plan);
}

fn print_stats(problem: &DeliveryProblem, plan: &Plan) {
    println!(
        "tasks served: {}, makespan: {:.3}h, max completion: {:.3}h, total cost: {:.2}",
        plan.total_tasks_served(),
        plan.makespan(),
        plan.max_completion_time(),
        plan.total_cost(problem),
    );
}
