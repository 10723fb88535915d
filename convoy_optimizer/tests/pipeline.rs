use rand::{SeedableRng, rngs::SmallRng};

use convoy_optimizer::{
    ga::params::GaParams,
    parsers::instance,
    solver::{solve_dynamic, solve_static},
    validate::{StaticBaseline, validate_dynamic, validate_static},
};

/// Four initial tasks, one extra releasing at 30 min, a truck depot with
/// two trucks and a drone depot with two drones. Coordinates are degrees;
/// roughly 1 km per 0.009 degrees of longitude at the equator.
const INSTANCE: &str = "\
    4 1 1 1
    60 50 2 3 10 5 0.5
    7
    901 1 1000
    1 2 1000
    2 3 1000
    3 4 8000
    4 902 1000
    4 7 1000
    902 7 2000
    1 0.009 0.0 0.0 1.0
    2 0.018 0.0 2.0 0.0
    3 0.027 0.0 0.0 3.0
    4 0.099 0.0 0.0 2.0
    901 0.000 0.0 2
    902 0.090 0.0 2
    7 0.108 0.0 0.0 1.0 30
";

/// The same world without the extra demand and with every peak factor
/// forced to 1.0.
const CALM_INSTANCE: &str = "\
    4 0 1 1
    60 50 2 3 10 5 0.5
    7
    901 1 1000
    1 2 1000
    2 3 1000
    3 4 8000
    4 902 1000
    4 7 1000
    902 7 2000
    1 0.009 0.0 0.0 1.0
    2 0.018 0.0 2.0 0.0
    3 0.027 0.0 0.0 3.0
    4 0.099 0.0 0.0 2.0
    901 0.000 0.0 2
    902 0.090 0.0 2
    901 1 1.0 1.0
    1 2 1.0 1.0
    2 3 1.0 1.0
    3 4 1.0 1.0
    4 902 1.0 1.0
    4 7 1.0 1.0
    902 7 1.0 1.0
";

fn test_params() -> GaParams {
    GaParams {
        population_size: 16,
        generations: 10,
        ..GaParams::static_defaults()
    }
}

#[test]
fn test_full_pipeline_validates() {
    let problem = instance::parse(INSTANCE).unwrap();
    let mut rng = SmallRng::seed_from_u64(42);

    let static_solution = solve_static(&problem, &test_params(), &mut rng);
    assert_eq!(static_solution.plan.total_tasks_served(), 4);
    let static_errors = validate_static(&problem, &static_solution.plan);
    assert!(static_errors.is_empty(), "{static_errors:?}");

    let dynamic_solution = solve_dynamic(&problem, &static_solution, &test_params(), &mut rng);
    assert!(!dynamic_solution.degraded);
    assert_eq!(dynamic_solution.plan.total_tasks_served(), 5);

    let baseline = StaticBaseline {
        plan: &static_solution.plan,
        makespan: static_solution.makespan,
    };
    let dynamic_errors = validate_dynamic(&problem, &dynamic_solution.plan, &baseline);
    assert!(dynamic_errors.is_empty(), "{dynamic_errors:?}");
}

#[test]
fn test_extra_task_not_served_before_release() {
    let problem = instance::parse(INSTANCE).unwrap();
    let mut rng = SmallRng::seed_from_u64(7);

    let static_solution = solve_static(&problem, &test_params(), &mut rng);
    let dynamic_solution = solve_dynamic(&problem, &static_solution, &test_params(), &mut rng);

    let extra = problem.task_idx(10007).unwrap();
    let mut found = false;
    for route in dynamic_solution.plan.routes() {
        for (stop, &arrival) in route.stops().iter().zip(route.arrivals()) {
            if stop.served_task() == Some(extra) {
                found = true;
                assert!(arrival >= 0.5 - 1e-9, "served at {arrival} before release");
            }
        }
    }
    assert!(found, "extra task must be served in the dynamic phase");
}

#[test]
fn test_no_extras_and_calm_roads_reproduce_static_plan() {
    let problem = instance::parse(CALM_INSTANCE).unwrap();
    let mut rng = SmallRng::seed_from_u64(42);

    let static_solution = solve_static(&problem, &test_params(), &mut rng);
    let dynamic_solution = solve_dynamic(&problem, &static_solution, &test_params(), &mut rng);

    assert!(!dynamic_solution.degraded);
    for (static_route, dynamic_route) in static_solution
        .plan
        .routes()
        .iter()
        .zip(dynamic_solution.plan.routes())
    {
        assert_eq!(static_route.stops(), dynamic_route.stops());
        for (&a, &b) in static_route
            .arrivals()
            .iter()
            .zip(dynamic_route.arrivals())
        {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
    }
}

#[test]
fn test_identical_seeds_reproduce_the_run() {
    let run = |seed: u64| {
        let problem = instance::parse(INSTANCE).unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        let static_solution = solve_static(&problem, &test_params(), &mut rng);
        let dynamic_solution = solve_dynamic(&problem, &static_solution, &test_params(), &mut rng);
        dynamic_solution
            .plan
            .routes()
            .iter()
            .map(|route| {
                (
                    route.stops().to_vec(),
                    route.arrivals().to_vec(),
                )
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(11), run(11));
}
