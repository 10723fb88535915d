use std::path::PathBuf;

use clap::Parser;
use mimalloc::MiMalloc;
use rand::{SeedableRng, rngs::SmallRng};

use convoy_optimizer::{
    ga::params::GaParams,
    parsers::instance::load_instance,
    report::{PhaseLabel, PlanReport},
    solver::{solve_dynamic, solve_static},
    validate::{StaticBaseline, validate_dynamic, validate_static},
};

mod output;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(author, version, about = "Two-phase truck/drone delivery planner", long_about = None)]
struct Cli {
    /// Instance file to solve.
    input: PathBuf,

    /// Seed of the search; identical seed and input reproduce the run.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(short, long)]
    debug: bool,

    #[arg(long)]
    population: Option<usize>,

    #[arg(long)]
    generations: Option<usize>,

    #[arg(long)]
    mutation_rate: Option<f64>,

    /// Write both phase reports as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let problem = load_instance(&cli.input)?;
    let mut rng = SmallRng::seed_from_u64(cli.seed);

    let static_params = override_params(GaParams::static_defaults(), &cli);
    let static_solution = solve_static(&problem, &static_params, &mut rng);
    output::print_static(&problem, &static_solution.plan);

    let dynamic_params = override_params(GaParams::dynamic_defaults(), &cli);
    let dynamic_solution = solve_dynamic(&problem, &static_solution, &dynamic_params, &mut rng);
    output::print_dynamic(&problem, &static_solution.plan, &dynamic_solution.plan);

    if let Some(path) = &cli.json {
        let reports = vec![
            PlanReport::from_plan(&problem, &static_solution.plan, PhaseLabel::Static),
            PlanReport::from_plan(&problem, &dynamic_solution.plan, PhaseLabel::Dynamic),
        ];
        std::fs::write(path, serde_json::to_string_pretty(&reports)?)?;
    }

    let baseline = StaticBaseline {
        plan: &static_solution.plan,
        makespan: static_solution.makespan,
    };
    let mut errors = validate_static(&problem, &static_solution.plan);
    errors.extend(validate_dynamic(&problem, &dynamic_solution.plan, &baseline));

    if !errors.is_empty() {
        for error in &errors {
            eprintln!("validation: {error}");
        }
        anyhow::bail!("{} validation error(s)", errors.len());
    }

    Ok(())
}

fn override_params(mut params: GaParams, cli: &Cli) -> GaParams {
    if let Some(population) = cli.population {
        params.population_size = population;
    }
    if let Some(generations) = cli.generations {
        params.generations = generations;
    }
    if let Some(mutation_rate) = cli.mutation_rate {
        params.mutation_rate = mutation_rate;
    }
    params
}
