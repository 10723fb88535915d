use fxhash::FxHashSet;
use rand::{Rng, rngs::SmallRng};
use tracing::{info, warn};

use crate::{
    ga::{
        TaskAssignment,
        evolution::{GenomeSpace, INFEASIBLE, evolve},
        params::GaParams,
    },
    problem::{Time, delivery_problem::DeliveryProblem, depot::DepotIdx, task::TaskIdx,
        vehicle::VehicleIdx,
    },
    route::{cooperative::plan_cooperative, plan::Plan},
};

/// Multiplier on the hours by which the initial demand slips past the
/// congestion-free baseline.
pub const DELAY_PENALTY: f64 = 2.0;

/// Initial tasks whose peak-aware arrival overruns the static makespan
/// even though their congestion-free arrival did not. These, together
/// with the extra tasks, are free to move anywhere in the fleet.
pub fn identify_delayed_tasks(
    problem: &DeliveryProblem,
    static_plan: &Plan,
    static_makespan: Time,
) -> Vec<TaskIdx> {
    let mut delayed = Vec::new();

    for route in static_plan.routes() {
        if route.is_idle() {
            continue;
        }
        let peak_arrivals = route.retimed_arrivals(problem, true);
        for (i, stop) in route.stops().iter().enumerate() {
            let Some(task) = stop.served_task() else {
                continue;
            };
            if peak_arrivals[i] > static_makespan && route.arrivals()[i] <= static_makespan {
                delayed.push(task);
            }
        }
    }

    delayed
}

/// The whole-fleet search space of the re-plan. A gene may move a
/// flexible task to any vehicle; every other task is pinned to its
/// original depot, and `repair` pushes strayed genes back there.
struct FleetSpace<'a> {
    problem: &'a DeliveryProblem,
    loci: Vec<TaskIdx>,
    flexible: Vec<bool>,
    origin_depot: Vec<Option<DepotIdx>>,
    static_makespan: Time,
}

impl FleetSpace<'_> {
    fn group_by_vehicle(&self, genome: &[VehicleIdx]) -> Vec<Vec<TaskIdx>> {
        let mut groups = vec![Vec::new(); self.problem.vehicles().len()];
        for (&gene, &task) in genome.iter().zip(&self.loci) {
            groups[gene.get()].push(task);
        }
        groups
    }

    fn random_depot_vehicle(&self, depot: DepotIdx, rng: &mut SmallRng) -> VehicleIdx {
        let vehicles = self.problem.depot(depot).vehicles();
        vehicles[rng.random_range(0..vehicles.len())]
    }

    fn random_vehicle(&self, rng: &mut SmallRng) -> VehicleIdx {
        VehicleIdx::new(rng.random_range(0..self.problem.vehicles().len()))
    }
}

impl GenomeSpace for FleetSpace<'_> {
    fn fitness(&self, genome: &[VehicleIdx]) -> f64 {
        let groups = self.group_by_vehicle(genome);
        let Some(plan) = plan_cooperative(self.problem, &groups, false) else {
            return INFEASIBLE;
        };

        let makespan = plan.makespan();
        let initial_count = self.problem.initial_task_count();
        let max_initial_arrival = plan
            .routes()
            .iter()
            .flat_map(|route| route.stops().iter().zip(route.arrivals()))
            .filter(|(stop, _)| {
                stop.served_task()
                    .is_some_and(|task| task.get() < initial_count)
            })
            .map(|(_, &arrival)| arrival)
            .fold(0.0, f64::max);

        let penalty = DELAY_PENALTY * (max_initial_arrival - self.static_makespan).max(0.0);
        let cost = plan.total_cost(self.problem);
        let weight = self.problem.time_weight();

        weight * (makespan + penalty) + (1.0 - weight) * cost
    }

    fn mutate_locus(&self, locus: usize, rng: &mut SmallRng) -> VehicleIdx {
        match self.origin_depot[locus] {
            Some(depot) => self.random_depot_vehicle(depot, rng),
            None => self.random_vehicle(rng),
        }
    }

    fn repair(&self, genome: &mut [VehicleIdx], rng: &mut SmallRng) {
        for (locus, gene) in genome.iter_mut().enumerate() {
            if let Some(origin) = self.origin_depot[locus]
                && self.problem.vehicle(*gene).depot() != origin
            {
                *gene = self.random_depot_vehicle(origin, rng);
            }
        }
    }
}

/// Re-plans the whole fleet over every task the static phase placed plus
/// all extras. Returns `None` when no feasible initial population could
/// be seeded; the caller then degrades to the static solution.
pub fn run_dynamic_ga(
    problem: &DeliveryProblem,
    static_assignment: &TaskAssignment,
    delayed: &[TaskIdx],
    static_makespan: Time,
    params: &GaParams,
    rng: &mut SmallRng,
) -> Option<TaskAssignment> {
    let delayed_set: FxHashSet<TaskIdx> = delayed.iter().copied().collect();

    let mut loci = Vec::new();
    let mut flexible = Vec::new();
    let mut origin_depot = Vec::new();
    let mut pinned_gene = Vec::new();

    for (i, task) in problem.tasks().iter().enumerate() {
        let task_idx = TaskIdx::new(i);
        if task.is_extra() {
            loci.push(task_idx);
            flexible.push(true);
            origin_depot.push(None);
            pinned_gene.push(None);
            continue;
        }
        // Initial tasks the static phase never placed stay out of the
        // re-plan as well.
        let Some(static_vehicle) = static_assignment.vehicle_of(task_idx) else {
            continue;
        };
        let is_flexible = delayed_set.contains(&task_idx);
        loci.push(task_idx);
        flexible.push(is_flexible);
        origin_depot.push((!is_flexible).then(|| problem.vehicle(static_vehicle).depot()));
        pinned_gene.push(Some(static_vehicle));
    }

    if loci.is_empty() {
        return None;
    }

    let trucks: Vec<VehicleIdx> = problem
        .vehicle_indices()
        .filter(|&v| !problem.vehicle(v).is_drone())
        .collect();

    let space = FleetSpace {
        problem,
        loci,
        flexible,
        origin_depot,
        static_makespan,
    };

    let mut population: Vec<Vec<VehicleIdx>> = Vec::with_capacity(params.population_size);
    let mut attempts = 0;
    while population.len() < params.population_size && attempts < params.max_seed_attempts {
        attempts += 1;
        // Half the seeds keep flexible tasks on trucks so the population
        // does not start in an all-drone corner nothing can fly.
        let trucks_only = population.len() < params.population_size / 2 && !trucks.is_empty();

        let genome: Vec<VehicleIdx> = space
            .flexible
            .iter()
            .enumerate()
            .map(|(locus, &is_flexible)| {
                if !is_flexible {
                    pinned_gene[locus].expect("pinned locus has a static vehicle")
                } else if trucks_only {
                    trucks[rng.random_range(0..trucks.len())]
                } else {
                    space.random_vehicle(rng)
                }
            })
            .collect();

        if space.fitness(&genome) < INFEASIBLE {
            population.push(genome);
        }
    }

    if population.is_empty() {
        warn!("could not seed a feasible re-plan population");
        return None;
    }

    info!(
        tasks = space.loci.len(),
        flexible = space.flexible.iter().filter(|&&f| f).count(),
        "running dynamic search"
    );
    let best = evolve(&space, population, params, rng);

    let mut result = TaskAssignment::empty(problem);
    for (&gene, &task) in best.iter().zip(&space.loci) {
        result.set(task, gene);
    }
    Some(result)
}
