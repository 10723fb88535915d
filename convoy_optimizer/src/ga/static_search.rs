use rand::{Rng, rngs::SmallRng};
use tracing::{debug, info, warn};

use crate::{
    assignment::DepotAssignment,
    ga::{
        TaskAssignment,
        evolution::{GenomeSpace, INFEASIBLE, evolve},
        params::GaParams,
    },
    problem::{delivery_problem::DeliveryProblem, depot::DepotIdx, task::TaskIdx,
        vehicle::VehicleIdx,
    },
    route::constructor::{ConstructionMode, build_route},
};

/// One depot's search space: genes pick which of the depot's vehicles
/// serves each of its tasks, and a genome scores by actually constructing
/// every implied route.
struct DepotSpace<'a> {
    problem: &'a DeliveryProblem,
    tasks: &'a [TaskIdx],
    vehicles: &'a [VehicleIdx],
}

impl GenomeSpace for DepotSpace<'_> {
    fn fitness(&self, genome: &[VehicleIdx]) -> f64 {
        let weight = self.problem.time_weight();
        let mut makespan: f64 = 0.0;
        let mut cost = 0.0;

        for &vehicle in self.vehicles {
            let vehicle_tasks: Vec<TaskIdx> = genome
                .iter()
                .zip(self.tasks)
                .filter(|&(&gene, _)| gene == vehicle)
                .map(|(_, &task)| task)
                .collect();
            if vehicle_tasks.is_empty() {
                continue;
            }

            let Some(route) =
                build_route(self.problem, vehicle, &vehicle_tasks, ConstructionMode::Static)
            else {
                return INFEASIBLE;
            };

            if let Some(arrival) = route.last_task_arrival() {
                makespan = makespan.max(arrival);
            }
            cost += route.cost(self.problem);
        }

        weight * makespan + (1.0 - weight) * cost
    }

    fn mutate_locus(&self, _locus: usize, rng: &mut SmallRng) -> VehicleIdx {
        self.vehicles[rng.random_range(0..self.vehicles.len())]
    }
}

/// Runs one independent genetic search per depot over the depot's
/// assigned tasks and collects the winning task -> vehicle mapping.
/// A depot whose population cannot be seeded is skipped with a warning;
/// its tasks stay unassigned and the validator will surface them.
pub fn run_static_ga(
    problem: &DeliveryProblem,
    assignment: &DepotAssignment,
    params: &GaParams,
    rng: &mut SmallRng,
) -> TaskAssignment {
    let mut result = TaskAssignment::empty(problem);

    for slot in 0..problem.depots().len() {
        let depot_idx = DepotIdx::new(slot);
        let depot = problem.depot(depot_idx);
        let tasks = assignment.tasks_of(depot_idx);

        if tasks.is_empty() {
            debug!(depot = depot.external_id(), "no tasks, skipping depot");
            continue;
        }
        if depot.vehicles().is_empty() {
            warn!(depot = depot.external_id(), "depot has no vehicles, skipping");
            continue;
        }

        let space = DepotSpace {
            problem,
            tasks,
            vehicles: depot.vehicles(),
        };

        let Some(population) = seed_population(&space, params, rng) else {
            warn!(
                depot = depot.external_id(),
                "could not seed a feasible population, skipping depot"
            );
            continue;
        };

        info!(
            depot = depot.external_id(),
            tasks = tasks.len(),
            vehicles = depot.vehicles().len(),
            "running static search"
        );
        let best = evolve(&space, population, params, rng);

        for (&gene, &task) in best.iter().zip(tasks) {
            result.set(task, gene);
        }
    }

    result
}

fn seed_population(
    space: &DepotSpace<'_>,
    params: &GaParams,
    rng: &mut SmallRng,
) -> Option<Vec<Vec<VehicleIdx>>> {
    let mut population = Vec::with_capacity(params.population_size);
    let mut attempts = 0;

    while population.len() < params.population_size && attempts < params.max_seed_attempts {
        attempts += 1;
        let genome: Vec<VehicleIdx> = (0..space.tasks.len())
            .map(|_| space.vehicles[rng.random_range(0..space.vehicles.len())])
            .collect();
        if space.fitness(&genome) < INFEASIBLE {
            population.push(genome);
        }
    }

    if population.is_empty() {
        None
    } else {
        Some(population)
    }
}
