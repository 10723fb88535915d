use rand::{Rng, rngs::SmallRng};
use rayon::prelude::*;

use crate::{ga::params::GaParams, problem::vehicle::VehicleIdx};

pub(crate) const INFEASIBLE: f64 = f64::MAX;

/// The search space a genetic run explores: how a genome scores, what a
/// gene may mutate into, and how an operator result is pushed back inside
/// the legal region. Fitness must be a pure function so populations can be
/// scored in parallel.
pub(crate) trait GenomeSpace: Sync {
    fn fitness(&self, genome: &[VehicleIdx]) -> f64;

    fn mutate_locus(&self, locus: usize, rng: &mut SmallRng) -> VehicleIdx;

    /// Re-legalizes a genome after crossover. Default: nothing to fix.
    fn repair(&self, _genome: &mut [VehicleIdx], _rng: &mut SmallRng) {}
}

pub(crate) fn score_population<S: GenomeSpace>(
    space: &S,
    population: &[Vec<VehicleIdx>],
) -> Vec<(f64, Vec<VehicleIdx>)> {
    population
        .par_iter()
        .map(|genome| (space.fitness(genome), genome.clone()))
        .collect()
}

/// Runs the generational loop over an already-seeded population and
/// returns the fittest genome. Elitist selection keeps the best half;
/// children come from single-point crossover and are admitted only when
/// feasible; mutation swaps one gene and reverts unless a feasible
/// replacement is found within the retry budget.
pub(crate) fn evolve<S: GenomeSpace>(
    space: &S,
    mut population: Vec<Vec<VehicleIdx>>,
    params: &GaParams,
    rng: &mut SmallRng,
) -> Vec<VehicleIdx> {
    debug_assert!(!population.is_empty());

    for _ in 0..params.generations {
        let mut scored = score_population(space, &population);
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let elite_count = (params.population_size / 2).max(1).min(scored.len());
        let elites: Vec<Vec<VehicleIdx>> = scored[..elite_count]
            .iter()
            .map(|(_, genome)| genome.clone())
            .collect();

        let mut next = elites.clone();
        let mut attempts = 0;
        while next.len() < params.population_size
            && elites.len() >= 2
            && attempts < params.max_crossover_attempts
        {
            attempts += 1;
            let first = rng.random_range(0..elites.len());
            let second = rng.random_range(0..elites.len());
            if first == second {
                continue;
            }

            let (mut child_a, mut child_b) =
                single_point_crossover(&elites[first], &elites[second], rng);
            space.repair(&mut child_a, rng);
            space.repair(&mut child_b, rng);

            if space.fitness(&child_a) < INFEASIBLE {
                next.push(child_a);
            }
            if next.len() < params.population_size && space.fitness(&child_b) < INFEASIBLE {
                next.push(child_b);
            }
        }
        // Crossover ran dry; pad the generation with elite copies so the
        // population size holds.
        while next.len() < params.population_size {
            let pick = rng.random_range(0..elites.len());
            next.push(elites[pick].clone());
        }

        for genome in next.iter_mut() {
            if !rng.random_bool(params.mutation_rate) {
                continue;
            }
            let locus = rng.random_range(0..genome.len());
            let old = genome[locus];
            for _ in 0..params.mutation_retries {
                let candidate = space.mutate_locus(locus, rng);
                if candidate == old {
                    continue;
                }
                genome[locus] = candidate;
                if space.fitness(genome) < INFEASIBLE {
                    break;
                }
                genome[locus] = old;
            }
        }

        population = next;
    }

    let mut scored = score_population(space, &population);
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.swap_remove(0).1
}

fn single_point_crossover(
    a: &[VehicleIdx],
    b: &[VehicleIdx],
    rng: &mut SmallRng,
) -> (Vec<VehicleIdx>, Vec<VehicleIdx>) {
    let mut child_a = a.to_vec();
    let mut child_b = b.to_vec();

    let point = rng.random_range(0..a.len());
    for locus in 0..=point {
        std::mem::swap(&mut child_a[locus], &mut child_b[locus]);
    }

    (child_a, child_b)
}
