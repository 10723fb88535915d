/// Knobs of both genetic searches. Termination is expressed purely as a
/// generation count.
#[derive(Debug, Clone)]
pub struct GaParams {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    /// Attempt budget for seeding the initial population.
    pub max_seed_attempts: usize,
    /// Replacement tries before a mutation reverts.
    pub mutation_retries: usize,
    /// Child-generation tries before a generation is padded with elites.
    pub max_crossover_attempts: usize,
}

impl GaParams {
    pub fn static_defaults() -> Self {
        Self {
            population_size: 100,
            generations: 100,
            mutation_rate: 0.1,
            max_seed_attempts: 1_000,
            mutation_retries: 10,
            max_crossover_attempts: 1_000,
        }
    }

    pub fn dynamic_defaults() -> Self {
        Self {
            generations: 50,
            ..Self::static_defaults()
        }
    }
}
