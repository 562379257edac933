//! Multi-objective tournament selection with per-objective elitism.

use std::collections::BTreeMap;

use crate::schema::{GLOBAL_BUCKET, RunConfig, SelectionMode};

use super::bounded::{BoundedBest, Keep};
use super::genome::{EvoRng, Genome};
use super::individual::Individual;

/// Selection errors. All are fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Cannot select from an empty population")]
    EmptyPopulation,
    #[error("Individual {index} has no score for objective '{objective}'")]
    MissingObjective { index: usize, objective: String },
    #[error("Individual {index} has objectives {found:?}, expected {expected:?}")]
    ObjectiveMismatch {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Objective name '{0}' is reserved")]
    ReservedObjective(String),
    #[error("The evaluator produced no objective")]
    NoObjective,
    #[error(
        "{elites} elites x {objectives} objectives leaves no room for tournaments \
         in {size} individuals"
    )]
    TooManyElites {
        elites: usize,
        objectives: usize,
        size: usize,
    },
}

/// Objective names of an evaluated population.
///
/// Every individual must carry exactly the objective set of the first one.
pub fn objectives<G>(population: &[Individual<G>]) -> Result<Vec<String>, SelectionError> {
    let first = population.first().ok_or(SelectionError::EmptyPopulation)?;
    let names: Vec<String> = first.fitnesses.keys().cloned().collect();
    if names.is_empty() {
        return Err(SelectionError::NoObjective);
    }
    if names.iter().any(|n| n == GLOBAL_BUCKET) {
        return Err(SelectionError::ReservedObjective(GLOBAL_BUCKET.to_string()));
    }

    for (index, individual) in population.iter().enumerate().skip(1) {
        if individual.fitnesses.len() != names.len() {
            return Err(SelectionError::ObjectiveMismatch {
                index,
                expected: names.clone(),
                found: individual.fitnesses.keys().cloned().collect(),
            });
        }
        if let Some(missing) = names.iter().find(|n| !individual.fitnesses.contains_key(*n)) {
            return Err(SelectionError::MissingObjective {
                index,
                objective: missing.clone(),
            });
        }
    }
    Ok(names)
}

/// Score of `individual` on `objective`.
fn score<G>(
    population: &[Individual<G>],
    index: usize,
    objective: &str,
) -> Result<f64, SelectionError> {
    population[index]
        .fitness(objective)
        .ok_or_else(|| SelectionError::MissingObjective {
            index,
            objective: objective.to_string(),
        })
}

/// Indices of the best `n` individuals on `objective`, first seen winning
/// ties. Order of the result is unspecified.
pub fn elite_indices<G>(
    population: &[Individual<G>],
    objective: &str,
    n: usize,
) -> Result<Vec<usize>, SelectionError> {
    let mut best = BoundedBest::new(Keep::Largest, n);
    for index in 0..population.len() {
        best.offer(score(population, index, objective)?, index);
    }
    Ok(best.into_entries().into_iter().map(|(_, i)| i).collect())
}

/// Elites for each objective, best first.
pub fn elites<'a, G>(
    population: &'a [Individual<G>],
    objectives: &[String],
    n: usize,
) -> Result<BTreeMap<String, Vec<&'a Individual<G>>>, SelectionError> {
    let mut result = BTreeMap::new();
    for objective in objectives {
        let mut indices = elite_indices(population, objective, n)?;
        indices.sort_by(|&a, &b| {
            let sa = population[a].fitness(objective).unwrap_or(f64::NEG_INFINITY);
            let sb = population[b].fitness(objective).unwrap_or(f64::NEG_INFINITY);
            sb.total_cmp(&sa).then(a.cmp(&b))
        });
        result.insert(
            objective.clone(),
            indices.into_iter().map(|i| &population[i]).collect(),
        );
    }
    Ok(result)
}

/// Builds the next generation from an evaluated population.
///
/// Owns the run's selection random stream: draws are sequential, so a seeded
/// selector replays the same choices on the same population.
#[derive(Debug, Clone)]
pub struct Selector {
    rng: EvoRng,
    mode: SelectionMode,
    nb_elites: usize,
    tournament_size: usize,
    crossover_probability: f64,
    mutation_probability: f64,
}

impl Selector {
    pub fn new(config: &RunConfig, rng: EvoRng) -> Self {
        Self {
            rng,
            mode: config.selection,
            nb_elites: config.nb_elites,
            tournament_size: config.tournament_size,
            crossover_probability: config.crossover_probability,
            mutation_probability: config.mutation_probability,
        }
    }

    /// Random stream shared with genome operators.
    pub fn rng(&mut self) -> &mut EvoRng {
        &mut self.rng
    }

    /// Produce `size` individuals from `population`.
    pub fn next_generation<G: Genome>(
        &mut self,
        population: &[Individual<G>],
        size: usize,
    ) -> Result<Vec<Individual<G>>, SelectionError> {
        let names = objectives(population)?;
        match self.mode {
            SelectionMode::MultiObjective => self.tournament(population, &names, size),
            SelectionMode::SplitPerObjective => {
                let share = size / names.len();
                let remaining = size % names.len();
                let mut next = Vec::with_capacity(size);
                for (i, name) in names.iter().enumerate() {
                    let n = share + usize::from(i < remaining);
                    let part = self.tournament(population, std::slice::from_ref(name), n)?;
                    next.extend(part);
                }
                Ok(next)
            }
        }
    }

    /// Elites of every objective in `names`, then tournaments until `size`.
    fn tournament<G: Genome>(
        &mut self,
        population: &[Individual<G>],
        names: &[String],
        size: usize,
    ) -> Result<Vec<Individual<G>>, SelectionError> {
        if self.nb_elites * names.len() >= size {
            return Err(SelectionError::TooManyElites {
                elites: self.nb_elites,
                objectives: names.len(),
                size,
            });
        }

        let mut next = Vec::with_capacity(size);
        for elites in elites(population, names, self.nb_elites)?.into_values() {
            next.extend(elites.into_iter().cloned());
        }

        while next.len() < size {
            let pool0: Vec<usize> = (0..self.tournament_size)
                .map(|_| self.rng.index(population.len()))
                .collect();
            let pool1: Vec<usize> = (0..self.tournament_size)
                .map(|_| self.rng.index(population.len()))
                .collect();
            let obj0 = &names[self.rng.index(names.len())];
            let obj1 = &names[self.rng.index(names.len())];

            let p0 = pool_winner(population, &pool0, obj0)?;
            let p1 = pool_winner(population, &pool1, obj1)?;

            let mut offspring = if self.rng.chance(self.crossover_probability) {
                Individual::new(
                    population[p0]
                        .genome
                        .crossover(&population[p1].genome, &mut self.rng),
                )
            } else {
                population[p0].clone()
            };

            if self.rng.chance(self.mutation_probability) {
                offspring.genome.mutate(&mut self.rng);
                offspring.invalidate();
            }
            next.push(offspring);
        }

        Ok(next)
    }
}

/// Best pool member on `objective`; the earliest drawn wins ties.
fn pool_winner<G>(
    population: &[Individual<G>],
    pool: &[usize],
    objective: &str,
) -> Result<usize, SelectionError> {
    let mut winner = pool[0];
    let mut best = score(population, winner, objective)?;
    for &candidate in &pool[1..] {
        let s = score(population, candidate, objective)?;
        if s > best {
            best = s;
            winner = candidate;
        }
    }
    Ok(winner)
}
