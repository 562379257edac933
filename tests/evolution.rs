mod common;

use common::{Int, IntEvaluator, opposed, score};
use morpho_evo::evolution::{EvolutionEngine, NOVELTY_OBJECTIVE, StopReason};
use morpho_evo::schema::{RunConfig, SelectionMode};

fn base_config() -> RunConfig {
    RunConfig::default()
        .with_random_seed(2024)
        .with_threads(4)
        .without_checkpoints()
}

#[test]
fn test_best_score_never_decreases() {
    let config = base_config()
        .with_population_size(20)
        .with_nb_elites(1)
        .with_tournament_size(3)
        .with_crossover_probability(1.0)
        .with_mutation_probability(0.0);
    let mut engine = EvolutionEngine::<Int, _>::new(config, score as IntEvaluator).unwrap();

    let summary = engine.step(5).unwrap();
    assert_eq!(summary.generations, 5);
    assert_eq!(summary.stop_reason, StopReason::StepsCompleted);

    let series: Vec<f64> = engine
        .stats()
        .best_series("score")
        .into_iter()
        .map(|b| b.unwrap())
        .collect();
    assert_eq!(series.len(), 5);
    for pair in series.windows(2) {
        assert!(pair[1] >= pair[0], "best went down: {series:?}");
    }
}

#[test]
fn test_elites_of_every_objective_survive() {
    let config = base_config()
        .with_population_size(30)
        .with_nb_elites(2)
        .with_crossover_probability(0.5)
        .with_mutation_probability(1.0);
    let mut engine = EvolutionEngine::<Int, _>::new(config, opposed as IntEvaluator).unwrap();

    let mut next = 0i64;
    engine
        .initialize_with(|_| {
            next += 1;
            Int(next * 37 % 101)
        })
        .unwrap();

    engine.step(1).unwrap();
    let mut parents: Vec<i64> = engine.population().iter().map(|i| i.genome.0).collect();
    parents.sort_unstable();

    engine.step(1).unwrap();
    let children: Vec<i64> = engine.population().iter().map(|i| i.genome.0).collect();

    // Two best on A (largest x) and two best on B (smallest x).
    for elite in [parents[0], parents[1], parents[28], parents[29]] {
        assert!(
            children.contains(&elite),
            "elite {elite} missing from {children:?}"
        );
    }
    let elite_a = children.iter().filter(|&&x| x >= parents[28]).count();
    let elite_b = children.iter().filter(|&&x| x <= parents[1]).count();
    assert!(elite_a >= 2);
    assert!(elite_b >= 2);
}

#[test]
fn test_split_per_objective_run() {
    let config = base_config()
        .with_population_size(21)
        .with_nb_elites(2)
        .with_nb_generations(4)
        .with_selection(SelectionMode::SplitPerObjective);
    let mut engine = EvolutionEngine::<Int, _>::new(config, opposed as IntEvaluator).unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary.stop_reason, StopReason::MaxGenerations);
    assert_eq!(summary.generations, 5);
    assert_eq!(engine.population().len(), 21);
}

#[test]
fn test_novelty_archive_grows_monotonically() {
    let config = base_config()
        .with_population_size(25)
        .with_nb_generations(6)
        .with_novelty(5, 2.0);
    let mut engine = EvolutionEngine::<Int, _>::new(config, opposed as IntEvaluator).unwrap();

    let mut sizes = Vec::new();
    engine
        .run_with_callback(|progress| {
            let report = progress.novelty.as_ref().unwrap();
            assert_eq!(progress.archive_size, report.previous_size + report.added);
            sizes.push(progress.archive_size);
        })
        .unwrap();

    assert_eq!(sizes.len(), 7);
    assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
    assert!(
        engine
            .archive()
            .entries()
            .iter()
            .all(|i| i.fitness(NOVELTY_OBJECTIVE).unwrap() > 2.0)
    );
}

#[test]
fn test_seeded_runs_reproducible() {
    let run = || {
        let config = base_config()
            .with_population_size(16)
            .with_nb_generations(5);
        let mut engine = EvolutionEngine::<Int, _>::new(config, opposed as IntEvaluator).unwrap();
        engine.run().unwrap();
        engine
            .population()
            .iter()
            .map(|i| i.genome.0)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
