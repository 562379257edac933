mod common;

use std::net::TcpListener;
use std::thread;

use common::{Int, IntEvaluator, opposed};
use morpho_evo::distributed::{ChannelLink, Link, TcpLink, Worker};
use morpho_evo::evolution::{EvolutionEngine, LocalScheduler, StopReason};
use morpho_evo::schema::RunConfig;

fn config() -> RunConfig {
    RunConfig::default()
        .with_population_size(23)
        .with_nb_generations(4)
        .with_nb_elites(1)
        .with_novelty(4, 1.0)
        .with_random_seed(99)
        .with_threads(2)
        .without_checkpoints()
}

fn objective_series(engine: &EvolutionEngine<Int, IntEvaluator>) -> Vec<Vec<(f64, f64, f64)>> {
    engine
        .stats()
        .entries()
        .iter()
        .map(|e| {
            e.objectives
                .values()
                .map(|s| (s.avg, s.worst, s.best))
                .collect()
        })
        .collect()
}

fn local_run() -> (Vec<Vec<(f64, f64, f64)>>, Vec<i64>) {
    let mut engine = EvolutionEngine::<Int, _>::new(config(), opposed as IntEvaluator).unwrap();
    engine.run().unwrap();
    let genomes = engine.population().iter().map(|i| i.genome.0).collect();
    (objective_series(&engine), genomes)
}

#[test]
fn test_channel_workers_match_local_run() {
    let mut links: Vec<Box<dyn Link>> = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let (coordinator_end, worker_end) = ChannelLink::pair();
        links.push(Box::new(coordinator_end));
        handles.push(thread::spawn(move || {
            let scheduler = LocalScheduler::new(Some(1)).unwrap();
            Worker::new(worker_end)
                .serve::<Int, _>(&scheduler, &(opposed as IntEvaluator))
                .unwrap()
        }));
    }

    let mut engine = EvolutionEngine::<Int, _>::new(config(), opposed as IntEvaluator)
        .unwrap()
        .with_workers(links);
    let summary = engine.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::MaxGenerations);
    assert_eq!(summary.generations, 5);

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 5);
    }

    let genomes: Vec<i64> = engine.population().iter().map(|i| i.genome.0).collect();
    let (local_series, local_genomes) = local_run();
    assert_eq!(genomes, local_genomes);
    assert_eq!(objective_series(&engine), local_series);
}

#[test]
fn test_tcp_workers() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(move || {
                let link = TcpLink::connect(addr).unwrap();
                let scheduler = LocalScheduler::new(Some(1)).unwrap();
                Worker::new(link)
                    .serve::<Int, _>(&scheduler, &(opposed as IntEvaluator))
                    .unwrap()
            })
        })
        .collect();

    let links: Vec<Box<dyn Link>> = TcpLink::accept(&listener, 2)
        .unwrap()
        .into_iter()
        .map(|l| Box::new(l) as Box<dyn Link>)
        .collect();

    let mut engine = EvolutionEngine::<Int, _>::new(config(), opposed as IntEvaluator)
        .unwrap()
        .with_workers(links);
    let summary = engine.run().unwrap();
    assert_eq!(summary.generations, 5);
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 5);
    }

    let (local_series, _) = local_run();
    assert_eq!(objective_series(&engine), local_series);
}
