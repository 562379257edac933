//! Coordinator and worker sides of the scatter/gather exchange.

use crate::evolution::{Evaluator, Genome, Individual, LocalScheduler};
use crate::schema::IndividualRecord;

use super::link::Link;
use super::{Message, TransportError, split_batches};

fn to_records<G: Genome>(batch: &[Individual<G>]) -> Result<Vec<IndividualRecord>, TransportError> {
    batch
        .iter()
        .map(|ind| ind.to_record().map_err(TransportError::from))
        .collect()
}

fn from_records<G: Genome>(
    records: Vec<IndividualRecord>,
) -> Result<Vec<Individual<G>>, TransportError> {
    records
        .into_iter()
        .map(|r| Individual::from_record(r).map_err(TransportError::from))
        .collect()
}

fn describe(message: &Message) -> String {
    match message {
        Message::Batch { generation, .. } => format!("batch for generation {generation}"),
        Message::Shutdown => "shutdown".to_string(),
    }
}

/// Coordinating side: owns one link per worker.
pub struct Coordinator<L: Link> {
    links: Vec<L>,
}

impl<L: Link> Coordinator<L> {
    pub fn new(links: Vec<L>) -> Self {
        Self { links }
    }

    pub fn workers(&self) -> usize {
        self.links.len()
    }

    /// Evaluate a whole generation across the coordinator and its workers.
    ///
    /// Returns only after every worker batch has come back; the population
    /// keeps its order. Returns the number of evaluations performed.
    pub fn evaluate<G, E>(
        &mut self,
        generation: usize,
        population: &mut Vec<Individual<G>>,
        scheduler: &LocalScheduler,
        evaluator: &E,
    ) -> Result<usize, TransportError>
    where
        G: Genome,
        E: Evaluator<G> + ?Sized,
    {
        let ranges = split_batches(population.len(), self.links.len());
        let mut remote = population.split_off(ranges[0].end);

        // Scatter.
        let mut sent = Vec::with_capacity(self.links.len());
        for (link, range) in self.links.iter_mut().zip(&ranges[1..]) {
            let batch: Vec<Individual<G>> = remote.drain(..range.len()).collect();
            let message = Message::Batch {
                generation,
                population: to_records(&batch)?,
            };
            link.send_frame(&message.encode()?)?;
            sent.push(batch.len());
        }
        log::debug!(
            "Scattered {:?} individuals, keeping {}",
            sent,
            population.len()
        );

        let mut performed = scheduler.evaluate(population, evaluator)?;

        // Gather: a full barrier over every worker.
        for (worker, (link, expected)) in self.links.iter_mut().zip(sent).enumerate() {
            let message = Message::decode(&link.recv_frame()?)?;
            let Message::Batch {
                generation: received,
                population: records,
            } = message
            else {
                return Err(TransportError::UnexpectedMessage(describe(&message)));
            };
            if received != generation {
                return Err(TransportError::GenerationMismatch {
                    worker,
                    expected: generation,
                    received,
                });
            }
            if records.len() != expected {
                return Err(TransportError::BatchSizeMismatch {
                    worker,
                    sent: expected,
                    received: records.len(),
                });
            }

            let batch = from_records::<G>(records)?;
            performed += batch.iter().filter(|i| !i.was_already_evaluated).count();
            log::trace!("Received {} treated individuals from worker {}", batch.len(), worker);
            population.extend(batch);
        }

        Ok(performed)
    }

    /// Tell every worker the run is over.
    pub fn shutdown(&mut self) -> Result<(), TransportError> {
        let payload = Message::Shutdown.encode()?;
        for link in &mut self.links {
            link.send_frame(&payload)?;
        }
        Ok(())
    }
}

/// Worker side: evaluates batches until told to stop.
pub struct Worker<L: Link> {
    link: L,
}

impl<L: Link> Worker<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Serve batches until a shutdown message. Returns the number of batches
    /// evaluated.
    pub fn serve<G, E>(
        &mut self,
        scheduler: &LocalScheduler,
        evaluator: &E,
    ) -> Result<usize, TransportError>
    where
        G: Genome,
        E: Evaluator<G> + ?Sized,
    {
        let mut served = 0;
        loop {
            match Message::decode(&self.link.recv_frame()?)? {
                Message::Shutdown => {
                    log::info!("Worker shutting down after {} batches", served);
                    return Ok(served);
                }
                Message::Batch {
                    generation,
                    population,
                } => {
                    let mut batch = from_records::<G>(population)?;
                    log::debug!(
                        "Reception of {} new individuals for generation {}",
                        batch.len(),
                        generation
                    );
                    scheduler.evaluate(&mut batch, evaluator)?;
                    let reply = Message::Batch {
                        generation,
                        population: to_records(&batch)?,
                    };
                    self.link.send_frame(&reply.encode()?)?;
                    served += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::Morphology;
    use crate::distributed::ChannelLink;
    use crate::evolution::{EvaluationError, EvoRng, GenomeError};
    use std::collections::HashSet;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u32);

    impl Genome for Tag {
        fn random(rng: &mut EvoRng) -> Self {
            Tag(rng.next_seed() as u32)
        }
        fn mutate(&mut self, _rng: &mut EvoRng) {}
        fn crossover(&self, _other: &Self, _rng: &mut EvoRng) -> Self {
            self.clone()
        }
        fn to_text(&self) -> Result<String, GenomeError> {
            Ok(self.0.to_string())
        }
        fn from_text(text: &str) -> Result<Self, GenomeError> {
            text.parse()
                .map(Tag)
                .map_err(|e| GenomeError::Invalid(format!("{e}")))
        }
    }

    fn square(ind: &mut Individual<Tag>) -> Result<(), EvaluationError> {
        let v = ind.genome.0 as f64;
        ind.set_fitness("square", v * v);
        ind.footprint = vec![vec![v]];
        Ok(())
    }

    fn spawn_workers(n: usize) -> (Vec<ChannelLink>, Vec<thread::JoinHandle<usize>>) {
        let mut links = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..n {
            let (coordinator_end, worker_end) = ChannelLink::pair();
            links.push(coordinator_end);
            handles.push(thread::spawn(move || {
                let scheduler = LocalScheduler::new(Some(2)).unwrap();
                Worker::new(worker_end)
                    .serve::<Tag, _>(&scheduler, &square)
                    .unwrap()
            }));
        }
        (links, handles)
    }

    #[test]
    fn test_scatter_gather_reconstructs_population() {
        for (size, workers) in [(10, 3), (7, 2), (3, 4), (20, 1), (5, 0)] {
            let (links, handles) = spawn_workers(workers);
            let mut coordinator = Coordinator::new(links);
            let scheduler = LocalScheduler::new(Some(2)).unwrap();

            let mut population: Vec<_> =
                (0..size as u32).map(|i| Individual::new(Tag(i))).collect();
            population[0].evaluated = true;

            let performed = coordinator
                .evaluate(0, &mut population, &scheduler, &square)
                .unwrap();
            assert_eq!(performed, size - 1);
            assert_eq!(population.len(), size);

            let tags: Vec<u32> = population.iter().map(|i| i.genome.0).collect();
            assert_eq!(tags, (0..size as u32).collect::<Vec<_>>());
            let unique: HashSet<u32> = tags.iter().copied().collect();
            assert_eq!(unique.len(), size);

            for ind in &population[1..] {
                assert!(ind.evaluated);
                let v = ind.genome.0 as f64;
                assert_eq!(ind.fitness("square"), Some(v * v));
            }

            coordinator.shutdown().unwrap();
            for handle in handles {
                let served = handle.join().unwrap();
                assert_eq!(served, 1);
            }
        }
    }

    fn gait(ind: &mut Individual<Morphology>) -> Result<(), EvaluationError> {
        let sum: f64 = ind.genome.genes.iter().sum();
        ind.set_fitness("sum", sum);
        ind.set_fitness("floor", if sum < 0.0 { f64::NEG_INFINITY } else { sum });
        ind.footprint = vec![ind.genome.genes.clone(), vec![sum / 3.0]];
        Ok(())
    }

    #[test]
    fn test_real_genomes_come_back_bit_identical() {
        let (coordinator_end, worker_end) = ChannelLink::pair();
        let handle = thread::spawn(move || {
            let scheduler = LocalScheduler::new(Some(2)).unwrap();
            Worker::new(worker_end)
                .serve::<Morphology, _>(&scheduler, &gait)
                .unwrap()
        });

        let mut rng = EvoRng::new(17);
        let originals: Vec<Morphology> = (0..200).map(|_| Morphology::random(&mut rng)).collect();
        let mut population: Vec<_> = originals.iter().cloned().map(Individual::new).collect();

        let mut coordinator = Coordinator::new(vec![coordinator_end]);
        let scheduler = LocalScheduler::new(Some(1)).unwrap();
        coordinator
            .evaluate(0, &mut population, &scheduler, &gait)
            .unwrap();
        coordinator.shutdown().unwrap();
        assert_eq!(handle.join().unwrap(), 1);

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        for (ind, original) in population.iter().zip(&originals) {
            let mut local = Individual::new(original.clone());
            gait(&mut local).unwrap();

            assert_eq!(bits(&ind.genome.genes), bits(&original.genes));
            assert_eq!(ind.footprint.len(), local.footprint.len());
            for (got, want) in ind.footprint.iter().zip(&local.footprint) {
                assert_eq!(bits(got), bits(want));
            }
            assert_eq!(
                ind.fitness("sum").map(f64::to_bits),
                local.fitness("sum").map(f64::to_bits)
            );
            assert_eq!(ind.fitness("floor"), local.fitness("floor"));
        }
        assert!(
            population
                .iter()
                .any(|i| i.fitness("floor") == Some(f64::NEG_INFINITY))
        );
    }

    #[test]
    fn test_multiple_generations_then_shutdown() {
        let (links, handles) = spawn_workers(2);
        let mut coordinator = Coordinator::new(links);
        let scheduler = LocalScheduler::new(Some(1)).unwrap();
        let mut population: Vec<_> = (0..9u32).map(|i| Individual::new(Tag(i))).collect();

        for generation in 0..3 {
            for ind in &mut population {
                ind.invalidate();
            }
            let performed = coordinator
                .evaluate(generation, &mut population, &scheduler, &square)
                .unwrap();
            assert_eq!(performed, 9);
        }
        coordinator.shutdown().unwrap();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }
    }

    #[test]
    fn test_short_batch_is_fatal() {
        let (coordinator_end, mut worker_end) = ChannelLink::pair();
        let responder = thread::spawn(move || {
            let _ = worker_end.recv_frame().unwrap();
            let reply = Message::Batch {
                generation: 0,
                population: Vec::new(),
            };
            worker_end.send_frame(&reply.encode().unwrap()).unwrap();
        });

        let mut coordinator = Coordinator::new(vec![coordinator_end]);
        let scheduler = LocalScheduler::new(Some(1)).unwrap();
        let mut population: Vec<_> = (0..4u32).map(|i| Individual::new(Tag(i))).collect();
        let err = coordinator
            .evaluate(0, &mut population, &scheduler, &square)
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::BatchSizeMismatch {
                worker: 0,
                sent: 2,
                received: 0
            }
        ));
        responder.join().unwrap();
    }

    #[test]
    fn test_lost_worker_is_fatal() {
        let (coordinator_end, worker_end) = ChannelLink::pair();
        drop(worker_end);
        let mut coordinator = Coordinator::new(vec![coordinator_end]);
        let scheduler = LocalScheduler::new(Some(1)).unwrap();
        let mut population: Vec<_> = (0..4u32).map(|i| Individual::new(Tag(i))).collect();
        assert!(matches!(
            coordinator.evaluate(0, &mut population, &scheduler, &square),
            Err(TransportError::Disconnected)
        ));
    }
}
