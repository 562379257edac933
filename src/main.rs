//! Morpho Evo CLI - Run an evolutionary search from JSON configuration.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process;

use morpho_evo::demo::{DemoEvaluator, Morphology};
use morpho_evo::distributed::{Link, TcpLink, Worker};
use morpho_evo::evolution::{EvolutionEngine, LocalScheduler};
use morpho_evo::schema::RunConfig;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    match args[1].as_str() {
        "--example" => print_example_config(),
        "--worker" => {
            let Some(addr) = args.get(2) else {
                print_usage(&args[0]);
                process::exit(1);
            };
            run_worker(addr);
        }
        "--coordinator" => {
            let (Some(addr), Some(workers), Some(config_path)) =
                (args.get(2), args.get(3), args.get(4))
            else {
                print_usage(&args[0]);
                process::exit(1);
            };
            let workers: usize = workers.parse().unwrap_or_else(|e| {
                eprintln!("Invalid worker count '{}': {}", workers, e);
                process::exit(1);
            });
            let options = Options::parse(&args[0], Path::new(config_path), &args[5..]);
            run_coordinator(addr, workers, options);
        }
        _ => {
            let options = Options::parse(&args[0], Path::new(&args[1]), &args[2..]);
            run_local(options);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <config.json> [generations] [options]", program);
    eprintln!(
        "       {} --coordinator <addr> <workers> <config.json> [generations] [options]",
        program
    );
    eprintln!("       {} --worker <addr>", program);
    eprintln!();
    eprintln!("Evolve walker gaits from a JSON run configuration.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Path to run configuration file");
    eprintln!("  generations  Overrides nb_generations from the configuration");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --resume <file.pop>     Resume from a population snapshot");
    eprintln!("  --archive <file.pop>    Start from a saved novelty archive");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
    eprintln!("Set RUST_LOG=info (or debug) to follow the run.");
}

/// Settings of a local or coordinating run.
struct Options {
    config: RunConfig,
    resume: Option<PathBuf>,
    archive: Option<PathBuf>,
}

impl Options {
    fn parse(program: &str, config_path: &Path, rest: &[String]) -> Self {
        let config_str = fs::read_to_string(config_path).unwrap_or_else(|e| {
            eprintln!("Error reading config file: {}", e);
            process::exit(1);
        });
        let mut config: RunConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Error parsing config: {}", e);
            process::exit(1);
        });

        let (resume, archive) = parse_flags(rest, &mut config).unwrap_or_else(|e| {
            eprintln!("{}", e);
            print_usage(program);
            process::exit(1);
        });

        Self {
            config,
            resume,
            archive,
        }
    }
}

/// Trailing arguments: an optional generation count and the snapshot flags.
fn parse_flags(
    rest: &[String],
    config: &mut RunConfig,
) -> Result<(Option<PathBuf>, Option<PathBuf>), String> {
    let mut resume = None;
    let mut archive = None;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            flag @ ("--resume" | "--archive") => {
                let path = iter
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| format!("Missing file after {}", flag))?;
                if flag == "--resume" {
                    resume = Some(path);
                } else {
                    archive = Some(path);
                }
            }
            other => match other.parse() {
                Ok(generations) => config.nb_generations = generations,
                Err(_) => return Err(format!("Unexpected argument: {}", other)),
            },
        }
    }
    Ok((resume, archive))
}

fn build_engine(options: &Options) -> EvolutionEngine<Morphology, DemoEvaluator> {
    let mut engine = EvolutionEngine::new(options.config.clone(), DemoEvaluator::default())
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });

    if let Some(path) = &options.resume {
        engine.load_population(path).unwrap_or_else(|e| {
            eprintln!("Error loading population: {}", e);
            process::exit(1);
        });
    }
    if let Some(path) = &options.archive {
        engine.load_archive(path).unwrap_or_else(|e| {
            eprintln!("Error loading archive: {}", e);
            process::exit(1);
        });
    }
    engine
}

fn run_local(options: Options) {
    let engine = build_engine(&options);
    run_engine(engine, &options.config);
}

fn run_coordinator(addr: &str, workers: usize, options: Options) {
    let listener = TcpListener::bind(addr).unwrap_or_else(|e| {
        eprintln!("Cannot listen on {}: {}", addr, e);
        process::exit(1);
    });
    println!("Waiting for {} workers on {}...", workers, addr);

    let links = TcpLink::accept(&listener, workers).unwrap_or_else(|e| {
        eprintln!("Error accepting workers: {}", e);
        process::exit(1);
    });
    let links: Vec<Box<dyn Link>> = links
        .into_iter()
        .map(|l| Box::new(l) as Box<dyn Link>)
        .collect();

    let engine = build_engine(&options).with_workers(links);
    run_engine(engine, &options.config);
}

fn run_engine(mut engine: EvolutionEngine<Morphology, DemoEvaluator>, config: &RunConfig) {
    println!("Morpho Evo");
    println!("==========");
    println!("Population: {}", config.population_size);
    println!("Generations: {}", config.nb_generations);
    println!(
        "Elites: {} per objective, tournament size {}",
        config.nb_elites, config.tournament_size
    );
    println!(
        "Crossover: {:.2}, mutation: {:.2}",
        config.crossover_probability, config.mutation_probability
    );
    if config.novelty.enabled {
        println!(
            "Novelty: k = {}, archive threshold = {}",
            config.novelty.k_nearest, config.novelty.min_novelty_for_archive
        );
    }
    println!();

    let result = engine.run_with_callback(|progress| {
        let best: Vec<String> = progress
            .stats
            .objectives
            .iter()
            .map(|(name, s)| format!("{}={:.4}", name, s.best))
            .collect();
        println!(
            "  Generation {}: {} evaluations in {:.2}s (x{:.1}), archive={}, best: {}",
            progress.generation,
            progress.evaluations,
            progress.stats.global.gen_total_time,
            progress.stats.global.time_ratio(),
            progress.archive_size,
            best.join(", ")
        );
    });

    let summary = result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    println!();
    println!("Stopped: {:?}", summary.stop_reason);
    println!(
        "Time: {:.2}s ({} generations, {} evaluations)",
        summary.elapsed_seconds, summary.generations, summary.total_evaluations
    );
    if let Some(dir) = &summary.run_dir {
        println!("Results written in {}", dir.display());
    }
}

fn run_worker(addr: &str) {
    let link = TcpLink::connect(addr).unwrap_or_else(|e| {
        eprintln!("Cannot connect to {}: {}", addr, e);
        process::exit(1);
    });
    let scheduler = LocalScheduler::new(None).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let served = Worker::new(link)
        .serve::<Morphology, _>(&scheduler, &DemoEvaluator::default())
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });
    println!("Evaluated {} batches", served);
}

fn print_example_config() {
    let config = RunConfig::default()
        .with_population_size(100)
        .with_nb_generations(50)
        .with_novelty(15, 0.5);

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
