mod simulation;
mod scenarios;
mod charts;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use auction_outcome::logger::{Logger, LogEvent, LogReceiverTrait, WriterReceiver};
use auction_outcome::utils::{sanitize_filename, RAND_SEED, VERBOSE_AUCTION, TOTAL_SIMULATED_REQUESTS};
use auction_outcome::{log, logln};
use scenarios::get_scenario_catalog;

fn open_log_file(path: &str, events: Vec<LogEvent>) -> Box<dyn LogReceiverTrait> {
    match WriterReceiver::file(&PathBuf::from(path), events) {
        Ok(receiver) => receiver,
        Err(e) => {
            eprintln!("Error: cannot open log file '{}': {}", path, e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: auction_outcome [--verbose auction] [--fastbreak] <scenario|all|charts> [iterations] [start]");
    eprintln!("Available scenarios:");
    for s in get_scenario_catalog() {
        eprintln!("  - {}", s.short_name);
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Parse and filter out --verbose and --fastbreak arguments
    let mut args = Vec::new();
    let mut skip_next = false;
    let mut fastbreak = false;
    for (i, arg) in raw_args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--verbose" {
            if i + 1 < raw_args.len() && raw_args[i + 1] == "auction" {
                VERBOSE_AUCTION.store(true, Ordering::Relaxed);
                skip_next = true;
            }
            continue;
        }
        if arg == "--fastbreak" {
            fastbreak = true;
            continue;
        }
        args.push(arg.clone());
    }

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    if args[1] == "charts" {
        match charts::generate_all_charts() {
            Ok(()) => {
                println!("All chart generation completed successfully.");
            }
            Err(e) => {
                eprintln!("Error generating charts: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let scenario_arg = &args[1];

    let iterations = if args.len() > 2 {
        match args[2].parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid iterations parameter '{}'. Expected a number.", args[2]);
                std::process::exit(1);
            }
        }
    } else {
        1
    };

    let start_iteration = if args.len() > 3 {
        match args[3].parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid start iteration parameter '{}'. Expected a number.", args[3]);
                std::process::exit(1);
            }
        }
    } else {
        0
    };

    let all_scenarios = get_scenario_catalog();
    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                print_usage();
                std::process::exit(1);
            }
        }
    };

    // Scenario detail on the console only for a single scenario run once
    let mut logger = Logger::new();
    if scenario_arg != "all" && iterations == 1 {
        logger.add_receiver(WriterReceiver::console(vec![LogEvent::Validation, LogEvent::Scenario]));
    } else {
        logger.add_receiver(WriterReceiver::console(vec![LogEvent::Validation]));
    }
    let summary_receiver_id = logger.add_receiver(open_log_file("log/summary.log", vec![LogEvent::Validation]));

    TOTAL_SIMULATED_REQUESTS.store(0, Ordering::Relaxed);

    if iterations > 1 {
        logln!(&mut logger, LogEvent::Validation, "Running '{}' {} times...\n", scenario_arg, iterations);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running '{}'...\n", scenario_arg);
    }

    'scenarios: for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

        let log_dir = format!("log/{}", sanitize_filename(scenario.short_name));
        let scenario_receiver_id = logger.add_receiver(open_log_file(&format!("{}/scenario.log", log_dir), vec![LogEvent::Scenario]));
        let auctions_receiver_id = if VERBOSE_AUCTION.load(Ordering::Relaxed) {
            Some(logger.add_receiver(open_log_file(&format!("{}/auctions.log", log_dir), vec![LogEvent::Auction, LogEvent::Request])))
        } else {
            None
        };

        for i in start_iteration..(start_iteration + iterations) {
            let iteration_num = i - start_iteration + 1;
            if iterations > 1 {
                log!(&mut logger, LogEvent::Validation, "[{}/{}] ", iteration_num, iterations);
            }

            RAND_SEED.store(i, Ordering::Relaxed);

            match (scenario.run)(scenario.short_name, &mut logger) {
                Ok(()) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✓");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                    }
                }
                Err(e) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✗");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                    }

                    if fastbreak {
                        logger.remove_receiver(scenario_receiver_id);
                        if let Some(id) = auctions_receiver_id {
                            logger.remove_receiver(id);
                        }
                        logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                        logln!(&mut logger, LogEvent::Validation, "Error at iteration {}/{} (seed {}): {}", iteration_num, iterations, i, e);
                        break 'scenarios;
                    }
                }
            }
        }

        logger.remove_receiver(scenario_receiver_id);
        if let Some(id) = auctions_receiver_id {
            logger.remove_receiver(id);
        }
    }

    let total = TOTAL_SIMULATED_REQUESTS.load(Ordering::Relaxed);
    logln!(&mut logger, LogEvent::Validation, "\nTotal simulated requests: {}", total);
    logger.remove_receiver(summary_receiver_id);
}
