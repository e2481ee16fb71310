
use indicatif::ParallelProgressIterator;
use log::{LevelFilter, debug, error, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use minorstar::cli::core::{Commands, ensure_folder, ensure_parent_folder, get_cli};
use minorstar::cli::refine::{RefineSettings, check_refine_settings};
use minorstar::data_types::minor_solution::MinorSolution;
use minorstar::minor_solver::{MinorConfigBuilder, MinorRefiner, RefinedModel};
use minorstar::parsing::problem::RefineProblem;
use minorstar::util::json_io::save_json;
use minorstar::util::progress_bar::model_progress_bar;
use minorstar::writers::minor_summary::MinorSummaryWriter;

fn run_refine(settings: RefineSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_refine_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // create a debug folder if specified, model audits get saved there
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("Creating debug folder at {debug_folder:?}...");
        if let Err(e) = ensure_folder(debug_folder, "debug folder") {
            error!("{e:#}");
            std::process::exit(exitcode::IOERR);
        }

        // save the CLI options
        let cli_json = debug_folder.join("cli_settings.json");
        info!("Saving CLI options to {cli_json:?}...");
        if let Err(e) = save_json(&settings, &cli_json) {
            error!("Error while saving CLI options: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // load everything we need
    info!("Loading problem bundle...");
    let problem = match RefineProblem::from_json(&settings.input_filename) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while loading problem bundle: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Loaded gene {} with {} major solution(s).", problem.gene().name(), problem.major_solutions().len());
    if problem.major_solutions().is_empty() {
        warn!("No major solutions were provided, outputs will be empty.");
    }

    // build our configuration
    let minor_config = match MinorConfigBuilder::default()
        .miss_penalty(settings.miss_penalty)
        .add_penalty(settings.add_penalty)
        .enforce_cn_bounds(settings.enforce_cn_bounds)
        .threads(settings.threads)
        .time_limit(settings.time_limit)
        .solver(settings.solver)
        .linearize_objective(settings.linearize_objective)
        .build() {
        Ok(mc) => mc,
        Err(e) => {
            error!("Error while building minor config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    let refiner = match MinorRefiner::new(
        problem.gene(), problem.coverage(), problem.major_solutions(), &minor_config, None
    ) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while building candidate space: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Candidate space: {} minor alleles over {} mutations.", refiner.space().bases().len(), refiner.space().mutations().len());

    // run the parallel iterator to solve them, order is kept by collect
    let ordered = MinorRefiner::ordered(problem.major_solutions());
    let progress_bar = model_progress_bar(ordered.len());
    info!("Refining major solutions...");
    let all_results: Vec<Option<RefinedModel>> = ordered.into_par_iter()
        .map(|major_solution| {
            debug!("major = {major_solution}");
            match refiner.refine(major_solution) {
                Ok(r) => Some(r),
                Err(e) => {
                    error!("Error while refining {major_solution}: {e:#}");
                    None
                }
            }
        })
        .progress_with(progress_bar)
        .collect();
    info!("Refinement complete, saving all outputs...");

    // iterate over each output and save the relevant info
    let mut summary_writer = settings.output_summary_filename.as_ref()
        .map(|_| MinorSummaryWriter::default());
    let mut minor_solutions: Vec<MinorSolution> = vec![];
    let mut error_models = 0;
    let mut empty_models = 0;
    for (model_index, opt_refined) in all_results.into_iter().enumerate() {
        let Some(refined) = opt_refined else {
            error_models += 1;
            continue;
        };

        if let Some(writer) = summary_writer.as_mut() {
            writer.add_model(model_index, refined.major_solution(), refined.solution());
        }

        if let Some(debug_folder) = settings.debug_folder.as_ref() {
            let audit_fn = debug_folder.join(format!("model_{model_index:03}.json"));
            if let Err(e) = save_json(refined.audit(), &audit_fn) {
                error!("Error while saving model audit: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        }

        match refined.solution() {
            Some(minor_solution) => {
                info!("\t{minor_solution}");
                minor_solutions.push(minor_solution.clone());
            },
            None => {
                warn!("No minor solution found for {}", refined.major_solution());
                empty_models += 1;
            }
        }
    }
    info!("Solved:empty:error models: {} : {empty_models} : {error_models}", minor_solutions.len());

    // now write things
    info!("Saving minor solutions to {:?}...", settings.output_filename);
    if let Err(e) = ensure_parent_folder(&settings.output_filename, "output folder")
        .and_then(|()| save_json(&minor_solutions, &settings.output_filename)) {
        error!("Error while saving minor solutions: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    if let (Some(summary_fn), Some(writer)) = (settings.output_summary_filename.as_deref(), summary_writer.as_ref()) {
        info!("Saving output summary to {summary_fn:?}...");
        if let Err(e) = ensure_parent_folder(summary_fn, "summary folder")
            .and_then(|()| writer.write_summary(summary_fn)) {
            error!("Error while saving summary file: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    info!("Refinement completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Refine(settings) => {
            run_refine(*settings);
        }
    }

    info!("Process finished successfully.");
}
