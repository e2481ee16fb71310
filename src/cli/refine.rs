
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::milp::good_lp_backend::SolverEngine;
use crate::minor_solver::{ADD_PENALTY_FACTOR, MISS_PENALTY_FACTOR};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct RefineSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    minorstar_version: String,

    /// Problem bundle with the gene catalog, coverage, and major solutions (JSON, optionally gzipped)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_filename: PathBuf,

    /// Output minor solutions (JSON)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Output summary file with one row per called allele (CSV/TSV)
    #[clap(long = "output-summary")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_summary_filename: Option<PathBuf>,

    /// Optional output debug folder
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// Penalty factor for a mutation that is part of a selected allele but missing from the reads
    #[clap(long = "miss-penalty")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Model parameters"))]
    #[clap(default_value_t = MISS_PENALTY_FACTOR)]
    pub miss_penalty: f64,

    /// Penalty factor for a mutation in the reads that no selected allele explains
    #[clap(long = "add-penalty")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Model parameters"))]
    #[clap(default_value_t = ADD_PENALTY_FACTOR)]
    pub add_penalty: f64,

    /// Enforces the copy-number bounds on each mutation as hard constraints
    #[clap(long = "enforce-cn-bounds")]
    #[clap(help_heading = Some("Model parameters"))]
    pub enforce_cn_bounds: bool,

    /// MILP solver used for every model
    #[clap(long = "solver")]
    #[clap(value_name = "SOLVER")]
    #[clap(help_heading = Some("Solver parameters"))]
    #[clap(default_value = "microlp")]
    pub solver: SolverEngine,

    /// Linearizes the objective inside the solver instead of using an epigraph bound
    #[clap(long = "linearize-objective")]
    #[clap(help_heading = Some("Solver parameters"))]
    pub linearize_objective: bool,

    /// Time limit per model in seconds; models that hit it are reported without a solution
    #[clap(long = "time-limit")]
    #[clap(value_name = "SECONDS")]
    #[clap(help_heading = Some("Solver parameters"))]
    pub time_limit: Option<f64>,

    /// Number of threads to use for solving models
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_refine_settings(mut settings: RefineSettings) -> anyhow::Result<RefineSettings> {
    // hard code the version in
    settings.minorstar_version = FULL_VERSION.clone();
    info!("minorstar version: {:?}", &settings.minorstar_version);
    info!("Sub-command: refine");
    info!("Inputs:");

    check_required_filename(&settings.input_filename, "Input problem")?;
    info!("\tProblem bundle: {:?}", &settings.input_filename);

    info!("Outputs:");
    info!("\tMinor solutions: {:?}", &settings.output_filename);
    info!("\tSummary: {:?}", &settings.output_summary_filename);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Model parameters:");
    ensure!(settings.miss_penalty.is_finite() && settings.miss_penalty >= 0.0, "--miss-penalty must be a non-negative number");
    info!("\tMiss penalty: {}", settings.miss_penalty);
    ensure!(settings.add_penalty.is_finite() && settings.add_penalty >= 0.0, "--add-penalty must be a non-negative number");
    info!("\tAdd penalty: {}", settings.add_penalty);
    info!("\tCopy-number bounds: {}", if settings.enforce_cn_bounds { "ENFORCED" } else { "ADVISORY" });

    info!("Solver parameters:");
    info!("\tSolver: {}", settings.solver);
    info!("\tObjective: {}", if settings.linearize_objective { "LINEARIZED" } else { "EPIGRAPH" });
    if let Some(time_limit) = settings.time_limit {
        ensure!(time_limit > 0.0, "--time-limit must be >0");
        info!("\tTime limit: {time_limit} s");
    } else {
        info!("\tTime limit: None");
    }

    // 0 is just a sentinel for single-threaded
    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_settings() -> RefineSettings {
        RefineSettings {
            input_filename: PathBuf::from("Cargo.toml"),
            output_filename: PathBuf::from("out.json"),
            miss_penalty: MISS_PENALTY_FACTOR,
            add_penalty: ADD_PENALTY_FACTOR,
            ..Default::default()
        }
    }

    #[test]
    fn test_check_settings() {
        let settings = check_refine_settings(mock_settings()).unwrap();
        assert_eq!(settings.threads, 1);
        assert_eq!(settings.minorstar_version, *FULL_VERSION);
    }

    #[test]
    fn test_bad_settings() {
        let mut settings = mock_settings();
        settings.miss_penalty = -1.0;
        assert!(check_refine_settings(settings).is_err());

        let mut settings = mock_settings();
        settings.time_limit = Some(0.0);
        assert!(check_refine_settings(settings).is_err());

        let mut settings = mock_settings();
        settings.input_filename = PathBuf::from("does_not_exist.json");
        assert!(check_refine_settings(settings).is_err());
    }
}
