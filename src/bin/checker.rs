use clap::Parser;
use mslscp_checker::checks::{
    checker::{CheckerError, check_instance_only, ensure_valid},
    statistics::InstanceStatistics,
    validation::validate,
};
use mslscp_checker::io::{instance_reader::Instance, solution_reader::Solution, writer::write_instance};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};

/// Loads an MSLSCP instance and optionally checks a solution against it.
#[derive(Parser)]
#[command(version)]
pub struct Arguments {
    pub instance: PathBuf,

    pub solution: Option<PathBuf>,

    /// Do not log anything
    #[arg(short, long)]
    pub quiet: bool,

    /// Treat warnings as errors
    #[arg(short, long)]
    pub paranoid: bool,

    /// Print the validation report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log instance statistics and balance lints
    #[arg(long)]
    pub stats: bool,

    /// Write the instance in canonical CSV form
    #[arg(long, value_name = "PATH")]
    pub normalize: Option<PathBuf>,

    /// Print digests of the instance and the solution
    #[cfg(feature = "with_digest")]
    #[arg(long)]
    pub digest: bool,
}

fn report_statistics(instance: &Instance) {
    let stats = InstanceStatistics::of(instance);
    info!(
        "Services: {}, locations: {}, demand points: {}, requests: {}, triplets: {} ({} duplicate rows)",
        stats.num_services,
        stats.num_locations,
        stats.num_demand_points,
        stats.num_requests,
        stats.num_triplets,
        stats.num_duplicate_rows,
    );
    if let Some((location, degree)) = stats.busiest_location {
        info!("Busiest {location} serves {degree} demand points");
    }

    for lint in stats.lints() {
        warn!("{lint}");
    }
}

fn check(args: &Arguments) -> Result<(), CheckerError> {
    let instance = check_instance_only(&args.instance, args.paranoid)?;

    if args.stats {
        report_statistics(&instance);
    }

    if let Some(path) = args.normalize.as_ref() {
        write_instance(&instance, BufWriter::new(File::create(path)?))?;
        info!("Wrote normalized instance to {path:?}");
    }

    #[cfg(feature = "with_digest")]
    if args.digest {
        println!(
            "Instance digest: {}",
            mslscp_checker::digest::algo::digest_instance(&instance)
        );
    }

    let Some(solution_path) = args.solution.as_ref() else {
        return Ok(());
    };

    let solution = Solution::read(solution_path, &instance, args.paranoid)?;
    let report = validate(&instance, &solution);

    if args.json {
        println!("{}", report.to_json());
    } else if report.is_feasible() {
        println!("Total cost: {}", report.total_cost());
    }

    ensure_valid(&report)?;

    #[cfg(feature = "with_digest")]
    if args.digest {
        println!(
            "Solution digest: {}",
            mslscp_checker::digest::algo::digest_solution(&solution)
        );
    }

    Ok(())
}

fn main() {
    let args = Arguments::parse();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::INFO)
            .without_time()
            .init();
    }

    if let Err(e) = check(&args) {
        error!("{e}");
        exit(1)
    }
}
