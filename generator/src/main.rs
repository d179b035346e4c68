use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, process::ExitCode};
use sweepdag::{
    config::GeneratorConfig,
    generator::Generator,
    logging,
    mixture::Mixture,
    sweep::sampler::Sampler,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// more output, can be repeated
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// less output, can be repeated
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,
}

#[derive(Args)]
struct SweepArgs {
    /// sweep configuration (YAML)
    #[arg(short, long, default_value = "sweeps.yaml")]
    config: PathBuf,

    /// only process sweeps whose name matches one of these globs
    #[arg(short, long)]
    sweep: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write scripts, submission descriptions and DAGs without submitting
    Generate(SweepArgs),
    /// Generate and submit every DAG to the scheduler
    Submit(SweepArgs),
    /// Print the canonical name of a gas mixture, e.g. `name C4H10 0.5 Ar`
    Name {
        #[arg(required = true, allow_hyphen_values = true)]
        components: Vec<String>,
    },
    /// Print the sampled field points, one per line
    Sample {
        points: usize,
        #[arg(long, default_value_t = 1.0)]
        min: f64,
        #[arg(long, default_value_t = 10_000.0)]
        max: f64,
    },
}

fn run_sweeps(args: &SweepArgs, submit: bool) -> ExitCode {
    let config = match GeneratorConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    if config.preflight_checks() {
        error!("Preflight checks failed, see above");
        return ExitCode::FAILURE;
    }

    let outcomes = match Generator::load(config).and_then(|generator| {
        generator.run(&args.sweep, submit)
    }) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    for outcome in outcomes.iter() {
        if let Ok((report, status)) = &outcome.result {
            info!(
                "{}: {} pending, {} done{} -> {}",
                outcome.name,
                report.pending,
                report.satisfied,
                status
                    .map(|status| format!(", submitted ({status})"))
                    .unwrap_or_default(),
                report.directory.display()
            );
        }
    }

    if outcomes.iter().all(|outcome| outcome.is_ok()) {
        info!("Finished!");
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::level(cli.verbose, cli.quiet));

    match cli.command {
        Commands::Generate(ref args) => run_sweeps(args, false),
        Commands::Submit(ref args) => run_sweeps(args, true),
        Commands::Name { components } => match Mixture::parse(&components.join(" ")) {
            Ok(mixture) => {
                println!("{}", mixture.canonical_name());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
        Commands::Sample { points, min, max } => match Sampler::new(min, max).sample(points) {
            Ok(samples) => {
                for sample in samples {
                    println!("{sample}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}
