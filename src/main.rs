use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use treestats::config::{ConfigManager, OutputFormat};
use treestats::logging::{LogLevel, LoggingSystem};
use treestats::pipeline::{TreeStatsPipeline, TreeStatsRequest};
use treestats::tree_bits::DegeneratePolicy;
use validator::Validate;

/// Relative entropy of a cactus net hierarchy against a flat sequence encoding.
#[derive(Parser, Debug)]
#[command(name = "treestats", author, version, about, long_about = None)]
struct Args {
    /// Set the log level
    #[arg(short = 'a', long = "logLevel", value_enum, ignore_case = true)]
    log_level: Option<LogLevel>,

    /// The location of the net disk (directory or JSON document)
    #[arg(short = 'c', long = "netDisk")]
    net_disk: PathBuf,

    /// The name of the net (the key in the database)
    #[arg(short = 'd', long = "netName")]
    net_name: String,

    /// The file to write the stats in
    #[arg(short = 'e', long = "outputFile")]
    output_file: PathBuf,

    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in scoring profile (parallel, lenient)
    #[arg(long)]
    profile: Option<String>,

    /// Output format; inferred from the output file extension by default
    #[arg(long, value_enum, ignore_case = true)]
    format: Option<OutputFormat>,

    /// Score sibling subtrees concurrently
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Propagate zero-length logarithms as NaN instead of failing
    #[arg(long)]
    lenient: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            use clap::error::ErrorKind;
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = e.print();
                    ExitCode::SUCCESS
                }
                _ => {
                    let _ = e.print();
                    eprintln!();
                    let _ = Args::command().write_help(&mut std::io::stderr());
                    ExitCode::FAILURE
                }
            };
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("treestats: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut manager = match &args.config {
        Some(path) => ConfigManager::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConfigManager::new(),
    };
    if let Some(profile) = &args.profile {
        manager.apply_profile(profile)?;
    }
    manager.load_from_env()?;

    let config = manager.config_mut();
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.format {
        config.output.format = Some(format);
    }
    if args.parallel {
        config.scoring.parallel = true;
    }
    if let Some(threads) = args.threads {
        config.scoring.num_threads = threads;
    }
    if args.lenient {
        config.scoring.degenerate_policy = DegeneratePolicy::Propagate;
    }
    let config = manager.into_config();
    config.validate().context("invalid configuration")?;

    let logging = LoggingSystem::new(config.logging.clone()).context("setting up logging")?;
    let request = TreeStatsRequest {
        net_disk: args.net_disk,
        net_name: args.net_name,
        output_file: args.output_file,
    };

    TreeStatsPipeline::new(config)
        .run(&logging, &request)
        .with_context(|| format!("computing tree stats for net '{}'", request.net_name))?;
    Ok(())
}
