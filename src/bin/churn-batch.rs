extern crate chrono;
extern crate churn_batch;
extern crate env_logger;
extern crate failure;
extern crate log;
extern crate shellexpand;
extern crate structopt;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use chrono::Local;
use churn_batch::{Config, Driver};
use env_logger::Builder;
use failure::{Error, ResultExt};
use log::LevelFilter;
use structopt::StructOpt;

fn main() {
    let args = Args::from_args();

    if args.example_config {
        generate_example();
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);

        for cause in e.iter_causes() {
            eprintln!("\tCaused By: {}", cause);
        }

        process::exit(1);
    }
}

fn generate_example() {
    let example = Config::example();

    println!("{}", example.as_toml());
}

fn run(args: &Args) -> Result<(), Error> {
    initialize_logging(args)?;
    let cfg = args.config()?;

    let driver = Driver::with_config(cfg);

    driver.run(&args.files)?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
struct Args {
    #[structopt(
        short = "c",
        long = "config",
        default_value = "~/.churn-batch.toml",
        help = "The configuration file to use."
    )]
    config_file: String,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output (repeat for more verbosity)"
    )]
    verbosity: u64,
    #[structopt(
        long = "example-config",
        help = "Generate an example config and immediately exit."
    )]
    example_config: bool,
    #[structopt(
        name = "FILE",
        parse(from_os_str),
        required_unless = "example-config",
        help = "Newline-delimited lists of GitHub repository URLs."
    )]
    files: Vec<PathBuf>,
}

impl Args {
    pub fn config(&self) -> Result<Config, Error> {
        let config_file =
            shellexpand::full(&self.config_file).context("Unable to expand wildcards")?;
        let path = Path::new(config_file.as_ref());

        // A missing config gets a ready-to-paste template instead of a bare
        // error, since it's the first thing every new user runs into.
        if !path.exists() {
            let stderr = io::stderr();
            let mut stderr = stderr.lock();
            writeln!(stderr, "File not found: {}", path.display()).ok();
            writeln!(stderr, "This file should have the following content:\n").ok();
            writeln!(stderr, "{}", Config::example().as_toml()).ok();
            process::exit(1);
        }

        Config::from_file(path)
            .context("Couldn't load the config")
            .map_err(Into::into)
    }
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    let level = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    builder.filter(Some("churn_batch"), level);

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.format(|out, record| match record.line() {
        Some(line) => writeln!(
            out,
            "{} [{:5}] ({}#{}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            line,
            record.args()
        ),
        None => writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        ),
    });

    builder.try_init()?;

    Ok(())
}
