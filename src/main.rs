#[macro_use]
extern crate clap;

use clap::Arg;
use comp3::{ControlUnit, DataPath};
use log::info;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Debug)]
enum Error {
    Image(isa::Error, PathBuf),
    Machine(comp3::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Image(err, path) => {
                write!(f, "Loading program \"{}\" failed: {}", path.display(), err)
            }
            Error::Machine(err) => write!(f, "Machine error: {}", err),
        }
    }
}

fn main() {
    // Parse command line arguments
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("PROGRAM")
                .help("Compiled program image to execute")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("Input character stream for the program")
                .index(2),
        )
        .arg(
            Arg::with_name("show_statistics")
                .long("show-statistics")
                .help("Logs tick count, wall time and effective tick rate"),
        )
        .arg(
            Arg::with_name("logs")
                .long("logs")
                .help("Traces every microcycle with the datapath state"),
        )
        .get_matches();

    let level = if matches.is_present("logs") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let program = matches.value_of("PROGRAM").unwrap();
    let input = matches.value_of("INPUT").unwrap_or("");
    let statistics = matches.is_present("show_statistics");

    if let Err(err) = machine(program, input, statistics) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn machine(program: &str, input: &str, statistics: bool) -> Result<(), Error> {
    let path = PathBuf::from(program);
    let image = isa::read_file(&path).map_err(|err| Error::Image(err, path))?;

    let datapath = DataPath::new(&image, input);
    let mut cpu = ControlUnit::new(datapath).map_err(Error::Machine)?;

    let start = Instant::now();
    cpu.run().map_err(Error::Machine)?;
    let time_taken = start.elapsed();

    if statistics {
        let secs = time_taken.as_secs_f64();
        info!(
            "Program finished. Instructions: {}, ticks: {}, time: {:.2}s, tick rate: {:.2} Hz",
            cpu.total_instructions(),
            cpu.total_ticks(),
            secs,
            cpu.total_ticks() as f64 / secs,
        );
    }

    println!("{}", cpu.datapath().io().output_string());

    Ok(())
}
