mod bed_output;
mod chrom_list;
mod classify;
mod cli;
mod fastq_output;
mod library_config;
mod read_info;
mod region_store;
mod run_stats;
mod scan;
mod score_sv;
mod sv_candidate;
mod sv_output;
mod sweep;

use std::{error, process};

use hhmmss::Hhmmss;
use log::info;

use crate::scan::run_scan;

static PROG_NAME: &str = env!("CARGO_PKG_NAME");
static PROG_VERSION: &str = env!("CARGO_PKG_VERSION");

fn setup_logger(debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                PROG_NAME,
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROG_NAME} {PROG_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );

    let start = std::time::Instant::now();

    run_scan(settings);

    info!(
        "{PROG_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    let settings = cli::parse_settings();
    setup_logger(settings.debug).unwrap();
    let settings = cli::validate_and_fix_settings(settings);

    if let Err(err) = run(&settings) {
        eprintln!("{}", err);
        process::exit(2);
    }
}
