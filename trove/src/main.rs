#![deny(clippy::all)]
// use log crate
#![deny(clippy::print_stdout)]

use std::time::Instant;

use trove::{init_log, roll};
use trove_config::{LoadConfiguration, TroveConfiguration};

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let time = Instant::now();
    let exec_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("Couldn't determine the working directory: {err}");
            std::process::exit(1);
        }
    };

    let config = match TroveConfiguration::load(&exec_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_log!(&config.logging);

    log::info!("Starting Trove {CARGO_PKG_VERSION}");
    log::debug!(
        "Build info: OS: \"{}\", ARCH: \"{}\", BUILD: \"{}\"",
        std::env::consts::OS,
        std::env::consts::ARCH,
        if cfg!(debug_assertions) {
            "Debug"
        } else {
            "Release"
        }
    );

    match roll(&exec_dir, &config) {
        Ok(items) => log::info!(
            "Generated {} item stacks in {}ms",
            items.len(),
            time.elapsed().as_millis()
        ),
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    }
}
