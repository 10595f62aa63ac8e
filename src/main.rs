mod aoi;
mod batch;
mod cli;
mod config;
mod constants;
mod convert;
mod coords;
mod crop;
mod error;
mod fetch;
mod grid;
mod mask;
mod metadata;
mod mosaic;
mod output;
mod pipeline;
mod progress;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Result, anyhow};
use batch::run_batch;
use cli::{Command, parse_args};
use convert::run_convert;
use rayon::ThreadPoolBuilder;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        Command::Run(config) => {
            if let Some(threads) = config.threads {
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()
                    .map_err(|err| anyhow!("Failed to configure thread pool: {err}"))?;
            }
            run_batch(&config)
        }
        Command::Convert(config) => run_convert(&config),
    }
}
