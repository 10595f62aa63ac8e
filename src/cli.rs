use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};

use crate::constants::{MAX_ZOOM, MIN_ZOOM};

const USAGE: &str = "Usage: aoicrop [--threads <N>] [--config <file>] [--zoom <Z>] <aoi.csv> <output-dir>\n       aoicrop convert <lng> <lat>";

pub enum Command {
    Run(RunConfig),
    Convert(ConvertConfig),
}

pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub threads: Option<usize>,
    pub config: Option<PathBuf>,
    pub zoom: Option<u8>,
}

pub struct ConvertConfig {
    pub lng: f64,
    pub lat: f64,
}

pub fn parse_args(args: &[String]) -> Result<Command> {
    if args.is_empty() {
        bail!("No arguments supplied.\n{USAGE}");
    }

    if args[0] == "convert" {
        return parse_convert(&args[1..]).map(Command::Convert);
    }

    parse_run(args).map(Command::Run)
}

fn parse_run(args: &[String]) -> Result<RunConfig> {
    let mut input = None;
    let mut output = None;
    let mut threads = None;
    let mut config = None;
    let mut zoom = None;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--help" || arg == "-h" {
            println!("{USAGE}");
            std::process::exit(0);
        } else if arg == "--threads" {
            i += 1;
            if i >= args.len() {
                bail!("Missing value for --threads\n{USAGE}");
            }
            threads = Some(parse_threads(&args[i])?);
        } else if let Some(value) = arg.strip_prefix("--threads=") {
            threads = Some(parse_threads(value)?);
        } else if arg == "--config" {
            i += 1;
            if i >= args.len() {
                bail!("Missing value for --config\n{USAGE}");
            }
            config = Some(PathBuf::from(&args[i]));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            config = Some(PathBuf::from(value));
        } else if arg == "--zoom" {
            i += 1;
            if i >= args.len() {
                bail!("Missing value for --zoom\n{USAGE}");
            }
            zoom = Some(parse_zoom(&args[i])?);
        } else if let Some(value) = arg.strip_prefix("--zoom=") {
            zoom = Some(parse_zoom(value)?);
        } else if arg.starts_with("--") {
            bail!("Unknown option: {arg}\n{USAGE}");
        } else if input.is_none() {
            input = Some(PathBuf::from(arg));
        } else if output.is_none() {
            output = Some(PathBuf::from(arg));
        } else {
            bail!("Unexpected argument: {arg}\n{USAGE}");
        }
        i += 1;
    }

    let input = input.ok_or_else(|| anyhow!("Missing AOI file argument.\n{USAGE}"))?;
    let output = output.ok_or_else(|| anyhow!("Missing output directory argument.\n{USAGE}"))?;

    Ok(RunConfig {
        input,
        output,
        threads,
        config,
        zoom,
    })
}

fn parse_convert(args: &[String]) -> Result<ConvertConfig> {
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        println!("{USAGE}");
        std::process::exit(0);
    }

    if args.len() != 2 {
        bail!("convert requires <lng> <lat>\n{USAGE}");
    }

    let lng = args[0]
        .parse::<f64>()
        .map_err(|_| anyhow!("Invalid longitude '{}'", args[0]))?;
    let lat = args[1]
        .parse::<f64>()
        .map_err(|_| anyhow!("Invalid latitude '{}'", args[1]))?;
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        bail!("Coordinate ({lng}, {lat}) is outside the valid lng/lat range");
    }

    Ok(ConvertConfig { lng, lat })
}

fn parse_threads(value: &str) -> Result<usize> {
    let threads: usize = value
        .parse()
        .map_err(|_| anyhow!("Invalid thread count '{value}'"))?;
    if threads == 0 {
        bail!("Thread count must be > 0");
    }
    Ok(threads)
}

fn parse_zoom(value: &str) -> Result<u8> {
    let zoom: u8 = value
        .parse()
        .map_err(|_| anyhow!("Invalid zoom '{value}'"))?;
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        bail!("Zoom must be between {MIN_ZOOM} and {MAX_ZOOM}");
    }
    Ok(zoom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn run_takes_positionals_and_options() {
        let parsed = parse_args(&args(&[
            "--threads",
            "4",
            "--config=crop.json",
            "--zoom",
            "18",
            "aoi.csv",
            "out",
        ]))
        .unwrap();
        let Command::Run(config) = parsed else {
            panic!("expected run command");
        };
        assert_eq!(config.input, PathBuf::from("aoi.csv"));
        assert_eq!(config.output, PathBuf::from("out"));
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.config, Some(PathBuf::from("crop.json")));
        assert_eq!(config.zoom, Some(18));
    }

    #[test]
    fn run_requires_output() {
        let err = parse_args(&args(&["aoi.csv"])).err().unwrap();
        assert!(err.to_string().contains("Missing output directory"));
    }

    #[test]
    fn rejects_bad_option_values() {
        assert!(parse_args(&args(&["--threads", "0", "a", "b"])).is_err());
        assert!(parse_args(&args(&["--zoom=20", "a", "b"])).is_err());
        assert!(parse_args(&args(&["--zoom"])).is_err());
        assert!(parse_args(&args(&["--fast", "a", "b"])).is_err());
        assert!(parse_args(&args(&["a", "b", "c"])).is_err());
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn convert_parses_lng_then_lat() {
        let Command::Convert(config) = parse_args(&args(&["convert", "116.397428", "39.90923"]))
            .unwrap()
        else {
            panic!("expected convert command");
        };
        assert_eq!(config.lng, 116.397428);
        assert_eq!(config.lat, 39.90923);
    }

    #[test]
    fn convert_validates_arguments() {
        assert!(parse_args(&args(&["convert", "116.4"])).is_err());
        assert!(parse_args(&args(&["convert", "east", "39.9"])).is_err());
        assert!(parse_args(&args(&["convert", "200", "39.9"])).is_err());
    }
}
