extern crate clap;
extern crate env_logger;
extern crate mandelmp;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches, ErrorKind};
use mandelmp::config::{parse_bounds, parse_in_range, parse_size, MAX_ITERATIONS};
use mandelmp::{ChannelPolicy, JobConfig, RemainderPolicy, Scheme, TransportKind};
use std::fmt::Display;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn validate_parse<T: FromStr>(s: &str) -> Result<(), String>
where
    T::Err: ToString,
{
    T::from_str(s).map(|_| ()).map_err(|e| e.to_string())
}

fn validate_range<T>(s: &str, low: T, high: T, what: &str) -> Result<(), String>
where
    T: FromStr + PartialOrd + Display,
{
    parse_in_range(s, low, high, what)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const BOUNDS: &str = "bounds";
const ITERATIONS: &str = "iterations";
const WORKERS: &str = "workers";
const THREADS: &str = "threads";
const TRANSPORT: &str = "transport";
const SCHEME: &str = "scheme";
const REMAINDER: &str = "remainder";
const PALETTE: &str = "palette";
const TIMEOUT: &str = "timeout";

fn app<'a, 'b>() -> App<'a, 'b> {
    let max_workers = 4 * num_cpus::get().max(1);

    App::new("mandel")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Partitioned Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .long(OUTPUT)
                .short("f")
                .takes_value(true)
                .default_value("mandel.ppm")
                .help("Output file; .ppm is written as binary PPM, other extensions by format"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("d")
                .takes_value(true)
                .default_value("1024x768")
                .validator(|s| parse_size(&s).map(|_| ()).map_err(|e| e.to_string()))
                .help("Size of output image, WIDTHxHEIGHT"),
        )
        .arg(
            Arg::with_name(BOUNDS)
                .long(BOUNDS)
                .short("b")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-1.78,0.78,-0.961,0.961")
                .validator(|s| parse_bounds(&s).map(|_| ()).map_err(|e| e.to_string()))
                .help("Region of the complex plane, xmin,xmax,ymin,ymax"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .long(ITERATIONS)
                .short("n")
                .takes_value(true)
                .default_value("100")
                .validator(|s| validate_range(&s, 1, MAX_ITERATIONS, "iteration count"))
                .help("Iteration budget per pixel"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .long(WORKERS)
                .short("w")
                .takes_value(true)
                .validator(move |s| validate_range(&s, 1, max_workers, "worker count"))
                .help(
                    "Number of worker ranks, coordinator included \
                     [default: cores, or for gather the most that divide the height]",
                ),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(|s| validate_range(&s, 1usize, 1024, "thread count"))
                .help("Threads per worker [default: cores / workers]"),
        )
        .arg(
            Arg::with_name(TRANSPORT)
                .long(TRANSPORT)
                .takes_value(true)
                .default_value("pack")
                .validator(|s| validate_parse::<TransportKind>(&s))
                .help("How rows reach the coordinator: gather, p2p, or pack"),
        )
        .arg(
            Arg::with_name(SCHEME)
                .long(SCHEME)
                .takes_value(true)
                .validator(|s| validate_parse::<Scheme>(&s))
                .help("How rows are dealt out: contiguous or interleaved [default: by transport]"),
        )
        .arg(
            Arg::with_name(REMAINDER)
                .long(REMAINDER)
                .takes_value(true)
                .default_value("spread")
                .validator(|s| validate_parse::<RemainderPolicy>(&s))
                .help("Rows that do not divide evenly: spread or strict"),
        )
        .arg(
            Arg::with_name(PALETTE)
                .long(PALETTE)
                .takes_value(true)
                .default_value("gray")
                .validator(|s| validate_parse::<ChannelPolicy>(&s))
                .help("Output colouring: gray or weighted"),
        )
        .arg(
            Arg::with_name(TIMEOUT)
                .long(TIMEOUT)
                .takes_value(true)
                .default_value("30")
                .validator(|s| validate_range(&s, 1u64, 86_400, "timeout in seconds"))
                .help("Seconds to wait on any one peer before giving up"),
        )
}

fn args<'a>() -> ArgMatches<'a> {
    match app().get_matches_safe() {
        Ok(matches) => matches,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                let stderr = io::stderr();
                let mut stderr = stderr.lock();
                let _ = writeln!(stderr, "{}\n", e.message);
                let _ = app().write_help(&mut stderr);
                let _ = writeln!(stderr);
                std::process::exit(1);
            }
        },
    }
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Option<T> {
    matches.value_of(name).and_then(|s| T::from_str(s).ok())
}

fn config(matches: &ArgMatches) -> JobConfig {
    let defaults = JobConfig::default();
    let (width, height) = matches
        .value_of(SIZE)
        .and_then(|s| parse_size(s).ok())
        .unwrap_or((defaults.width, defaults.height));
    let bounds = matches
        .value_of(BOUNDS)
        .and_then(|s| parse_bounds(s).ok())
        .unwrap_or(defaults.bounds);
    let transport = value(matches, TRANSPORT).unwrap_or(defaults.transport);
    let workers =
        value(matches, WORKERS).unwrap_or_else(|| JobConfig::default_workers(transport, height));

    JobConfig {
        iterations: value(matches, ITERATIONS).unwrap_or(defaults.iterations),
        width,
        height,
        bounds,
        output: matches
            .value_of(OUTPUT)
            .map(PathBuf::from)
            .unwrap_or_else(|| defaults.output.clone()),
        workers,
        threads: value(matches, THREADS).unwrap_or_else(|| JobConfig::default_threads(workers)),
        transport,
        scheme: value(matches, SCHEME),
        remainder: value(matches, REMAINDER).unwrap_or(defaults.remainder),
        palette: value(matches, PALETTE).unwrap_or(defaults.palette),
        timeout: value(matches, TIMEOUT)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
    }
}

fn main() {
    env_logger::init();
    let matches = args();
    let config = config(&matches);

    if let Err(e) = mandelmp::run(&config) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
