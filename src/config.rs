//! The job description.  Built once at startup, validated, and then
//! only ever read: every rank sees the same `JobConfig` by reference.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use num_cpus;

use error::Error;
use output::ChannelPolicy;
use partition::{RemainderPolicy, Scheme};
use planes::DomainBounds;
use transport::TransportKind;

/// Default per-pixel iteration budget.
pub const DEFAULT_ITERATIONS: usize = 100;
/// Default raster width.
pub const DEFAULT_WIDTH: usize = 1024;
/// Default raster height.
pub const DEFAULT_HEIGHT: usize = 768;
/// Default output file.
pub const DEFAULT_OUTPUT: &str = "mandel.ppm";
/// Largest iteration budget accepted.
pub const MAX_ITERATIONS: usize = 1_000_000;
/// Default bound on any single wait for a peer.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything a job needs to know.
#[derive(Clone, Debug)]
pub struct JobConfig {
    /// Per-pixel iteration budget.
    pub iterations: usize,
    /// Raster columns.
    pub width: usize,
    /// Raster rows.
    pub height: usize,
    /// The rectangle of the complex plane to render.
    pub bounds: DomainBounds,
    /// Where the coordinator writes the image.
    pub output: PathBuf,
    /// Number of ranks, coordinator included.
    pub workers: usize,
    /// Threads each rank may use to render a multi-row tile.
    pub threads: usize,
    /// How tiles reach the coordinator.
    pub transport: TransportKind,
    /// How rows are dealt out; `None` uses the transport's usual
    /// scheme.
    pub scheme: Option<Scheme>,
    /// What to do with rows left over after an even split.
    pub remainder: RemainderPolicy,
    /// How intensities become colours in the output file.
    pub palette: ChannelPolicy,
    /// Bound on any single wait for a peer.
    pub timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> JobConfig {
        let workers = JobConfig::default_workers(TransportKind::PackUnpack, DEFAULT_HEIGHT);
        JobConfig {
            iterations: DEFAULT_ITERATIONS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            bounds: DomainBounds::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            workers,
            threads: JobConfig::default_threads(workers),
            transport: TransportKind::PackUnpack,
            scheme: None,
            remainder: RemainderPolicy::Spread,
            palette: ChannelPolicy::Gray,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl JobConfig {
    /// The partition scheme actually in force.
    pub fn scheme(&self) -> Scheme {
        self.scheme
            .unwrap_or_else(|| self.transport.default_scheme())
    }

    /// Ranks to use when the caller does not say: one per core.  Gather
    /// needs equal tiles, so for it this is the largest count no greater
    /// than the cores that divides `height` evenly.
    pub fn default_workers(transport: TransportKind, height: usize) -> usize {
        let cpus = num_cpus::get().max(1);
        match transport {
            TransportKind::Gather => (1..=cpus.min(height.max(1)))
                .rev()
                .find(|workers| height % workers == 0)
                .unwrap_or(1),
            TransportKind::PointToPoint | TransportKind::PackUnpack => cpus,
        }
    }

    /// Threads per rank when the caller does not say: the machine's
    /// cores shared out among the ranks.
    pub fn default_threads(workers: usize) -> usize {
        (num_cpus::get() / workers.max(1)).max(1)
    }

    /// Check every invariant the rest of the job relies on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(Error::Config(format!(
                "iteration count {} must be between 1 and {}",
                self.iterations, MAX_ITERATIONS
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "image dimensions {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.width.checked_mul(self.height).is_none() {
            return Err(Error::Config(format!(
                "image dimensions {}x{} are too large",
                self.width, self.height
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("worker count must be non-zero".to_string()));
        }
        if self.threads == 0 {
            return Err(Error::Config("thread count must be non-zero".to_string()));
        }
        if self.timeout == Duration::from_secs(0) {
            return Err(Error::Config("timeout must be non-zero".to_string()));
        }
        self.bounds.validate()
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Scheme, Error> {
        match s {
            "contiguous" | "block" => Ok(Scheme::Contiguous),
            "interleaved" | "striped" => Ok(Scheme::Interleaved),
            _ => Err(Error::Config(format!(
                "unknown scheme '{}' (expected contiguous or interleaved)",
                s
            ))),
        }
    }
}

impl FromStr for RemainderPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<RemainderPolicy, Error> {
        match s {
            "spread" => Ok(RemainderPolicy::Spread),
            "strict" => Ok(RemainderPolicy::Strict),
            _ => Err(Error::Config(format!(
                "unknown remainder policy '{}' (expected spread or strict)",
                s
            ))),
        }
    }
}

/// Given a string and a separator, returns the two values separated
/// by the separator.
pub fn parse_pair<T: FromStr>(s: &str, separator: char) -> Option<(T, T)> {
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

/// Parses a number and checks it lies in `low..=high`.  `what` names
/// the value in the error.
pub fn parse_in_range<T>(s: &str, low: T, high: T, what: &str) -> Result<T, Error>
where
    T: FromStr + PartialOrd + Display,
{
    match T::from_str(s.trim()) {
        Ok(v) if v >= low && v <= high => Ok(v),
        Ok(v) => Err(Error::Config(format!(
            "{} {} must be between {} and {}",
            what, v, low, high
        ))),
        Err(_) => Err(Error::Config(format!("could not parse {} '{}'", what, s))),
    }
}

/// Parses `xmin,xmax,ymin,ymax` into validated bounds.
pub fn parse_bounds(s: &str) -> Result<DomainBounds, Error> {
    let values: Result<Vec<f64>, _> = s.split(',').map(|v| v.trim().parse::<f64>()).collect();
    match values {
        Ok(ref v) if v.len() == 4 => DomainBounds::new(v[0], v[1], v[2], v[3]),
        _ => Err(Error::Config(format!(
            "could not parse bounds '{}' (expected xmin,xmax,ymin,ymax)",
            s
        ))),
    }
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_size(s: &str) -> Result<(usize, usize), Error> {
    match parse_pair::<usize>(s, 'x') {
        Some((w, h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(Error::Config(format!(
            "could not parse image size '{}' (expected WIDTHxHEIGHT)",
            s
        ))),
    }
}
