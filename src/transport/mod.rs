//! How finished rows get from the workers to the coordinator.  Three
//! interchangeable strategies share one interface, so each can be run
//! against the same partition and the same assembler and their
//! outputs compared byte for byte.

use std::fmt;
use std::str::FromStr;

use assemble::Assembler;
use comm::Communicator;
use error::Error;
use kernel::Kernel;
use partition::{Partitioner, Scheme};

mod gather;
mod p2p;
mod packing;

pub use self::gather::CollectiveGather;
pub use self::p2p::PointToPoint;
pub use self::packing::PackUnpack;

/// The rank that assembles the raster and writes the output.
pub const COORDINATOR: usize = 0;

/// What a rank needs to do its share of the work.  Identical on every
/// rank and never mutated once the job starts.
pub struct Context<'a> {
    /// The row assignment every rank agrees on.
    pub partitioner: &'a Partitioner,
    /// The row renderer.
    pub kernel: &'a Kernel,
}

/// Where a rank is in the job.  Workers go Idle, Computing,
/// Delivering, Done; the coordinator goes Idle, Computing, Receiving,
/// Assembling, Done, possibly cycling per round.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Idle,
    /// Rendering rows.
    Computing,
    /// Handing rows to the transport.
    Delivering,
    /// Waiting on rows from other ranks.
    Receiving,
    /// Placing received rows into the raster.
    Assembling,
    /// Finished; every expected row is accounted for.
    Done,
}

impl Phase {
    /// Record that `rank` has entered this phase.
    pub fn enter(self, rank: usize) {
        debug!("rank {}: {:?}", rank, self);
    }
}

/// A strategy for delivering tiles to the coordinator.
pub trait Transport: Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Refuse, before any work starts, a partition this transport
    /// cannot carry.
    fn check(&self, _partitioner: &Partitioner) -> Result<(), Error> {
        Ok(())
    }

    /// Compute and deliver a non-coordinator rank's rows.
    fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error>;

    /// Compute the coordinator's own rows and receive everyone
    /// else's into the assembler.
    fn run_coordinator(
        &self,
        ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error>;
}

/// The available transports, by name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// One blocking collective gather of equal-sized tiles.
    Gather,
    /// A non-blocking send per row per round.
    PointToPoint,
    /// One packed buffer per worker.
    PackUnpack,
}

impl TransportKind {
    /// Every kind, for tests and help text.
    pub fn all() -> [TransportKind; 3] {
        [
            TransportKind::Gather,
            TransportKind::PointToPoint,
            TransportKind::PackUnpack,
        ]
    }

    /// The strategy object for this kind.
    pub fn strategy(self) -> Box<dyn Transport> {
        match self {
            TransportKind::Gather => Box::new(CollectiveGather),
            TransportKind::PointToPoint => Box::new(PointToPoint),
            TransportKind::PackUnpack => Box::new(PackUnpack),
        }
    }

    /// The partition scheme this transport is normally paired with.
    pub fn default_scheme(self) -> Scheme {
        match self {
            TransportKind::Gather => Scheme::Contiguous,
            TransportKind::PointToPoint | TransportKind::PackUnpack => Scheme::Interleaved,
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<TransportKind, Error> {
        match s {
            "gather" => Ok(TransportKind::Gather),
            "p2p" | "isend" => Ok(TransportKind::PointToPoint),
            "pack" => Ok(TransportKind::PackUnpack),
            _ => Err(Error::Config(format!(
                "unknown transport '{}' (expected gather, p2p, or pack)",
                s
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            TransportKind::Gather => "gather",
            TransportKind::PointToPoint => "p2p",
            TransportKind::PackUnpack => "pack",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_and_print() {
        for kind in TransportKind::all().iter() {
            assert_eq!(kind.to_string().parse::<TransportKind>().unwrap(), *kind);
        }
        assert_eq!(
            "isend".parse::<TransportKind>().unwrap(),
            TransportKind::PointToPoint
        );
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn strategies_name_themselves() {
        let names: Vec<&str> = TransportKind::all()
            .iter()
            .map(|k| k.strategy().name())
            .collect();
        assert_eq!(names, vec!["gather", "p2p", "pack"]);
    }

    #[test]
    fn streaming_transports_default_to_interleaving() {
        assert_eq!(TransportKind::Gather.default_scheme(), Scheme::Contiguous);
        assert_eq!(
            TransportKind::PackUnpack.default_scheme(),
            Scheme::Interleaved
        );
    }
}
