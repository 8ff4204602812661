//! Every rank renders its whole tile, then all of them take part in
//! one blocking gather.  Nothing is visible at the coordinator until
//! every tile has arrived.

use assemble::Assembler;
use comm::Communicator;
use error::Error;
use itertools::Itertools;
use partition::Partitioner;

use super::{Context, Phase, Transport, COORDINATOR};

/// The collective-gather transport.  Tiles must all be the same size.
#[derive(Copy, Clone, Debug)]
pub struct CollectiveGather;

impl Transport for CollectiveGather {
    fn name(&self) -> &'static str {
        "gather"
    }

    fn check(&self, partitioner: &Partitioner) -> Result<(), Error> {
        let sizes: Vec<usize> = partitioner.partitions().iter().map(|p| p.len()).collect();
        if sizes.iter().all_equal() {
            Ok(())
        } else {
            Err(Error::Partition(format!(
                "gather needs equal tiles, but the partition gives rows {}",
                sizes.iter().join("/")
            )))
        }
    }

    fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error> {
        let rank = comm.rank();
        let partition = ctx.partitioner.partition(rank);
        Phase::Computing.enter(rank);
        let tile = ctx.kernel.render_rows(&partition.rows)?;
        Phase::Delivering.enter(rank);
        comm.gather(COORDINATOR, tile.into_bytes())?;
        Ok(())
    }

    fn run_coordinator(
        &self,
        ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error> {
        let rank = comm.rank();
        let partition = ctx.partitioner.partition(rank);
        Phase::Computing.enter(rank);
        let tile = ctx.kernel.render_rows(&partition.rows)?;
        Phase::Receiving.enter(rank);
        let gathered = comm.gather(COORDINATOR, tile.into_bytes())?.ok_or_else(|| {
            Error::Transport("gather returned nothing at the coordinator".to_string())
        })?;
        Phase::Assembling.enter(rank);
        assembler.place_gathered(&gathered)
    }
}
