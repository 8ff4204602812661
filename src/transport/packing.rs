//! Each worker packs all of its rows into one buffer as it renders
//! them and sends the buffer once, under its own tag.  The coordinator
//! receives exactly one buffer per worker, in rank order, and unpacks
//! exactly as many records as the partition says that worker owns.

use assemble::Assembler;
use codec::{PackBuffer, Unpacker};
use comm::Communicator;
use error::{alloc_bytes, Error};

use super::{Context, Phase, Transport, COORDINATOR};

/// The tag a worker's packed buffer travels under.
pub fn pack_tag(rank: usize) -> u32 {
    (rank as u32 + 1) * 100
}

/// The manual pack/unpack transport.
#[derive(Copy, Clone, Debug)]
pub struct PackUnpack;

impl Transport for PackUnpack {
    fn name(&self) -> &'static str {
        "pack"
    }

    fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error> {
        let rank = comm.rank();
        let partition = ctx.partitioner.partition(rank);
        let width = ctx.kernel.width();
        let mut buffer = PackBuffer::for_records(partition.len(), width)?;
        let mut row = alloc_bytes(width, "row buffer")?;

        Phase::Computing.enter(rank);
        for assignment in &partition.rows {
            ctx.kernel.render_row_into(assignment, &mut row)?;
            buffer.pack(assignment.row, &row)?;
        }

        Phase::Delivering.enter(rank);
        let records = buffer.records() as u64;
        comm.send(COORDINATOR, pack_tag(rank), records, buffer.into_bytes())
    }

    fn run_coordinator(
        &self,
        ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error> {
        let rank = comm.rank();
        let own = ctx.partitioner.partition(rank);
        Phase::Computing.enter(rank);
        let tile = ctx.kernel.render_rows(&own.rows)?;
        assembler.place_tile(rank, &tile)?;

        for source in (0..comm.size()).filter(|&r| r != rank) {
            Phase::Receiving.enter(rank);
            let envelope = comm.recv(source, pack_tag(source))?;
            let expected = ctx.partitioner.partition(source);
            if envelope.seq != expected.len() as u64 {
                return Err(Error::Transport(format!(
                    "rank {} packed {} records, its partition has {}",
                    source,
                    envelope.seq,
                    expected.len()
                )));
            }

            Phase::Assembling.enter(rank);
            let mut unpacker = Unpacker::new(&envelope.payload);
            for assignment in &expected.rows {
                let (row, pixels) = unpacker.unpack()?;
                if row != assignment.row {
                    return Err(Error::Protocol(format!(
                        "rank {} packed row {} where row {} was expected",
                        source, row, assignment.row
                    )));
                }
                assembler.place_row(source, row, pixels)?;
            }
            unpacker.finish()?;
        }
        Ok(())
    }
}
