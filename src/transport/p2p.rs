//! Rows are streamed a round at a time.  In round `j` every worker
//! renders its `j`th row and fires it off with a non-blocking send,
//! then moves straight on to round `j+1`.  The coordinator renders its
//! own row for the round, posts one receive per worker that owes a
//! row this round, and waits for all of them before it places any.

use assemble::Assembler;
use comm::{Communicator, RecvRequest};
use error::{alloc_bytes, Error};

use super::{Context, Phase, Transport, COORDINATOR};

/// The single tag every row of the job travels under.
pub const ROW_TAG: u32 = 5;

/// The asynchronous point-to-point transport.
#[derive(Copy, Clone, Debug)]
pub struct PointToPoint;

impl Transport for PointToPoint {
    fn name(&self) -> &'static str {
        "p2p"
    }

    fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error> {
        let rank = comm.rank();
        let partition = ctx.partitioner.partition(rank);
        let mut pending = Vec::with_capacity(partition.len());
        for (round, assignment) in partition.rows.iter().enumerate() {
            Phase::Computing.enter(rank);
            // A fresh buffer per round; the previous one belongs to its
            // send until that send is waited on.
            let row = ctx.kernel.render_row(assignment)?;
            Phase::Delivering.enter(rank);
            pending.push(comm.isend(COORDINATOR, ROW_TAG, round as u64, row));
        }
        for request in pending {
            request.wait()?;
        }
        Ok(())
    }

    fn run_coordinator(
        &self,
        ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error> {
        let rank = comm.rank();
        let partitions = ctx.partitioner.partitions();
        let rounds = partitions.iter().map(|p| p.len()).max().unwrap_or(0);
        let mut own = alloc_bytes(ctx.kernel.width(), "row buffer")?;

        for round in 0..rounds {
            if let Some(assignment) = partitions[rank].rows.get(round) {
                Phase::Computing.enter(rank);
                ctx.kernel.render_row_into(assignment, &mut own)?;
                assembler.place_row(rank, assignment.row, &own)?;
            }

            Phase::Receiving.enter(rank);
            let requests: Vec<RecvRequest> = partitions
                .iter()
                .filter(|p| p.rank != rank && p.len() > round)
                .map(|p| comm.irecv(p.rank, ROW_TAG))
                .collect();
            let envelopes = comm.wait_all(&requests)?;

            Phase::Assembling.enter(rank);
            for envelope in envelopes {
                if envelope.seq != round as u64 {
                    return Err(Error::Protocol(format!(
                        "rank {} sent round {} while the coordinator was on round {}",
                        envelope.source, envelope.seq, round
                    )));
                }
                let row = partitions[envelope.source].rows[round].row;
                assembler.place_row(envelope.source, row, &envelope.payload)?;
            }
        }
        Ok(())
    }
}
