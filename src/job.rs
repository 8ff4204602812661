//! Runs a whole job: partitions the raster, starts one thread per
//! rank, lets the chosen transport move the rows, and hands back the
//! coordinator's finished raster.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crossbeam;

use assemble::{Assembler, Raster};
use comm::{Communicator, World};
use config::JobConfig;
use error::{panicked, Error};
use kernel::Kernel;
use output;
use partition::Partitioner;
use transport::{Context, Phase, Transport, COORDINATOR};

fn run_worker(
    transport: &dyn Transport,
    ctx: &Context,
    comm: &mut Communicator,
) -> Result<(), Error> {
    let rank = comm.rank();
    Phase::Idle.enter(rank);
    // a panic must still reach the coordinator as an abort
    let result = panic::catch_unwind(AssertUnwindSafe(|| transport.run_worker(ctx, &mut *comm)))
        .unwrap_or_else(|payload| Err(panicked(&format!("rank {}", rank), &*payload)));
    match result {
        Ok(()) => Phase::Done.enter(rank),
        Err(ref err) => {
            error!("rank {} failed: {}", rank, err);
            comm.abort(COORDINATOR, &err.to_string());
        }
    }
    result
}

fn run_coordinator(
    transport: &dyn Transport,
    ctx: &Context,
    comm: &mut Communicator,
) -> Result<Raster, Error> {
    let rank = comm.rank();
    Phase::Idle.enter(rank);
    let mut assembler = Assembler::new(ctx.partitioner, ctx.kernel.width())?;
    transport.run_coordinator(ctx, comm, &mut assembler)?;
    let raster = assembler.finish()?;
    Phase::Done.enter(rank);
    Ok(raster)
}

/// Render the raster described by `config`.  Either every row arrives
/// and is placed, or the job fails.
pub fn render(config: &JobConfig) -> Result<Raster, Error> {
    let strategy = config.transport.strategy();
    render_with(config, &*strategy)
}

/// Render with a caller-supplied transport in place of the one
/// `config` names.
pub fn render_with(config: &JobConfig, transport: &dyn Transport) -> Result<Raster, Error> {
    config.validate()?;
    let partitioner = Partitioner::new(
        config.workers,
        config.height,
        config.bounds,
        config.scheme(),
        config.remainder,
    )?;
    partitioner.verify_coverage()?;
    transport.check(&partitioner)?;
    let kernel = Kernel::new(config.width, config.iterations, config.threads)?;

    info!(
        "rendering {}x{} at {} iterations: {} ranks, {:?} rows, {} transport",
        config.width,
        config.height,
        config.iterations,
        config.workers,
        partitioner.scheme(),
        transport.name()
    );
    let started = Instant::now();

    let ctx = Context {
        partitioner: &partitioner,
        kernel: &kernel,
    };
    let mut comms = World::new(config.workers, config.timeout);
    let mut coordinator = comms.remove(COORDINATOR);

    let ctx = &ctx;
    let (raster, workers) = crossbeam::scope(|spawner| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|mut comm| spawner.spawn(move |_| run_worker(transport, ctx, &mut comm)))
            .collect();
        let raster = run_coordinator(transport, ctx, &mut coordinator);
        let workers: Vec<Result<(), Error>> = handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| Err(panicked("worker thread", &*payload)))
            })
            .collect();
        (raster, workers)
    })
    .map_err(|payload| panicked("job scope", &*payload))?;

    let raster = raster?;
    for worker in workers {
        worker?;
    }
    info!("rendered in {:?}", started.elapsed());
    Ok(raster)
}

/// Render and write the output file.  Only the coordinator's raster is
/// ever written.
pub fn run(config: &JobConfig) -> Result<Raster, Error> {
    let raster = render(config)?;
    output::save(&config.output, &raster, config.palette)?;
    info!("wrote {}", config.output.display());
    Ok(raster)
}
