extern crate mandelmp;

use std::thread;
use std::time::{Duration, Instant};

use mandelmp::assemble::Assembler;
use mandelmp::comm::Communicator;
use mandelmp::transport::{Context, PackUnpack, PointToPoint, Transport, COORDINATOR};
use mandelmp::{render_with, Error, JobConfig, Scheme, TransportKind};

fn config(workers: usize, transport: TransportKind) -> JobConfig {
    JobConfig {
        iterations: 20,
        width: 8,
        height: 12,
        workers,
        threads: 1,
        transport,
        scheme: Some(Scheme::Interleaved),
        timeout: Duration::from_secs(10),
        ..JobConfig::default()
    }
}

/// Delegates to a real transport, except that one rank fails before
/// sending anything.
#[derive(Debug)]
struct FailingRank<T> {
    inner: T,
    rank: usize,
}

impl<T: Transport> Transport for FailingRank<T> {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error> {
        if comm.rank() == self.rank {
            return Err(Error::Resource {
                what: "tile buffer",
                bytes: 1 << 30,
            });
        }
        self.inner.run_worker(ctx, comm)
    }

    fn run_coordinator(
        &self,
        ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error> {
        self.inner.run_coordinator(ctx, comm, assembler)
    }
}

/// Sends a row the partition never assigned to the sender.
#[derive(Debug)]
struct Trespasser;

impl Transport for Trespasser {
    fn name(&self) -> &'static str {
        "trespasser"
    }

    fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error> {
        let width = ctx.kernel.width();
        comm.send(COORDINATOR, 5, 0, vec![0; width])
    }

    fn run_coordinator(
        &self,
        _ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error> {
        let envelope = comm.recv(1, 5)?;
        // row 0 belongs to the coordinator
        assembler.place_row(envelope.source, 0, &envelope.payload)
    }
}

#[test]
fn failed_worker_aborts_the_pack_job_promptly() {
    let started = Instant::now();
    let transport = FailingRank {
        inner: PackUnpack,
        rank: 2,
    };
    match render_with(&config(4, TransportKind::PackUnpack), &transport) {
        Err(Error::PeerAborted { rank, reason }) => {
            assert_eq!(rank, 2);
            assert!(reason.contains("tile buffer"));
        }
        other => panic!("expected the coordinator to see the abort, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn failed_worker_aborts_the_streaming_job() {
    let transport = FailingRank {
        inner: PointToPoint,
        rank: 1,
    };
    match render_with(&config(3, TransportKind::PointToPoint), &transport) {
        Err(Error::PeerAborted { rank: 1, .. }) => (),
        other => panic!("expected the coordinator to see the abort, got {:?}", other),
    }
}

/// Workers never send anything; the coordinator expects packed
/// buffers.
#[derive(Debug)]
struct Mute {
    linger: Duration,
}

impl Transport for Mute {
    fn name(&self) -> &'static str {
        "mute"
    }

    fn run_worker(&self, _ctx: &Context, _comm: &mut Communicator) -> Result<(), Error> {
        thread::sleep(self.linger);
        Ok(())
    }

    fn run_coordinator(
        &self,
        ctx: &Context,
        comm: &mut Communicator,
        assembler: &mut Assembler,
    ) -> Result<(), Error> {
        PackUnpack.run_coordinator(ctx, comm, assembler)
    }
}

#[test]
fn silent_worker_times_out_instead_of_hanging() {
    let job = JobConfig {
        timeout: Duration::from_millis(100),
        ..config(2, TransportKind::PackUnpack)
    };
    let mute = Mute {
        linger: Duration::from_millis(600),
    };
    match render_with(&job, &mute) {
        Err(Error::Timeout { source: 1, .. }) => (),
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[test]
fn workers_that_exit_without_sending_disconnect_the_coordinator() {
    let started = Instant::now();
    let mute = Mute {
        linger: Duration::from_millis(0),
    };
    match render_with(&config(3, TransportKind::PackUnpack), &mute) {
        Err(Error::Disconnected(0)) => (),
        other => panic!("expected a disconnect, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn panicking_worker_aborts_the_job_promptly() {
    #[derive(Debug)]
    struct Crash;

    impl Transport for Crash {
        fn name(&self) -> &'static str {
            "crash"
        }

        fn run_worker(&self, ctx: &Context, comm: &mut Communicator) -> Result<(), Error> {
            if comm.rank() == 1 {
                panic!("rank 1 fell over");
            }
            PackUnpack.run_worker(ctx, comm)
        }

        fn run_coordinator(
            &self,
            ctx: &Context,
            comm: &mut Communicator,
            assembler: &mut Assembler,
        ) -> Result<(), Error> {
            PackUnpack.run_coordinator(ctx, comm, assembler)
        }
    }

    let started = Instant::now();
    match render_with(&config(3, TransportKind::PackUnpack), &Crash) {
        Err(Error::PeerAborted { rank: 1, reason }) => {
            assert!(reason.contains("rank 1 fell over"), "{}", reason)
        }
        other => panic!("expected the coordinator to see the abort, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn row_from_the_wrong_worker_is_reported() {
    match render_with(&config(2, TransportKind::PointToPoint), &Trespasser) {
        Err(Error::Protocol(msg)) => assert!(msg.contains("belongs to rank 0")),
        other => panic!("expected a protocol violation, got {:?}", other),
    }
}

#[test]
fn coordinator_that_skips_rows_cannot_finish() {
    #[derive(Debug)]
    struct Lazy;

    impl Transport for Lazy {
        fn name(&self) -> &'static str {
            "lazy"
        }

        fn run_worker(&self, _ctx: &Context, _comm: &mut Communicator) -> Result<(), Error> {
            Ok(())
        }

        fn run_coordinator(
            &self,
            _ctx: &Context,
            _comm: &mut Communicator,
            _assembler: &mut Assembler,
        ) -> Result<(), Error> {
            Ok(())
        }
    }

    match render_with(&config(3, TransportKind::PointToPoint), &Lazy) {
        Err(Error::Incomplete { count, .. }) => assert_eq!(count, 12),
        other => panic!("expected an incomplete raster, got {:?}", other),
    }
}
