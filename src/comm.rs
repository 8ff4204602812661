//! An in-process message-passing world.  Each rank owns a mailbox and
//! a sender into every other rank's mailbox; ranks share no mutable
//! state.  Receives are matched on (source, tag), envelopes that
//! arrive before anyone asks for them are stashed in arrival order,
//! and every blocking wait is bounded by a timeout so a dead peer
//! surfaces as an error instead of a hang.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use error::Error;

/// Tag reserved for collective gather contributions.
pub const GATHER_TAG: u32 = 0xFFFF_FF00;
/// Tag reserved for abort notifications.
pub const ABORT_TAG: u32 = 0xFFFF_FFFF;

/// One unit of transfer between two ranks.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Rank that sent it.
    pub source: usize,
    /// Matching tag.
    pub tag: u32,
    /// Sender-assigned sequence number.
    pub seq: u64,
    /// The bytes.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Byte length of the payload.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Creates the endpoints for a job.
pub struct World;

impl World {
    /// One communicator per rank.  Hand each one to the thread that
    /// plays that rank.  A rank holds no sender into its own mailbox,
    /// so once every peer has dropped its communicator a pending
    /// receive fails with `Disconnected`.
    pub fn new(size: usize, timeout: Duration) -> Vec<Communicator> {
        let (senders, receivers): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
            (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, mailbox)| Communicator {
                rank,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(dest, sender)| {
                        if dest == rank {
                            None
                        } else {
                            Some(sender.clone())
                        }
                    })
                    .collect(),
                mailbox,
                stash: VecDeque::new(),
                timeout,
            })
            .collect()
    }
}

/// A pending non-blocking send.  The payload was moved into the
/// request, so the sender cannot touch the buffer until the send is
/// confirmed.
#[derive(Debug)]
#[must_use = "a send is not known to be complete until it is waited on"]
pub struct SendRequest {
    result: Result<(), Error>,
}

impl SendRequest {
    /// Confirm completion.
    pub fn wait(self) -> Result<(), Error> {
        self.result
    }
}

/// A posted receive.  Completed by `Communicator::wait` or
/// `Communicator::wait_all`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use = "a posted receive must be waited on"]
pub struct RecvRequest {
    /// Rank to receive from.
    pub source: usize,
    /// Tag to match.
    pub tag: u32,
}

/// One rank's endpoint.
pub struct Communicator {
    rank: usize,
    peers: Vec<Option<Sender<Envelope>>>,
    mailbox: Receiver<Envelope>,
    stash: VecDeque<Envelope>,
    timeout: Duration,
}

impl Communicator {
    /// This rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the world.
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    fn post(&self, dest: usize, tag: u32, seq: u64, payload: Vec<u8>) -> Result<(), Error> {
        let peer = match self.peers.get(dest) {
            Some(&Some(ref peer)) => peer,
            Some(&None) => {
                return Err(Error::Transport(format!(
                    "rank {} cannot send to itself",
                    self.rank
                )))
            }
            None => {
                return Err(Error::Transport(format!(
                    "rank {} has no peer {} (world size {})",
                    self.rank,
                    dest,
                    self.size()
                )))
            }
        };
        trace!(
            "rank {} -> {}: tag {} seq {} ({} bytes)",
            self.rank,
            dest,
            tag,
            seq,
            payload.len()
        );
        peer.send(Envelope {
            source: self.rank,
            tag,
            seq,
            payload,
        })
        .map_err(|_| Error::Disconnected(dest))
    }

    /// Send and return once the envelope is in the destination's
    /// mailbox.
    pub fn send(&self, dest: usize, tag: u32, seq: u64, payload: Vec<u8>) -> Result<(), Error> {
        self.post(dest, tag, seq, payload)
    }

    /// Start a send and return immediately.  The caller gives up the
    /// payload.
    pub fn isend(&self, dest: usize, tag: u32, seq: u64, payload: Vec<u8>) -> SendRequest {
        SendRequest {
            result: self.post(dest, tag, seq, payload),
        }
    }

    /// Post a receive for later completion.
    pub fn irecv(&self, source: usize, tag: u32) -> RecvRequest {
        RecvRequest { source, tag }
    }

    /// Block until an envelope from `source` with `tag` arrives.
    pub fn recv(&mut self, source: usize, tag: u32) -> Result<Envelope, Error> {
        self.wait(RecvRequest { source, tag })
    }

    /// Complete one posted receive.
    pub fn wait(&mut self, request: RecvRequest) -> Result<Envelope, Error> {
        let deadline = Instant::now() + self.timeout;
        self.complete(request, deadline)
    }

    /// Complete every posted receive, in the order given.  Returns
    /// only once all of them have landed.
    pub fn wait_all(&mut self, requests: &[RecvRequest]) -> Result<Vec<Envelope>, Error> {
        let deadline = Instant::now() + self.timeout;
        requests
            .iter()
            .map(|&request| self.complete(request, deadline))
            .collect()
    }

    fn take_stashed(&mut self, request: RecvRequest) -> Option<Envelope> {
        let index = self
            .stash
            .iter()
            .position(|e| e.source == request.source && e.tag == request.tag)?;
        self.stash.remove(index)
    }

    fn complete(&mut self, request: RecvRequest, deadline: Instant) -> Result<Envelope, Error> {
        if let Some(abort) = self.stash.iter().find(|e| e.tag == ABORT_TAG) {
            return Err(aborted(abort));
        }
        if let Some(envelope) = self.take_stashed(request) {
            return Ok(envelope);
        }
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| Duration::from_secs(0));
            match self.mailbox.recv_timeout(remaining) {
                Ok(envelope) => {
                    if envelope.tag == ABORT_TAG {
                        let err = aborted(&envelope);
                        self.stash.push_back(envelope);
                        return Err(err);
                    }
                    if envelope.source == request.source && envelope.tag == request.tag {
                        return Ok(envelope);
                    }
                    self.stash.push_back(envelope);
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::Timeout {
                        source: request.source,
                        tag: request.tag,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::Disconnected(self.rank)),
            }
        }
    }

    /// Collective gather to `root`.  Every rank must call this with a
    /// contribution of the same length.  The root gets back every
    /// contribution concatenated in rank order; the others get `None`.
    pub fn gather(&mut self, root: usize, contribution: Vec<u8>) -> Result<Option<Vec<u8>>, Error> {
        if self.rank != root {
            self.send(root, GATHER_TAG, 0, contribution)?;
            return Ok(None);
        }

        let size = self.size();
        let expected = contribution.len();
        let mut gathered = Vec::new();
        gathered
            .try_reserve_exact(expected * size)
            .map_err(|_| Error::Resource {
                what: "gather buffer",
                bytes: expected * size,
            })?;
        let mut own = Some(contribution);
        for source in 0..size {
            let part = if source == root {
                own.take().unwrap_or_default()
            } else {
                self.recv(source, GATHER_TAG)?.payload
            };
            if part.len() != expected {
                return Err(Error::Transport(format!(
                    "gather contribution from rank {} is {} bytes, expected {}",
                    source,
                    part.len(),
                    expected
                )));
            }
            gathered.extend_from_slice(&part);
        }
        Ok(Some(gathered))
    }

    /// Tell `dest` that this rank is giving up.
    pub fn abort(&self, dest: usize, reason: &str) {
        if dest == self.rank {
            return;
        }
        if self
            .post(dest, ABORT_TAG, 0, reason.as_bytes().to_vec())
            .is_err()
        {
            warn!("rank {} could not deliver abort to rank {}", self.rank, dest);
        }
    }
}

fn aborted(envelope: &Envelope) -> Error {
    Error::PeerAborted {
        rank: envelope.source,
        reason: String::from_utf8_lossy(&envelope.payload).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam;

    fn world(size: usize) -> Vec<Communicator> {
        World::new(size, Duration::from_secs(5))
    }

    #[test]
    fn send_and_recv_match_on_source_and_tag() {
        let mut comms = world(3);
        comms[1].send(0, 7, 0, vec![1]).unwrap();
        comms[2].send(0, 7, 0, vec![2]).unwrap();
        comms[1].send(0, 8, 0, vec![3]).unwrap();
        let root = &mut comms[0];
        assert_eq!(root.recv(1, 8).unwrap().payload, vec![3]);
        assert_eq!(root.recv(2, 7).unwrap().payload, vec![2]);
        assert_eq!(root.recv(1, 7).unwrap().payload, vec![1]);
    }

    #[test]
    fn same_source_same_tag_arrives_in_order() {
        let mut comms = world(2);
        for seq in 0..5 {
            comms[1].isend(0, 5, seq, vec![seq as u8]).wait().unwrap();
        }
        for seq in 0..5 {
            let envelope = comms[0].recv(1, 5).unwrap();
            assert_eq!(envelope.seq, seq);
        }
    }

    #[test]
    fn wait_all_completes_every_request() {
        let mut comms = world(4);
        for rank in (1..4).rev() {
            comms[rank].send(0, 5, 0, vec![rank as u8; 3]).unwrap();
        }
        let requests: Vec<RecvRequest> = (1..4).map(|r| comms[0].irecv(r, 5)).collect();
        let envelopes = comms[0].wait_all(&requests).unwrap();
        let sources: Vec<usize> = envelopes.iter().map(|e| e.source).collect();
        assert_eq!(sources, vec![1, 2, 3]);
        assert!(envelopes.iter().all(|e| e.len() == 3));
    }

    #[test]
    fn recv_times_out() {
        let mut comms = World::new(2, Duration::from_millis(20));
        match comms[0].recv(1, 5) {
            Err(Error::Timeout { source: 1, tag: 5 }) => (),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[test]
    fn abort_interrupts_a_pending_receive() {
        let mut comms = world(3);
        comms[2].abort(0, "out of memory");
        match comms[0].recv(1, 5) {
            Err(Error::PeerAborted { rank: 2, reason }) => assert_eq!(reason, "out of memory"),
            other => panic!("expected an abort, got {:?}", other),
        }
        assert!(comms[0].recv(1, 5).is_err());
    }

    #[test]
    fn gather_concatenates_in_rank_order() {
        let comms = world(4);
        let results: Vec<Option<Vec<u8>>> = crossbeam::scope(|spawner| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|mut comm| {
                    spawner.spawn(move |_| {
                        let rank = comm.rank() as u8;
                        comm.gather(0, vec![rank, rank]).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();
        assert_eq!(results[0], Some(vec![0, 0, 1, 1, 2, 2, 3, 3]));
        assert!(results[1..].iter().all(|r| r.is_none()));
    }

    #[test]
    fn gather_rejects_uneven_contributions() {
        let mut comms = world(2);
        comms[1].gather(0, vec![1, 2, 3]).unwrap();
        assert!(comms[0].gather(0, vec![0, 0]).is_err());
    }

    #[test]
    fn sending_to_a_missing_rank_fails() {
        let comms = world(2);
        assert!(comms[0].send(9, 5, 0, vec![]).is_err());
        assert!(comms[0].isend(9, 5, 0, vec![]).wait().is_err());
        assert!(comms[0].send(0, 5, 0, vec![]).is_err());
    }

    #[test]
    fn dropped_peer_is_a_disconnect_not_a_timeout() {
        let mut comms = World::new(2, Duration::from_secs(30));
        comms[1].send(0, 5, 0, vec![1]).unwrap();
        comms.truncate(1);
        let started = Instant::now();
        // what was sent before the drop is still delivered
        assert_eq!(comms[0].recv(1, 5).unwrap().payload, vec![1]);
        match comms[0].recv(1, 5) {
            Err(Error::Disconnected(0)) => (),
            other => panic!("expected a disconnect, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
