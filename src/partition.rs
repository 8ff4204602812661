//! Splits the rows of the raster among the workers.  The assignment is
//! a pure function of the worker count, the raster height, and the
//! domain bounds, so every rank computes the same answer without ever
//! talking to the others.

use itertools::Itertools;

use error::Error;
use planes::DomainBounds;

/// How rows are dealt out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// Worker `i` owns one contiguous block of rows.
    Contiguous,
    /// Rows are dealt round-robin: worker `i` owns `i, i+P, i+2P, ...`.
    Interleaved,
}

/// What to do when the height does not divide evenly by the worker
/// count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RemainderPolicy {
    /// Spread the leftover rows so no two workers differ by more than
    /// one row.
    Spread,
    /// Refuse to partition at all.
    Strict,
}

/// A single raster row and the slice of the complex plane it covers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RowAssignment {
    /// Raster row index.
    pub row: usize,
    /// The row's sub-rectangle of the domain.
    pub bounds: DomainBounds,
}

/// Everything one worker is responsible for.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    /// The worker's rank.
    pub rank: usize,
    /// Assigned rows, in the order they are computed and delivered.
    /// For the interleaved scheme the `j`th entry is the worker's row
    /// for round `j`.
    pub rows: Vec<RowAssignment>,
}

impl Partition {
    /// Number of rows assigned.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether this worker has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raster row indices, in delivery order.
    pub fn row_indices(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.row).collect()
    }
}

/// The deterministic row-to-worker mapping for one job.
#[derive(Clone, Debug)]
pub struct Partitioner {
    workers: usize,
    height: usize,
    bounds: DomainBounds,
    scheme: Scheme,
}

impl Partitioner {
    /// Checks that the job can be partitioned under `policy` and
    /// returns the partitioner for it.
    pub fn new(
        workers: usize,
        height: usize,
        bounds: DomainBounds,
        scheme: Scheme,
        policy: RemainderPolicy,
    ) -> Result<Partitioner, Error> {
        if workers == 0 {
            return Err(Error::Config("worker count must be non-zero".to_string()));
        }
        if height == 0 {
            return Err(Error::Config("raster height must be non-zero".to_string()));
        }
        bounds.validate()?;
        if policy == RemainderPolicy::Strict && height % workers != 0 {
            return Err(Error::Partition(format!(
                "{} rows do not divide evenly among {} workers ({} left over)",
                height,
                workers,
                height % workers
            )));
        }
        Ok(Partitioner {
            workers,
            height,
            bounds,
            scheme,
        })
    }

    /// Number of workers, coordinator included.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Raster height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The scheme rows are dealt under.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Number of interleaved rounds: `ceil(H / P)`.
    pub fn rounds(&self) -> usize {
        (self.height + self.workers - 1) / self.workers
    }

    /// Half-open row range of `rank`'s contiguous block.
    pub fn block(&self, rank: usize) -> (usize, usize) {
        let start = rank * self.height / self.workers;
        let end = (rank + 1) * self.height / self.workers;
        (start, end)
    }

    /// The raster row `rank` computes in interleaved round `round`, if
    /// it has one.
    pub fn row_in_round(&self, rank: usize, round: usize) -> Option<usize> {
        let row = round * self.workers + rank;
        if rank < self.workers && row < self.height {
            Some(row)
        } else {
            None
        }
    }

    /// Which rank owns `row`, or `None` if the row is outside the
    /// raster.
    pub fn owner(&self, row: usize) -> Option<usize> {
        if row >= self.height {
            return None;
        }
        match self.scheme {
            Scheme::Interleaved => Some(row % self.workers),
            Scheme::Contiguous => {
                (0..self.workers).find(|&rank| {
                    let (start, end) = self.block(rank);
                    row >= start && row < end
                })
            }
        }
    }

    fn assign(&self, row: usize) -> RowAssignment {
        RowAssignment {
            row,
            bounds: self.bounds.row_bounds(row, self.height),
        }
    }

    /// The rows assigned to `rank`.
    pub fn partition(&self, rank: usize) -> Partition {
        let rows = if rank >= self.workers {
            vec![]
        } else {
            match self.scheme {
                Scheme::Contiguous => {
                    let (start, end) = self.block(rank);
                    (start..end).map(|row| self.assign(row)).collect()
                }
                Scheme::Interleaved => (rank..self.height)
                    .step_by(self.workers)
                    .map(|row| self.assign(row))
                    .collect(),
            }
        };
        Partition { rank, rows }
    }

    /// Every worker's partition, in rank order.
    pub fn partitions(&self) -> Vec<Partition> {
        (0..self.workers).map(|rank| self.partition(rank)).collect()
    }

    /// Confirm that the partitions cover every row exactly once.
    pub fn verify_coverage(&self) -> Result<(), Error> {
        let rows: Vec<usize> = self
            .partitions()
            .iter()
            .flat_map(|p| p.row_indices())
            .sorted()
            .collect();
        let duplicated: Vec<usize> = rows
            .iter()
            .tuple_windows()
            .filter(|&(a, b)| a == b)
            .map(|(a, _)| *a)
            .dedup()
            .collect();
        if !duplicated.is_empty() {
            return Err(Error::Partition(format!(
                "rows assigned more than once: {}",
                duplicated.iter().join(", ")
            )));
        }
        if rows.len() != self.height || rows.last().map_or(false, |&r| r >= self.height) {
            let missing: Vec<usize> = (0..self.height)
                .filter(|r| rows.binary_search(r).is_err())
                .collect();
            return Err(Error::Partition(format!(
                "rows never assigned: {}",
                missing.iter().join(", ")
            )));
        }
        Ok(())
    }
}
