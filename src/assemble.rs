//! The coordinator's side of the job: a full-size raster and the
//! bookkeeping that decides whether an arriving row may be placed in
//! it.

use itertools::Itertools;

use error::{alloc_bytes, Error};
use kernel::Tile;
use partition::Partitioner;

/// A finished (or finishing) grid of intensities, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// `width * height` intensities.
    pub pixels: Vec<u8>,
}

impl Raster {
    /// A zeroed raster.
    pub fn new(width: usize, height: usize) -> Result<Raster, Error> {
        Ok(Raster {
            width,
            height,
            pixels: alloc_bytes(width * height, "raster")?,
        })
    }

    /// The intensity at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    /// One row of intensities.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }
}

/// Places rows into the raster at the index the partition assigned
/// them, refusing anything the partition did not ask for.
pub struct Assembler<'p> {
    partitioner: &'p Partitioner,
    raster: Raster,
    received: Vec<bool>,
}

impl<'p> Assembler<'p> {
    /// A fresh, empty raster `width` columns wide and as tall as the
    /// partition.
    pub fn new(partitioner: &'p Partitioner, width: usize) -> Result<Assembler<'p>, Error> {
        let height = partitioner.height();
        Ok(Assembler {
            partitioner,
            raster: Raster::new(width, height)?,
            received: vec![false; height],
        })
    }

    /// Place a row sent by `source`.  Placing a row twice is harmless
    /// if the contents agree.
    pub fn place_row(&mut self, source: usize, row: usize, pixels: &[u8]) -> Result<(), Error> {
        let height = self.raster.height;
        let width = self.raster.width;
        if row >= height {
            return Err(Error::Protocol(format!(
                "rank {} delivered row {} of a {}-row raster",
                source, row, height
            )));
        }
        match self.partitioner.owner(row) {
            Some(owner) if owner == source => (),
            Some(owner) => {
                return Err(Error::Protocol(format!(
                    "rank {} delivered row {}, which belongs to rank {}",
                    source, row, owner
                )))
            }
            None => {
                return Err(Error::Protocol(format!(
                    "row {} was never assigned to any worker",
                    row
                )))
            }
        }
        if pixels.len() != width {
            return Err(Error::Transport(format!(
                "row {} from rank {} is {} bytes, expected {}",
                row,
                source,
                pixels.len(),
                width
            )));
        }
        if self.received[row] {
            if self.raster.row(row) != pixels {
                return Err(Error::Protocol(format!(
                    "rank {} delivered row {} twice with different contents",
                    source, row
                )));
            }
            warn!("row {} from rank {} delivered twice", row, source);
            return Ok(());
        }
        self.raster.row_mut(row).copy_from_slice(pixels);
        self.received[row] = true;
        trace!("placed row {} from rank {}", row, source);
        Ok(())
    }

    /// Place every row of a tile produced by `source`.
    pub fn place_tile(&mut self, source: usize, tile: &Tile) -> Result<(), Error> {
        if tile.width != self.raster.width {
            return Err(Error::Transport(format!(
                "tile from rank {} is {} wide, expected {}",
                source, tile.width, self.raster.width
            )));
        }
        for (row, pixels) in tile.iter_rows() {
            self.place_row(source, row, pixels)?;
        }
        Ok(())
    }

    /// Place the concatenated tiles of a gather, in rank order, using
    /// the partition to recover each tile's rows.
    pub fn place_gathered(&mut self, gathered: &[u8]) -> Result<(), Error> {
        let width = self.raster.width;
        let mut offset = 0;
        for partition in self.partitioner.partitions() {
            let len = partition.len() * width;
            if offset + len > gathered.len() {
                return Err(Error::Transport(format!(
                    "gathered buffer ends at {} bytes, rank {}'s tile needs {}..{}",
                    gathered.len(),
                    partition.rank,
                    offset,
                    offset + len
                )));
            }
            let chunk = &gathered[offset..offset + len];
            for (row, pixels) in partition.row_indices().into_iter().zip(chunk.chunks(width)) {
                self.place_row(partition.rank, row, pixels)?;
            }
            offset += len;
        }
        if offset != gathered.len() {
            return Err(Error::Transport(format!(
                "gathered buffer has {} bytes past the last tile",
                gathered.len() - offset
            )));
        }
        Ok(())
    }

    /// Rows that have not arrived yet.
    pub fn missing(&self) -> Vec<usize> {
        self.received
            .iter()
            .enumerate()
            .filter(|&(_, &seen)| !seen)
            .map(|(row, _)| row)
            .collect()
    }

    /// Whether every row has arrived.
    pub fn is_complete(&self) -> bool {
        self.received.iter().all(|&seen| seen)
    }

    /// Hand over the raster, provided every row arrived.
    pub fn finish(self) -> Result<Raster, Error> {
        let missing = self.missing();
        if !missing.is_empty() {
            let mut rows = missing.iter().take(16).join(", ");
            if missing.len() > 16 {
                rows.push_str(", ...");
            }
            return Err(Error::Incomplete {
                count: missing.len(),
                rows,
            });
        }
        Ok(self.raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partition::{RemainderPolicy, Scheme};
    use planes::DomainBounds;

    fn partitioner(workers: usize, height: usize, scheme: Scheme) -> Partitioner {
        Partitioner::new(
            workers,
            height,
            DomainBounds::default(),
            scheme,
            RemainderPolicy::Spread,
        )
        .unwrap()
    }

    #[test]
    fn rows_land_where_the_partition_says() {
        let p = partitioner(2, 4, Scheme::Interleaved);
        let mut assembler = Assembler::new(&p, 2).unwrap();
        assembler.place_row(1, 3, &[3, 3]).unwrap();
        assembler.place_row(0, 0, &[0, 0]).unwrap();
        assembler.place_row(1, 1, &[1, 1]).unwrap();
        assembler.place_row(0, 2, &[2, 2]).unwrap();
        let raster = assembler.finish().unwrap();
        assert_eq!(raster.pixels, vec![0, 0, 1, 1, 2, 2, 3, 3]);
        assert_eq!(raster.get(1, 2), 2);
    }

    #[test]
    fn out_of_range_row_is_a_protocol_violation() {
        let p = partitioner(2, 4, Scheme::Contiguous);
        let mut assembler = Assembler::new(&p, 2).unwrap();
        match assembler.place_row(1, 4, &[0, 0]) {
            Err(Error::Protocol(_)) => (),
            other => panic!("expected a protocol error, got {:?}", other),
        }
    }

    #[test]
    fn row_from_the_wrong_rank_is_a_protocol_violation() {
        let p = partitioner(2, 4, Scheme::Contiguous);
        let mut assembler = Assembler::new(&p, 2).unwrap();
        assert!(assembler.place_row(1, 0, &[0, 0]).is_err());
    }

    #[test]
    fn duplicate_rows_are_idempotent_only_when_identical() {
        let p = partitioner(1, 2, Scheme::Contiguous);
        let mut assembler = Assembler::new(&p, 2).unwrap();
        assembler.place_row(0, 1, &[5, 6]).unwrap();
        assembler.place_row(0, 1, &[5, 6]).unwrap();
        assert!(assembler.place_row(0, 1, &[6, 5]).is_err());
    }

    #[test]
    fn short_row_is_a_transport_error() {
        let p = partitioner(1, 2, Scheme::Contiguous);
        let mut assembler = Assembler::new(&p, 3).unwrap();
        match assembler.place_row(0, 0, &[1, 2]) {
            Err(Error::Transport(_)) => (),
            other => panic!("expected a transport error, got {:?}", other),
        }
    }

    #[test]
    fn missing_rows_block_finish() {
        let p = partitioner(2, 3, Scheme::Interleaved);
        let mut assembler = Assembler::new(&p, 1).unwrap();
        assembler.place_row(0, 0, &[9]).unwrap();
        assert!(!assembler.is_complete());
        assert_eq!(assembler.missing(), vec![1, 2]);
        match assembler.finish() {
            Err(Error::Incomplete { count, rows }) => {
                assert_eq!(count, 2);
                assert_eq!(rows, "1, 2");
            }
            other => panic!("expected an incomplete raster, got {:?}", other),
        }
    }

    #[test]
    fn gathered_interleaved_tiles_are_reordered() {
        let p = partitioner(2, 4, Scheme::Interleaved);
        let mut assembler = Assembler::new(&p, 1).unwrap();
        // rank 0 owns rows 0 and 2, rank 1 owns rows 1 and 3
        assembler.place_gathered(&[10, 12, 11, 13]).unwrap();
        assert_eq!(assembler.finish().unwrap().pixels, vec![10, 11, 12, 13]);
    }

    #[test]
    fn gathered_buffer_must_be_exact() {
        let p = partitioner(2, 4, Scheme::Contiguous);
        let mut assembler = Assembler::new(&p, 1).unwrap();
        assert!(assembler.place_gathered(&[1, 2, 3]).is_err());
        let mut assembler = Assembler::new(&p, 1).unwrap();
        assert!(assembler.place_gathered(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn tiles_place_every_row() {
        let p = partitioner(2, 4, Scheme::Contiguous);
        let mut assembler = Assembler::new(&p, 2).unwrap();
        let tile = Tile {
            rows: vec![2, 3],
            width: 2,
            pixels: vec![1, 2, 3, 4],
        };
        assembler.place_tile(1, &tile).unwrap();
        assert_eq!(assembler.missing(), vec![0, 1]);
    }
}
