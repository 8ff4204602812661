//! The per-pixel escape-time function and the tile renderer built on
//! top of it.  Every pixel is independent of every other, so a tile
//! is split into disjoint runs of rows and handed to scoped threads
//! with no locking at all.

use crossbeam;
use num::{clamp, Complex};

use error::{alloc_bytes, panicked, Error};
use partition::RowAssignment;
use planes::{Pixel, PlaneMapper};

/// Iterate `z = z² + c` from zero, counting the iterations that
/// complete without the orbit leaving the radius-2 disk, up to
/// `limit`.
pub fn escape_time(c: Complex<f64>, limit: usize) -> usize {
    let mut z: Complex<f64> = Complex { re: 0.0, im: 0.0 };
    let mut i = 0;
    while i < limit {
        z = z * z + c;
        if z.norm_sqr() > 4.0 {
            break;
        }
        i += 1;
    }
    i
}

/// Scale an iteration count onto `0..=255`.
pub fn intensity(iterations: usize, limit: usize) -> u8 {
    let scaled = (255.0 * iterations as f64 / limit as f64).round();
    clamp(scaled, 0.0, 255.0) as u8
}

/// A worker-local fragment of the raster: full-width rows, in the
/// order the partition assigned them.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    /// The raster row index of each row in `pixels`.
    pub rows: Vec<usize>,
    /// Row width in pixels.
    pub width: usize,
    /// Row-major intensities, `rows.len() * width` of them.
    pub pixels: Vec<u8>,
}

impl Tile {
    /// The intensities of the `index`th row of this tile.
    pub fn row(&self, index: usize) -> &[u8] {
        &self.pixels[index * self.width..(index + 1) * self.width]
    }

    /// Iterate over `(raster row, intensities)` pairs.
    pub fn iter_rows<'a>(&'a self) -> impl Iterator<Item = (usize, &'a [u8])> + 'a {
        self.rows.iter().cloned().zip(self.pixels.chunks(self.width))
    }

    /// Give up the tile, keeping only its pixels.
    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }
}

/// Renders rows of the raster.  Holds nothing but the raster width,
/// the iteration budget, and how many threads it may use.
#[derive(Copy, Clone, Debug)]
pub struct Kernel {
    width: usize,
    limit: usize,
    threads: usize,
}

impl Kernel {
    /// Requires the raster width, the per-pixel iteration budget, and
    /// the number of threads to spread a multi-row tile across.
    pub fn new(width: usize, limit: usize, threads: usize) -> Result<Kernel, Error> {
        if width == 0 {
            return Err(Error::Config("raster width must be non-zero".to_string()));
        }
        if limit == 0 {
            return Err(Error::Config("iteration budget must be non-zero".to_string()));
        }
        Ok(Kernel {
            width,
            limit,
            threads: threads.max(1),
        })
    }

    /// Row width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Render one row into `out`, which must be exactly one row wide.
    /// The row is mapped through its own sub-bounds.
    pub fn render_row_into(&self, assignment: &RowAssignment, out: &mut [u8]) -> Result<(), Error> {
        if out.len() != self.width {
            return Err(Error::Protocol(format!(
                "row buffer holds {} pixels, expected {}",
                out.len(),
                self.width
            )));
        }
        let plane = PlaneMapper::new(self.width, 1, assignment.bounds)?;
        for (column, pixel) in out.iter_mut().enumerate() {
            let c = plane.pixel_to_point(&Pixel(column, 0));
            *pixel = intensity(escape_time(c, self.limit), self.limit);
        }
        Ok(())
    }

    /// Render a single row into a freshly allocated buffer.
    pub fn render_row(&self, assignment: &RowAssignment) -> Result<Vec<u8>, Error> {
        let mut out = alloc_bytes(self.width, "row buffer")?;
        self.render_row_into(assignment, &mut out)?;
        Ok(out)
    }

    /// Render every assigned row into one tile, spreading contiguous
    /// runs of rows across the kernel's threads.
    pub fn render_rows(&self, assignments: &[RowAssignment]) -> Result<Tile, Error> {
        let mut pixels = alloc_bytes(assignments.len() * self.width, "tile buffer")?;
        let threads = self.threads.min(assignments.len()).max(1);

        if threads == 1 {
            for (assignment, out) in assignments.iter().zip(pixels.chunks_mut(self.width)) {
                self.render_row_into(assignment, out)?;
            }
        } else {
            let rows_per_thread = (assignments.len() + threads - 1) / threads;
            let chunk = rows_per_thread * self.width;
            let results: Vec<Result<(), Error>> = crossbeam::scope(|spawner| {
                let handles: Vec<_> = pixels
                    .chunks_mut(chunk)
                    .zip(assignments.chunks(rows_per_thread))
                    .map(|(region, rows)| {
                        spawner.spawn(move |_| -> Result<(), Error> {
                            for (assignment, out) in rows.iter().zip(region.chunks_mut(self.width)) {
                                self.render_row_into(assignment, out)?;
                            }
                            Ok(())
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|payload| {
                                Err(panicked("tile render thread", &*payload))
                            })
                    })
                    .collect()
            })
            .map_err(|payload| panicked("tile render scope", &*payload))?;
            for result in results {
                result?;
            }
        }

        Ok(Tile {
            rows: assignments.iter().map(|a| a.row).collect(),
            width: self.width,
            pixels,
        })
    }
}
