#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Partitioned Mandelbrot renderer
//!
//! Every pixel of a Mandelbrot image is independent of every other:
//! take the point of the complex plane under the pixel, iterate
//! `z = z² + c` from zero until the orbit leaves the radius-2 disk or
//! the iteration budget runs out, and the count is the pixel's value.
//! That makes the image trivially divisible, and the interesting part
//! is not the arithmetic but the bookkeeping: splitting the rows among
//! a set of workers, getting each worker's rows back to a single
//! coordinator, and putting them back together in the right order.
//!
//! Workers here are threads that share nothing and talk only by
//! message passing.  Rows can be dealt out in contiguous blocks or
//! round-robin, and delivered to the coordinator one of three ways: a
//! single blocking gather, a stream of non-blocking sends a round at a
//! time, or one packed buffer per worker.  Whatever the combination,
//! the assembled raster is byte-for-byte the same.

extern crate byteorder;
extern crate crossbeam;
#[macro_use]
extern crate failure;
extern crate image;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

#[cfg(test)]
extern crate tempfile;

pub mod assemble;
pub mod codec;
pub mod comm;
pub mod config;
pub mod error;
pub mod job;
pub mod kernel;
pub mod output;
pub mod partition;
pub mod planes;
pub mod transport;

pub use assemble::{Assembler, Raster};
pub use config::JobConfig;
pub use error::Error;
pub use job::{render, render_with, run};
pub use output::ChannelPolicy;
pub use partition::{Partitioner, RemainderPolicy, Scheme};
pub use planes::DomainBounds;
pub use transport::TransportKind;
