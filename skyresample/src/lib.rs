//! skyresample - flux-conserving reprojection between celestial pixel grids.
//!
//! Each input pixel is treated as the quadrilateral bounded by its four
//! corners, and its value is distributed over the output pixels it overlaps
//! in proportion to the overlapping area. Output pixels no input pixel
//! covers are NaN, and the footprint reports the covered fraction.
//!
//! # Pipeline
//!
//! ```text
//! LoopLayout::validate          shapes, loop axes
//!   CornerGrid::sample          corner world coordinates, both grids
//!   HarmonizedCoords::build     input corners in output frame and pixel space
//!   partition                   input windows, one per worker
//!   OverlapKernel::overlap      partial sums per window  (worker pool)
//!   Accumulator                 sum, then divide
//!   Assembler                   stack loop axes back
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skyresample::{reproject_exact, CelestialFrame, Parallelism, TanProjection};
//!
//! let input = TanProjection::new((50.5, 50.5), (83.63, 22.01), (-0.002, 0.002));
//! let output = TanProjection::new((60.5, 60.5), (184.55, -5.78), (-0.002, 0.002))
//!     .with_frame(CelestialFrame::Galactic);
//!
//! let result = reproject_exact(image.view(), &input, &output, &[120, 120], Parallelism::Auto, true)?;
//! ```

pub mod accumulate;
pub mod assemble;
pub mod config;
pub mod error;
pub mod grid;
pub mod harmonize;
pub mod kernel;
pub mod logging;
pub mod partition;
pub mod pool;
pub mod reproject;
pub mod shape;
pub mod sky;

pub use assemble::Reprojection;
pub use error::{ErrorKind, ReprojectError, ReprojectResult};
pub use kernel::{KernelError, OverlapKernel, PartialSums, PlanarOverlapKernel};
pub use partition::{InputWindow, PartitionAxis};
pub use pool::Parallelism;
pub use reproject::{reproject_exact, ExactReprojector, ReprojectOptions};
pub use sky::{CelestialFrame, LonLat, SkyProjection, TanProjection};

/// Re-exported so callers can cancel a running call without adding the
/// dependency themselves.
pub use tokio_util::sync::CancellationToken;
