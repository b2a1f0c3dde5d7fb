//! Exact reprojection orchestration.
//!
//! Wires the stages together for one call:
//!
//! ```text
//! validate ─► precision check ─► pool ─► corner grids ─► harmonize ─► partition
//!                                                                        │
//!                ┌───────────────── for each loop index ─────────────────┘
//!                ▼
//!         kernel × P windows ─► accumulate ─► normalize ─► assemble
//! ```
//!
//! The worker pool lives exactly as long as the call. Cancellation is only
//! observed by the coordinator, between stages and between loop indices.

use std::sync::Arc;
use std::time::Instant;

use ndarray::{ArrayView, Axis, Dimension};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, instrument};

use crate::accumulate::Accumulator;
use crate::assemble::{Assembler, Reprojection};
use crate::error::{ReprojectError, ReprojectResult};
use crate::grid::CornerGrid;
use crate::harmonize::{check_precision, HarmonizedCoords};
use crate::kernel::{OverlapKernel, PlanarOverlapKernel};
use crate::partition::{partition, PartitionAxis};
use crate::pool::{Parallelism, WorkerPool};
use crate::shape::LoopLayout;
use crate::sky::{SkyProjection, DEFAULT_MIN_PIXEL_AREA};

/// Options for an exact reprojection call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectOptions {
    /// Number of workers to split each slice across.
    pub parallelism: Parallelism,
    /// Input axis along which work is split.
    pub partition_axis: PartitionAxis,
    /// Whether to return the footprint.
    pub want_footprint: bool,
    /// Pixel area (deg²) below which a precision warning is logged.
    pub min_pixel_area: f64,
}

impl Default for ReprojectOptions {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::Auto,
            partition_axis: PartitionAxis::Columns,
            want_footprint: true,
            min_pixel_area: DEFAULT_MIN_PIXEL_AREA,
        }
    }
}

/// Flux-conserving reprojection between two sky grids.
///
/// # Example
///
/// ```ignore
/// let reprojector = ExactReprojector::new(ReprojectOptions::default());
/// let result = reprojector.reproject(image.view(), &input_grid, &output_grid, &[512, 512])?;
/// ```
#[derive(Clone)]
pub struct ExactReprojector {
    options: ReprojectOptions,
    kernel: Arc<dyn OverlapKernel>,
    cancellation: Option<CancellationToken>,
}

impl ExactReprojector {
    /// Creates a reprojector using the built-in planar overlap kernel.
    pub fn new(options: ReprojectOptions) -> Self {
        Self {
            options,
            kernel: Arc::new(PlanarOverlapKernel::new()),
            cancellation: None,
        }
    }

    /// Replaces the overlap kernel.
    pub fn with_kernel(mut self, kernel: Arc<dyn OverlapKernel>) -> Self {
        self.kernel = kernel;
        self
    }

    /// Aborts the call with [`ReprojectError::Cancelled`] once `token` is
    /// cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn options(&self) -> &ReprojectOptions {
        &self.options
    }

    /// Reprojects `image` from the `input` grid onto the `output` grid.
    ///
    /// Leading axes of `image` beyond the two spatial axes are loop axes; the
    /// same transform is applied to every 2-D slice along them and
    /// `output_shape` must repeat them exactly.
    ///
    /// # Arguments
    ///
    /// * `image` - Input samples, any element type convertible to `f64`
    /// * `input` - Sky projection of the input grid
    /// * `output` - Sky projection of the output grid
    /// * `output_shape` - Loop axes followed by `(ny_out, nx_out)`
    ///
    /// # Errors
    ///
    /// Dimensionality errors are raised before any coordinate work. Kernel
    /// failures abort the whole call.
    #[instrument(
        name = "reproject_exact",
        skip_all,
        fields(input_shape = ?image.shape(), output_shape = ?output_shape)
    )]
    pub fn reproject<T, D>(
        &self,
        image: ArrayView<'_, T, D>,
        input: &dyn SkyProjection,
        output: &dyn SkyProjection,
        output_shape: &[usize],
    ) -> ReprojectResult<Reprojection>
    where
        T: Copy + Into<f64>,
        D: Dimension,
    {
        let started = Instant::now();
        let image = image.into_dyn();

        let layout = LoopLayout::validate(image.shape(), output_shape, input, output)?;
        check_precision(input, output, self.options.min_pixel_area);
        self.check_cancelled()?;

        let pool = WorkerPool::new(self.options.parallelism)?;
        let stack = layout.flatten(image)?;

        let (ny_in, nx_in) = layout.input_spatial();
        let (ny_out, nx_out) = layout.output_spatial();
        info!(
            loop_count = layout.loop_count(),
            input = ?(ny_in, nx_in),
            output = ?(ny_out, nx_out),
            workers = pool.workers(),
            axis = %self.options.partition_axis,
            kernel = self.kernel.name(),
            "Starting exact reprojection"
        );

        let input_corners = CornerGrid::sample_in(&pool, input, ny_in, nx_in);
        let output_corners = CornerGrid::sample_in(&pool, output, ny_out, nx_out);
        let coords = HarmonizedCoords::build_in(&pool, &input_corners, &output_corners, output);
        drop(input_corners);
        self.check_cancelled()?;

        let windows = partition(ny_in, nx_in, pool.workers(), self.options.partition_axis);
        let mut assembler = Assembler::new(&layout, self.options.want_footprint);

        for (index, slice) in stack.axis_iter(Axis(0)).enumerate() {
            self.check_cancelled()?;
            let _span = debug_span!("loop_slice", index).entered();

            let kernel = &self.kernel;
            let coords = &coords;
            let partials = pool.run_batch(&windows, |window| {
                kernel.overlap(window, coords, slice, (ny_out, nx_out))
            });
            self.check_cancelled()?;

            let mut acc = Accumulator::new((ny_out, nx_out));
            for partial in partials {
                acc.add(&partial?)?;
            }
            debug!(partials = acc.partials(), "Slice accumulated");
            assembler.push(acc.finish_in(&pool));
        }

        let result = assembler.finish()?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Exact reprojection complete"
        );
        Ok(result)
    }

    fn check_cancelled(&self) -> ReprojectResult<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => {
                debug!("Reprojection cancelled by caller");
                Err(ReprojectError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

impl Default for ExactReprojector {
    fn default() -> Self {
        Self::new(ReprojectOptions::default())
    }
}

impl std::fmt::Debug for ExactReprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactReprojector")
            .field("options", &self.options)
            .field("kernel", &self.kernel.name())
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}

/// Reprojects `image` with the built-in kernel and default partitioning.
///
/// Shorthand for [`ExactReprojector::reproject`] with the given parallelism
/// and footprint flag.
pub fn reproject_exact<T, D>(
    image: ArrayView<'_, T, D>,
    input: &dyn SkyProjection,
    output: &dyn SkyProjection,
    output_shape: &[usize],
    parallelism: Parallelism,
    want_footprint: bool,
) -> ReprojectResult<Reprojection>
where
    T: Copy + Into<f64>,
    D: Dimension,
{
    let options = ReprojectOptions {
        parallelism,
        want_footprint,
        ..ReprojectOptions::default()
    };
    ExactReprojector::new(options).reproject(image, input, output, output_shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::harmonize::HarmonizedCoords;
    use crate::kernel::{KernelError, PartialSums};
    use crate::partition::InputWindow;
    use crate::sky::TanProjection;
    use ndarray::{Array2, Array3, ArrayView2};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn grid() -> TanProjection {
        TanProjection::new((4.5, 3.5), (45.0, 30.0), (-0.002, 0.002))
    }

    /// Kernel that fails on every window.
    struct FailingKernel;

    impl OverlapKernel for FailingKernel {
        fn overlap(
            &self,
            _window: &InputWindow,
            _coords: &HarmonizedCoords,
            _slice: ArrayView2<'_, f64>,
            _out_shape: (usize, usize),
        ) -> Result<PartialSums, KernelError> {
            Err(KernelError::Computation("boom".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Kernel that counts its invocations and contributes nothing.
    #[derive(Default)]
    struct CountingKernel {
        calls: AtomicUsize,
    }

    impl OverlapKernel for CountingKernel {
        fn overlap(
            &self,
            _window: &InputWindow,
            _coords: &HarmonizedCoords,
            _slice: ArrayView2<'_, f64>,
            out_shape: (usize, usize),
        ) -> Result<PartialSums, KernelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PartialSums::zeros(out_shape))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_assert_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExactReprojector>();
    }

    #[test]
    fn test_identity_2d() {
        let image = Array2::from_shape_fn((6, 8), |(j, i)| (j * 8 + i) as f64);
        let result = reproject_exact(
            image.view(),
            &grid(),
            &grid(),
            &[6, 8],
            Parallelism::Disabled,
            true,
        )
        .unwrap();

        assert_eq!(result.shape(), &[6, 8]);
        for (a, b) in result.image.iter().zip(image.iter()) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
        let footprint = result.footprint.unwrap();
        assert!(footprint.iter().all(|&w| (w - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_integer_input_is_coerced() {
        let image = Array2::from_shape_fn((6, 8), |(j, i)| (j + i) as u16);
        let result = reproject_exact(
            image.view(),
            &grid(),
            &grid(),
            &[6, 8],
            Parallelism::Disabled,
            false,
        )
        .unwrap();
        assert!((result.image[[2, 3]] - 5.0).abs() < 1e-6);
        assert!(result.footprint.is_none());
    }

    #[test]
    fn test_kernel_failure_aborts_call() {
        let reprojector = ExactReprojector::new(ReprojectOptions {
            parallelism: Parallelism::workers(2).unwrap(),
            ..ReprojectOptions::default()
        })
        .with_kernel(Arc::new(FailingKernel));

        let image = Array2::<f64>::zeros((6, 8));
        let err = reprojector
            .reproject(image.view(), &grid(), &grid(), &[6, 8])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Kernel);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_kernel_called_once_per_window_and_slice() {
        let kernel = Arc::new(CountingKernel::default());
        let reprojector = ExactReprojector::new(ReprojectOptions {
            parallelism: Parallelism::workers(3).unwrap(),
            ..ReprojectOptions::default()
        })
        .with_kernel(kernel.clone());

        let image = Array3::<f32>::zeros((4, 6, 8));
        let result = reprojector
            .reproject(image.view(), &grid(), &grid(), &[4, 6, 8])
            .unwrap();

        assert_eq!(kernel.calls.load(Ordering::SeqCst), 4 * 3);
        // Nothing was deposited, so every pixel is uncovered
        assert!(result.image.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_dimension_errors_precede_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let reprojector = ExactReprojector::default().with_cancellation(token);

        let image = Array3::<f64>::zeros((5, 6, 8));
        let err = reprojector
            .reproject(image.view(), &grid(), &grid(), &[4, 6, 8])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dimensionality);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let reprojector = ExactReprojector::default().with_cancellation(token);

        let image = Array2::<f64>::zeros((6, 8));
        let err = reprojector
            .reproject(image.view(), &grid(), &grid(), &[6, 8])
            .unwrap_err();
        assert!(matches!(err, ReprojectError::Cancelled));
    }

    #[test]
    fn test_debug_names_kernel() {
        let debug = format!("{:?}", ExactReprojector::default());
        assert!(debug.contains("planar"));
    }
}
