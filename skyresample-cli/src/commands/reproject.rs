//! Reproject command - resample an image from the input grid onto the output grid.
//!
//! Grids come from the `[input]` and `[output]` sections of the configuration
//! file. The input image is read as 16-bit greyscale, or as three colour
//! planes with `--rgb`, and the result is written as a 16-bit PNG stretched
//! to its finite range. Uncovered pixels are written as zero.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use ndarray::{Array2, Array3, ArrayD, IxDyn};
use skyresample::config::ConfigFile;
use skyresample::logging::init_logging;
use skyresample::{ExactReprojector, Parallelism, PartitionAxis};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CliError;

/// Arguments for the reproject command.
pub struct ReprojectArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub footprint: Option<PathBuf>,
    pub parallel: Option<Parallelism>,
    pub axis: Option<PartitionAxis>,
    pub rgb: bool,
}

/// Run the reproject command.
pub fn run(args: ReprojectArgs, config_path: &Path, verbose: bool) -> Result<(), CliError> {
    let mut config = ConfigFile::load_from(config_path)?;
    if verbose {
        config.logging.level = "debug".to_string();
    }
    let _logging = init_logging(&config.logging)?;
    info!(config = %config_path.display(), "skyresample reproject starting");

    // CLI > config file
    let mut settings = config.reproject.clone();
    if let Some(parallel) = args.parallel {
        settings.parallelism = parallel;
    }
    if let Some(axis) = args.axis {
        settings.partition_axis = axis;
    }
    let footprint_out = footprint_path(args.footprint.clone(), settings.footprint, &args.output);
    let mut options = settings.to_options();
    options.want_footprint = footprint_out.is_some();

    let (ny_out, nx_out) = config.output.shape().ok_or_else(|| {
        CliError::Config(
            "output grid size is not set. \
             Use 'skyresample config set output.naxis1 <columns>' and output.naxis2."
                .to_string(),
        )
    })?;

    let image = load_image(&args.input, args.rgb)?;
    let mut output_shape: Vec<usize> = image.shape()[..image.ndim() - 2].to_vec();
    output_shape.extend([ny_out, nx_out]);
    debug!(input_shape = ?image.shape(), output_shape = ?output_shape, "Loaded input image");

    // An undeclared input size is taken from the image itself.
    let mut input_grid = config.input.clone();
    let spatial = &image.shape()[image.ndim() - 2..];
    input_grid.naxis2.get_or_insert(spatial[0]);
    input_grid.naxis1.get_or_insert(spatial[1]);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, stopping...");
        cancel_clone.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    let reprojector = ExactReprojector::new(options).with_cancellation(cancel);
    let result = reprojector.reproject(
        image.view(),
        &input_grid.projection(),
        &config.output.projection(),
        &output_shape,
    )?;

    let (data, footprint) = result.into_parts();
    let range = finite_range(data.iter().copied()).unwrap_or((0.0, 0.0));
    save_image(&data, range, &args.output)?;
    println!("Wrote {}", args.output.display());

    if let (Some(path), Some(footprint)) = (footprint_out.as_ref(), footprint) {
        save_image(&footprint, (0.0, 1.0), path)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

/// Where to write the footprint: the explicit path, otherwise
/// `<output stem>_footprint.png` beside the output when `[reproject] footprint`
/// is set, otherwise nowhere.
fn footprint_path(explicit: Option<PathBuf>, enabled: bool, output: &Path) -> Option<PathBuf> {
    explicit.or_else(|| {
        enabled.then(|| {
            let stem = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            output.with_file_name(format!("{}_footprint.png", stem))
        })
    })
}

/// Reads `path` as `(ny, nx)` greyscale, or `(3, ny, nx)` colour planes.
fn load_image(path: &Path, rgb: bool) -> Result<ArrayD<u16>, CliError> {
    let img = image::open(path)
        .map_err(|e| CliError::Image(format!("Failed to read {}: {}", path.display(), e)))?;
    image_to_array(img, rgb)
}

fn image_to_array(img: DynamicImage, rgb: bool) -> Result<ArrayD<u16>, CliError> {
    let (nx, ny) = (img.width() as usize, img.height() as usize);
    let shape_err = |e: ndarray::ShapeError| CliError::Image(e.to_string());

    if rgb {
        let pixels = Array3::from_shape_vec((ny, nx, 3), img.to_rgb16().into_raw())
            .map_err(shape_err)?;
        Ok(pixels
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .into_owned()
            .into_dyn())
    } else {
        let pixels =
            Array2::from_shape_vec((ny, nx), img.to_luma16().into_raw()).map_err(shape_err)?;
        Ok(pixels.into_dyn())
    }
}

/// Minimum and maximum of the finite values.
fn finite_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Maps `value` from `[lo, hi]` onto the full `u16` range.
///
/// Non-finite values map to zero. A flat range maps every finite value to
/// the maximum so covered pixels stay distinguishable from blanks.
fn quantize(value: f64, (lo, hi): (f64, f64)) -> u16 {
    if !value.is_finite() {
        return 0;
    }
    if hi <= lo {
        return u16::MAX;
    }
    let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    (t * u16::MAX as f64).round() as u16
}

/// Writes a `(ny, nx)` or `(3, ny, nx)` array as a 16-bit image.
fn save_image(data: &ArrayD<f64>, range: (f64, f64), path: &Path) -> Result<(), CliError> {
    let shape = data.shape();
    let write_err = |e: image::ImageError| {
        CliError::Image(format!("Failed to write {}: {}", path.display(), e))
    };

    match shape {
        [ny, nx] => {
            let raw: Vec<u16> = data.iter().map(|&v| quantize(v, range)).collect();
            let buffer = ImageBuffer::<Luma<u16>, _>::from_raw(*nx as u32, *ny as u32, raw)
                .ok_or_else(|| CliError::Image("image buffer size mismatch".to_string()))?;
            buffer.save(path).map_err(write_err)
        }
        [3, ny, nx] => {
            // Planes to interleaved pixels.
            let interleaved = data.view().permuted_axes(IxDyn(&[1, 2, 0]));
            let raw: Vec<u16> = interleaved.iter().map(|&v| quantize(v, range)).collect();
            let buffer = ImageBuffer::<Rgb<u16>, _>::from_raw(*nx as u32, *ny as u32, raw)
                .ok_or_else(|| CliError::Image("image buffer size mismatch".to_string()))?;
            buffer.save(path).map_err(write_err)
        }
        other => Err(CliError::Image(format!(
            "Cannot write array of shape {:?} as an image",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_finite_range_skips_nan() {
        let range = finite_range([f64::NAN, 3.0, -1.0, f64::INFINITY, 2.0]);
        assert_eq!(range, Some((-1.0, 3.0)));
        assert_eq!(finite_range([f64::NAN]), None);
    }

    #[test]
    fn test_quantize_endpoints() {
        assert_eq!(quantize(-1.0, (-1.0, 3.0)), 0);
        assert_eq!(quantize(3.0, (-1.0, 3.0)), u16::MAX);
        assert_eq!(quantize(1.0, (-1.0, 3.0)), 32768);
        assert_eq!(quantize(f64::NAN, (-1.0, 3.0)), 0);
    }

    #[test]
    fn test_quantize_flat_range() {
        assert_eq!(quantize(5.0, (5.0, 5.0)), u16::MAX);
        assert_eq!(quantize(f64::NAN, (5.0, 5.0)), 0);
    }

    #[test]
    fn test_rgb_image_becomes_planes() {
        let mut buffer = ImageBuffer::<Rgb<u16>, Vec<u16>>::new(4, 2);
        buffer.put_pixel(3, 1, Rgb([10, 20, 30]));
        let array = image_to_array(DynamicImage::ImageRgb16(buffer), true).unwrap();

        assert_eq!(array.shape(), &[3, 2, 4]);
        assert_eq!(array[[0, 1, 3]], 10);
        assert_eq!(array[[1, 1, 3]], 20);
        assert_eq!(array[[2, 1, 3]], 30);
    }

    #[test]
    fn test_greyscale_image_shape() {
        let buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::new(5, 3);
        let array = image_to_array(DynamicImage::ImageLuma16(buffer), false).unwrap();
        assert_eq!(array.shape(), &[3, 5]);
    }

    #[test]
    fn test_save_and_reload_greyscale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.png");
        let data = ndarray::arr2(&[[0.0, f64::NAN], [1.0, 2.0]]).into_dyn();

        save_image(&data, (0.0, 2.0), &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_luma16();
        assert_eq!(reloaded.dimensions(), (2, 2));
        assert_eq!(reloaded.get_pixel(0, 0).0[0], 0);
        assert_eq!(reloaded.get_pixel(1, 0).0[0], 0);
        assert_eq!(reloaded.get_pixel(1, 1).0[0], u16::MAX);
    }

    #[test]
    fn test_footprint_path_resolution() {
        let output = Path::new("/data/out/m1.png");
        assert_eq!(
            footprint_path(Some(PathBuf::from("/tmp/fp.png")), false, output),
            Some(PathBuf::from("/tmp/fp.png"))
        );
        assert_eq!(
            footprint_path(None, true, output),
            Some(PathBuf::from("/data/out/m1_footprint.png"))
        );
        assert_eq!(footprint_path(None, false, output), None);
    }

    #[test]
    fn test_save_and_reload_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rgb.png");
        let mut data = ArrayD::<f64>::zeros(vec![3, 2, 2]);
        data[[0, 1, 0]] = 1.0;
        data[[2, 0, 1]] = 1.0;

        save_image(&data, (0.0, 1.0), &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb16();
        assert_eq!(reloaded.dimensions(), (2, 2));
        assert_eq!(reloaded.get_pixel(0, 1).0, [u16::MAX, 0, 0]);
        assert_eq!(reloaded.get_pixel(1, 0).0, [0, 0, u16::MAX]);
        assert_eq!(reloaded.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_save_rejects_odd_shape() {
        let dir = TempDir::new().unwrap();
        let data = ArrayD::<f64>::zeros(vec![2, 2, 2]);
        let err = save_image(&data, (0.0, 1.0), &dir.path().join("x.png")).unwrap_err();
        assert!(matches!(err, CliError::Image(_)));
    }

    proptest! {
        #[test]
        fn quantize_is_monotonic(a in -1e6f64..1e6, b in -1e6f64..1e6, lo in -1e6f64..0.0, span in 1e-3f64..2e6) {
            let range = (lo, lo + span);
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(quantize(small, range) <= quantize(large, range));
        }
    }
}
