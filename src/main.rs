use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use dicom_display::{
    DecodedImage, GpuCompositor, PaletteType, PhotometricInterpretation, RasterCompositor,
    RendererConfig, WindowLevel,
};

/// Largest per-channel CPU/GPU difference accepted by `probe`
const MAX_PATH_DIFF: u8 = 1;

#[derive(Parser)]
#[command(name = "dicom-display", about = "Window/level display pipeline probe")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to <config dir>/dicom-display/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Render a buffer through the CPU and GPU paths and compare them
    Probe {
        /// Raw little-endian samples (synthetic ramp when omitted)
        #[arg(long)]
        raw: Option<PathBuf>,

        #[arg(long, default_value_t = 256)]
        width: u32,

        #[arg(long, default_value_t = 256)]
        height: u32,

        /// Bits allocated per sample: 8 or 16
        #[arg(long, default_value_t = 16)]
        bits: u16,

        /// Samples are two's complement
        #[arg(long)]
        signed: bool,

        /// Photometric interpretation as written in the header
        #[arg(long, default_value = "MONOCHROME2")]
        photometric: String,

        /// Window center (default: min/max of the samples)
        #[arg(long, allow_hyphen_values = true)]
        center: Option<f64>,

        /// Window width (default: min/max of the samples)
        #[arg(long, allow_hyphen_values = true)]
        window_width: Option<f64>,

        /// Palette key or name (default from config)
        #[arg(long, value_parser = parse_palette)]
        palette: Option<PaletteType>,

        /// Skip the GPU path
        #[arg(long)]
        cpu_only: bool,

        /// Save the CPU raster (format from the extension)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the available palettes
    Palettes,
}

fn parse_palette(value: &str) -> Result<PaletteType, String> {
    PaletteType::from_name(value).ok_or_else(|| {
        let keys: Vec<&str> = PaletteType::ALL.iter().map(|kind| kind.key()).collect();
        format!("unknown palette '{}' (expected one of: {})", value, keys.join(", "))
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RendererConfig::load_from(path)?,
        None => RendererConfig::load()?,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Probe {
            raw,
            width,
            height,
            bits,
            signed,
            photometric,
            center,
            window_width,
            palette,
            cpu_only,
            out,
        } => {
            let photometric = PhotometricInterpretation::from_header(&photometric);
            let samples_per_pixel = if photometric == PhotometricInterpretation::Rgb { 3 } else { 1 };
            let pixel_data = match &raw {
                Some(path) => std::fs::read(path)?,
                None => synthetic_ramp(width, height, bits, signed, samples_per_pixel),
            };

            let decoded = DecodedImage {
                width,
                height,
                bits_allocated: bits,
                bits_stored: bits,
                samples_per_pixel,
                signed,
                photometric,
                pixel_data,
                window_center: center,
                window_width,
            };

            let palette = palette.unwrap_or(config.default_palette);
            probe(&config, decoded, palette, cpu_only, out)?;
        }

        Command::Palettes => {
            for kind in PaletteType::ALL {
                println!("{:<10} {}", kind.key(), kind.name());
            }
        }
    }

    Ok(())
}

fn probe(
    config: &RendererConfig,
    decoded: DecodedImage,
    palette: PaletteType,
    cpu_only: bool,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    // A lone --center or --window-width falls back to the default for the other
    let (center, width) = (decoded.window_center, decoded.window_width);
    let (buffer, default_window) = DecodedImage {
        window_center: None,
        window_width: None,
        ..decoded
    }
    .into_parts()?;
    let window = WindowLevel::new(
        center.unwrap_or(default_window.center),
        width.unwrap_or(default_window.width),
    );

    info!(
        "Probing {}x{} {}-bit {:?} buffer, window C={} W={}, palette {}",
        buffer.width(),
        buffer.height(),
        buffer.bit_depth().bits(),
        buffer.photometric(),
        window.center,
        window.width,
        palette
    );

    let started = Instant::now();
    let cpu = RasterCompositor::new().render(&buffer, &window, palette)?;
    info!(
        "CPU path: {:?} raster in {:.1}ms",
        cpu.layout,
        started.elapsed().as_secs_f64() * 1000.0
    );

    if let Some(path) = &out {
        let image = cpu.to_dynamic_image().ok_or("raster does not match its geometry")?;
        image.save(path)?;
        info!("Saved CPU raster to {}", path.display());
    }

    if cpu_only || !config.prefer_gpu {
        info!("GPU path skipped");
        return Ok(());
    }

    let mut gpu = match pollster::block_on(GpuCompositor::new(config.power_preference.into())) {
        Ok(gpu) => gpu,
        Err(err) => {
            warn!("GPU path unavailable: {}", err);
            return Ok(());
        }
    };

    let size = buffer.dimensions();
    gpu.set_image(Arc::new(buffer));
    gpu.set_palette(palette);

    let started = Instant::now();
    let rendered = gpu.render_to_buffer(size, 0, &window)?;
    info!(
        "GPU path: {:?} raster in {:.1}ms",
        rendered.layout,
        started.elapsed().as_secs_f64() * 1000.0
    );

    match cpu.max_channel_diff(&rendered) {
        Some(diff) if diff <= MAX_PATH_DIFF => {
            info!("Paths agree (max per-channel difference {})", diff);
            Ok(())
        }
        Some(diff) => Err(format!("paths disagree: max per-channel difference {diff}").into()),
        None => Err("paths produced rasters of different shape".into()),
    }
}

/// Horizontal ramp across the full value range of the format
///
/// With three samples per pixel the ramp is 8-bit RGB: red rises, green
/// falls and blue follows the row.
fn synthetic_ramp(width: u32, height: u32, bits: u16, signed: bool, samples_per_pixel: u16) -> Vec<u8> {
    let span = width.saturating_sub(1).max(1) as i64;
    let rows = height.saturating_sub(1).max(1) as i64;
    let value_at = |x: u32, lo: i64, hi: i64| lo + (hi - lo) * x as i64 / span;

    let mut data = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if samples_per_pixel == 3 {
                let red = value_at(x, 0, 255) as u8;
                data.extend_from_slice(&[red, 255 - red, (255 * y as i64 / rows) as u8]);
                continue;
            }
            match (bits, signed) {
                (16, false) => {
                    data.extend_from_slice(&(value_at(x, 0, 65535) as u16).to_le_bytes())
                }
                (16, true) => {
                    data.extend_from_slice(&(value_at(x, -32768, 32767) as i16).to_le_bytes())
                }
                _ => data.push(value_at(x, 0, 255) as u8),
            }
        }
    }
    data
}
