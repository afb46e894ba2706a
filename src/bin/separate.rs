use anyhow::{Context, Result};
use clap::Parser;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Delay, Frame, ImageFormat, RgbaImage};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_to_color_layers_wasm::{
    Algorithm, ColorSpace, PaletteEntry, Preprocessing, Preprocessor, ProcessedImage, ProcessingConfig,
    hex_to_rgb, layer_animations, process_frames, process_rgba_image,
};

/// Split images into flat-color PNG layers, one per palette color.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths (animated GIFs are split frame by frame)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Number of palette colors, locked ones included
    #[arg(short = 'k', long)]
    colors: Option<usize>,

    /// Clustering algorithm
    #[arg(short, long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Color space k-means runs in
    #[arg(short = 's', long, value_enum)]
    color_space: Option<ColorSpace>,

    /// Disable luma weighting of RGB channels
    #[arg(long)]
    no_perceptual: bool,

    /// Use CIEDE2000 distance (Lab only)
    #[arg(long)]
    ciede2000: bool,

    /// Merge regions of at most this many pixels into a neighbor (0 = off)
    #[arg(long)]
    stray: Option<usize>,

    /// Seed for k-means++ initialisation
    #[arg(long)]
    seed: Option<i64>,

    /// Comma-separated hex colors to keep in the palette verbatim
    #[arg(long, value_delimiter = ',')]
    lock: Vec<String>,

    /// Denoising filter applied before clustering
    #[arg(long, value_enum, default_value_t = Preprocessing::None)]
    preprocess: Preprocessing,

    /// Filter strength: blur sigma, median radius or bilateral spatial sigma
    #[arg(long, default_value_t = 1.0)]
    strength: f64,

    /// JSON file with a processing configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'd', long, default_value = "layers")]
    out_dir: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    source: String,
    config: &'a ProcessingConfig,
    preprocessing: Preprocessing,
    strength: f64,
    palette: Vec<String>,
    frames: Vec<Vec<PaletteEntry>>,
}

struct Decoded {
    frames: Vec<RgbaImage>,
    delays: Vec<Delay>,
}

fn build_config(args: &Args) -> Result<ProcessingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ProcessingConfig::default(),
    };

    if let Some(k) = args.colors {
        config.k = k;
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(space) = args.color_space {
        config.color_space = space;
    }
    if args.no_perceptual {
        config.perceptual_weighting = false;
    }
    if args.ciede2000 {
        config.use_ciede2000 = true;
    }
    if let Some(stray) = args.stray {
        config.stray_pixel_threshold = stray;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if !args.lock.is_empty() {
        config.locked_centroids = args
            .lock
            .iter()
            .map(|s| hex_to_rgb(s))
            .collect::<Result<_, _>>()
            .context("invalid --lock color")?;
    }

    anyhow::ensure!(config.k >= 1, "at least one color is required");
    anyhow::ensure!(
        config.locked_centroids.len() <= config.k,
        "{} locked colors do not fit in a palette of {}",
        config.locked_centroids.len(),
        config.k
    );
    Ok(config)
}

fn decode(bytes: &[u8]) -> Result<Decoded> {
    if image::guess_format(bytes).ok() == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes))?;
        let frames = decoder.into_frames().collect_frames()?;
        if !frames.is_empty() {
            let delays = frames.iter().map(Frame::delay).collect();
            let frames = frames.into_iter().map(Frame::into_buffer).collect();
            return Ok(Decoded { frames, delays });
        }
    }
    let img = image::load_from_memory(bytes)?;
    Ok(Decoded {
        frames: vec![img.to_rgba8()],
        delays: Vec::new(),
    })
}

fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Saved → {}", path.display());
    Ok(())
}

fn write_layers(result: &ProcessedImage, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (stem, layer) in result.layer_stems().iter().zip(&result.layers) {
        write_png(layer, &dir.join(format!("{stem}.png")))?;
    }
    write_png(&result.composite(), &dir.join("composite.png"))
}

fn write_gif(images: impl IntoIterator<Item = RgbaImage>, delays: &[Delay], path: &Path) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;
    let frames = images
        .into_iter()
        .zip(delays)
        .map(|(image, &delay)| Frame::from_parts(image, 0, 0, delay));
    encoder
        .encode_frames(frames)
        .with_context(|| format!("encoding {}", path.display()))?;
    println!("Saved → {}", path.display());
    Ok(())
}

/// One looping GIF per palette color plus the flattened animation.
fn write_animations(results: &[ProcessedImage], delays: &[Delay], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (stem, frames) in layer_animations(results) {
        write_gif(frames.into_iter().cloned(), delays, &dir.join(format!("{stem}.gif")))?;
    }
    write_gif(
        results.iter().map(ProcessedImage::composite),
        delays,
        &dir.join("composite.gif"),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_to_color_layers_wasm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let filter = args.preprocess.preprocessor(args.strength);

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let mut decoded = decode(&bytes).with_context(|| format!("decoding {}", input.display()))?;
        if let Some(filter) = &filter {
            for frame in &mut decoded.frames {
                *frame = filter.apply(frame);
            }
        }

        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let dir = args.out_dir.join(&*stem);
        tracing::info!(
            input = %input.display(),
            frames = decoded.frames.len(),
            k = config.k,
            algorithm = %config.algorithm,
            "separating"
        );

        let results = if decoded.frames.len() > 1 {
            let results = process_frames(&decoded.frames, &config).context("layer separation failed")?;
            for (i, result) in results.iter().enumerate() {
                write_layers(result, &dir.join(format!("frame_{i}")))?;
            }
            write_animations(&results, &decoded.delays, &dir)?;
            results
        } else {
            let mut results = Vec::with_capacity(1);
            for frame in &decoded.frames {
                let result = process_rgba_image(frame, &config).context("layer separation failed")?;
                write_layers(&result, &dir)?;
                results.push(result);
            }
            results
        };

        let report = Report {
            source: input.display().to_string(),
            config: &config,
            preprocessing: args.preprocess,
            strength: args.strength,
            palette: results.first().map(ProcessedImage::palette_hex).unwrap_or_default(),
            frames: results.iter().map(ProcessedImage::palette_entries).collect(),
        };
        let report_path = dir.join("palette.json");
        fs::write(&report_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing {}", report_path.display()))?;
        println!("Saved → {}", report_path.display());
    }

    Ok(())
}
