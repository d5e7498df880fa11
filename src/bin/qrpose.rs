//! qrpose CLI: marker detection, marker generation and scene rendering.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use qr_pose::compositor::BlenderCompositor;
use qr_pose::encoder::{encode_text, render_marker, render_projected, rotated_layout};
use qr_pose::{
    BackendPreference, CornerOrder, EcLevel, MarkerLocator, Pipeline, PoseResult, Settings,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "qrpose", version, about = "QR marker pose estimation and placement")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect a marker and print its pose as JSON (null when absent)
    Detect {
        /// Input images; several run in parallel
        #[arg(long, required = true)]
        image: Vec<PathBuf>,
        #[command(flatten)]
        locator: LocatorArgs,
        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Write a QR marker image
    Generate {
        /// Payload text
        #[arg(long)]
        text: String,
        /// Output PNG
        #[arg(long)]
        out: PathBuf,
        /// Error correction level (L, M, Q, H)
        #[arg(long, default_value = "M")]
        ec: EcLevel,
        /// Pixels per module
        #[arg(long, default_value_t = 8)]
        module_px: u32,
        /// Quiet zone in modules
        #[arg(long, default_value_t = 4)]
        quiet_zone: u32,
        /// In-plane rotation in degrees, clockwise on screen
        #[arg(long, allow_negative_numbers = true)]
        rotate: Option<f64>,
    },
    /// Detect the marker in an image and render an object onto it
    Render {
        /// Background photograph containing the marker
        #[arg(long)]
        image: PathBuf,
        /// Rendered output image
        #[arg(long)]
        out: PathBuf,
        /// Model file to place; the script's default object otherwise
        #[arg(long)]
        model: Option<PathBuf>,
        #[command(flatten)]
        render: RenderArgs,
        #[command(flatten)]
        locator: LocatorArgs,
        /// Side of the background plane in scene units
        #[arg(long)]
        plane_size: Option<f64>,
        /// Offset of the object along the plane normal
        #[arg(long)]
        lift: Option<f64>,
    },
    /// Generate a "demo" marker in a scratch directory, detect it, render it
    Demo {
        /// Rendered output image
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct LocatorArgs {
    /// Settings JSON file; QRPOSE_* environment variables otherwise
    #[arg(long)]
    config: Option<PathBuf>,
    /// Finder backend: auto, scanline or contour
    #[arg(long)]
    backend: Option<BackendPreference>,
    /// Corner order: detected or canonical
    #[arg(long)]
    corner_order: Option<CornerOrder>,
    /// Downscale inputs whose longer side exceeds this (0 disables)
    #[arg(long)]
    max_dim: Option<u32>,
}

#[derive(Debug, Clone, Args)]
struct RenderArgs {
    /// Blender placement script
    #[arg(long)]
    script: PathBuf,
    /// Blender executable
    #[arg(long, default_value = BlenderCompositor::DEFAULT_EXECUTABLE)]
    blender: PathBuf,
    /// Render time limit in seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

impl LocatorArgs {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings {
                locator: qr_pose::LocatorConfig::from_env(),
                ..Settings::default()
            },
        };
        if let Some(backend) = self.backend {
            settings.locator.backend = backend;
        }
        if let Some(order) = self.corner_order {
            settings.locator.corner_order = order;
        }
        if let Some(max_dim) = self.max_dim {
            settings.locator.max_dim = (max_dim > 0).then_some(max_dim);
        }
        Ok(settings)
    }
}

impl RenderArgs {
    fn compositor(&self) -> BlenderCompositor {
        BlenderCompositor::new(&self.script)
            .with_executable(&self.blender)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Detect {
            image,
            locator,
            pretty,
        } => detect_cmd(&image, &locator, pretty),
        Command::Generate {
            text,
            out,
            ec,
            module_px,
            quiet_zone,
            rotate,
        } => generate_cmd(&text, &out, ec, module_px, quiet_zone, rotate),
        Command::Render {
            image,
            out,
            model,
            render,
            locator,
            plane_size,
            lift,
        } => {
            let mut settings = locator.settings()?;
            if let Some(size) = plane_size {
                settings.placement.plane_size = size;
            }
            if let Some(lift) = lift {
                settings.placement.lift = lift;
            }
            render_cmd(&settings, &render, &image, &out, model.as_deref())
        }
        Command::Demo { out, render } => demo_cmd(&out, &render),
    }
}

fn detect_cmd(images: &[PathBuf], args: &LocatorArgs, pretty: bool) -> Result<()> {
    let settings = args.settings()?;
    let locator = MarkerLocator::new(settings.locator);
    info!(backend = %locator.backend_kind(), images = images.len(), "detecting");

    for detection in locator.locate_many(images) {
        let pose = detection.as_ref().map(PoseResult::from_detection);
        let json = if pretty {
            serde_json::to_string_pretty(&pose)?
        } else {
            serde_json::to_string(&pose)?
        };
        println!("{json}");
    }
    Ok(())
}

fn generate_cmd(
    text: &str,
    out: &Path,
    ec: EcLevel,
    module_px: u32,
    quiet_zone: u32,
    rotate: Option<f64>,
) -> Result<()> {
    if module_px == 0 {
        bail!("--module-px must be at least 1");
    }
    let symbol = encode_text(text, ec)?;
    let image = match rotate {
        Some(degrees) => {
            let (w, h, transform) =
                rotated_layout(&symbol, module_px as f32, quiet_zone as usize, degrees);
            render_projected(&symbol, w, h, &transform)
        }
        None => render_marker(&symbol, module_px, quiet_zone),
    };
    image
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(
        version = symbol.version,
        ec = %symbol.ec_level,
        out = %out.display(),
        "marker written"
    );
    Ok(())
}

fn render_cmd(
    settings: &Settings,
    render: &RenderArgs,
    image: &Path,
    out: &Path,
    model: Option<&Path>,
) -> Result<()> {
    let pipeline = Pipeline::from_settings(settings, render.compositor());
    let outcome = pipeline
        .run(image, out, model)
        .with_context(|| format!("rendering {} failed", image.display()))?;
    println!("{}", serde_json::to_string(&outcome.pose)?);
    Ok(())
}

fn demo_cmd(out: &Path, render: &RenderArgs) -> Result<()> {
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let marker = scratch.path().join("demo.png");
    generate_cmd("demo", &marker, EcLevel::M, 8, 4, None)?;

    let settings = Settings {
        locator: qr_pose::LocatorConfig::from_env(),
        ..Settings::default()
    };
    render_cmd(&settings, render, &marker, out, None)
}
