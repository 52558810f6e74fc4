//! qrslab CLI - two-material QR code plates for 3D printing
//!
//! `qrslab generate <URL>` writes one plate; `qrslab batch <FILE>` writes a
//! plate for every URL in a file, in parallel.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qrslab::{generate, Config, ExportFormat, ExportReport, ExportTarget};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod logger;

/// Directory for single plates without an explicit output path.
const DEFAULT_OUTPUT_DIR: &str = "output";
/// Longest URL-derived part of a default file name.
const MAX_NAME_CHARS: usize = 20;

#[derive(Parser)]
#[command(name = "qrslab")]
#[command(about = "Generate two-material 3D printable QR code plates", long_about = None)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a plate for one URL
    Generate {
        /// URL to encode
        url: String,
        /// Output file (.3mf for separate colored objects, .stl for one mesh with a swap height)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Generate plates for every URL in a file (one per line, `#` starts a comment)
    Batch {
        /// File with one URL per line
        urls: PathBuf,
        /// Output directory
        #[arg(short = 'd', long, default_value = "plates")]
        out_dir: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::ThreeMf)]
        format: Format,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(clap::Args)]
struct SettingsArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Plate side (mm)
    #[arg(long)]
    qr_size: Option<f64>,
    /// Plate thickness (mm)
    #[arg(long)]
    base_height: Option<f64>,
    /// Module height above the plate (mm)
    #[arg(long)]
    accent_height: Option<f64>,
    /// Label height or inlay depth (mm)
    #[arg(long)]
    text_height: Option<f64>,
    /// Plate corner radius (mm), 0 for square corners
    #[arg(long)]
    corner_radius: Option<f64>,
    /// Label text
    #[arg(long)]
    label: Option<String>,
}

impl SettingsArgs {
    /// Configuration file (or defaults) with command-line overrides applied.
    fn resolve(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(v) = self.qr_size {
            config.qr_size_mm = v;
        }
        if let Some(v) = self.base_height {
            config.base_height_mm = v;
        }
        if let Some(v) = self.accent_height {
            config.accent_height_mm = v;
        }
        if let Some(v) = self.text_height {
            config.text_height_mm = v;
        }
        if let Some(v) = self.corner_radius {
            config.corner_radius_mm = v;
        }
        if let Some(text) = &self.label {
            config.label.text = text.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// 3MF with one object per filament
    #[value(name = "3mf")]
    ThreeMf,
    /// Single STL plus swap-height sidecar
    Stl,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::ThreeMf => ExportFormat::ThreeMf,
            Format::Stl => ExportFormat::Stl,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    match cli.command {
        Commands::Generate {
            url,
            output,
            settings,
        } => {
            let config = settings.resolve()?;
            generate_one(&url, output, &config)?;
        }
        Commands::Batch {
            urls,
            out_dir,
            format,
            settings,
        } => {
            let config = settings.resolve()?;
            run_batch(&urls, &out_dir, format.into(), &config)?;
        }
    }

    Ok(())
}

fn generate_one(url: &str, output: Option<PathBuf>, config: &Config) -> Result<()> {
    let path = match output {
        Some(path) => normalize_output(path),
        None => default_output(url),
    };
    // The output directory is created by the export, once there is a plate.
    let target = ExportTarget::from_path(&path)?;
    let report = generate(url, config, &target)?;
    print_report(&report);
    match target.format {
        ExportFormat::ThreeMf => {
            println!("  Materials are pre-assigned to extruders 1 and 2.");
        }
        ExportFormat::Stl => {
            println!(
                "  Change filament at Z={:.2} mm ({} below, {} above).",
                config.base_height_mm, config.materials.base.name, config.materials.accent.name
            );
        }
    }
    Ok(())
}

fn run_batch(urls_file: &Path, out_dir: &Path, format: ExportFormat, config: &Config) -> Result<()> {
    let text = std::fs::read_to_string(urls_file)
        .with_context(|| format!("reading {}", urls_file.display()))?;
    let urls = read_urls(&text);
    if urls.is_empty() {
        bail!("no URLs in {}", urls_file.display());
    }

    let results: Vec<_> = urls
        .par_iter()
        .enumerate()
        .map(|(i, url)| {
            let path = out_dir.join(batch_file_name(i + 1, format));
            generate(url, config, &ExportTarget { format, path })
        })
        .collect();

    let total = results.len();
    let mut failed = 0;
    for (i, result) in results.into_iter().enumerate() {
        println!("[{}/{}] {}", i + 1, total, urls[i]);
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                failed += 1;
                tracing::error!(error = %e, "plate failed");
                println!("  failed: {}", e.root());
            }
        }
    }

    println!("{} of {} plates written to {}", total - failed, total, out_dir.display());
    if failed > 0 {
        bail!("{failed} of {total} URLs failed");
    }
    Ok(())
}

fn print_report(report: &ExportReport) {
    for file in &report.files {
        println!("  wrote {}", file.display());
    }
    println!("  {} triangles", report.triangles);
}

/// `output/treasure_qr_<last URL segment>.3mf`.
fn default_output(url: &str) -> PathBuf {
    let segment = url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let name: String = segment
        .chars()
        .take(MAX_NAME_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    Path::new(DEFAULT_OUTPUT_DIR).join(format!("treasure_qr_{name}.3mf"))
}

/// Append `.3mf` unless the path already names a supported format.
fn normalize_output(path: PathBuf) -> PathBuf {
    if ExportFormat::from_path(&path).is_some() {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(".3mf");
    PathBuf::from(name)
}

/// Non-empty, non-comment lines, trimmed.
fn read_urls(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn batch_file_name(index: usize, format: ExportFormat) -> String {
    format!("treasure_{index:02}.{}", format.extension())
}
