//! img2pdf-rs — lay out images one per page and save them as a PDF.
//!
//! `img2pdf-rs photo1.jpg photo2.png scans/ -m low -b '#000000' -o album.pdf`

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use img2pdf_core::options::{Color, ExportOptions, MarginPreset};
use img2pdf_core::ConvertError;
use img2pdf_output_pdf::pdf_engine_with_progress;
use img2pdf_utils::load::load_image_set;

#[derive(Parser, Debug)]
#[command(
    name = "img2pdf-rs",
    version,
    about = "Convert images to a multi-page PDF, one image per page"
)]
struct Cli {
    /// Image files or directories, in page order
    images: Vec<PathBuf>,

    /// Output file (defaults to the configured file name in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page margin: none, low, medium, big
    #[arg(short, long)]
    margin: Option<MarginPreset>,

    /// Background color, e.g. '#ffffff'
    #[arg(short, long)]
    background: Option<Color>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump effective merged config as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

/// Global config: ~/.config/img2pdf-rs/config.toml
fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("img2pdf-rs").join("config.toml"))
}

/// Project-local config: ./.img2pdf-rs.toml
fn local_config_path() -> PathBuf {
    PathBuf::from(".img2pdf-rs.toml")
}

/// Load config from the global and project-local TOML files.
/// A present project-local file fully overrides the global one.
/// Missing files are silently ignored; malformed ones are skipped and
/// reported back so they can be logged once logging is configured.
fn load_config(global: Option<&Path>, local: &Path) -> (ExportOptions, Vec<String>) {
    let mut opts = ExportOptions::default();
    let mut warnings = Vec::new();

    for path in global.into_iter().chain(std::iter::once(local)) {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        match toml::from_str::<ExportOptions>(&contents) {
            Ok(parsed) => opts = parsed,
            Err(e) => warnings.push(format!("Failed to parse {}: {}", path.display(), e)),
        }
    }

    (opts, warnings)
}

/// Apply CLI flags on top of config-loaded options.
/// Only overrides when the CLI flag was explicitly provided.
fn apply_cli_overrides(opts: &mut ExportOptions, cli: &Cli) {
    if cli.verbose > 0 {
        opts.verbose = cli.verbose;
    }

    if let Some(margin) = cli.margin {
        opts.margin = margin;
    }

    if let Some(background) = cli.background {
        opts.background = background;
    }

    if let Some(name) = cli
        .output
        .as_deref()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
    {
        opts.file_name = name.to_string();
    }
}

/// Log level used when `RUST_LOG` is not set.
fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = env_logger::Env::default().default_filter_or(default_log_filter(verbose));
    env_logger::Builder::from_env(filter).init();
}

fn main() {
    let cli = Cli::parse();

    let (mut opts, warnings) = load_config(global_config_path().as_deref(), &local_config_path());
    apply_cli_overrides(&mut opts, &cli);

    // Verbosity may come from config, so logging starts after the merge.
    init_logging(opts.verbose);
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    if cli.dump_config {
        match toml::to_string_pretty(&opts) {
            Ok(s) => {
                println!("{}", s);
                process::exit(0);
            }
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                process::exit(1);
            }
        }
    }

    if let Err(e) = run_export(&cli, &opts) {
        match e.downcast_ref::<ConvertError>() {
            Some(ConvertError::EmptyInput) => eprintln!("{}", ConvertError::EmptyInput),
            _ => eprintln!("Error: {:#}", e),
        }
        process::exit(1);
    }
}

fn run_export(cli: &Cli, opts: &ExportOptions) -> Result<PathBuf> {
    let images = load_image_set(&cli.images).context("Failed to read input images")?;
    log::info!(
        "Loaded {} images ({} bytes)",
        images.len(),
        images.total_bytes()
    );

    let engine = pdf_engine_with_progress(Box::new(|frac, msg| {
        if frac < 1.0 {
            log::info!("[{:3.0}%] {}", frac * 100.0, msg);
        } else {
            log::info!("Done!");
        }
    }));

    let doc = engine.export(&images, opts)?;

    let path = match &cli.output {
        Some(path) => {
            doc.write_to(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path.clone()
        }
        None => {
            let cwd = std::env::current_dir().context("No current directory")?;
            doc.save_to(&cwd)
                .with_context(|| format!("Failed to write {}", doc.file_name))?
        }
    };

    println!("{}", path.display());
    Ok(path)
}
