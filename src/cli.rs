// ============================================================================
// huewash CLI: headless color wash via command-line arguments
// ============================================================================
//
// Usage examples:
//   huewash --input photo.png --color "#4169E1" --blend multiply --output out.png
//   huewash -i photo.jpg --hsv 200,25,25 --opacity 0.8 -o out.jpg --quality 85
//   huewash -i "shots/*.png" --blend soft-light --output-dir washed/ --format webp
//
// No GUI is opened in CLI mode. Inputs are processed one after another on the
// current thread; the fill pass itself still runs row-parallel.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{BlendMode, Surface, composite};
use crate::components::colors::{INITIAL_HEX, parse_hex, parse_hsv};
use crate::io::{SaveFormat, encode_and_write, load_image_sync};
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// huewash headless color washer.
///
/// Tint images with a single color under one of six blend modes, without the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "huewash",
    about = "huewash headless color washer",
    long_about = "Wash image files with a color under a blend mode without opening\n\
                  the GUI. Reads anything the image crate decodes; writes PNG,\n\
                  JPEG, WEBP, or BMP.\n\n\
                  Example:\n  \
                  huewash --input photo.png --color \"#4169E1\" --blend multiply --output out.png\n  \
                  huewash -i *.jpg --hsv 200,25,25 --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Wash color as #rrggbb.
    #[arg(short, long, value_name = "HEX", conflicts_with = "hsv")]
    pub color: Option<String>,

    /// Wash color as H,S,V (hue 0–360, saturation and value 0–100).
    #[arg(long, value_name = "H,S,V")]
    pub hsv: Option<String>,

    /// Wash opacity (0–1). Defaults to the saved setting.
    #[arg(long, value_name = "0-1")]
    pub opacity: Option<f32>,

    /// Blend mode: color, multiply, overlay, screen, soft-light, hard-light.
    /// Defaults to the saved setting.
    #[arg(short, long, value_name = "MODE")]
    pub blend: Option<String>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Print per-file timing and debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// What every input gets washed with.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Wash {
    color: [u8; 3],
    opacity: f32,
    mode: BlendMode,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs, settings: &AppSettings) -> ExitCode {
    let wash = match resolve_wash(&args, settings) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "cli wash: color {:?}, opacity {}, mode {}",
        wash.color,
        wash.opacity,
        wash.mode.name()
    );

    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    let mut surface = Surface::new(0, 0);

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(&mut surface, input_path, &output_path, wash, save_format, args.quality) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log::error!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    surface: &mut Surface,
    input: &Path,
    output: &Path,
    wash: Wash,
    format: SaveFormat,
    quality: u8,
) -> Result<(), String> {
    let image = load_image_sync(input).map_err(|e| format!("load failed: {}", e))?;
    composite(surface, &image, wash.color, wash.opacity, wash.mode);
    encode_and_write(surface.pixels(), output, format, quality)
        .map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Combine the color/opacity/blend flags with the saved defaults.
fn resolve_wash(args: &CliArgs, settings: &AppSettings) -> Result<Wash, String> {
    let color = match (&args.color, &args.hsv) {
        (Some(hex), _) => parse_hex(hex).map_err(|e| e.to_string())?,
        (None, Some(hsv)) => parse_hsv(hsv).map_err(|e| e.to_string())?.to_rgb(),
        (None, None) => parse_hex(INITIAL_HEX).map_err(|e| e.to_string())?,
    };

    let opacity = args.opacity.unwrap_or(settings.default_opacity);
    if !(0.0..=1.0).contains(&opacity) {
        return Err(format!("opacity must be between 0 and 1, got {}", opacity));
    }

    let mode = match &args.blend {
        Some(name) => BlendMode::from_name(name).ok_or_else(|| {
            let known: Vec<&str> = BlendMode::all().iter().map(|m| m.name()).collect();
            format!("unknown blend mode '{}' (expected one of: {})", name, known.join(", "))
        })?,
        None => settings.default_blend_mode,
    };

    Ok(Wash { color, opacity, mode })
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg {
        return SaveFormat::from_extension(f).unwrap_or_default();
    }
    output
        .and_then(|out| out.extension())
        .and_then(|e| e.to_str())
        .and_then(SaveFormat::from_extension)
        .unwrap_or_default()
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
