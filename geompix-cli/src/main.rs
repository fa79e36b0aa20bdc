//! geompix command-line interface.
//!
//! Inspects geometry files, exports pixel maps and assembles raw frames.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand};
use geompix_algorithms::{assemble, build_pixel_map};
use geompix_core::{
    AssemblyConfig, CanvasLayout, CollisionPolicy, Geometry, PhotonEnergy, PixelMap,
    PixelMapConfig,
};
use geompix_io::{
    load_geometry, ElementType, FrameWriter, OutputFormat, RawElement, RawFrameReader,
};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    GeompixIo(#[from] geompix_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] geompix_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Detector geometry tool: pixel maps and frame assembly.
#[derive(Parser)]
#[command(name = "geompix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that build a pixel map.
#[derive(clap::Args, Debug, Clone, Default)]
struct MapOptions {
    /// Visualization pixel size in metres (default: smallest panel pitch)
    #[arg(long)]
    pixel_size: Option<f64>,

    /// Beam center override in metres
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    beam_center: Option<Vec<f64>>,

    /// Center the canvas on the beam center
    #[arg(long)]
    centered: bool,

    /// Keep pixels inside bad regions
    #[arg(long)]
    keep_bad_regions: bool,
}

impl MapOptions {
    fn to_config(&self) -> Result<PixelMapConfig> {
        let mut config = PixelMapConfig::new().with_bad_regions(!self.keep_bad_regions);
        if let Some(size) = self.pixel_size {
            config = config.with_pixel_size(size);
        }
        if let Some(center) = &self.beam_center {
            let [x, y] = center.as_slice() else {
                return Err(CliError::InvalidArgument(
                    "--beam-center takes exactly two values".to_string(),
                ));
            };
            config = config.with_beam_center([*x, *y]);
        }
        if self.centered {
            config = config.with_layout(CanvasLayout::Centered);
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a geometry file
    Info {
        /// Input geometry file
        geometry: PathBuf,

        #[command(flatten)]
        map: MapOptions,
    },

    /// Export the pixel map of a geometry as JSON
    PixelMap {
        /// Input geometry file
        geometry: PathBuf,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        map: MapOptions,
    },

    /// Assemble one raw frame into a visualization frame
    Assemble {
        /// Input geometry file
        geometry: PathBuf,

        /// Raw frame file (headerless little-endian elements)
        raw: PathBuf,

        /// Output file (.csv for text, anything else for binary)
        #[arg(short, long)]
        output: PathBuf,

        /// Element type of the raw file
        #[arg(long, default_value = "u16")]
        dtype: ElementType,

        /// Frame index within the raw file
        #[arg(long, default_value = "0")]
        frame: usize,

        /// Value for canvas cells no pixel lands in
        #[arg(long, allow_negative_numbers = true)]
        fill: Option<String>,

        /// Keep the first pixel written to a cell instead of the last
        #[arg(long)]
        first_write_wins: bool,

        /// Also write the mask to this file
        #[arg(long)]
        mask: Option<PathBuf>,

        #[command(flatten)]
        map: MapOptions,
    },
}

/// Parameters of a single assembly run.
struct AssembleJob<'a> {
    raw: &'a Path,
    frame: usize,
    fill: Option<&'a str>,
    collision: CollisionPolicy,
    output: &'a Path,
    mask: Option<&'a Path>,
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Info { geometry: path, map } => {
            let geometry = load_geometry(&path)?;
            print_info(&path, &geometry);
            let pixel_map = build_pixel_map(&geometry, &map.to_config()?)?;
            print_map_summary(&pixel_map);
        }

        Commands::PixelMap {
            geometry: path,
            output,
            map,
        } => {
            let geometry = load_geometry(&path)?;
            let pixel_map = build_pixel_map(&geometry, &map.to_config()?)?;
            let mut writer = BufWriter::new(File::create(&output)?);
            serde_json::to_writer(&mut writer, &pixel_map)?;
            writer.flush()?;
            log::info!("wrote pixel map to {}", output.display());
            print_map_summary(&pixel_map);
        }

        Commands::Assemble {
            geometry: path,
            raw,
            output,
            dtype,
            frame,
            fill,
            first_write_wins,
            mask,
            map,
        } => {
            let geometry = load_geometry(&path)?;
            let pixel_map = build_pixel_map(&geometry, &map.to_config()?)?;
            let job = AssembleJob {
                raw: &raw,
                frame,
                fill: fill.as_deref(),
                collision: if first_write_wins {
                    CollisionPolicy::FirstWriteWins
                } else {
                    CollisionPolicy::LastWriteWins
                },
                output: &output,
                mask: mask.as_deref(),
            };
            let filled = match dtype {
                ElementType::U8 => assemble_frame::<u8>(&pixel_map, &job)?,
                ElementType::U16 => assemble_frame::<u16>(&pixel_map, &job)?,
                ElementType::U32 => assemble_frame::<u32>(&pixel_map, &job)?,
                ElementType::I16 => assemble_frame::<i16>(&pixel_map, &job)?,
                ElementType::I32 => assemble_frame::<i32>(&pixel_map, &job)?,
                ElementType::F32 => assemble_frame::<f32>(&pixel_map, &job)?,
                ElementType::F64 => assemble_frame::<f64>(&pixel_map, &job)?,
            };
            let (height, width) = pixel_map.canvas().shape();
            println!(
                "Assembled frame {} into {}x{} ({} cells filled): {}",
                frame,
                height,
                width,
                filled,
                output.display()
            );
        }
    }
    Ok(())
}

fn assemble_frame<T>(pixel_map: &PixelMap, job: &AssembleJob<'_>) -> Result<usize>
where
    T: RawElement + Display + Default + FromStr,
{
    let reader = RawFrameReader::open(job.raw, T::TYPE, pixel_map.shape())?;
    let raw = reader.frame::<T>(job.frame)?;

    let fill = match job.fill {
        Some(text) => text.parse::<T>().map_err(|_| {
            CliError::InvalidArgument(format!("fill value {text:?} is not a valid {}", T::TYPE))
        })?,
        None => T::default(),
    };
    let config = AssemblyConfig::with_fill(fill).with_collision(job.collision);
    let assembled = assemble(pixel_map, raw.view(), &config)?;

    let mut writer = FrameWriter::create(job.output, OutputFormat::from_path(job.output))?;
    writer.write_frame(assembled.frame.view())?;
    if let Some(mask_path) = job.mask {
        let mut writer = FrameWriter::create(mask_path, OutputFormat::from_path(mask_path))?;
        writer.write_mask(assembled.mask.view())?;
    }
    Ok(assembled.filled_count())
}

fn print_info(path: &Path, geometry: &Geometry) {
    let (rows, cols) = geometry.raw_shape();
    println!("File: {}", path.display());
    println!("Panels: {}", geometry.panels().len());
    println!("Raw shape: {} x {} ({} pixels covered)", rows, cols, geometry.pixel_count());
    println!();
    println!(
        "{:<12} {:>11} {:>11} {:>12} {:>20} {:>20} {:>20}",
        "Panel", "fs", "ss", "pitch (um)", "corner (px)", "fs vector", "ss vector"
    );
    println!("{:-<112}", "");
    for panel in geometry.panels() {
        println!(
            "{:<12} {:>11} {:>11} {:>12.3} {:>20} {:>20} {:>20}",
            panel.name,
            format!("{}..{}", panel.min_fs, panel.max_fs),
            format!("{}..{}", panel.min_ss, panel.max_ss),
            panel.pixel_pitch() * 1e6,
            format!("({:.2}, {:.2})", panel.corner_x, panel.corner_y),
            format!("({:.4}, {:.4})", panel.fs.x, panel.fs.y),
            format!("({:.4}, {:.4})", panel.ss.x, panel.ss.y),
        );
    }
    println!();

    let beam = geometry.beam();
    match &beam.photon_energy {
        Some(PhotonEnergy::FromData(location)) => println!("Photon energy: from {location}"),
        _ => match beam.photon_energy_ev() {
            Some(energy) => println!("Photon energy: {energy:.1} eV"),
            None => println!("Photon energy: not set"),
        },
    }
    if let Some(wavelength) = beam.wavelength_m() {
        println!("Wavelength: {:.4} A", wavelength * 1e10);
    }
    if let Some([x, y]) = geometry.beam_center() {
        println!("Beam center: ({x}, {y}) m");
    }
    let extremes = geometry.extreme_pixels();
    println!(
        "Corner distance: {:.4} m ({}) to {:.4} m ({})",
        extremes.nearest.distance,
        extremes.nearest.panel,
        extremes.furthest.distance,
        extremes.furthest.panel
    );
    if let Some(location) = geometry.peak_info_location() {
        println!("Peak info: {location}");
    }
    println!("Bad regions: {}", geometry.bad_regions().len());
    println!(
        "Rigid groups: {} ({} collections)",
        geometry.rigid_groups().len(),
        geometry.rigid_group_collections().len()
    );
}

fn print_map_summary(map: &PixelMap) {
    let canvas = map.canvas();
    println!(
        "Valid pixels: {} of {}",
        map.valid_count(),
        map.shape().0 * map.shape().1
    );
    println!(
        "Canvas: {} x {} at {:.3} um ({:?})",
        canvas.height(),
        canvas.width(),
        canvas.pixel_size() * 1e6,
        canvas.layout()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    const GEOMETRY: &str = "\
res = 1
p/min_fs = 0
p/max_fs = 1
p/min_ss = 0
p/max_ss = 1
p/corner_x = 0
p/corner_y = 0
p/fs = x
p/ss = y
";

    fn write_geometry(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("detector.geom");
        std::fs::write(&path, GEOMETRY).unwrap();
        path
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assemble_args() {
        let cli = Cli::try_parse_from([
            "geompix",
            "assemble",
            "d.geom",
            "raw.bin",
            "-o",
            "out.csv",
            "--dtype",
            "f32",
            "--beam-center",
            "-0.5",
            "0.25",
            "--fill",
            "-1",
            "--first-write-wins",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Assemble {
            dtype,
            fill,
            first_write_wins,
            map,
            ..
        } = cli.command
        else {
            panic!("expected assemble");
        };
        assert_eq!(dtype, ElementType::F32);
        assert_eq!(fill.as_deref(), Some("-1"));
        assert!(first_write_wins);
        let config = map.to_config().unwrap();
        assert_eq!(config.beam_center, Some([-0.5, 0.25]));
    }

    #[test]
    fn test_assemble_command_writes_frame_and_mask() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = write_geometry(&dir);
        let raw = dir.path().join("raw.bin");
        let mut file = File::create(&raw).unwrap();
        for value in [10u16, 20, 30, 40] {
            file.write_all(&value.to_le_bytes()).unwrap();
        }
        drop(file);
        let output = dir.path().join("frame.csv");
        let mask = dir.path().join("mask.csv");

        run(Commands::Assemble {
            geometry,
            raw,
            output: output.clone(),
            dtype: ElementType::U16,
            frame: 0,
            fill: None,
            first_write_wins: false,
            mask: Some(mask.clone()),
            map: MapOptions::default(),
        })
        .unwrap();

        assert_eq!(std::fs::read_to_string(output).unwrap(), "10,20\n30,40\n");
        assert_eq!(std::fs::read_to_string(mask).unwrap(), "1,1\n1,1\n");
    }

    #[test]
    fn test_invalid_fill_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = write_geometry(&dir);
        let raw = dir.path().join("raw.bin");
        std::fs::write(&raw, [0u8; 4]).unwrap();

        let result = run(Commands::Assemble {
            geometry,
            raw,
            output: dir.path().join("frame.bin"),
            dtype: ElementType::U8,
            frame: 0,
            fill: Some("-3".to_string()),
            first_write_wins: false,
            mask: None,
            map: MapOptions::default(),
        });
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_pixel_map_command_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = write_geometry(&dir);
        let output = dir.path().join("map.json");

        run(Commands::PixelMap {
            geometry,
            output: output.clone(),
            map: MapOptions::default(),
        })
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert!(json.get("x").is_some());
        assert!(json.get("canvas").is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pixel_map_command_reports_full_device() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = write_geometry(&dir);

        let result = run(Commands::PixelMap {
            geometry,
            output: PathBuf::from("/dev/full"),
            map: MapOptions::default(),
        });
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
