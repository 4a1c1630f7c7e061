//! svgmesh CLI - extrude SVG artwork into GLB meshes

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use svgmesh_core::export::{GlbOptions, write_glb_with_options};
use svgmesh_core::{Conversion, ConvertConfig, svg_to_mesh};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "svgmesh")]
#[command(about = "Extrude SVG artwork into textured 3D meshes", long_about = None)]
#[command(version)]
struct Cli {
    /// Log every pipeline stage
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an SVG file to a GLB file
    Convert {
        /// Input SVG file
        input: PathBuf,

        /// Output file (defaults to the input name with a .glb extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Edge length of textures baked for masked shapes
        #[arg(long, default_value = "512")]
        baked_texture_size: u32,

        /// Also write the document after <use> expansion
        #[arg(long)]
        dump_svg: Option<PathBuf>,

        #[command(flatten)]
        options: ConfigArgs,
    },

    /// Run the conversion and print a summary without writing anything
    Inspect {
        /// Input SVG file
        input: PathBuf,

        /// Print the summary and warnings as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: ConfigArgs,
    },
}

/// Overrides applied on top of the defaults or `--config`
#[derive(Args)]
struct ConfigArgs {
    /// JSON file with conversion options (camelCase keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extrusion depth in SVG user units
    #[arg(short, long)]
    depth: Option<f32>,

    /// Scale the result so its larger side measures this many units
    #[arg(long)]
    size: Option<f32>,

    /// Maximum <use> nesting depth
    #[arg(long)]
    max_use_depth: Option<usize>,

    /// Leave <use> elements unexpanded
    #[arg(long)]
    no_use_expansion: bool,

    /// Bake <use> transforms into the geometry
    #[arg(long)]
    no_inherit_transforms: bool,

    /// Ignore <mask> definitions
    #[arg(long)]
    no_masks: bool,

    /// Opacity of masked materials
    #[arg(long)]
    mask_opacity: Option<f32>,

    /// Gradient texture resolution
    #[arg(long)]
    gradient_resolution: Option<u32>,

    /// Mask texture resolution
    #[arg(long)]
    mask_resolution: Option<u32>,

    /// Render both faces of every triangle
    #[arg(long)]
    double_sided: bool,

    /// Color <use> copies by expansion depth
    #[arg(long)]
    debug_use_colors: bool,

    /// Disable the per-mesh z offset
    #[arg(long)]
    no_depth_stagger: bool,
}

impl ConfigArgs {
    fn load(&self) -> Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ConvertConfig::default(),
        };

        if let Some(depth) = self.depth {
            config = config.with_extrusion_depth(depth);
        }
        if self.size.is_some() {
            config = config.with_target_size(self.size);
        }
        if let Some(max) = self.max_use_depth {
            config = config.with_max_use_depth(max);
        }
        if let Some(opacity) = self.mask_opacity {
            config = config.with_mask_opacity(opacity);
        }
        if let Some(res) = self.gradient_resolution {
            config = config.with_gradient_resolution(res);
        }
        if let Some(res) = self.mask_resolution {
            config = config.with_mask_resolution(res);
        }
        if self.no_use_expansion {
            config = config.with_use_expansion(false);
        }
        if self.no_inherit_transforms {
            config = config.with_inherit_transforms(false);
        }
        if self.no_masks {
            config = config.with_masks(false);
        }
        if self.double_sided {
            config = config.with_double_sided(true);
        }
        if self.debug_use_colors {
            config = config.with_debug_use_colors(true);
        }
        if self.no_depth_stagger {
            config = config.with_depth_stagger(false);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Convert {
            input,
            output,
            baked_texture_size,
            dump_svg,
            options,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("glb"));
            run_convert(&input, &output, baked_texture_size, dump_svg.as_deref(), &options)?;
        }
        Commands::Inspect {
            input,
            json,
            options,
        } => {
            run_inspect(&input, json, &options)?;
        }
    }

    Ok(())
}

fn convert_file(input: &Path, options: &ConfigArgs) -> Result<Conversion> {
    let config = options.load()?;
    let svg = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    svg_to_mesh(&svg, &config).with_context(|| format!("converting {}", input.display()))
}

fn run_convert(
    input: &Path,
    output: &Path,
    baked_texture_size: u32,
    dump_svg: Option<&Path>,
    options: &ConfigArgs,
) -> Result<()> {
    // Warnings are already logged as they are raised
    let conversion = convert_file(input, options)?;

    if let Some(path) = dump_svg {
        std::fs::write(path, conversion.document.to_svg_string())
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let glb_options = GlbOptions { baked_texture_size };
    write_glb_with_options(&conversion.group, BufWriter::new(file), &glb_options)
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = conversion.summary();
    println!(
        "Exported {} meshes ({} triangles) to {}",
        summary.meshes,
        summary.triangles,
        output.display()
    );
    Ok(())
}

fn run_inspect(input: &Path, json: bool, options: &ConfigArgs) -> Result<()> {
    let conversion = convert_file(input, options)?;
    let summary = conversion.summary();

    if json {
        let report = serde_json::json!({
            "summary": summary,
            "warnings": conversion
                .diagnostics
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "meshes": conversion
                .group
                .meshes
                .iter()
                .map(|m| &m.metadata)
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", input.display());
    println!("{summary}");
    if let Some(bounds) = conversion.group.bounds {
        let size = bounds.size();
        println!("bounds:          {} x {} x {}", size.x, size.y, size.z);
    }
    print_warnings(&conversion);
    Ok(())
}

fn print_warnings(conversion: &Conversion) {
    for warning in &conversion.diagnostics {
        eprintln!("warning: {warning}");
    }
}
