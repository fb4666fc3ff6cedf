use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glam::{Mat4, Vec2, Vec3};
use tessera::heightfield::Heightfield;
use tessera::{BasePrimitives, TessellationConfig, Tessellator, ViewParams};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    about = "Adaptive terrain tessellation driven by a concurrent binary tree"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run adaptive refinement passes over a procedural terrain and report
    /// per-pass statistics.
    Refine(SceneArgs),
    /// Refine, then export the final leaf mesh as a Wavefront OBJ.
    Mesh {
        /// Output OBJ path.
        output: PathBuf,
        #[command(flatten)]
        scene: SceneArgs,
    },
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// Number of update passes to run.
    #[arg(long, default_value_t = 12)]
    passes: usize,
    /// Maximum subdivision depth.
    #[arg(long, default_value_t = 20)]
    max_depth: u32,
    /// Split threshold in screen pixels.
    #[arg(long, default_value_t = 24.0)]
    split: f32,
    /// Merge threshold in screen pixels.
    #[arg(long, default_value_t = 8.0)]
    merge: f32,
    /// Terrain seed.
    #[arg(long, default_value_t = 0)]
    seed: u32,
    /// Terrain side length in world units.
    #[arg(long, default_value_t = 1000.0)]
    terrain_size: f32,
    /// Peak terrain height in world units.
    #[arg(long, default_value_t = 120.0)]
    amplitude: f32,
    /// Camera height above the terrain center, world units.
    #[arg(long, default_value_t = 150.0)]
    eye_height: f32,
    /// Viewport size in pixels, width and height.
    #[arg(long, num_args = 2, default_values_t = [1920.0, 1080.0])]
    viewport: Vec<f32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Refine(scene) => run_refine(&scene).map(|_| ()),
        Commands::Mesh { output, scene } => run_mesh(output, &scene),
    }
}

/// Refine against a fixed viewpoint near one corner of the terrain, so the
/// tessellation visibly concentrates detail under the camera.
fn run_refine(scene: &SceneArgs) -> Result<Tessellator> {
    let config = TessellationConfig {
        max_depth: scene.max_depth,
        split_threshold_px: scene.split,
        merge_threshold_px: scene.merge,
        ..TessellationConfig::default()
    };
    let mut tess = Tessellator::new(config, BasePrimitives::unit_square())
        .context("invalid tessellation configuration")?;

    let field = Heightfield::new(scene.seed);
    let size = scene.terrain_size;
    let amplitude = scene.amplitude;
    let lift = move |uv: Vec2| Vec3::new(uv.x * size, field.sample(uv.x, uv.y) * amplitude, uv.y * size);

    let view = camera(scene);

    println!("pass\tsplits\tmerges\tleaves");
    for pass in 0..scene.passes {
        let stats = tess.update(&view, &lift);
        println!(
            "{}\t{}\t{}\t{}",
            pass + 1,
            stats.splits,
            stats.merges,
            stats.leaf_count
        );
    }

    Ok(tess)
}

fn run_mesh(output: PathBuf, scene: &SceneArgs) -> Result<()> {
    let tess = run_refine(scene)?;

    let field = Heightfield::new(scene.seed);
    let size = scene.terrain_size;
    let amplitude = scene.amplitude;

    let file = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let triangles = tess.leaf_triangles();
    for triangle in &triangles {
        for uv in [triangle.v0, triangle.v1, triangle.v2] {
            let h = field.sample(uv.x, uv.y) * amplitude;
            writeln!(writer, "v {} {} {}", uv.x * size, h, uv.y * size)?;
        }
    }
    for i in 0..triangles.len() {
        let base = 3 * i + 1; // OBJ indices are 1-based
        writeln!(writer, "f {} {} {}", base, base + 1, base + 2)?;
    }
    writer.flush()?;

    println!(
        "wrote {} triangles to {}",
        triangles.len(),
        output.display()
    );
    Ok(())
}

fn camera(scene: &SceneArgs) -> ViewParams {
    let size = scene.terrain_size;
    let eye = Vec3::new(size * 0.25, scene.eye_height, size * 0.25);
    let center = Vec3::new(size * 0.5, 0.0, size * 0.5);
    let viewport = Vec2::new(scene.viewport[0], scene.viewport[1]);
    let projection = Mat4::perspective_rh(
        60_f32.to_radians(),
        viewport.x / viewport.y,
        0.5,
        4.0 * size,
    );
    ViewParams {
        view_proj: projection * Mat4::look_at_rh(eye, center, Vec3::Y),
        viewport,
    }
}
