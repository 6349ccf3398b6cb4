//! Demo binary that flies a camera toward a synthetic quadtree tileset and
//! runs the selection engine each frame, simulating the asynchronous loader
//! by completing the highest-priority requests between frames.
//!
//! Run with `cargo run -p massif-viewer` for the default fly-through.
//! Run with `cargo run -p massif-viewer -- --skip-lod --frames 300` to watch
//! skip-level-of-detail selection converge.

use std::path::PathBuf;

use clap::Parser;
use glam::DVec3;
use massif_math::Aabb;
use massif_tileset::{
    FrameState, RefineMode, SelectionEngine, TileDescriptor, TileId, Tileset, TilesetConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Massif selection demo command-line arguments.
///
/// CLI values override settings loaded from the optional RON config.
#[derive(Parser, Debug)]
#[command(name = "massif-viewer", about = "Massif tile selection demo")]
struct CliArgs {
    /// Frames to simulate.
    #[arg(long, default_value_t = 240)]
    frames: u64,

    /// Quadtree depth of the synthetic tileset.
    #[arg(long, default_value_t = 5)]
    depth: u16,

    /// Content loads completed per frame.
    #[arg(long, default_value_t = 8)]
    loads_per_frame: usize,

    /// Resident-tile budget; colder tiles are evicted between frames.
    #[arg(long, default_value_t = 2048)]
    resident_tiles: usize,

    /// Enable skip-level-of-detail traversal.
    #[arg(long)]
    skip_lod: bool,

    /// Maximum screen-space error override.
    #[arg(long)]
    max_sse: Option<f64>,

    /// Path to a RON tileset config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter (e.g. "info", "massif_tileset=trace").
    #[arg(long)]
    log_level: Option<String>,
}

impl CliArgs {
    fn apply_overrides(&self, config: &mut TilesetConfig) {
        if self.skip_lod {
            config.skip_level_of_detail = true;
        }
        if let Some(max_sse) = self.max_sse {
            config.maximum_screen_space_error = max_sse;
        }
    }
}

/// Console logging with timestamps and module paths, overridable via
/// RUST_LOG or the --log-level flag.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();
}

/// World extent of the synthetic terrain slab, in meters.
const TERRAIN_EXTENT: f64 = 4096.0;
/// Thickness of each terrain tile slab.
const TERRAIN_THICKNESS: f64 = 32.0;

/// Build a quadtree tileset over a square terrain slab centered on the
/// origin: a structural root with renderable descendants whose geometric
/// error halves per level, leaves flagged with the zero sentinel.
fn build_tileset(config: TilesetConfig, depth: u16) -> Tileset {
    let root_bounds = slab_bounds(-TERRAIN_EXTENT, TERRAIN_EXTENT, -TERRAIN_EXTENT, TERRAIN_EXTENT);
    let root_error = TERRAIN_EXTENT / 4.0;
    let mut tileset = Tileset::new(
        config,
        root_error * 2.0,
        TileDescriptor::empty(root_bounds, root_error, RefineMode::Replace),
    );

    let root = tileset.root();
    subdivide(
        &mut tileset,
        root,
        -TERRAIN_EXTENT,
        TERRAIN_EXTENT,
        -TERRAIN_EXTENT,
        TERRAIN_EXTENT,
        root_error / 2.0,
        depth,
    );
    tileset
}

fn slab_bounds(min_x: f64, max_x: f64, min_z: f64, max_z: f64) -> Aabb {
    Aabb::new(
        DVec3::new(min_x, 0.0, min_z),
        DVec3::new(max_x, TERRAIN_THICKNESS, max_z),
    )
}

#[allow(clippy::too_many_arguments)]
fn subdivide(
    tileset: &mut Tileset,
    parent: TileId,
    min_x: f64,
    max_x: f64,
    min_z: f64,
    max_z: f64,
    geometric_error: f64,
    levels_left: u16,
) {
    if levels_left == 0 {
        return;
    }
    let mid_x = (min_x + max_x) * 0.5;
    let mid_z = (min_z + max_z) * 0.5;
    let quads = [
        (min_x, mid_x, min_z, mid_z),
        (mid_x, max_x, min_z, mid_z),
        (min_x, mid_x, mid_z, max_z),
        (mid_x, max_x, mid_z, max_z),
    ];
    for (qx0, qx1, qz0, qz1) in quads {
        // Leaves carry the zero sentinel: nothing below them to refine to.
        let child_error = if levels_left == 1 { 0.0 } else { geometric_error };
        let child = tileset.add_child(
            parent,
            TileDescriptor::renderable(
                slab_bounds(qx0, qx1, qz0, qz1),
                child_error,
                RefineMode::Replace,
            ),
        );
        subdivide(
            tileset,
            child,
            qx0,
            qx1,
            qz0,
            qz1,
            geometric_error / 2.0,
            levels_left - 1,
        );
    }
}

/// Camera fly-in: start high above the far edge, descend toward the center
/// while looking down-forward.
fn camera_for_frame(frame_number: u64, total_frames: u64) -> (DVec3, DVec3) {
    let t = (frame_number - 1) as f64 / total_frames.max(1) as f64;
    let altitude = 6000.0 - 5200.0 * t;
    let approach = 5000.0 - 4000.0 * t;
    let eye = DVec3::new(0.0, altitude, approach);
    let forward = (DVec3::new(0.0, 0.0, -500.0) - eye).normalize();
    (eye, forward)
}

/// Complete the highest-priority pending loads, the way a real frame would
/// drain its request queue: sorted by the inherited holder priority.
fn complete_loads(tileset: &mut Tileset, budget: usize) -> usize {
    let mut pending: Vec<TileId> = tileset.requested_tiles().to_vec();
    pending.sort_unstable_by(|&a, &b| {
        let pa = tileset.tile(tileset.tile(a).priority_holder()).priority_distance();
        let pb = tileset.tile(tileset.tile(b).priority_holder()).priority_distance();
        pa.total_cmp(&pb)
    });
    pending.truncate(budget);
    for &id in &pending {
        tileset.tile_mut(id).mark_content_ready();
    }
    pending.len()
}

/// Evict the least-recently-touched tiles beyond the resident budget,
/// dropping their content so a later approach re-requests it.
fn evict_cold_tiles(tileset: &mut Tileset, keep: usize) -> usize {
    let candidates = tileset.cache().unload_candidates(keep);
    for &id in &candidates {
        tileset.tile_mut(id).mark_content_unloaded();
        tileset.cache_mut().remove(id);
    }
    candidates.len()
}

fn main() {
    let args = CliArgs::parse();
    init_logging(args.log_level.as_deref());

    let mut config = match &args.config {
        Some(path) => match TilesetConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
        None => TilesetConfig::default(),
    };
    args.apply_overrides(&mut config);

    let mut tileset = build_tileset(config, args.depth);
    let mut engine = SelectionEngine::new();
    info!(
        "built synthetic tileset: {} tiles, depth {}",
        tileset.len(),
        args.depth
    );

    let mut total_loaded = 0usize;
    for frame_number in 1..=args.frames {
        let (eye, forward) = camera_for_frame(frame_number, args.frames);
        let frame = FrameState::perspective(
            frame_number,
            eye,
            forward,
            DVec3::Y,
            std::f64::consts::FRAC_PI_3,
            16.0 / 9.0,
            1.0,
            50_000.0,
            1080.0,
        );

        let ran = engine.select_tiles(&mut tileset, &frame);
        let loaded = complete_loads(&mut tileset, args.loads_per_frame);
        let evicted = evict_cold_tiles(&mut tileset, args.resident_tiles);
        total_loaded += loaded;

        if frame_number % 20 == 0 || frame_number == args.frames {
            let stats = tileset.statistics();
            info!(
                "frame {frame_number}: ran={ran} selected={} requested={} visited={} \
                 union_culled={} loaded_now={loaded} evicted={evicted} altitude={:.0}",
                tileset.selected_tiles().len(),
                tileset.requested_tiles().len(),
                stats.visited,
                stats.culled_with_children_union,
                eye.y,
            );
        }
    }

    info!(
        "fly-through complete: {total_loaded} tiles loaded, {} resident in cache",
        tileset.cache().len()
    );
}
