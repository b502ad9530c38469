//! # Camera Stack Depth Demo
//!
//! Demonstrates:
//! - A synthetic camera stack (base camera plus overlays) on the software backend
//! - Per-camera active flags and both merge modes
//! - Recording passes through the host hooks and replaying them with the executor
//! - Loading and saving feature settings as TOML
//!
//! Every camera "renders" a constant depth; the demo prints the recorded passes
//! and the composited depth shown in the color target.
//!
//! ```bash
//! cargo run --example stack_depth_demo -- --depths 0.2,0.8,0.5 --mode overlay
//! ```

use std::path::PathBuf;

use camera_stack_depth::backend::{
    GraphicsBackend, SoftwareBackend, SoftwareShader, TextureDescriptor, TextureFormat,
};
use camera_stack_depth::pipeline::{
    CameraRecordRequest, CameraStackDepthFeature, CameraStackDepthSettings, FrameStatus,
    MergeMode,
};
use camera_stack_depth::render_graph::{
    RenderGraphExecutor, BACK_DEPTH_PROPERTY, DEPTH_TEXTURE_PROPERTY, FRONT_DEPTH_PROPERTY,
};
use camera_stack_depth::scene::{CameraId, CameraKind, CameraStackDescriptor};
use clap::Parser;

/// Merge mode selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliMergeMode {
    /// Front-most active camera wins.
    Overlay,
    /// Largest depth value wins.
    Maximum,
}

impl From<CliMergeMode> for MergeMode {
    fn from(mode: CliMergeMode) -> Self {
        match mode {
            CliMergeMode::Overlay => MergeMode::Overlay,
            CliMergeMode::Maximum => MergeMode::Maximum,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "Camera Stack Depth Demo",
    about = "Composite the depth of a synthetic camera stack"
)]
struct Args {
    /// Depth rendered by each camera, base camera first.
    #[arg(long, value_delimiter = ',', default_value = "0.2,0.8,0.5")]
    depths: Vec<f32>,

    /// Merge mode; overrides the settings file.
    #[arg(long, value_enum)]
    mode: Option<CliMergeMode>,

    /// Raw ordinals of cameras to deactivate.
    #[arg(long, value_delimiter = ',')]
    inactive: Vec<usize>,

    /// Load settings from this TOML file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Save the final settings to this TOML file.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Viewport width in pixels.
    #[arg(long, default_value = "8")]
    width: u32,

    /// Viewport height in pixels.
    #[arg(long, default_value = "8")]
    height: u32,

    /// Number of frames to run.
    #[arg(long, default_value = "2")]
    frames: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => CameraStackDepthSettings::load(path)?,
        None => CameraStackDepthSettings::default(),
    };
    if let Some(mode) = args.mode {
        settings.merge_mode = mode.into();
    }
    if !args.inactive.is_empty() {
        settings.active_cameras = (0..args.depths.len())
            .map(|raw| !args.inactive.contains(&raw))
            .collect();
    }

    let mut backend = SoftwareBackend::new();
    let display = backend.create_material(SoftwareShader::ShowDepth {
        source_property: DEPTH_TEXTURE_PROPERTY,
    });
    let merge = backend.create_material(SoftwareShader::MergeDepth {
        back_property: BACK_DEPTH_PROPERTY,
        front_property: FRONT_DEPTH_PROPERTY,
        overlay_keyword: MergeMode::Overlay.keyword(),
    });
    let color_target = backend.create_texture(&TextureDescriptor {
        label: Some("Color Target".into()),
        width: args.width,
        height: args.height,
        format: TextureFormat::Rgba8Unorm,
        ..Default::default()
    })?;

    let mut depth_sources = Vec::new();
    for (i, &depth) in args.depths.iter().enumerate() {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some(format!("Camera {i} Depth")),
            width: args.width,
            height: args.height,
            format: TextureFormat::Depth32Float,
            ..Default::default()
        })?;
        backend.fill(texture, depth)?;
        depth_sources.push(texture);
    }

    let cameras: Vec<CameraId> = (1..=depth_sources.len() as u64).map(CameraId).collect();
    let stack = CameraStackDescriptor {
        base: cameras.first().copied(),
        overlays: cameras.iter().skip(1).copied().collect(),
    };

    let mut feature = CameraStackDepthFeature::from_settings(&settings);
    feature.set_display_material(Some(display));
    feature.set_merge_material(Some(merge));
    let mut executor = RenderGraphExecutor::new();

    for frame in 0..args.frames {
        let status = feature.on_camera_stack_resolved(&mut backend, &stack, (args.width, args.height));

        if status != FrameStatus::Recording {
            println!("frame {frame}: {status:?}");
            continue;
        }

        for (&camera, &depth_source) in cameras.iter().zip(&depth_sources) {
            let request = CameraRecordRequest {
                camera,
                kind: CameraKind::Game,
                depth_source,
                color_target,
            };
            if let Err(err) = feature.on_camera_record(&request) {
                log::error!("{}", err);
            }
        }

        let Some(recording) = feature.take_recording() else {
            continue;
        };
        println!("frame {frame}: {} passes", recording.len());
        for pass in recording.passes() {
            println!("  {:<26} {} {:?}", pass.name, pass.camera, pass.kind);
        }
        executor.execute(&recording, &mut backend)?;

        let value = backend.texel(color_target, 0, 0).unwrap_or_default();
        println!(
            "  composited depth ({:?}): {value}",
            feature.merge_mode()
        );
    }

    if let Some(path) = &args.save {
        feature.settings().save(path)?;
        println!("settings saved to {}", path.display());
    }

    feature.dispose(&mut backend);
    println!(
        "{}: {} textures created, {} destroyed, {} blits",
        backend.name(),
        backend.created_count(),
        backend.destroyed_count(),
        backend.blit_count()
    );
    Ok(())
}
