use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use facerec_core::detection::domain::face_detector::DetectedFace;
use facerec_core::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
use facerec_core::identity::domain::identity::{Identity, IdentityId};
use facerec_core::identity::domain::identity_error::IdentityError;
use facerec_core::identity::domain::identity_resolver::{IdentityResolver, DEFAULT_TEACH_WEIGHT};
use facerec_core::identity::infrastructure::identity_store::IdentityStore;
use facerec_core::identity::infrastructure::json_identity_repository::JsonIdentityRepository;
use facerec_core::identity::infrastructure::remote_identity_resolver::RemoteIdentityResolver;
use facerec_core::shared::bounding_box::BoundingBox;
use facerec_core::shared::config::{AppConfig, RemoteConfig};
use facerec_core::shared::feature_vector::FeatureVector;
use facerec_core::shared::frame::Frame;
use facerec_core::tracking::domain::track_event::TrackCallbacks;
use facerec_core::tracking::face_tracker::FaceTracker;

/// Face identity store administration and tracker replay.
#[derive(Parser)]
#[command(name = "facerec")]
struct Cli {
    /// Local identity store file (defaults to the platform data directory).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Base URL of a facerec server to use instead of a local store.
    #[arg(long, global = true, conflicts_with = "store")]
    remote: Option<String>,

    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum descriptor distance for two faces to be the same person.
    #[arg(long, global = true)]
    threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List known identities.
    List,
    /// Show one identity by id or name.
    Show { key: String },
    /// Identify a descriptor read from a JSON array file.
    Identify { vector: PathBuf },
    /// Teach a descriptor read from a JSON array file.
    Teach {
        vector: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        id: Option<IdentityId>,
        #[arg(long, default_value_t = DEFAULT_TEACH_WEIGHT)]
        weight: f64,
    },
    /// Rename an identity given by id or name.
    Rename { key: String, name: String },
    /// Delete an identity given by id or name.
    Delete { key: String },
    /// Run the tracker over scripted detections.
    Replay {
        script: PathBuf,
        /// Playback rate; 0 replays as fast as possible.
        #[arg(long, default_value = "0")]
        fps: f64,
    },
}

#[derive(Deserialize)]
struct ScriptFrame {
    frame: usize,
    #[serde(default)]
    faces: Vec<ScriptFace>,
}

#[derive(Deserialize)]
struct ScriptFace {
    #[serde(rename = "box")]
    bbox: BoundingBox,
    vector: FeatureVector,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let resolver = build_resolver(&cli, &config)?;

    match cli.command {
        Command::List => {
            let identities = resolver.list()?;
            if identities.is_empty() {
                eprintln!("No identities stored");
            }
            for identity in &identities {
                print_identity(identity);
            }
        }
        Command::Show { key } => print_identity(&lookup_key(resolver.as_ref(), &key)?),
        Command::Identify { vector } => {
            let vector = read_vector(&vector)?;
            print_identity(&resolver.identify(&vector)?);
        }
        Command::Teach {
            vector,
            name,
            id,
            weight,
        } => {
            let vector = read_vector(&vector)?;
            let identity = resolver.teach(&vector, name.as_deref(), id, weight)?;
            print_identity(&identity);
        }
        Command::Rename { key, name } => {
            let id = lookup_key(resolver.as_ref(), &key)?.id;
            print_identity(&resolver.rename(id, &name)?);
        }
        Command::Delete { key } => {
            let id = lookup_key(resolver.as_ref(), &key)?.id;
            let removed = resolver.delete(id)?;
            log::info!("Deleted identity {} '{}'", removed.id, removed.name);
        }
        Command::Replay { script, fps } => run_replay(&script, fps, &config, resolver)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(threshold) = cli.threshold {
        config.store.distance_threshold = threshold;
        config.store.validate()?;
    }
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
        config.remote = None;
    }
    if let Some(url) = &cli.remote {
        config.remote = Some(RemoteConfig::new(url.clone()));
    }
    Ok(config)
}

fn build_resolver(
    cli: &Cli,
    config: &AppConfig,
) -> Result<Arc<dyn IdentityResolver>, Box<dyn std::error::Error>> {
    if let Some(remote) = &config.remote {
        if cli.threshold.is_some() {
            log::warn!("--threshold has no effect on a remote store");
        }
        return Ok(Arc::new(RemoteIdentityResolver::new(remote)?));
    }

    let path = config
        .resolved_store_path()
        .ok_or("No data directory available; pass --store")?;
    log::info!("Using identity store {}", path.display());
    let repository = JsonIdentityRepository::open(&path)?;
    Ok(Arc::new(IdentityStore::open(
        Box::new(repository),
        config.store.clone(),
    )?))
}

/// Numeric keys are ids; anything else is a name.
fn lookup_key(resolver: &dyn IdentityResolver, key: &str) -> Result<Identity, IdentityError> {
    match key.parse::<IdentityId>() {
        Ok(id) => resolver.lookup(None, Some(id)),
        Err(_) => resolver.lookup(Some(key), None),
    }
}

fn read_vector(path: &Path) -> Result<FeatureVector, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read descriptor {}: {e}", path.display()))?;
    serde_json::from_str(&json)
        .map_err(|e| format!("Invalid descriptor in {}: {e}", path.display()).into())
}

fn load_script(
    path: &Path,
) -> Result<HashMap<usize, Vec<DetectedFace>>, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read script {}: {e}", path.display()))?;
    let frames: Vec<ScriptFrame> = serde_json::from_str(&json)
        .map_err(|e| format!("Invalid script {}: {e}", path.display()))?;

    let mut script: HashMap<usize, Vec<DetectedFace>> = HashMap::new();
    for frame in frames {
        script.entry(frame.frame).or_default().extend(
            frame
                .faces
                .into_iter()
                .map(|face| DetectedFace {
                    bbox: face.bbox,
                    vector: face.vector,
                }),
        );
    }
    Ok(script)
}

fn run_replay(
    script_path: &Path,
    fps: f64,
    config: &AppConfig,
    resolver: Arc<dyn IdentityResolver>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !(fps.is_finite() && fps >= 0.0) {
        return Err(format!("FPS must be a non-negative number, got {fps}").into());
    }
    let detector = ReplayFaceDetector::new(Arc::new(load_script(script_path)?));
    let total = detector.frame_count();
    let frame_delay = (fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));

    let callbacks = TrackCallbacks::new()
        .with_appearance(|track| {
            log::info!("Track {} appeared at {}", track.id(), track.smoothed_box());
            Ok(())
        })
        .with_identification(|track| {
            log::info!(
                "Track {} is {}",
                track.id(),
                track.name().unwrap_or("unidentified")
            );
            Ok(())
        })
        .with_disappearance(|track| {
            log::info!(
                "Track {} ({}) disappeared",
                track.id(),
                track.name().unwrap_or("unidentified")
            );
            Ok(())
        });

    let mut tracker = FaceTracker::start(
        config.tracker.clone(),
        Arc::new(detector),
        resolver,
        callbacks,
    )?;

    for index in 0..total {
        let tracks = tracker.update(Frame::placeholder(index))?;
        for track in &tracks {
            println!(
                "{index}\t{}\t{}\t{}",
                track.id(),
                track.smoothed_box(),
                track.name().unwrap_or("-")
            );
        }
        if let Some(delay) = frame_delay {
            std::thread::sleep(delay);
        }
    }
    tracker.stop();

    log::info!(
        "Replayed {total} frames, {} tracks remaining",
        tracker.tracks().len()
    );
    Ok(())
}

fn print_identity(identity: &Identity) {
    println!(
        "{}\t{}\t{:.2}",
        identity.id, identity.name, identity.observation_weight
    );
}
