use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use music_center::config::LoggingConfig;
use music_center::{Config, CoverArt, MusicCenter};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "music-center")]
#[command(about = "Browse a local music folder, keep playlists, play one track at a time")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Use this config file instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set the library root, or show the remembered one
    Root { path: Option<PathBuf> },
    /// List artist directories under the remembered root
    Artists,
    /// List playable entries inside an artist directory
    Tracks { dir: PathBuf },
    /// Show the cover image for an artist directory
    Cover { dir: PathBuf },
    #[command(subcommand)]
    Playlist(PlaylistCommand),
    /// Play a single track until it finishes
    Play {
        file: PathBuf,
        #[arg(long)]
        volume: Option<f32>,
    },
}

#[derive(Subcommand)]
enum PlaylistCommand {
    Create { name: String },
    Add { name: String, track: PathBuf },
    Remove { name: String, track: PathBuf },
    List,
    Show { name: String },
    /// Remember a playlist as selected for the next run
    Select { name: String },
}

fn init_logging(logging: &LoggingConfig, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.directory)
        .with_context(|| format!("creating log directory {}", logging.directory.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&logging.directory, "music-center.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let writer = if dev {
        BoxMakeWriter::new(file_writer.and(std::io::stderr))
    } else {
        BoxMakeWriter::new(file_writer)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if dev {
        eprintln!("🔧 Dev mode: log output mirrored to stderr");
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let _guard = init_logging(&config.logging, args.dev)?;
    info!("🎵 Music Center starting up");

    let mut center = MusicCenter::open(config).context("opening the playlist database")?;

    match args.command {
        Command::Root { path } => root(&center, path, args.json).await,
        Command::Artists => artists(&center, args.json).await,
        Command::Tracks { dir } => tracks(&center, dir, args.json).await,
        Command::Cover { dir } => {
            let cover = center.cover_art(dir).await;
            if args.json {
                emit_json(&cover)
            } else {
                match &cover {
                    CoverArt::File(path) => println!("{}", path.display()),
                    CoverArt::Placeholder => println!("{} (placeholder)", cover.reference().display()),
                }
                Ok(())
            }
        }
        Command::Playlist(command) => playlist(&center, command, args.json).await,
        Command::Play { file, volume } => play(&mut center, file, volume).await,
    }
}

async fn root(center: &MusicCenter, path: Option<PathBuf>, json: bool) -> Result<()> {
    let (root, artists) = match path {
        Some(path) => {
            let path = std::path::absolute(&path)
                .with_context(|| format!("resolving {}", path.display()))?;
            let Some(artists) = center.set_root(&path).await?.current() else {
                return Ok(());
            };
            (Some(path), artists)
        }
        None => {
            let restored = center.restore().await?;
            (restored.root, restored.artists)
        }
    };

    if json {
        return emit_json(&serde_json::json!({ "root": root, "artists": artists }));
    }

    match root {
        Some(root) => {
            println!("📁 {} ({} artists)", root.display(), artists.len());
            for artist in artists {
                println!("  {}", artist.name);
            }
        }
        None => println!("No library root set yet. Run `music-center root <PATH>`."),
    }
    Ok(())
}

async fn artists(center: &MusicCenter, json: bool) -> Result<()> {
    let restored = center.restore().await?;
    if json {
        return emit_json(&restored.artists);
    }
    for artist in restored.artists {
        println!("{}", artist.name);
    }
    Ok(())
}

async fn tracks(center: &MusicCenter, dir: PathBuf, json: bool) -> Result<()> {
    let Some(entries) = center.tracks_for(dir).await.current() else {
        return Ok(());
    };

    #[derive(Serialize)]
    struct Row {
        #[serde(flatten)]
        entry: music_center::LibraryEntry,
        description: Option<music_center::TrackDescription>,
    }

    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let description = if entry.is_track() {
            Some(center.describe(&entry.path).await)
        } else {
            None
        };
        rows.push(Row { entry, description });
    }

    if json {
        return emit_json(&rows);
    }

    for row in rows {
        match row.description {
            Some(description) => {
                let duration = description.formatted_duration().unwrap_or_else(|| "--:--".to_string());
                println!("🎵 {:<40} {} [{}]", row.entry.name, description.playlist_label(), duration);
            }
            None => println!("📁 {}", row.entry.name),
        }
    }
    Ok(())
}

async fn playlist(center: &MusicCenter, command: PlaylistCommand, json: bool) -> Result<()> {
    match command {
        PlaylistCommand::Create { name } => {
            center.create_playlist(&name).await?;
            println!("Created playlist {}", name);
        }
        PlaylistCommand::Add { name, track } => {
            center.add_track(&name, &track).await?;
            println!("Added {} to {}", track.display(), name);
        }
        PlaylistCommand::Remove { name, track } => {
            let removed = center.remove_track(&name, &track).await?;
            println!("Removed {} entr{} from {}", removed, if removed == 1 { "y" } else { "ies" }, name);
        }
        PlaylistCommand::List => {
            let summaries = center.playlist_summaries().await;
            let selected = center.load_selection().await?;
            if json {
                return emit_json(&serde_json::json!({ "playlists": summaries, "selected": selected }));
            }
            for summary in summaries {
                let marker = if selected.as_deref() == Some(summary.name.as_str()) { "*" } else { " " };
                println!("{} {} ({} tracks)", marker, summary.name, summary.track_count);
            }
        }
        PlaylistCommand::Show { name } => {
            let tracks = center.list_tracks(&name).await;
            if json {
                return emit_json(&tracks);
            }
            for (i, track) in tracks.iter().enumerate() {
                let description = center.describe(track).await;
                println!("{:>3}. {}", i + 1, description.playlist_label());
            }
        }
        PlaylistCommand::Select { name } => {
            center.select_playlist(&name).await?;
            println!("Selected playlist {}", name);
        }
    }
    Ok(())
}

#[cfg(feature = "audio")]
async fn play(center: &mut MusicCenter, file: PathBuf, volume: Option<f32>) -> Result<()> {
    use music_center::audio::RodioBackend;
    use music_center::{PlaybackHandle, PlayerEvent};
    use std::io::Write;

    let handle = PlaybackHandle::spawn(
        RodioBackend::new,
        Some(center.metadata()),
        &center.config().playback,
    )?;
    center.attach_playback(handle);

    let mut events = center.subscribe().await?;
    if let Some(volume) = volume {
        center.set_volume(volume).await?;
    }
    if center.load(&file).await?.is_superseded() {
        return Ok(());
    }
    center.play().await?;

    if let Some(description) = center.now_playing().await? {
        println!("▶ {}", description.playlist_label());
    }

    while let Some(event) = events.recv().await {
        match event {
            PlayerEvent::PositionChanged(progress) => {
                print!("\r{}  {:>3}%", progress.label(), (progress.fraction() * 100.0).round());
                std::io::stdout().flush()?;
            }
            PlayerEvent::TrackFinished(_) | PlayerEvent::Stopped => break,
            _ => {}
        }
    }
    println!();
    Ok(())
}

#[cfg(not(feature = "audio"))]
async fn play(_center: &mut MusicCenter, _file: PathBuf, _volume: Option<f32>) -> Result<()> {
    anyhow::bail!("built without the `audio` feature; no output device available")
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
