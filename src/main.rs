use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vibemap::models::{Profile, RecommendationResult, RecommendedTrack, DEFAULT_RECOMMENDATIONS};
use vibemap::progress::{create_spinner, format_duration, set_log_only};
use vibemap::safety::validate_output_path;
use vibemap::{EngineError, Engine, LoadOptions, NormalizedMatrix};

#[derive(Parser)]
#[command(name = "vibemap")]
#[command(about = "Recommend musically similar tracks from an audio-feature catalog")]
struct Args {
    /// Catalog file (.csv, .sqlite, .sqlite3 or .db)
    catalog: PathBuf,

    /// Title of the track to get recommendations for
    #[arg(long)]
    track: Option<String>,

    /// Number of results, counting the selected track itself
    #[arg(long, short = 'k', default_value_t = DEFAULT_RECOMMENDATIONS)]
    count: usize,

    /// Feature columns (comma-separated), defaults to the 12 Spotify audio features
    #[arg(long)]
    features: Option<String>,

    /// Table to read from SQLite catalogs
    #[arg(long, default_value = "tracks")]
    table: String,

    /// Print every track title, sorted
    #[arg(long)]
    list: bool,

    /// Print the normalized profile of each recommended track
    #[arg(long)]
    profile: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Write the normalized matrix as JSON (file name must contain "normalized")
    #[arg(long)]
    export_matrix: Option<PathBuf>,

    /// Write load statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars and log phases as plain lines
    #[arg(long)]
    log_only: bool,
}

/// Everything printed under `--json`, as one document on stdout.
#[derive(Default, Serialize)]
struct JsonOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tracks: Option<Vec<&'a str>>,
    #[serde(flatten)]
    result: Option<&'a RecommendationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profiles: Option<Vec<Profile>>,
}

/// Reject flag combinations that would do nothing or be silently ignored.
fn check_args(args: &Args) -> Result<NonZeroUsize> {
    let Some(k) = NonZeroUsize::new(args.count) else {
        bail!("--count must be at least 1");
    };
    if args.track.is_none() && !args.list && args.export_matrix.is_none() {
        bail!("Nothing to do: pass --track, --list or --export-matrix");
    }
    if args.profile && args.track.is_none() {
        bail!("--profile needs --track");
    }
    Ok(k)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(args: &Args) -> LoadOptions {
    let mut options = LoadOptions {
        table: args.table.clone(),
        ..Default::default()
    };
    if let Some(ref features) = args.features {
        options.features = features
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
    }
    options
}

fn export_matrix(matrix: &NormalizedMatrix, output: &Path, catalog: &Path) -> Result<()> {
    validate_output_path(output, "normalized", &[catalog])?;

    let spinner = create_spinner("Exporting normalized matrix");
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, matrix)?;
    writer.flush()?;
    spinner.finish_with_message(format!(
        "Exported {} x {} matrix to {}",
        matrix.len(),
        matrix.columns().len(),
        output.display()
    ));
    Ok(())
}

fn print_track_line(entry: &RecommendedTrack) {
    println!(
        "  {}. {} - {} (distance {:.4})",
        entry.rank, entry.track_name, entry.artists, entry.distance
    );
}

fn print_profile(profile: &Profile) {
    for axis in &profile.axes {
        let bar = "#".repeat((axis.value * 20.0).round() as usize);
        println!("       {:<18} {:.3} {}", axis.feature, axis.value, bar);
    }
}

fn print_recommendations(result: &RecommendationResult, profiles: Option<&[Profile]>) {
    let profile_at = |i: usize| profiles.and_then(|p| p.get(i));

    let Some(selected) = result.selected() else {
        return;
    };
    println!("You've just listened to:");
    print_track_line(selected);
    if let Some(p) = profile_at(0) {
        print_profile(p);
    }

    if result.similar().is_empty() {
        return;
    }
    println!("\nYou may enjoy these similar songs:");
    for (i, entry) in result.similar().iter().enumerate() {
        print_track_line(entry);
        if let Some(p) = profile_at(i + 1) {
            print_profile(p);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    set_log_only(args.log_only);

    let k = check_args(&args)?;

    let start = Instant::now();
    let engine = Engine::open(&args.catalog, load_options(&args))
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let snapshot = engine.snapshot();

    let stats = snapshot.stats();
    info!(
        tracks = stats.tracks,
        distinct_titles = stats.distinct_titles,
        distinct_title_pct = stats.distinct_title_rate(),
        "catalog ready"
    );
    if args.log_only {
        stats.log_phase("LOAD");
    }
    if let Some(ref path) = args.stats {
        stats.write_to_file(path)?;
    }

    let mut recommendation = None;
    let mut json = JsonOutput::default();

    if args.list {
        let names = snapshot.catalog().track_names_sorted();
        if args.json {
            json.tracks = Some(names);
        } else {
            for name in names {
                println!("{}", name);
            }
        }
    }

    if let Some(ref output) = args.export_matrix {
        export_matrix(snapshot.matrix(), output, &args.catalog)?;
    }

    if let Some(ref track) = args.track {
        let view = match engine.recommend(track, k) {
            Ok(view) => view,
            Err(EngineError::TrackNotFound { name, suggestions }) => {
                if suggestions.is_empty() {
                    bail!("Track '{}' is not in the catalog", name);
                }
                bail!(
                    "Track '{}' is not in the catalog. Did you mean: {}?",
                    name,
                    suggestions.join(", ")
                );
            }
            Err(e) if e.is_not_found() => bail!("{}", e),
            Err(e) => return Err(e).context("Failed to compute recommendations"),
        };
        recommendation = Some(view);
    }

    let profiles = match recommendation {
        Some(ref view) if args.profile => Some(view.profiles()?),
        _ => None,
    };

    if args.json {
        json.result = recommendation.as_ref().map(|view| &view.result);
        json.profiles = profiles;
        if json.tracks.is_some() || json.result.is_some() {
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    } else if let Some(ref view) = recommendation {
        print_recommendations(&view.result, profiles.as_deref());
    }

    info!(elapsed = %format_duration(start.elapsed()), "done");
    Ok(())
}
