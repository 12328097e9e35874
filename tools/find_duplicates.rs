use std::env;

use dedup::{find_duplicate_groups_with_mode, find_duplicates_for_song_with_mode};
use library::Library;
use metadata::format_duration;
use tools::config::{clamp_threshold, config_path_from_env, load_or_create_config, resolve_path};
use tracing::info;

#[derive(Default)]
struct Args {
    json: bool,
    exact: bool,
    threshold: Option<f64>,
    song: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => args.json = true,
            "--exact" => args.exact = true,
            "--threshold" => {
                let value = iter.next().ok_or("--threshold needs a value")?;
                let value: f64 = value
                    .parse()
                    .map_err(|_| format!("invalid threshold: {}", value))?;
                args.threshold = Some(clamp_threshold(value));
            }
            "--song" => {
                args.song = Some(iter.next().ok_or("--song needs a song id")?);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(args)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tools::init_tracing();

    let args = parse_args()?;
    let config_path = config_path_from_env();
    let (config, _) = load_or_create_config(&config_path)?;
    let library = Library::open(&resolve_path(&config_path, &config.library_path))?;
    let threshold = args.threshold.unwrap_or(config.duplicate_threshold);
    let mode = config.match_mode();

    if args.exact {
        let groups = library.find_exact_duplicates()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        } else {
            for group in &groups {
                println!("{} - {} ({} copies)", group.title, group.artist, group.count);
                for id in &group.song_ids {
                    println!("    {}", id);
                }
            }
        }
        return Ok(());
    }

    let songs = library.all_songs()?;
    info!("Checking {} songs (threshold {})", songs.len(), threshold);

    if let Some(song_id) = args.song.as_deref() {
        let target = library
            .get_song(song_id)?
            .ok_or_else(|| format!("song not found: {}", song_id))?;
        let ranked = find_duplicates_for_song_with_mode(&target, &songs, threshold, mode);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        } else {
            println!("{} - {}", target.title, target.artist);
            for entry in &ranked {
                println!(
                    "  {:.3} {:<15} {} - {} [{}] {}",
                    entry.verdict.overall_similarity,
                    entry.verdict.match_type.as_str(),
                    entry.song.title,
                    entry.song.artist,
                    format_duration(entry.song.duration),
                    entry.song.id
                );
            }
        }
        return Ok(());
    }

    let groups = find_duplicate_groups_with_mode(&songs, threshold, mode);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    for (idx, group) in groups.iter().enumerate() {
        println!(
            "Group {}: {} - {} ({} songs)",
            idx + 1,
            group.title(),
            group.artist(),
            group.count()
        );
        println!(
            "  seed                  {} [{}] {}",
            group.seed.file_path,
            format_duration(group.seed.duration),
            group.seed.id
        );
        for member in &group.members {
            println!(
                "  {:.3} {:<15} {} [{}] {}",
                member.similarity,
                member.match_type.as_str(),
                member.song.file_path,
                format_duration(member.song.duration),
                member.song.id
            );
        }
    }
    println!("{} duplicate groups", groups.len());

    Ok(())
}
