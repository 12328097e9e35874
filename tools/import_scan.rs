use std::env;
use std::path::PathBuf;

use library::{collect_audio_files, import_files, ImportStatus, Library};
use tools::config::{config_path_from_env, load_or_create_config, resolve_music_root, resolve_path};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tools::init_tracing();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Wrote default config to {:?}", config_path);
    }

    let mut inputs: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        let root = resolve_music_root(&config_path, &config.music_root)
            .ok_or("no paths given and music_root is not set")?;
        inputs.push(root);
    }

    let library_path = resolve_path(&config_path, &config.library_path);
    let library = Library::open(&library_path)?;

    let files = collect_audio_files(&inputs, config.recursive_scan);
    info!("Found {} audio files", files.len());

    let report = import_files(&library, &files, &config.import_options(), |progress| {
        if progress.status == ImportStatus::Processing {
            info!(
                "[{}/{}] {}",
                progress.current,
                progress.total,
                progress.file.as_deref().unwrap_or("")
            );
        }
    });

    for failure in &report.errors {
        eprintln!("failed: {} ({})", failure.path, failure.error);
    }
    println!(
        "{} imported, {} skipped, {} failed",
        report.imported, report.skipped, report.failed
    );

    Ok(())
}
