/// Report (and optionally remove) upload-area files no question references.
/// The server never deletes attachment files itself; run this by hand or from cron.
/// Files modified in the last `--min-age-minutes` are left alone, since the
/// server stores a question's files just before it saves the question.
///
/// Usage: purge-attachments [--delete] [--min-age-minutes N]
///   --delete          : remove the orphaned files instead of only listing them
///   --min-age-minutes : only consider files at least this old (default 60)

use std::collections::HashSet;
use std::time::Duration;

use clap::Parser;

use course_board_api::{
    config::Config,
    db::{encoding::legacy_encoding, CsvTable},
    models::question::Question,
    services::uploads::UploadArea,
};

#[derive(Parser)]
#[command(name = "purge-attachments", about = "Find attachment files no question refers to")]
struct Args {
    /// Delete the orphaned files (default: list only)
    #[arg(long)]
    delete: bool,

    /// Skip files modified more recently than this many minutes ago
    #[arg(long, default_value_t = 60)]
    min_age_minutes: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = Config::from_env()?;

    let questions = CsvTable::<Question>::new(
        config.questions_path(),
        legacy_encoding(&config.legacy_encoding),
    );
    // A question file that cannot be read must not make every upload look orphaned.
    let referenced: HashSet<String> = questions
        .list_strict()
        .await?
        .into_iter()
        .flat_map(|q| q.attachments)
        .collect();

    let uploads = UploadArea::new(config.upload_dir.clone());
    let min_age = Duration::from_secs(args.min_age_minutes.saturating_mul(60));
    let orphans: Vec<String> = uploads
        .names_older_than(min_age)
        .await?
        .into_iter()
        .filter(|name| !referenced.contains(name))
        .collect();

    tracing::info!(
        "{} file(s) referenced, {} orphaned in {} (ignoring files newer than {} min)",
        referenced.len(),
        orphans.len(),
        uploads.dir().display(),
        args.min_age_minutes
    );

    for name in &orphans {
        if args.delete {
            match tokio::fs::remove_file(uploads.dir().join(name)).await {
                Ok(()) => tracing::info!("Removed {}", name),
                Err(e) => tracing::error!("Could not remove {}: {}", name, e),
            }
        } else {
            println!("{name}");
        }
    }

    Ok(())
}
