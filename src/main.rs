use clap::{Parser, Subcommand};
use std::path::PathBuf;

use corpus_annotate::config::ViewerConfig;
use corpus_annotate::constants::NO_EDITS_MESSAGE;
use corpus_annotate::corpus::Corpus;
use corpus_annotate::edits::{EditError, EditStore};
use corpus_annotate::export::export_edits;
use corpus_annotate::highlight::{card_text, AnnotationDiff};
use corpus_annotate::serve::serve_viewer;
use corpus_annotate::slot::FileSlotStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "View a booster/hedge corpus and correct its word annotations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the viewer API
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write all persisted edits to a timestamped backup file
    Export {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory to write the backup into (overrides config file)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the highlighted markup of one record with its current edits
    Render {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Record id
        id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Serve { config, port } => serve(config, port),
        Command::Export { config, output_dir } => export(config, output_dir),
        Command::Render { config, id } => render(config, id),
    }
}

fn serve(config_path: PathBuf, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ViewerConfig::load(&config_path)?;
    let port = port_override.unwrap_or(config.api_port);

    // Blocking fetch, must finish before the server runtime starts
    let corpus = Corpus::load(&config.corpus, config.profiles.as_deref())?;

    serve_viewer(config, corpus, port)
}

fn export(config_path: PathBuf, output_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ViewerConfig::load(&config_path)?;
    let store = EditStore::open(FileSlotStore::new(&config.state_dir));
    let dir = output_dir.unwrap_or_else(|| config.export_dir().to_path_buf());

    match export_edits(&store, &dir) {
        Ok(response) => {
            println!(
                "Exported edits for {} records to {}",
                response.edited_count,
                response.path.display()
            );
            Ok(())
        }
        Err(EditError::NothingToExport) => {
            println!("{}", NO_EDITS_MESSAGE);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn render(config_path: PathBuf, id: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = ViewerConfig::load(&config_path)?;
    let corpus = Corpus::load(&config.corpus, None)?;
    let store = EditStore::open(FileSlotStore::new(&config.state_dir));

    let record = corpus
        .record(&id)
        .ok_or_else(|| format!("Record '{}' not found", id))?;
    let entry = store.entry(&id);

    println!("{}", card_text(record, entry));

    if !store.is_edited(&id) {
        return Ok(());
    }

    let diff = AnnotationDiff::compute(record, entry);
    println!();
    if diff.is_unchanged() {
        println!("Edited, but annotations match the original");
    } else {
        println!("Added boosters:   {:?}", diff.added_boosters);
        println!("Added hedges:     {:?}", diff.added_hedges);
        println!("Kept boosters:    {:?}", diff.kept_boosters);
        println!("Kept hedges:      {:?}", diff.kept_hedges);
        println!("Removed boosters: {:?}", diff.removed_boosters);
        println!("Removed hedges:   {:?}", diff.removed_hedges);
    }

    Ok(())
}
