//! mkvtag CLI
//!
//! Inspect and edit Matroska tags and attachments from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matroska_tags::{MatroskaFile, SimpleTag};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mkvtag")]
#[command(version)]
#[command(about = "Matroska tag inspection and editing tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tags, attachments, and stream properties
    #[command(name = "t")]
    List {
        /// Matroska file to inspect
        file: PathBuf,

        /// Verbose output (includes parse defects)
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the values of one tag name
    Get {
        file: PathBuf,

        /// Tag name (case-insensitive, e.g. TITLE)
        name: String,

        /// Tag language code (default: no language)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Set a tag to the given values (no values removes the tag)
    Set {
        file: PathBuf,

        /// Tag name (case-insensitive)
        name: String,

        /// Values to store
        values: Vec<String>,

        /// Tag language code (default: no language)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Extract attachments
    #[command(name = "x")]
    Extract {
        file: PathBuf,

        /// Directory to extract to (default: current directory)
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { file, verbose } => list(&file, verbose)?,
        Commands::Get { file, name, language } => get(&file, &name, language.as_deref())?,
        Commands::Set { file, name, values, language } => {
            set(&file, &name, &values, language.as_deref())?
        }
        Commands::Extract { file, directory } => extract(&file, &directory)?,
    }

    Ok(())
}

fn open(path: &Path) -> Result<MatroskaFile> {
    MatroskaFile::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn list(path: &Path, verbose: bool) -> Result<()> {
    let mut file = open(path)?;

    let props = file.properties().clone();
    if let Some(rate) = props.audio_sample_rate {
        let channels = props.audio_channels.unwrap_or(1);
        println!("audio: {} Hz, {} channel(s)", rate, channels);
    }
    if let (Some(w), Some(h)) = (props.video_width, props.video_height) {
        println!("video: {}x{}", w, h);
    }
    if let Some(duration) = props.duration {
        println!("duration: {} ms", duration.as_millis());
    }

    for tag in file.tags().tags() {
        println!("tag (target {}):", tag.target.effective_value());
        for st in &tag.simple_tags {
            print_simple_tag(st, 1);
        }
    }

    for att in file.attachments() {
        println!(
            "attachment: {} ({}, {} bytes, {:?})",
            att.filename,
            att.mime_type,
            att.len(),
            att.role()
        );
    }

    if verbose {
        for defect in file.defects() {
            eprintln!("defect: {}", defect);
        }
    }

    Ok(())
}

fn print_simple_tag(st: &SimpleTag, indent: usize) {
    let pad = "  ".repeat(indent);
    let language = st.language.as_deref().map(|l| format!(" [{}]", l)).unwrap_or_default();
    match &st.value {
        Some(value) => println!("{}{}{} = {}", pad, st.name(), language, value),
        None => println!("{}{}{}", pad, st.name(), language),
    }
    for child in &st.children {
        print_simple_tag(child, indent + 1);
    }
}

fn get(path: &Path, name: &str, language: Option<&str>) -> Result<()> {
    let mut file = open(path)?;
    for value in file.tag().get(name, language) {
        println!("{}", value);
    }
    Ok(())
}

fn set(path: &Path, name: &str, values: &[String], language: Option<&str>) -> Result<()> {
    let mut file = open(path)?;
    let values: Vec<&str> = values.iter().map(String::as_str).collect();
    file.tag()
        .set(name, language, &values)
        .with_context(|| format!("failed to set {}", name))?;
    file.save().with_context(|| format!("failed to save {}", path.display()))?;
    Ok(())
}

fn extract(path: &Path, directory: &Path) -> Result<()> {
    let mut file = open(path)?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;

    let mut extracted = 0usize;
    for att in file.attachments() {
        // Only the final path component: attachment names are untrusted.
        let name = Path::new(&att.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("attachment-{}", att.uid));
        let target = directory.join(name);
        let data = att.data().unwrap_or(&[]);
        std::fs::write(&target, data)
            .with_context(|| format!("failed to write {}", target.display()))?;
        println!("extracted {} ({} bytes)", target.display(), data.len());
        extracted += 1;
    }

    if extracted == 0 {
        println!("no attachments");
    }
    Ok(())
}
