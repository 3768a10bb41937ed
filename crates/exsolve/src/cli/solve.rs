//! The `exsolve solve` command: answer images and write the document.

use clap::{Args, ValueEnum};
use exsolve_core::pipeline::{FileDiscovery, ProgressEvent};
use exsolve_core::{
    AnswerDocument, ChannelProgress, Config, DocumentFormat, Exsolver, Session,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Arguments for the `solve` command.
#[derive(Args, Debug)]
pub struct SolveArgs {
    /// Image files or directories, answered in the order given
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Extra instructions for every image without its own
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Extra instructions for a single image
    #[arg(long = "item-instructions", value_name = "PATH=TEXT", value_parser = parse_item_instructions)]
    pub item_instructions: Vec<(PathBuf, String)>,

    /// Document format (defaults to document.format from config)
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Directory to write the document to (defaults to document.output_dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Document file name; derived from student and group when omitted
    #[arg(long)]
    pub output_name: Option<String>,

    /// Student name for the document header
    #[arg(long)]
    pub student: Option<String>,

    /// Group or class for the document header
    #[arg(long)]
    pub group: Option<String>,

    /// Maximum number of concurrent workers
    #[arg(short, long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub workers: Option<usize>,

    /// Gemini API key for this run (overrides gemini.api_key)
    #[arg(long)]
    pub api_key: Option<String>,
}

/// Supported document formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Markdown,
    Text,
    Json,
    Jsonl,
}

impl From<Format> for DocumentFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Markdown => DocumentFormat::Markdown,
            Format::Text => DocumentFormat::Text,
            Format::Json => DocumentFormat::Json,
            Format::Jsonl => DocumentFormat::JsonLines,
        }
    }
}

fn parse_item_instructions(raw: &str) -> Result<(PathBuf, String), String> {
    let (path, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=TEXT, got '{raw}'"))?;
    if path.trim().is_empty() {
        return Err("image path must not be empty".to_string());
    }
    Ok((PathBuf::from(path.trim()), text.to_string()))
}

/// Document settings after merging flags over config.
#[derive(Debug, PartialEq)]
struct DocumentSettings {
    student: String,
    group: String,
    format: DocumentFormat,
    output_dir: PathBuf,
    filename: String,
    instructions: Option<String>,
}

fn resolve_settings(args: &SolveArgs, config: &Config) -> anyhow::Result<DocumentSettings> {
    let doc = &config.document;
    let student = args.student.clone().unwrap_or_else(|| doc.student_name.clone());
    let group = args.group.clone().unwrap_or_else(|| doc.group.clone());

    if student.trim().is_empty() {
        anyhow::bail!("Please enter student name (--student or document.student_name)");
    }
    if group.trim().is_empty() {
        anyhow::bail!("Please enter group (--group or document.group)");
    }

    let format = match args.format {
        Some(format) => format.into(),
        None => DocumentFormat::parse(&doc.format)
            .ok_or_else(|| anyhow::anyhow!("Unknown document format '{}'", doc.format))?,
    };

    let output_dir = match &args.output_dir {
        Some(dir) => PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).into_owned()),
        None => config.output_dir(),
    };

    let custom_name = args.output_name.as_deref().unwrap_or(&doc.output_filename);
    let filename = AnswerDocument::output_filename(&student, &group, custom_name);

    let instructions = args
        .instructions
        .clone()
        .or_else(|| Some(doc.instructions.clone()))
        .filter(|text| !text.trim().is_empty());

    Ok(DocumentSettings {
        student,
        group,
        format,
        output_dir,
        filename,
        instructions,
    })
}

/// Execute the solve command.
pub async fn execute(args: SolveArgs, mut config: Config) -> anyhow::Result<()> {
    let settings = resolve_settings(&args, &config)?;
    if let Some(workers) = args.workers {
        config.pipeline.max_workers = workers;
    }

    let files = FileDiscovery::default().discover(&args.inputs);
    if files.is_empty() {
        anyhow::bail!("Please select at least one image (no supported images found)");
    }
    tracing::info!(
        "Found {} images ({:.1} KB)",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1024.0
    );

    let mut session = Session::new(settings.student.clone(), settings.group.clone());
    for file in &files {
        session.add_image(file.path.clone());
    }
    if let Some(text) = &settings.instructions {
        session.set_instructions(text.clone());
    }
    for (path, text) in args.item_instructions {
        if !session.images().contains(&path) {
            tracing::warn!("--item-instructions for {:?} matches no input image", path);
            continue;
        }
        session.set_image_instructions(path, text);
    }

    let exsolver = Exsolver::new(config, args.api_key.as_deref())?;

    let (sink, events) = ChannelProgress::new();
    let progress = progress_bar(files.len() as u64);
    let watcher = tokio::spawn(drive_progress(progress.clone(), events));

    let outcome = exsolver.run(&session, Arc::new(sink)).await;
    watcher.abort();

    let results = match outcome {
        Ok(results) => {
            progress.finish_and_clear();
            results
        }
        Err(e) => {
            progress.abandon_with_message("Error occurred");
            return Err(e.into());
        }
    };

    let document = AnswerDocument::from_results(&settings.student, &settings.group, &results);
    let path = document.save(&settings.output_dir, &settings.filename, settings.format)?;

    let errors = results.error_count();
    if errors > 0 {
        tracing::warn!(
            "{errors} of {} images failed; their entries in the document start with \"Error:\"",
            results.len()
        );
    }
    tracing::info!("Document saved to {}", path.display());
    println!("{}", path.display());

    Ok(())
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => tracing::debug!("Falling back to default progress style: {e}"),
    }
    pb
}

async fn drive_progress(pb: ProgressBar, mut events: UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Status(message) => pb.set_message(message),
            ProgressEvent::ItemDone(_) => pb.inc(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SolveArgs,
    }

    fn parse(argv: &[&str]) -> SolveArgs {
        let mut full = vec!["solve"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_parse_item_instructions() {
        assert_eq!(
            parse_item_instructions("p1.png=Only exercise 2=b").unwrap(),
            (PathBuf::from("p1.png"), "Only exercise 2=b".to_string())
        );
        assert!(parse_item_instructions("no-separator").is_err());
        assert!(parse_item_instructions("=text").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = parse(&[
            "a.png",
            "dir",
            "--item-instructions",
            "a.png=Use past tense.",
            "--format",
            "jsonl",
            "-w",
            "3",
        ]);
        assert_eq!(args.inputs, vec![PathBuf::from("a.png"), PathBuf::from("dir")]);
        assert_eq!(args.item_instructions.len(), 1);
        assert_eq!(args.format, Some(Format::Jsonl));
        assert_eq!(args.workers, Some(3));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(TestCli::try_parse_from(["solve", "a.png", "--workers", "0"]).is_err());
        assert!(TestCli::try_parse_from(["solve"]).is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.document.student_name = "Ana Pop".to_string();
        config.document.group = "10 B".to_string();
        config.document.format = "text".to_string();
        config.document.instructions = "Answer in English.".to_string();

        let settings = resolve_settings(&parse(&["a.png"]), &config).unwrap();

        assert_eq!(settings.filename, "Ana_Pop_10_B");
        assert_eq!(settings.format, DocumentFormat::Text);
        assert_eq!(settings.instructions.as_deref(), Some("Answer in English."));
        assert_eq!(settings.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.document.student_name = "Ana Pop".to_string();
        config.document.group = "10B".to_string();
        config.document.instructions = "from config".to_string();

        let args = parse(&[
            "a.png",
            "--student",
            "Ion Ionescu",
            "--output-name",
            "homework",
            "--format",
            "json",
            "-i",
            "from flag",
        ]);
        let settings = resolve_settings(&args, &config).unwrap();

        assert_eq!(settings.student, "Ion Ionescu");
        assert_eq!(settings.group, "10B");
        assert_eq!(settings.filename, "homework");
        assert_eq!(settings.format, DocumentFormat::Json);
        assert_eq!(settings.instructions.as_deref(), Some("from flag"));
    }

    #[test]
    fn test_missing_student_rejected() {
        let config = Config::default();
        let err = resolve_settings(&parse(&["a.png", "--group", "10B"]), &config).unwrap_err();
        assert!(err.to_string().contains("student name"));
    }
}
