//! Operator tool driving the document pipeline in-process.
//!
//! Shares configuration with the HTTP binary, so the same `.env` selects the storage backend,
//! search service, and chat deployment.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use docqna::{
    config, logging,
    pipeline::{ContainerKind, DocumentApi, DocumentService, RefreshOutcome, UploadOutcome},
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "docqna-cli", about = "Stage, promote, and query documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stage PDF files. Directories are searched recursively.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Promote staged documents into the query container.
    Prepare {
        names: Vec<String>,
        /// Promote everything currently staged.
        #[arg(long, conflicts_with = "names")]
        all: bool,
    },
    /// Ask a question against the indexed documents.
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Remove a staged document.
    Delete { name: String },
    /// Clear the query container.
    Empty,
    /// List documents in a container.
    List {
        #[arg(long, value_enum, default_value = "staging")]
        container: ContainerArg,
    },
    /// Download a stored document.
    Fetch {
        name: String,
        #[arg(long, value_enum, default_value = "staging")]
        container: ContainerArg,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ContainerArg {
    Staging,
    Query,
}

impl From<ContainerArg> for ContainerKind {
    fn from(value: ContainerArg) -> Self {
        match value {
            ContainerArg::Staging => ContainerKind::Staging,
            ContainerArg::Query => ContainerKind::Query,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();
    let service = DocumentService::from_config(config).context("failed to initialize pipeline")?;

    match cli.command {
        Command::Upload { paths } => upload(&service, &paths).await,
        Command::Prepare { names, all } => prepare(&service, names, all).await,
        Command::Ask { question } => {
            let answer = service.answer(&question.join(" ")).await?;
            println!("{answer}");
            Ok(())
        }
        Command::Delete { name } => {
            service.delete(&name).await?;
            println!("deleted {name}");
            Ok(())
        }
        Command::Empty => {
            let report = service.reset_query_container().await?;
            println!("cleared {} document(s)", report.deleted);
            print_refresh(&report.refresh);
            Ok(())
        }
        Command::List { container } => {
            for name in service.list(container.into()).await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Fetch {
            name,
            container,
            output,
        } => {
            let object = service.fetch(container.into(), &name).await?;
            fs::write(&output, &object.content)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "wrote {} byte(s) to {}",
                object.content.len(),
                output.display()
            );
            Ok(())
        }
    }
}

async fn upload(service: &DocumentService, paths: &[PathBuf]) -> Result<()> {
    let files = collect_pdfs(paths)?;
    if files.is_empty() {
        bail!("no PDF files found");
    }
    for file in files {
        let content =
            fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
        let name = file.to_string_lossy();
        match service
            .upload(&name, Bytes::from(content), "application/pdf")
            .await?
        {
            UploadOutcome::Stored(name) => println!("staged {name}"),
            UploadOutcome::AlreadyExists(name) => println!("skipped {name} (already staged)"),
        }
    }
    Ok(())
}

fn collect_pdfs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("{} does not exist", path.display());
        }
    }
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

async fn prepare(service: &DocumentService, names: Vec<String>, all: bool) -> Result<()> {
    let names = if all {
        service.list(ContainerKind::Staging).await?
    } else {
        names
    };
    if names.is_empty() {
        bail!("no documents to promote");
    }

    let report = service.promote(&names).await?;
    for doc in &report.documents {
        match &doc.outcome {
            Ok(()) => println!("promoted {}", doc.name),
            Err(failure) => println!("failed   {}: {failure}", doc.name),
        }
    }
    print_refresh(&report.refresh);
    Ok(())
}

fn print_refresh(refresh: &RefreshOutcome) {
    match refresh {
        RefreshOutcome::Requested => println!("indexer refresh requested"),
        RefreshOutcome::Throttled { message } => {
            println!("indexer refresh throttled ({message}); search results may lag")
        }
    }
}
