pub mod config;
pub mod model;
pub mod search;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use config::Config;
use model::doctype::Registry;
use search::compiler::CompileError;
use search::pagination::PageWindow;
use search::searcher::{SearchParams, Searcher};
use search::tantivy::{DocumentInput, TantivyIndex, index_dir};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "collectie",
    version,
    about = "Search the Collectie Groesbeek card indexes"
)]
pub struct Cli {
    /// Path to a TOML config file (defaults to $COLLECTIE_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override data dir holding the index. Defaults to platform data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a query and print the plan as JSON
    Compile {
        query: String,

        /// Restrict field names and weights to these document types
        #[arg(long = "doctype")]
        doctypes: Vec<String>,
    },
    /// Print the page numbers shown for a result page
    Pages {
        #[arg(long)]
        total: usize,

        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Defaults to the configured page size
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Add documents from JSON-lines files to the index
    Index {
        /// Files with one `{"id", "doctype", "fields", "year"?}` object per line
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run a search and print the result page as JSON
    Search {
        query: String,

        #[arg(long = "doctype")]
        doctypes: Vec<String>,

        /// Sort keys, e.g. `jaar` or `-jaar`
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Print one indexed card as JSON
    Show { id: String },
    /// Print the number of indexed cards, overall and per document type
    Stats,
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compile { query, doctypes } => {
            let config = Config::load(cli.config.as_deref())?;
            let selection = config.registry.select(&doctypes)?;
            match Registry::compiler(&selection).compile(&query.to_lowercase()) {
                Ok(compiled) => print_json(&compiled),
                Err(CompileError::EmptyQuery) => {
                    anyhow::bail!("enter a search term")
                }
            }
        }
        Commands::Pages {
            total,
            page,
            page_size,
        } => {
            let page_size = match page_size {
                Some(size) => size,
                None => Config::load(cli.config.as_deref())?.page_size,
            };
            let window = PageWindow::compute(total, page, page_size);
            print_json(&window.pages())
        }
        Commands::Index { files } => {
            let config = Config::load(cli.config.as_deref())?;
            let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
            let added = run_index(&config, &data_dir, &files)?;
            print_json(&serde_json::json!({ "added": added }))
        }
        Commands::Search {
            query,
            doctypes,
            sort,
            page,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
            let index = TantivyIndex::open_or_create(&index_dir(&data_dir)?, &config.registry)?;
            let outcome = Searcher::new(&config, &index).run(&SearchParams {
                q: query,
                doctypes,
                sort,
                page,
            })?;
            print_json(&outcome)
        }
        Commands::Show { id } => {
            let index = open_index(cli.config.as_deref(), cli.data_dir)?;
            match index.get(&id)? {
                Some(hit) => print_json(&hit),
                None => anyhow::bail!("no card with id `{id}`"),
            }
        }
        Commands::Stats => {
            let index = open_index(cli.config.as_deref(), cli.data_dir)?;
            print_json(&index.doc_counts()?)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "collectie", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
    }
}

/// Index every JSON line of `files`. Malformed lines are logged and skipped.
pub fn run_index(config: &Config, data_dir: &Path, files: &[PathBuf]) -> Result<usize> {
    let mut index = TantivyIndex::open_or_create(&index_dir(data_dir)?, &config.registry)?;
    let mut added = 0;
    for path in files {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening documents file {}", path.display()))?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let doc: DocumentInput = match serde_json::from_str(&line) {
                Ok(doc) => doc,
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        line = lineno + 1,
                        error = %err,
                        "document_parse_failed"
                    );
                    continue;
                }
            };
            if let Err(err) = index.add_document(&doc) {
                tracing::warn!(
                    file = %path.display(),
                    line = lineno + 1,
                    error = %err,
                    "document_rejected"
                );
                continue;
            }
            added += 1;
        }
    }
    index.commit()?;
    tracing::info!(added, files = files.len(), "index_done");
    Ok(added)
}

fn open_index(config: Option<&Path>, data_dir: Option<PathBuf>) -> Result<TantivyIndex> {
    let config = Config::load(config)?;
    let data_dir = data_dir.unwrap_or_else(default_data_dir);
    TantivyIndex::open_or_create(&index_dir(&data_dir)?, &config.registry)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("nl", "collectiegroesbeek", "collectie-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".collectie-search"))
}
