//! CLI for the extraction analysis engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extract_analysis::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "extract-plan")]
#[command(author, version, about = "Plan extract-method and extract-variable refactorings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan extracting the selected statements into a new method
    Method {
        /// Name of the new method
        #[arg(short, long)]
        name: String,

        /// Selection start, as a byte offset
        #[arg(short, long)]
        offset: usize,

        /// Selection length in bytes
        #[arg(short, long)]
        length: usize,

        /// Treat this name as the implicit closure parameter (e.g. "it")
        #[arg(long)]
        implicit_param: Option<String>,

        /// Source file to analyze
        path: PathBuf,
    },

    /// Plan extracting the selected expression into a new local variable
    Local {
        /// Name of the new variable
        #[arg(short, long)]
        name: String,

        /// Selection start, as a byte offset
        #[arg(short, long)]
        offset: usize,

        /// Selection length in bytes
        #[arg(short, long)]
        length: usize,

        /// Also replace every structurally identical expression
        #[arg(long)]
        replace_all: bool,

        /// Treat this name as the implicit closure parameter (e.g. "it")
        #[arg(long)]
        implicit_param: Option<String>,

        /// Source file to analyze
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Method {
            name,
            offset,
            length,
            implicit_param,
            path,
        } => {
            let module = load(&path, implicit_param)?;
            let outcome = ExtractMethod::new(name).plan(
                &module,
                Selection::new(offset, length),
                &DeclaredTypeResolver,
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Local {
            name,
            offset,
            length,
            replace_all,
            implicit_param,
            path,
        } => {
            let module = load(&path, implicit_param)?;
            let outcome = ExtractLocal::new(name)
                .replace_all(replace_all)
                .plan(&module, Selection::new(offset, length));
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn load(path: &PathBuf, implicit_param: Option<String>) -> Result<Module> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut options = BinderOptions::default();
    if let Some(name) = implicit_param {
        options = options.with_implicit_closure_param(name);
    }
    parse_module(&source, options).with_context(|| format!("failed to parse {}", path.display()))
}
