//! # flowfile-cli
//!
//! Run, check, and export flow documents from the command line.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use flowfile_core::doc::FlowDocument;
use flowfile_core::exec::{ExecutionEngine, ExecutionEvent};
use flowfile_core::schema::SchemaState;
use flowfile_core::{CancelToken, FlowGraph};
use flowfile_store::{FileGraphStore, GraphStore};

#[derive(Parser)]
#[command(name = "flowfile")]
#[command(about = "Flowfile CLI - run, check, and export flow documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document, execute it, and print the final status
    Run {
        /// Path to the YAML or JSON document
        file: PathBuf,

        /// Root directory for sample caches
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Directory the document is saved back into when auto_save is set
        #[arg(long, default_value = "graphs")]
        store_dir: PathBuf,
    },

    /// Validate structure, connectivity, and predicted schemas
    Check {
        /// Path to the YAML or JSON document
        file: PathBuf,
    },

    /// Emit an equivalent fluent script to stdout
    Export {
        /// Path to the YAML or JSON document
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            file,
            cache_dir,
            store_dir,
        } => run(&file, &cache_dir, &store_dir),
        Commands::Check { file } => check(&file),
        Commands::Export { file } => export(&file),
    };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(file: &PathBuf) -> Result<FlowGraph, Box<dyn std::error::Error>> {
    Ok(FlowDocument::load_file(file)?.into_graph()?)
}

fn run(
    file: &PathBuf,
    cache_dir: &PathBuf,
    store_dir: &PathBuf,
) -> Result<bool, Box<dyn std::error::Error>> {
    let graph = load(file)?;
    let show_progress = graph.settings.show_progress;
    let auto_save = graph.settings.auto_save;

    let engine = ExecutionEngine::new().with_cache_root(cache_dir);
    let (mut rx, handle) = engine.run_detached(graph, CancelToken::new());

    while let Some(event) = rx.blocking_recv() {
        if !show_progress {
            continue;
        }
        match event {
            ExecutionEvent::Node {
                node_id,
                state,
                duration_ms,
                rows,
                cached,
                error,
                ..
            } => {
                let mut line = format!("node {} {:?}", node_id, state);
                if let Some(ms) = duration_ms {
                    line.push_str(&format!(" ({} ms)", ms));
                }
                if let Some(rows) = rows {
                    line.push_str(&format!(" {} rows", rows));
                }
                if cached {
                    line.push_str(" [cached]");
                }
                if let Some(err) = error {
                    line.push_str(&format!(": {}", err));
                }
                println!("  {}", line);
            }
            ExecutionEvent::Finished {
                success,
                nodes_completed,
                nodes_failed,
                ..
            } => {
                println!(
                    "finished: {} ({} completed, {} failed)",
                    if success { "ok" } else { "failed" },
                    nodes_completed,
                    nodes_failed
                );
            }
        }
    }

    let (graph, report) = handle.join().expect("run thread panicked");
    let report = report?;

    if report.success && auto_save {
        let store = FileGraphStore::new(store_dir);
        let doc = FlowDocument::from_graph(&graph)?;
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(store.put(&doc))?;
        println!("✓ saved graph {} to {}", doc.graph_id, store_dir.display());
    }

    if report.success {
        println!("✓ run succeeded");
    } else {
        eprintln!("✗ run failed");
    }
    Ok(report.success)
}

fn check(file: &PathBuf) -> Result<bool, Box<dyn std::error::Error>> {
    let graph = load(file)?;
    let mut ok = true;

    for id in graph.node_ids() {
        if let Err(e) = graph.check_arity(id) {
            eprintln!("✗ {}", e);
            ok = false;
        }
    }
    for node in graph.nodes() {
        match &node.schema_state {
            SchemaState::Known(schema) => {
                println!("  node {} ({}): {}", node.id, node.kind(), schema);
            }
            SchemaState::Partial { known, dynamic } => {
                println!(
                    "  node {} ({}): {} + dynamic columns ({})",
                    node.id,
                    node.kind(),
                    known,
                    dynamic
                );
            }
            SchemaState::Unknown { reason } => {
                eprintln!("✗ node {} ({}): schema unknown: {}", node.id, node.kind(), reason);
                ok = false;
            }
        }
    }

    if ok {
        println!("✓ {} nodes, {} edges, schemas resolved", graph.node_count(), graph.edges().len());
    }
    Ok(ok)
}

fn export(file: &PathBuf) -> Result<bool, Box<dyn std::error::Error>> {
    let graph = load(file)?;
    print!("{}", flowfile_core::codegen::export_script(&graph)?);
    Ok(true)
}
