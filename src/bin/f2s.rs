use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    process,
};
use tracing_subscriber::EnvFilter;

use f2s::{
    BatchReport, Config, DependencyGraph, Scope,
    batch::run_assign,
    bootstrap::{assign_roles, create_master, create_nodes, prefetch, prepare_data},
    compose::assemble,
    graph::build_from_serialized,
    json_output::{DoctorJsonOutput, ReportJsonOutput},
    library_graph,
    lint::lint_builtin_rules,
    loader::load_serialized_graph_from_path,
    parse_scopes,
    resource_meta::render_all,
    source::{FileSource, NodeSource, StubNodes},
    store::MemoryStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "f2s",
    version,
    about = "Translate deployment task graphs into resources and events"
)]
struct Cli {
    /// Configuration file (JSON, or TOML with the `toml` feature).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create resources and events for the tasks of the given scopes.
    Assign(AssignArgs),
    /// Create node resources.
    Nodes(NodesArgs),
    /// Create the master node and key generation resources.
    Master(MasterArgs),
    /// Create role resources for nodes.
    Roles(NodesArgs),
    /// Create per-node cluster data resources.
    Prep(PrepArgs),
    /// Refresh per-node data resources with the nodes' deployment facts.
    Prefetch(PrefetchArgs),
    /// Render resource definitions for library tasks.
    T2r(T2rArgs),
    /// Render compositions for a task library.
    G2vr(G2vrArgs),
    /// Check a task graph without touching any store.
    Doctor(DoctorArgs),
    /// Print tasks in dependency order.
    Order(GraphInput),
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Store snapshot read before and written after the run.
    #[arg(long = "store", default_value = "f2s-store.yaml")]
    store: PathBuf,
    /// Print the outcome report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct AssignArgs {
    /// Environment (cluster) id.
    env: String,
    /// Node ids to assign; `null` selects the anchor scope.
    #[arg(required = true)]
    scopes: Vec<String>,
    /// Serialized task graph dump (YAML or JSON).
    #[arg(long = "graph")]
    graph: PathBuf,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct NodeSourceArgs {
    /// Node inventory (YAML).
    #[arg(long = "nodes")]
    nodes: Option<PathBuf>,
    /// Use the deterministic offline node source.
    #[arg(long = "stub")]
    stub: bool,
}

#[derive(Args, Debug)]
struct NodesArgs {
    uids: Vec<String>,
    #[command(flatten)]
    source: NodeSourceArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct MasterArgs {
    env: String,
    #[command(flatten)]
    source: NodeSourceArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct PrepArgs {
    env: String,
    uids: Vec<String>,
    /// Also load deployment facts into the created resources.
    #[arg(long = "facts")]
    facts: bool,
    #[command(flatten)]
    source: NodeSourceArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct PrefetchArgs {
    env: String,
    uids: Vec<String>,
    #[command(flatten)]
    source: NodeSourceArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct T2rArgs {
    /// Only these task ids (default: all).
    tasks: Vec<String>,
    #[arg(long = "library")]
    library: PathBuf,
    /// Output directory; one subdirectory per task.
    #[arg(long = "out", required_unless_present = "preview")]
    out: Option<PathBuf>,
    /// Print the rendered metadata instead of writing it.
    #[arg(long = "preview")]
    preview: bool,
}

#[derive(Args, Debug)]
struct G2vrArgs {
    #[arg(long = "library")]
    library: PathBuf,
    #[arg(long = "out")]
    out: PathBuf,
    /// Remove previously generated compositions first.
    #[arg(long = "clean")]
    clean: bool,
}

#[derive(Args, Debug)]
struct GraphInput {
    /// Task library directory.
    #[arg(long = "library", conflicts_with = "graph", required_unless_present = "graph")]
    library: Option<PathBuf>,
    /// Serialized task graph dump.
    #[arg(long = "graph")]
    graph: Option<PathBuf>,
    /// Environment label used in diagnostics for `--graph`.
    #[arg(long = "env", default_value = "0")]
    env: String,
    /// Scopes to load from `--graph` (default: all).
    scopes: Vec<String>,
}

#[derive(Args, Debug)]
struct DoctorArgs {
    #[command(flatten)]
    input: GraphInput,
    /// Emit a machine readable result.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Assign(args) => handle_assign(args, &config),
        Commands::Nodes(args) => {
            let source = node_source(&args.source, &config)?;
            with_store(&args.store, |store| {
                Ok(create_nodes(source.as_ref(), store, &config, &args.uids)?)
            })
        }
        Commands::Master(args) => {
            let source = node_source(&args.source, &config)?;
            with_store(&args.store, |store| {
                Ok(create_master(source.as_ref(), store, &config, &args.env)?)
            })
        }
        Commands::Roles(args) => {
            let source = node_source(&args.source, &config)?;
            with_store(&args.store, |store| {
                Ok(assign_roles(source.as_ref(), store, &config, &args.uids)?)
            })
        }
        Commands::Prep(args) => {
            let source = if args.facts {
                Some(node_source(&args.source, &config)?)
            } else {
                None
            };
            with_store(&args.store, |store| {
                let mut report = prepare_data(store, &config, &args.env, &args.uids);
                if let Some(source) = &source {
                    report.merge(prefetch(source.as_ref(), store, &args.env, &args.uids)?);
                }
                Ok(report)
            })
        }
        Commands::Prefetch(args) => {
            let source = node_source(&args.source, &config)?;
            with_store(&args.store, |store| {
                Ok(prefetch(source.as_ref(), store, &args.env, &args.uids)?)
            })
        }
        Commands::T2r(args) => handle_t2r(args, &config),
        Commands::G2vr(args) => handle_g2vr(args, &config),
        Commands::Doctor(args) => handle_doctor(args),
        Commands::Order(input) => handle_order(input),
    }
}

fn node_source(args: &NodeSourceArgs, config: &Config) -> Result<Box<dyn NodeSource>> {
    if args.stub || config.stub_nodes {
        return Ok(Box::new(StubNodes));
    }
    let path = args
        .nodes
        .clone()
        .context("no node source: pass --nodes <inventory> or --stub")?;
    Ok(Box::new(FileSource::new(None, Some(path))))
}

/// Load the store snapshot, run `op`, save the snapshot and print the report.
fn with_store(
    args: &StoreArgs,
    op: impl FnOnce(&mut MemoryStore) -> Result<BatchReport>,
) -> Result<()> {
    let mut store = MemoryStore::load_from_path(&args.store)?;
    let outcome = op(&mut store);
    // Partial progress is kept even when the batch stopped on a fatal error.
    store
        .save_to_path(&args.store)
        .with_context(|| format!("failed to save {}", args.store.display()))?;
    print_report(&outcome?, args.json)
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", ReportJsonOutput::new(report).to_json_string()?);
    } else {
        for name in &report.created {
            println!("created  {name}");
        }
        for name in &report.existing {
            println!("existing {name}");
        }
        for name in &report.updated {
            println!("updated  {name}");
        }
        for link in &report.connected {
            println!("owned    {} -> {}", link.parent, link.child);
        }
        for failure in &report.failures {
            eprintln!(
                "FAIL {} {}: {}",
                failure.stage, failure.subject, failure.message
            );
        }
        println!("{}", report.summary());
    }
    if report.is_clean() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} operation(s) failed; rerun to finish",
            report.failures.len()
        )
    }
}

fn handle_assign(args: AssignArgs, config: &Config) -> Result<()> {
    let scopes = parse_scopes(&args.scopes);
    let source = FileSource::new(Some(args.graph.clone()), None);
    with_store(&args.store, |store| {
        Ok(run_assign(&source, store, config, &args.env, &scopes)?)
    })
}

fn handle_t2r(args: T2rArgs, config: &Config) -> Result<()> {
    let graph = library_graph(&args.library)?;
    let selected = graph
        .tasks()
        .filter(|task| args.tasks.is_empty() || args.tasks.contains(&task.id));
    let (metas, skipped) = render_all(selected, config);
    for id in &skipped {
        tracing::info!("skipping {id}: no resource handler");
    }

    for meta in &metas {
        if args.preview {
            println!("--- {}", meta.id);
            print!("{}", serde_yaml_bw::to_string(meta)?);
        } else if let Some(out) = &args.out {
            std::fs::create_dir_all(out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let path = meta.write_under(out)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn handle_g2vr(args: G2vrArgs, config: &Config) -> Result<()> {
    let graph = library_graph(&args.library)?;
    let compositions = assemble(&graph, config)?;
    if args.clean && args.out.exists() {
        std::fs::remove_dir_all(&args.out)
            .with_context(|| format!("failed to clean {}", args.out.display()))?;
    }
    let written = compositions.write_all(&args.out, config)?;
    for id in &compositions.conditional {
        tracing::info!("{id} is conditional");
    }
    println!(
        "{} compositions, {} collections written to {}",
        compositions.singles.len(),
        compositions.collections.len(),
        args.out.display()
    );
    tracing::debug!("{} files", written.len());
    Ok(())
}

fn load_graph(input: &GraphInput) -> f2s::Result<DependencyGraph> {
    if let Some(library) = &input.library {
        return library_graph(library);
    }
    let path = input
        .graph
        .as_deref()
        .ok_or_else(|| f2s::F2sError::source("pass --library or --graph"))?;
    let serialized = load_serialized_graph_from_path(path)?;
    let scopes: Vec<Scope> = if input.scopes.is_empty() {
        serialized.tasks_graph.keys().cloned().collect()
    } else {
        parse_scopes(&input.scopes)
    };
    build_from_serialized(serialized, &input.env, &scopes)
}

fn input_label(input: &GraphInput) -> Option<String> {
    input
        .library
        .as_deref()
        .or(input.graph.as_deref())
        .map(Path::display)
        .map(|p| p.to_string())
}

fn handle_doctor(args: DoctorArgs) -> Result<()> {
    let label = input_label(&args.input);
    if args.json {
        let output = match load_graph(&args.input) {
            Ok(graph) => DoctorJsonOutput::from_graph(&graph, label),
            Err(err) => DoctorJsonOutput::error(err),
        };
        let ok = output.ok;
        println!("{}", output.into_string());
        if !ok {
            process::exit(1);
        }
        return Ok(());
    }

    let graph = load_graph(&args.input)?;
    let mut problems = lint_builtin_rules(&graph);
    if let Err(err) = graph.topological_sort() {
        problems.push(err.to_string());
    }
    let label = label.unwrap_or_default();
    if problems.is_empty() {
        println!(
            "OK  {} ({} tasks, {} edges)",
            label,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("ERR {label}: {problem}");
        }
        anyhow::bail!("{} problem(s) found", problems.len())
    }
}

fn handle_order(input: GraphInput) -> Result<()> {
    let graph = load_graph(&input)?;
    for key in graph.topological_sort()? {
        println!("{key}");
    }
    Ok(())
}
