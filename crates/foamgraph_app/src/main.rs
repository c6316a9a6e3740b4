// SPDX-License-Identifier: MIT OR Apache-2.0
//! `foamgraph` command-line front end.
//!
//! Loads a scene file and inspects, validates, builds or generates it.

use clap::{Parser, Subcommand};
use foamgraph_app::{ProjectError, ProjectSettings, Session, SessionError};
use foamgraph_case::{CaseReport, FileOutcome, FileReport, GenerationReport};
use foamgraph_graph::{Finding, NodeId, Validation};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "foamgraph")]
#[command(about = "Compile OpenFOAM node graphs into case files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node and connection counts and the output nodes of a scene
    Info {
        /// Scene file (.json)
        scene: PathBuf,
    },
    /// Validate one output node, or every output node
    Validate {
        /// Scene file (.json)
        scene: PathBuf,
        /// Node to validate from
        #[arg(long)]
        root: Option<NodeId>,
    },
    /// Build the document under a node and print it as JSON
    Build {
        /// Scene file (.json)
        scene: PathBuf,
        /// Node to build from
        #[arg(long)]
        root: NodeId,
    },
    /// Generate files for one terminal node, or every terminal node
    Generate {
        /// Scene file (.json)
        scene: PathBuf,
        /// File or case output node
        #[arg(long)]
        root: Option<NodeId>,
        /// Output directory, overriding the project settings
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Project settings (.ron); defaults to foamgraph.ron next to the scene
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Cannot print document: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "foamgraph=info".parse::<tracing_subscriber::filter::Directive>() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}

/// Run a command; `Ok(false)` means it ran but found errors
fn run(command: Commands) -> Result<bool, CliError> {
    match command {
        Commands::Info { scene } => {
            let session = Session::open(&scene, ProjectSettings::default())?;
            show_info(&session);
            Ok(true)
        }
        Commands::Validate { scene, root } => {
            let session = Session::open(&scene, ProjectSettings::default())?;
            validate(&session, root)
        }
        Commands::Build { scene, root } => {
            let session = Session::open(&scene, ProjectSettings::default())?;
            match session.build(root)? {
                Ok(document) => {
                    println!("{}", serde_json::to_string_pretty(&document)?);
                    Ok(true)
                }
                Err(validation) => {
                    print_findings(root, &validation);
                    Ok(false)
                }
            }
        }
        Commands::Generate {
            scene,
            root,
            out,
            settings,
        } => {
            let settings_path = settings.unwrap_or_else(|| project_file_for(&scene));
            let mut settings = ProjectSettings::load_or_default(&settings_path)?;
            if let Some(out) = out {
                settings.generator.output_dir = out;
            }

            let mut session = Session::open(&scene, settings)?;
            let reports = match root {
                Some(root) => vec![session.generate(root)?],
                None => session.generate_all()?,
            };
            if reports.is_empty() {
                println!("No output nodes in {}", scene.display());
            }

            let mut ok = true;
            for report in &reports {
                ok &= match report {
                    GenerationReport::File(report) => print_file_report(report),
                    GenerationReport::Case(report) => print_case_report(report),
                };
            }
            let stats = session.cache_stats();
            tracing::info!("Built {} documents, {} cache hits", stats.builds, stats.hits);
            Ok(ok)
        }
    }
}

fn project_file_for(scene: &Path) -> PathBuf {
    let dir = scene.parent().unwrap_or_else(|| Path::new("."));
    ProjectSettings::project_file_path(dir)
}

fn show_info(session: &Session) {
    let graph = session.graph();
    println!("Nodes:       {}", graph.node_count());
    println!("Connections: {}", graph.connection_count());

    let outputs: Vec<_> = graph.output_nodes().collect();
    if outputs.is_empty() {
        println!("No output nodes");
        return;
    }
    println!("Output nodes:");
    for node in outputs {
        let name = if node.has_blank_name() { "-" } else { node.name() };
        println!("  {}  {:<12} {}", node.id, node.kind().display_name(), name);
    }
}

fn validate(session: &Session, root: Option<NodeId>) -> Result<bool, CliError> {
    let roots: Vec<NodeId> = match root {
        Some(root) => vec![root],
        None => session.graph().output_nodes().map(|n| n.id).collect(),
    };

    let mut ok = true;
    for root in roots {
        let validation = session.validate(root)?;
        print_findings(root, &validation);
        ok &= validation.is_clean();
    }
    Ok(ok)
}

fn print_finding(finding: &Finding) {
    println!(
        "  {:?} {:?} at {}: {}",
        finding.severity, finding.kind, finding.node, finding.message
    );
}

fn print_findings(root: NodeId, validation: &Validation) {
    if validation.findings().is_empty() {
        println!("{root}: ok");
        return;
    }
    println!(
        "{root}: {} errors, {} warnings",
        validation.errors().count(),
        validation.warnings().count()
    );
    validation.findings().iter().for_each(print_finding);
}

fn print_file_report(report: &FileReport) -> bool {
    let outcome = match (&report.outcome, &report.path) {
        (Some(FileOutcome::Written), Some(path)) => format!("wrote {}", path.display()),
        (Some(FileOutcome::Failed(message)), _) => format!("failed: {message}"),
        (Some(outcome), _) => format!("{outcome:?}"),
        (None, _) => match &report.error {
            Some(error) => format!("failed: {error}"),
            None => format!("{:?}", report.state),
        },
    };
    let partial = if report.partial { " (partial)" } else { "" };
    println!("File output {}: {}{}", report.node, outcome, partial);
    report.findings.iter().for_each(print_finding);
    report.succeeded()
}

fn print_case_report(report: &CaseReport) -> bool {
    if let Some(error) = &report.error {
        println!("Case output {}: failed: {}", report.node, error);
        return false;
    }
    println!(
        "Case output {} -> {}: {} written, {} skipped, {} failed",
        report.node,
        report.case_dir.display(),
        report.written(),
        report.skipped(),
        report.failed()
    );
    if report.existing_files > 0 {
        println!("  {} files were already present", report.existing_files);
    }
    for file in &report.files {
        if let Some(path) = &file.path {
            println!("  {:?} {}", file.outcome, path.display());
        }
    }
    report.findings.iter().for_each(print_finding);
    report.succeeded()
}
