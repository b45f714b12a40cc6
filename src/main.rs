use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use workflow_forge::agent::{arc_agent, install_signal_handlers, is_shutdown_requested, InputValidatorAgent, SummaryReporterAgent};
use workflow_forge::approval::spawn_approval_manager;
use workflow_forge::config::load_config_from;
use workflow_forge::engine::Engine;
use workflow_forge::lock;
use workflow_forge::log::parse_log_level;
use workflow_forge::registry::AgentRegistry;
use workflow_forge::state::{FileStateStore, StateStore};
use workflow_forge::types::Mode;
use workflow_forge::{log_error, log_info, log_warn};

#[derive(Parser)]
#[command(name = "workflow-forge", about = "Multi-agent workflow orchestrator for project bootstrapping")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to config file (defaults to {root}/workflow-forge.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity level (error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new project and start its workflow
    Submit {
        /// Unique project id
        project_id: String,
        /// Workflow mode (discovery or direct)
        #[arg(long, default_value = "direct")]
        mode: String,
        /// Short project description
        #[arg(long)]
        description: Option<String>,
        /// Project type (web-app, api, ml-project, ai-app, full-platform)
        #[arg(long, default_value = "web-app")]
        project_type: String,
        /// Free-form overview text, used by discovery mode's domain detector
        #[arg(long)]
        overview: Option<String>,
    },
    /// Show a project's progress
    Status {
        project_id: String,
    },
    /// Approve the pending gate for a project
    Approve {
        gate_id: String,
        project_id: String,
    },
    /// Reject the pending gate for a project with feedback
    Reject {
        gate_id: String,
        project_id: String,
        /// Rejection feedback (minimum length enforced by config)
        feedback: String,
    },
    /// Resume a workflow from its last checkpoint
    Resume {
        project_id: String,
    },
    /// List every pending approval gate
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match parse_log_level(&cli.log_level) {
        Ok(level) => workflow_forge::log::set_log_level(level),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let runtime_dir = cli.root.join(".workflow-forge");
    let _lock_guard = match lock::try_acquire(&runtime_dir) {
        Ok(guard) => guard,
        Err(e) => {
            log_error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let config = match load_config_from(cli.config.as_deref(), &cli.root) {
        Ok(config) => config,
        Err(e) => {
            log_error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut registry = AgentRegistry::new(None);
    registry.register_implementation(arc_agent(InputValidatorAgent));
    registry.register_implementation(arc_agent(SummaryReporterAgent));
    let registry = Arc::new(registry);

    let state_dir = cli.root.join(".workflow-forge").join("state");
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(state_dir));

    let min_rejection_feedback_len = config.approval.min_rejection_feedback_len;

    let (approvals, _approval_task) = spawn_approval_manager();
    let engine = Engine::new(registry, Arc::clone(&store), approvals.clone(), config);

    if let Err(e) = install_signal_handlers() {
        log_warn!("failed to install signal handlers: {}", e);
    }
    let shutdown_engine = engine.clone();
    let _shutdown_monitor = tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            if is_shutdown_requested() {
                log_info!("shutdown requested, cancelling running workflows");
                shutdown_engine.cancel_all().await;
                break;
            }
        }
    });

    match engine.recover_interrupted().await {
        Ok(recovered) if !recovered.is_empty() => {
            log_info!("recovered {} interrupted project(s): {}", recovered.len(), recovered.join(", "));
        }
        Ok(_) => {}
        Err(e) => log_warn!("crash recovery failed: {}", e),
    }

    let result = match cli.command {
        Commands::Submit {
            project_id,
            mode,
            description,
            project_type,
            overview,
        } => handle_submit(&engine, &project_id, &mode, description, project_type, overview).await,
        Commands::Status { project_id } => handle_status(&engine, &project_id).await,
        Commands::Approve { gate_id, project_id } => handle_approve(&approvals, &engine, &gate_id, &project_id).await,
        Commands::Reject {
            gate_id,
            project_id,
            feedback,
        } => handle_reject(&approvals, &engine, &gate_id, &project_id, &feedback, min_rejection_feedback_len).await,
        Commands::Resume { project_id } => handle_resume(&engine, &project_id).await,
        Commands::List => handle_list(&approvals).await,
    };

    if let Err(e) = result {
        log_error!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn handle_submit(
    engine: &Engine,
    project_id: &str,
    mode: &str,
    description: Option<String>,
    project_type: String,
    overview: Option<String>,
) -> Result<(), String> {
    let mode = match mode {
        "discovery" => Mode::Discovery,
        "direct" => Mode::Direct,
        other => return Err(format!("unknown mode '{}': expected discovery or direct", other)),
    };

    let mut input: Map<String, Value> = Map::new();
    input.insert("project_type".to_string(), Value::String(project_type));
    if let Some(description) = description {
        input.insert("description".to_string(), Value::String(description));
    }
    if let Some(overview) = &overview {
        input.insert("project_overview".to_string(), Value::String(overview.clone()));
        input.insert("key_features".to_string(), Value::String(String::new()));
        input.insert("constraints".to_string(), Value::String(String::new()));
    }

    let context = engine
        .start_workflow(project_id, mode, input)
        .await
        .map_err(|e| e.to_string())?;

    println!("submitted project {} (status: {:?})", context.project_id, context.status);
    Ok(())
}

async fn handle_status(engine: &Engine, project_id: &str) -> Result<(), String> {
    let progress = engine.get_progress(project_id).await.map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&progress).map_err(|e| e.to_string())?);
    Ok(())
}

async fn handle_approve(
    approvals: &workflow_forge::approval::ApprovalHandle,
    engine: &Engine,
    gate_id: &str,
    project_id: &str,
) -> Result<(), String> {
    approvals.approve(gate_id).await?;
    engine.resume_workflow(project_id).await.map_err(|e| e.to_string())?;
    println!("approved gate {} and resumed project {}", gate_id, project_id);
    Ok(())
}

async fn handle_reject(
    approvals: &workflow_forge::approval::ApprovalHandle,
    engine: &Engine,
    gate_id: &str,
    project_id: &str,
    feedback: &str,
    min_feedback_len: usize,
) -> Result<(), String> {
    if feedback.trim().len() < min_feedback_len {
        return Err(format!("rejection feedback must be at least {} characters", min_feedback_len));
    }
    approvals.reject(gate_id, feedback).await?;
    let _ = engine;
    println!("rejected gate {} for project {}", gate_id, project_id);
    Ok(())
}

async fn handle_resume(engine: &Engine, project_id: &str) -> Result<(), String> {
    engine.resume_workflow(project_id).await.map_err(|e| e.to_string())?;
    println!("resumed project {}", project_id);
    Ok(())
}

async fn handle_list(approvals: &workflow_forge::approval::ApprovalHandle) -> Result<(), String> {
    let pending = approvals.list_pending().await;
    if pending.is_empty() {
        println!("no pending approval gates");
        return Ok(());
    }
    for gate in pending {
        println!("{}  project={}  phase={}", gate.gate_id, gate.project_id, gate.phase);
    }
    Ok(())
}
