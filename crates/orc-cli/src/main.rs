use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use orc_agent_host::AgentHost;
use orc_llm::ScriptedLlmProvider;
use orc_schemas::{AgentName, ArtifactType};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "orc")]
#[command(about = "Constitutional multi-agent orchestrator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or create requests
    Request {
        #[command(subcommand)]
        cmd: RequestCmd,
    },

    /// Run the next eligible agent for a request
    Agent {
        #[command(subcommand)]
        cmd: AgentCmd,
    },

    /// Approve, reject or show paused artifacts
    Artifact {
        #[command(subcommand)]
        cmd: ArtifactCmd,
    },

    /// Inspect a request's event log
    Events {
        #[command(subcommand)]
        cmd: EventsCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> engine -> risk -> stress...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
}

#[derive(Subcommand)]
enum RequestCmd {
    /// Create a new request from a natural-language prompt
    New { prompt: String },
    /// Print a request's Conductor State
    Status { request_id: Uuid },
}

#[derive(Subcommand)]
enum AgentCmd {
    /// Run an agent for a request. If `--agent` is omitted, the single
    /// eligible agent for the request's current phase is used; a phase
    /// with more than one eligible agent requires the flag.
    Run {
        request_id: Uuid,
        #[arg(long)]
        agent: Option<String>,
    },
}

#[derive(Subcommand)]
enum ArtifactCmd {
    /// Approve the artifact paused at a request's current phase
    Approve {
        request_id: Uuid,
        #[arg(long = "by")]
        approver: String,
    },
    /// Reject the artifact paused at a request's current phase
    Reject {
        request_id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Print the latest artifact of a given type for a request
    Show {
        request_id: Uuid,
        #[arg(long = "type")]
        artifact_type: String,
    },
}

#[derive(Subcommand)]
enum EventsCmd {
    /// Print a request's event log, optionally starting after a sequence number
    Tail {
        request_id: Uuid,
        #[arg(long)]
        since: Option<i64>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Request { cmd } => run_request(cmd).await?,
        Commands::Agent { cmd } => run_agent(cmd).await?,
        Commands::Artifact { cmd } => run_artifact(cmd).await?,
        Commands::Events { cmd } => run_events(cmd).await?,
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = orc_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
        Commands::Db { cmd } => run_db(cmd).await?,
    }

    Ok(())
}

async fn run_request(cmd: RequestCmd) -> Result<()> {
    let pool = connect().await?;
    match cmd {
        RequestCmd::New { prompt } => {
            let request_id = Uuid::new_v4();
            orc_store::insert_request(
                &pool,
                &orc_store::NewRequest {
                    request_id,
                    original_prompt: prompt,
                },
            )
            .await
            .context("insert_request failed")?;
            println!("request_id={request_id}");
        }
        RequestCmd::Status { request_id } => {
            let state = orc_store::fetch_conductor_state(&pool, request_id).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}

async fn run_agent(cmd: AgentCmd) -> Result<()> {
    let pool = connect().await?;
    let host = AgentHost::new(pool.clone(), ScriptedLlmProvider::new());

    match cmd {
        AgentCmd::Run { request_id, agent } => {
            let agent_name = match agent {
                Some(name) => parse_tagged::<AgentName>(&name)?,
                None => {
                    let state = orc_store::fetch_conductor_state(&pool, request_id).await?;
                    let eligible = host.envelopes().agents_for_phase(state.phase);
                    match eligible.as_slice() {
                        [single] => *single,
                        [] => bail!("no agent is eligible for phase {:?}", state.phase),
                        many => bail!(
                            "phase {:?} has {} eligible agents, pass --agent: {}",
                            state.phase,
                            many.len(),
                            many.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", ")
                        ),
                    }
                }
            };

            match agent_name {
                AgentName::CompletionAuditor => {
                    let decision = host.run_completion_auditor(request_id).await?;
                    let state = host.resolve_completion_decision(request_id).await?;
                    println!("decision={decision:?}");
                    println!("{}", serde_json::to_string_pretty(&state)?);
                }
                AgentName::RepairAgent => {
                    let fs = orc_workspace_fs::RealWorkspaceFs::new(workspace_root().join(request_id.to_string()));
                    let log = host.run_repair_agent(request_id, &fs).await?;
                    println!("{}", serde_json::to_string_pretty(&log)?);
                }
                _ => {
                    let outcome = host.run_agent(request_id, agent_name).await?;
                    let artifact = outcome.into_artifact();
                    println!("{}", serde_json::to_string_pretty(&artifact)?);
                }
            }
        }
    }
    Ok(())
}

async fn run_artifact(cmd: ArtifactCmd) -> Result<()> {
    let pool = connect().await?;
    let host = AgentHost::new(pool.clone(), ScriptedLlmProvider::new());

    match cmd {
        ArtifactCmd::Approve { request_id, approver } => {
            let state = host.approve(request_id).await?;
            println!("approved_by={approver}");
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        ArtifactCmd::Reject { request_id, reason } => {
            host.reject(request_id).await?;
            if let Some(reason) = reason {
                println!("rejected, reason={reason}");
            } else {
                println!("rejected");
            }
        }
        ArtifactCmd::Show { request_id, artifact_type } => {
            let artifact_type = parse_tagged::<ArtifactType>(&artifact_type)?;
            let artifact = orc_store::fetch_latest_artifact(&pool, request_id, artifact_type)
                .await?
                .with_context(|| format!("no {artifact_type:?} artifact yet for this request"))?;
            println!("{}", serde_json::to_string_pretty(&artifact)?);
        }
    }
    Ok(())
}

async fn run_events(cmd: EventsCmd) -> Result<()> {
    let pool = connect().await?;
    match cmd {
        EventsCmd::Tail { request_id, since } => {
            let since = since.unwrap_or(0);
            let events = orc_store::list_for_request(&pool, request_id).await?;
            for event in events.into_iter().filter(|e| e.seq as i64 > since) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }
    Ok(())
}

async fn run_db(cmd: DbCmd) -> Result<()> {
    let pool = connect().await?;
    match cmd {
        DbCmd::Status => {
            let s = orc_store::status(&pool).await?;
            println!("db_ok={} has_requests_table={}", s.ok, s.has_requests_table);
        }
        DbCmd::Migrate => {
            orc_store::migrate(&pool).await?;
            println!("migrations_applied=true");
        }
    }
    Ok(())
}

async fn connect() -> Result<PgPool> {
    orc_store::connect_from_env().await.context("connecting to database")
}

fn workspace_root() -> std::path::PathBuf {
    std::env::var("ORC_WORKSPACE_ROOT")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("./orc-workspaces"))
}

/// Parse a snake_case CLI argument into any `Deserialize` tagged enum, the
/// same representation `#[serde(rename_all = "snake_case")]` gives it on the
/// wire -- mirrors `orc-daemon`'s path-param parsing.
fn parse_tagged<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("unrecognized value {value:?}"))
}
