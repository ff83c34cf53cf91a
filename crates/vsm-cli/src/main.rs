//! `vsmctl`: operator entry point for the VSM control plane. `run` boots the
//! resident process (topology declaration, all five levels, the algedonic
//! consumer); the other subcommands are thin RPC clients that talk to a
//! running instance over the broker.

mod agents;
mod capability;
mod config;
mod exitcode;
mod handlers;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use vsm_broker::ChannelPool;
use vsm_broker::TopologyDeclarator;
use vsm_control::{AuditChannel, ResourcePools};
use vsm_coordinator::Coordinator;
use vsm_core::{Command, CommandTarget, ResultStatus};
use vsm_eventbus::EventBus;
use vsm_governance::Governance;
use vsm_intelligence::Intelligence;
use vsm_recursive::RecursiveProtocol;
use vsm_registry::AgentRegistry;
use vsm_router::Router;
use vsm_supervisor::Supervisor;
use vsm_variety::{Boundary, VarietyEngine};

use agents::ProcessAgentFactory;
use config::Config;

/// Well-known capability names the resident process answers directly,
/// alongside the per-agent capabilities `declare_agent_topology` binds.
const CAPABILITY_NAMES: &[&str] = &[
    "supervisor.spawn",
    "supervisor.terminate",
    "registry.list",
    "governance.policy.set",
    "governance.policy.list",
    "governance.viability",
    "control.audit",
];
const CAPABILITY_QUEUE: &str = "vsm.control-plane.capabilities";

#[derive(Parser)]
#[command(name = "vsmctl", about = "Operate a VSM control plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the resident control plane process.
    Run,
    /// Manage level-1 agents.
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
    /// Manage S5 policies.
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Issue a direct S3* audit bypassing coordination.
    Audit {
        /// Target agent id.
        target: String,
        /// Command type to invoke on the target.
        operation: String,
    },
    /// Print the current system viability score.
    Viability,
}

#[derive(Subcommand)]
enum AgentAction {
    Spawn {
        agent_type: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        config: Option<String>,
    },
    Terminate {
        id: String,
    },
    List,
}

#[derive(Subcommand)]
enum PolicyAction {
    Set {
        policy_type: String,
        file: String,
    },
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(exitcode::CONFIG_ERROR);
        }
    };

    let code = match cli.command {
        Commands::Run => run(config).await,
        Commands::Agent { action } => agent(config, action).await,
        Commands::Policy { action } => policy(config, action).await,
        Commands::Audit { target, operation } => audit(config, target, operation).await,
        Commands::Viability => viability(config).await,
    };
    std::process::exit(code);
}

async fn connect(config: &Config) -> Result<Arc<ChannelPool>, i32> {
    let pool = Arc::new(ChannelPool::new(&config.broker_url));
    if let Err(err) = pool.connect().await {
        error!(error = %err, "could not reach broker");
        return Err(exitcode::BROKER_UNAVAILABLE);
    }
    Ok(pool)
}

async fn client_router(pool: Arc<ChannelPool>, router_id: &str) -> Result<Arc<Router>, i32> {
    let router = Arc::new(Router::new(pool, router_id));
    if let Err(err) = router.start_reply_consumer().await {
        error!(error = %err, "could not start reply consumer");
        return Err(exitcode::GENERIC_ERROR);
    }
    Ok(router)
}

fn print_result(result: vsm_core::CommandResult) -> i32 {
    match result.status {
        ResultStatus::Ok => {
            println!("{}", serde_json::to_string_pretty(&result.payload).unwrap_or_default());
            exitcode::SUCCESS
        }
        ResultStatus::Timeout => {
            eprintln!("request timed out after {}ms", result.duration_ms);
            exitcode::BROKER_UNAVAILABLE
        }
        ResultStatus::Error => {
            eprintln!("error: {}", result.error_message.unwrap_or_default());
            exitcode::GENERIC_ERROR
        }
    }
}

async fn agent(config: Config, action: AgentAction) -> i32 {
    let pool = match connect(&config).await {
        Ok(p) => p,
        Err(code) => return code,
    };
    let router = match client_router(pool, "cli-agent").await {
        Ok(r) => r,
        Err(code) => return code,
    };

    let (command_type, payload) = match action {
        AgentAction::Spawn { agent_type, id, config: agent_config } => (
            "supervisor.spawn",
            serde_json::json!({
                "agent_type": agent_type,
                "agent_id": id,
                "config": agent_config.map(|raw| serde_json::from_str::<serde_json::Value>(&raw).unwrap_or(serde_json::Value::Null)),
            }),
        ),
        AgentAction::Terminate { id } => ("supervisor.terminate", serde_json::json!({ "agent_id": id })),
        AgentAction::List => ("registry.list", serde_json::Value::Null),
    };

    let command = Command::new(command_type, CommandTarget::Capability { name: command_type.to_string() }, payload);
    match router.call(command.target.clone(), command, config.default_timeout).await {
        Ok(result) => print_result(result),
        Err(err) => {
            error!(error = %err, "agent command failed");
            exitcode::GENERIC_ERROR
        }
    }
}

async fn policy(config: Config, action: PolicyAction) -> i32 {
    let pool = match connect(&config).await {
        Ok(p) => p,
        Err(code) => return code,
    };
    let router = match client_router(pool, "cli-policy").await {
        Ok(r) => r,
        Err(code) => return code,
    };

    let (command_type, payload) = match action {
        PolicyAction::Set { policy_type, file } => {
            let raw = match std::fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(err) => {
                    error!(error = %err, file = %file, "could not read policy file");
                    return exitcode::CONFIG_ERROR;
                }
            };
            let rules: serde_json::Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(err) => {
                    error!(error = %err, "policy file is not valid JSON");
                    return exitcode::CONFIG_ERROR;
                }
            };
            ("governance.policy.set", serde_json::json!({ "policy_type": policy_type, "rules": rules }))
        }
        PolicyAction::List => ("governance.policy.list", serde_json::Value::Null),
    };

    let command = Command::new(command_type, CommandTarget::Capability { name: command_type.to_string() }, payload);
    match router.call(command.target.clone(), command, config.default_timeout).await {
        Ok(result) => print_result(result),
        Err(err) => {
            error!(error = %err, "policy command failed");
            exitcode::GENERIC_ERROR
        }
    }
}

async fn audit(config: Config, target: String, operation: String) -> i32 {
    let pool = match connect(&config).await {
        Ok(p) => p,
        Err(code) => return code,
    };
    let router = match client_router(pool, "cli-audit").await {
        Ok(r) => r,
        Err(code) => return code,
    };

    let command = Command::new(
        "control.audit",
        CommandTarget::Capability { name: "control.audit".to_string() },
        serde_json::json!({"target": target, "operation": operation}),
    )
    .with_audit_bypass("cli-operator");
    match router.call(command.target.clone(), command, config.default_timeout).await {
        Ok(result) => print_result(result),
        Err(err) => {
            error!(error = %err, "audit failed");
            exitcode::GENERIC_ERROR
        }
    }
}

async fn viability(config: Config) -> i32 {
    let pool = match connect(&config).await {
        Ok(p) => p,
        Err(code) => return code,
    };
    let router = match client_router(pool, "cli-viability").await {
        Ok(r) => r,
        Err(code) => return code,
    };

    let command = Command::new(
        "governance.viability",
        CommandTarget::Capability { name: "governance.viability".to_string() },
        serde_json::Value::Null,
    );
    match router.call(command.target.clone(), command, config.default_timeout).await {
        Ok(result) => print_result(result),
        Err(err) => {
            error!(error = %err, "viability query failed");
            exitcode::GENERIC_ERROR
        }
    }
}

async fn run(config: Config) -> i32 {
    let pool = match connect(&config).await {
        Ok(p) => p,
        Err(code) => return code,
    };

    let lease = match pool.acquire("startup").await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, "could not acquire startup channel");
            return exitcode::BROKER_UNAVAILABLE;
        }
    };
    if let Err(err) = TopologyDeclarator::declare_fixed_topology(&lease).await {
        error!(error = %err, "could not declare topology");
        return exitcode::BROKER_UNAVAILABLE;
    }
    if let Err(err) = TopologyDeclarator::declare_capability_topology(&lease, CAPABILITY_QUEUE, CAPABILITY_NAMES).await {
        error!(error = %err, "could not declare capability topology");
        return exitcode::BROKER_UNAVAILABLE;
    }
    drop(lease);

    let events = EventBus::new();

    let intelligence_router = match client_router(pool.clone(), "s4-intelligence").await {
        Ok(r) => r,
        Err(code) => return code,
    };
    let intelligence = Arc::new(Intelligence::new(intelligence_router, events.clone()));
    intelligence.spawn_anomaly_detector();

    let governance = match Governance::new(&config.policy_log_path, pool.clone(), intelligence.clone(), events.clone()) {
        Ok(g) => Arc::new(g),
        Err(err) => {
            error!(error = %err, "could not open policy store");
            return exitcode::GENERIC_ERROR;
        }
    };
    if let Err(err) = governance.spawn_algedonic_consumer(pool.clone()).await {
        error!(error = %err, "could not start algedonic consumer");
        return exitcode::BROKER_UNAVAILABLE;
    }

    let totals = [
        (vsm_core::ResourceKind::Compute, 100.0),
        (vsm_core::ResourceKind::Memory, 100.0),
        (vsm_core::ResourceKind::Network, 100.0),
        (vsm_core::ResourceKind::Storage, 100.0),
    ]
    .into_iter()
    .collect();
    let resource_pools = Arc::new(ResourcePools::new(totals));
    resource_pools.clone().spawn_optimization_cycle();

    let audit_router = match client_router(pool.clone(), "s3star-audit").await {
        Ok(r) => r,
        Err(code) => return code,
    };
    let audit_channel = Arc::new(AuditChannel::new(audit_router, events.clone()));

    let coordinator = Arc::new(Coordinator::new(pool.clone(), events.clone()));
    let _ = coordinator;

    let _variety_engine = VarietyEngine::new(Boundary::S3S4, events.clone());

    let recursive = RecursiveProtocol::new(pool.clone(), events.clone()).with_max_depth(config.max_recursion_depth);
    let _ = recursive;

    let registry = Arc::new(AgentRegistry::new(events.clone()));
    registry.spawn_default_health_sweep();
    let supervisor = Arc::new(Supervisor::new(registry.clone(), Arc::new(ProcessAgentFactory::new(pool.clone())), events.clone()));

    let resident_router = Arc::new(Router::new(pool.clone(), "resident-capabilities"));
    let registration_failed = [
        resident_router.register_handler(
            "supervisor.spawn",
            Arc::new(handlers::SupervisorSpawnHandler { supervisor: supervisor.clone() }),
        ),
        resident_router.register_handler(
            "supervisor.terminate",
            Arc::new(handlers::SupervisorTerminateHandler { supervisor: supervisor.clone() }),
        ),
        resident_router.register_handler("registry.list", Arc::new(handlers::RegistryListHandler { registry: registry.clone() })),
        resident_router
            .register_handler("governance.policy.set", Arc::new(handlers::PolicySetHandler { governance: governance.clone() })),
        resident_router.register_handler(
            "governance.policy.list",
            Arc::new(handlers::PolicyListHandler { governance: governance.clone() }),
        ),
        resident_router
            .register_handler("governance.viability", Arc::new(handlers::ViabilityHandler { governance: governance.clone() })),
        resident_router.register_handler("control.audit", Arc::new(handlers::AuditCapabilityHandler { audit: audit_channel.clone() })),
    ]
    .into_iter()
    .find(|r| r.is_err());
    if let Some(Err(err)) = registration_failed {
        error!(error = %err, "could not register a capability handler");
        return exitcode::GENERIC_ERROR;
    }

    if let Err(err) = capability::spawn_capability_consumer(pool.clone(), resident_router, CAPABILITY_QUEUE).await {
        error!(error = %err, "could not start capability consumer");
        return exitcode::BROKER_UNAVAILABLE;
    }

    info!(broker = %config.broker_url, "vsm control plane running");
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to install ctrl-c handler");
    }
    info!("shutting down");
    exitcode::SUCCESS
}
