//! tagsched - tag-driven start/stop scheduling for container cluster services.
//!
//! Usage:
//!   tagsched validate <config>                     Validate a scheduler configuration
//!   tagsched discover --config C --fleet F         List schedulable services of a fleet
//!   tagsched stop --config C --fleet F [-s NAME]   Stop services of a fleet
//!   tagsched start --config C --fleet F [-s NAME]  Start services of a fleet
//!
//! Fleets are YAML fixtures run against the in-memory backend, which makes
//! every command a dry run of what the scheduler would do.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tagsched::config::parse_tag_list;
use tagsched::{
    EcsService, Event, EventBus, EventHandler, FleetFixture, InMemoryEcs, ScheduledResource,
    SchedulerConfig, SchedulerContext, YamlLoader,
};
use tracing::{error, info, warn};

/// tagsched - tag-driven start/stop scheduling for cluster services
#[derive(Parser)]
#[command(name = "tagsched")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that operate on a fleet.
#[derive(clap::Args)]
struct FleetArgs {
    /// Path to the scheduler configuration YAML
    #[arg(short, long, value_name = "CONFIG")]
    config: PathBuf,

    /// Path to the fleet fixture YAML
    #[arg(short, long, value_name = "FLEET")]
    fleet: PathBuf,

    /// Override the schedule tag name from the configuration
    #[arg(long)]
    tag_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scheduler configuration without running
    Validate {
        /// Path to the scheduler configuration YAML
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// List schedulable services
    Discover {
        #[command(flatten)]
        fleet: FleetArgs,

        /// Print services as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop schedulable services
    Stop {
        #[command(flatten)]
        fleet: FleetArgs,

        /// Only stop these services (default: all discovered)
        #[arg(short, long = "service", value_name = "NAME")]
        services: Vec<String>,

        /// Override stopped tags, as "key=value,key2=value2"
        #[arg(long)]
        stopped_tags: Option<String>,
    },

    /// Start schedulable services
    Start {
        #[command(flatten)]
        fleet: FleetArgs,

        /// Only start these services (default: all discovered)
        #[arg(short, long = "service", value_name = "NAME")]
        services: Vec<String>,

        /// Override started tags, as "key=value,key2=value2"
        #[arg(long)]
        started_tags: Option<String>,
    },
}

/// Simple logging event handler that prints transition events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::ServiceStopped {
                service_id,
                previous_capacity,
                ..
            } => {
                info!(
                    "Service '{}' stopped (saved desired count {})",
                    service_id, previous_capacity
                );
            }
            Event::ServiceStarted {
                service_id,
                restored_capacity,
                ..
            } => {
                info!(
                    "Service '{}' started with desired count {}",
                    service_id, restored_capacity
                );
            }
            Event::TransitionFailed {
                service_id,
                target,
                error,
                ..
            } => {
                error!("Service '{}' could not be {}: {}", service_id, target, error);
            }
            Event::TagReconcileFailed {
                service_id, error, ..
            } => {
                warn!("Tags of service '{}' not updated: {}", service_id, error);
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Discover { fleet, json } => {
            discover(fleet, json).await?;
        }
        Commands::Stop {
            fleet,
            services,
            stopped_tags,
        } => {
            let mut config = load_config(&fleet)?;
            if let Some(tags) = stopped_tags {
                config.stopped_tags = parse_tag_list(&tags)?;
            }
            transition(fleet, config, services, Direction::Stop).await?;
        }
        Commands::Start {
            fleet,
            services,
            started_tags,
        } => {
            let mut config = load_config(&fleet)?;
            if let Some(tags) = started_tags {
                config.started_tags = parse_tag_list(&tags)?;
            }
            transition(fleet, config, services, Direction::Start).await?;
        }
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum Direction {
    Stop,
    Start,
}

/// Validate a scheduler configuration.
fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating configuration: {}", path.display());

    match YamlLoader::load_scheduler_config(&path) {
        Ok(config) => {
            info!("Configuration is valid:");
            info!("  Schedule tag: {}", config.tag_name);
            info!("  Started tags: {}", config.started_tags.len());
            info!("  Stopped tags: {}", config.stopped_tags.len());
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}

fn load_config(args: &FleetArgs) -> Result<SchedulerConfig, Box<dyn std::error::Error>> {
    let mut config = YamlLoader::load_scheduler_config(&args.config)?;
    if let Some(tag_name) = &args.tag_name {
        config.tag_name = tag_name.clone();
        YamlLoader::validate(&config)?;
    }
    Ok(config)
}

async fn context(
    args: &FleetArgs,
    config: SchedulerConfig,
) -> Result<(Arc<InMemoryEcs>, SchedulerContext), Box<dyn std::error::Error>> {
    let ecs = Arc::new(FleetFixture::load(&args.fleet)?.build());
    let account = config
        .account
        .clone()
        .unwrap_or_else(|| ecs.account().to_string());
    let region = ecs.region().to_string();

    let event_bus = Arc::new(EventBus::new());
    event_bus.register(Arc::new(LoggingHandler)).await;

    let ctx = SchedulerContext::new(account, region, ecs.clone(), Arc::new(config))
        .with_event_bus(event_bus);
    Ok((ecs, ctx))
}

/// List schedulable services of a fleet.
async fn discover(args: FleetArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let (_ecs, ctx) = context(&args, config).await?;
    let resources = EcsService::new().discover_resources(&ctx).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resources)?);
        return Ok(());
    }

    if resources.is_empty() {
        println!("No services tagged with '{}'", ctx.config.tag_name);
        return Ok(());
    }

    for resource in &resources {
        print_resource(resource);
    }
    Ok(())
}

fn print_resource(resource: &ScheduledResource) {
    println!("Service: {} ({})", resource.name, resource.kind());
    println!("  Cluster: {}", resource.cluster_name);
    println!("  Schedule: {}", resource.schedule_name);
    println!("  State: {}", resource.state);
    println!("  Desired count: {}", resource.current_capacity);
    if let Some(saved) = &resource.saved_capacity {
        println!("  Saved desired count: {}", saved);
    }
    println!();
}

/// Stop or start services of a fleet and print the outcome.
async fn transition(
    args: FleetArgs,
    config: SchedulerConfig,
    services: Vec<String>,
    direction: Direction,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ecs, ctx) = context(&args, config).await?;
    let service = EcsService::new();

    let mut resources = service.discover_resources(&ctx).await?;
    if !services.is_empty() {
        resources.retain(|r| services.iter().any(|s| s == &r.name));
        for name in &services {
            if !resources.iter().any(|r| &r.name == name) {
                warn!("Service '{}' not found or not schedulable", name);
            }
        }
    }

    let results = match direction {
        Direction::Stop => service.stop_resources(&ctx, &resources).await,
        Direction::Start => service.start_resources(&ctx, &resources).await,
    };

    info!("{} service(s) changed", results.len());
    for result in &results {
        println!("{}: {}", result.service_id, result.label());
    }

    println!();
    println!("Fleet after run:");
    for described in ecs.snapshot() {
        println!(
            "  {} desired={} status={}",
            described.service_name, described.desired_count, described.status
        );
    }
    Ok(())
}
