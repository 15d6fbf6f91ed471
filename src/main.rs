use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use opkit_config::QueueConfig;
use opkit_operation::{BlockResultOperation, NotificationCenter, Operation, ProducesResult};
use opkit_queue::{Enqueue, OperationQueue};

/// Opkit - typed-result operations with observable lifecycles
#[derive(Parser)]
#[command(name = "opkit")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run block operations on a queue and print their lifecycle events
  Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
  /// Path to a queue configuration file (JSON)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Queue name, overriding the configuration file
  #[arg(long)]
  queue_name: Option<String>,

  /// Display name given to each operation
  #[arg(long, default_value = "")]
  name: String,

  /// Number of operations to run
  #[arg(long, default_value_t = 1)]
  count: usize,

  /// Make every operation fail with this message
  #[arg(long, conflicts_with = "panic")]
  fail: Option<String>,

  /// Make every operation panic
  #[arg(long)]
  panic: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run(args)) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run(args))?;
    }
    None => {
      println!("opkit - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
  let mut config = match &args.config {
    Some(path) => {
      let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
      QueueConfig::from_json_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?
    }
    None => QueueConfig::default(),
  };
  if args.queue_name.is_some() {
    config.name = args.queue_name.clone();
  }

  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe();
  let queue = OperationQueue::new(config, center.clone()).context("failed to create queue")?;

  eprintln!("Queue: '{}'", queue.name().unwrap_or_default());

  let operations: Vec<_> = (0..args.count)
    .map(|index| Arc::new(build_operation(&args, index).named(args.name.clone())))
    .collect();

  for operation in &operations {
    eprintln!("Enqueue: {}", operation);
    operation
      .clone()
      .enqueue(&queue)
      .context("failed to enqueue operation")?;
  }

  queue.wait_until_all_operations_finished().await;

  // Every event has been published once the queue is drained.
  while let Ok(event) = subscription.receiver.try_recv() {
    println!("{}", serde_json::to_string(&event)?);
  }

  for operation in &operations {
    eprintln!("Finished: {}", operation);
    match operation.output() {
      Ok(greeting) => println!("{}", serde_json::json!({ "id": operation.id(), "output": greeting })),
      Err(e) => println!("{}", serde_json::json!({ "id": operation.id(), "error": e.to_string() })),
    }
  }

  Ok(())
}

fn build_operation(args: &RunArgs, index: usize) -> BlockResultOperation<String> {
  if args.panic {
    return BlockResultOperation::from_value(move || panic!("operation {} panicked", index));
  }

  match args.fail.clone() {
    Some(message) => BlockResultOperation::new(move || Err(format!("{} ({})", message, index))),
    None => BlockResultOperation::from_value(move || format!("Hello from operation {}", index)),
  }
}
