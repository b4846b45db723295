use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use hotspot_advisor::config::{self, Config, OutputFormat, WatchParams};
use hotspot_advisor::monitor::{self, ClusterSnapshot, NodeReading};
use hotspot_advisor::optimizer::HotspotDetector;

#[derive(Parser)]
#[command(name = "hotspot-advisor")]
#[command(about = "CPU hotspot detection and SHARD_ROW_ID_BITS advice for TiKV clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RuleArgs {
    /// Rule resource file (repeatable; built-in rules when omitted)
    #[arg(short, long = "rules")]
    rules: Vec<PathBuf>,

    /// Rule set name
    #[arg(long, default_value = config::DEFAULT_RULE_SET_NAME)]
    name: String,

    /// Rule set version
    #[arg(long, default_value = config::DEFAULT_RULE_SET_VERSION)]
    rule_version: String,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Snapshot JSON file
    #[arg(short, long, conflicts_with = "node")]
    snapshot: Option<PathBuf>,

    /// Node reading as id:raftstore_cpu:coprocessor_cpu (repeatable)
    #[arg(short, long)]
    node: Vec<String>,

    /// Skip the write hotspot check
    #[arg(long)]
    skip_write: bool,

    /// Skip the read hotspot check
    #[arg(long)]
    skip_read: bool,

    /// Workload writes through a non-clustered index (implicit row ids)
    #[arg(long)]
    non_clustered: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one snapshot
    Check {
        #[command(flatten)]
        rules: RuleArgs,

        #[command(flatten)]
        snapshot: SnapshotArgs,

        /// Table named in the suggested ALTER TABLE statement
        #[arg(short, long, default_value = "table_name")]
        table: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Re-evaluate a snapshot over simulated monitoring ticks
    Watch {
        #[command(flatten)]
        rules: RuleArgs,

        #[command(flatten)]
        snapshot: SnapshotArgs,

        /// Number of ticks
        #[arg(long, default_value = "5")]
        ticks: usize,

        /// Time between ticks (e.g., 500ms, 2s)
        #[arg(short, long, default_value = "1s")]
        interval: String,

        /// Maximum drift per reading per tick, percent
        #[arg(short, long, default_value = "10")]
        jitter: f64,

        /// Seed for the simulated drift
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Show the compiled rule set
    Rules {
        #[command(flatten)]
        rules: RuleArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hotspot_advisor=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            rules,
            snapshot,
            table,
            format,
        } => {
            let config = Config {
                table,
                format: format.parse()?,
                ..rule_config(rules)
            };
            let snapshot = build_snapshot(snapshot)?;
            run_check(config, snapshot).await?;
        }
        Commands::Watch {
            rules,
            snapshot,
            ticks,
            interval,
            jitter,
            seed,
        } => {
            if !jitter.is_finite() {
                return Err(anyhow::anyhow!("Jitter must be a finite percentage: {}", jitter));
            }
            let params = WatchParams {
                ticks,
                interval: config::parse_interval(&interval)?,
                jitter_percent: jitter,
                seed,
            };
            let snapshot = build_snapshot(snapshot)?;
            run_watch(rule_config(rules), params, snapshot).await?;
        }
        Commands::Rules { rules } => {
            show_rules(rule_config(rules)).await?;
        }
    }

    Ok(())
}

fn rule_config(args: RuleArgs) -> Config {
    Config {
        rule_files: args.rules,
        rule_set_name: args.name,
        rule_set_version: args.rule_version,
        ..Config::default()
    }
}

fn build_snapshot(args: SnapshotArgs) -> anyhow::Result<ClusterSnapshot> {
    let mut snapshot = match &args.snapshot {
        Some(path) => config::load_snapshot(path)?,
        None => {
            if args.node.is_empty() {
                return Err(anyhow::anyhow!(
                    "Provide --snapshot or at least one --node id:raftstore_cpu:coprocessor_cpu"
                ));
            }
            let nodes = args
                .node
                .iter()
                .map(|s| s.parse())
                .collect::<anyhow::Result<Vec<NodeReading>>>()?;
            ClusterSnapshot::new(nodes)
        }
    };

    if args.skip_write {
        snapshot.check_write_hotspot = false;
    }
    if args.skip_read {
        snapshot.check_read_hotspot = false;
    }
    if args.non_clustered {
        snapshot.non_clustered_index = true;
    }

    Ok(snapshot)
}

async fn run_check(config: Config, mut snapshot: ClusterSnapshot) -> anyhow::Result<()> {
    let detector = HotspotDetector::new(config.load_rules()?);
    detector
        .evaluate(&mut snapshot)
        .context("Failed to evaluate hotspot rules")?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Text => {
            print_report(&detector, &snapshot, &config.table);
        }
    }

    Ok(())
}

async fn run_watch(
    config: Config,
    params: WatchParams,
    mut snapshot: ClusterSnapshot,
) -> anyhow::Result<()> {
    let detector = HotspotDetector::new(config.load_rules()?);
    monitor::watch(&detector, &mut snapshot, &params, |tick, verdict| {
        println!(
            "[tick {}] write: {} ({:.2}x), read: {} ({:.2}x), shard bits: {}",
            tick,
            if verdict.write_hotspot_detected { "HOT" } else { "ok" },
            verdict.write_hotspot_ratio,
            if verdict.read_hotspot_detected { "HOT" } else { "ok" },
            verdict.read_hotspot_ratio,
            if verdict.recommend_shard_bits {
                verdict.shard_row_id_bits.to_string()
            } else {
                "-".to_string()
            },
        );
    })
    .await?;
    Ok(())
}

async fn show_rules(config: Config) -> anyhow::Result<()> {
    let rules = config.load_rules()?;
    println!("Rule set: {} {}", rules.name(), rules.version());
    for rule in rules.rules() {
        println!("  [{:>3}] {}", rule.salience(), rule.name());
    }
    Ok(())
}

fn print_report(detector: &HotspotDetector, snapshot: &ClusterSnapshot, table: &str) {
    let rules = detector.rules();
    println!("Rule set: {} {} ({} rules)", rules.name(), rules.version(), rules.len());
    println!("TiKV nodes: {}", snapshot.nodes.len());
    for node in &snapshot.nodes {
        println!(
            "  {}: raftstore CPU {:.2}%, coprocessor CPU {:.2}%",
            node.node_id, node.raftstore_cpu, node.coprocessor_cpu
        );
    }

    if let Some(stats) = &snapshot.stats {
        println!("Statistics:");
        println!(
            "  write: max {:.2}%, avg {:.2}%, hottest {}",
            stats.write.max, stats.write.avg, stats.write.hottest_node
        );
        println!(
            "  read:  max {:.2}%, avg {:.2}%, hottest {}",
            stats.read.max, stats.read.avg, stats.read.hottest_node
        );
    }

    println!("Findings:");
    for finding in detector.analyze(snapshot, table) {
        println!("  - {}", finding);
    }
}
