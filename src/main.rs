use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nflow_core::flow::{aggregate_flows, multi_edge_pairs, parallel_edges};
use nflow_core::store::Variable;
use nflow_core::{EdgeMode, EngineConfig, FlowModel, ModelError};

#[derive(Parser)]
#[command(name = "nflow", version, about = "Evaluate nitrogen-flow variables and project department flows")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "NFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Variable records (JSON); overrides the config
    #[arg(long)]
    variables: Option<PathBuf>,

    /// Display selection (JSON array of n_id); overrides the config
    #[arg(long)]
    display: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every derived variable and print the results
    Evaluate {
        #[command(flatten)]
        edits: Edits,
        /// Print every variable instead of the display set
        #[arg(long)]
        all: bool,
    },
    /// Evaluate, then print the department flow edges
    Flows {
        #[command(flatten)]
        edits: Edits,
        /// Edge mode; defaults to the config
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Use every flow variable instead of the display set
        #[arg(long)]
        all: bool,
    },
    /// Check sequence order and declared dependencies
    Validate,
    /// Evaluate, then print the dependency tree of one variable
    Trace {
        id: String,
        #[command(flatten)]
        edits: Edits,
    },
}

#[derive(clap::Args)]
struct Edits {
    /// Input edit applied before evaluation, as id=value (repeatable)
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_edit)]
    set: Vec<(String, f64)>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Aggregated,
    Parallel,
}

impl From<ModeArg> for EdgeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Aggregated => EdgeMode::Aggregated,
            ModeArg::Parallel => EdgeMode::Parallel,
        }
    }
}

fn parse_edit(raw: &str) -> Result<(String, f64), String> {
    let (id, value) = raw.split_once('=').ok_or_else(|| format!("expected ID=VALUE, got '{}'", raw))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing variable id in '{}'", raw));
    }
    let value: f64 = value.trim().parse().map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((id.to_string(), value))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = cli.variables {
        config.data.variables = path;
    }
    if let Some(path) = cli.display {
        config.data.display = Some(path);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut model = FlowModel::open(config).context("loading variable store")?;
    info!(variables = model.store().len(), "Store loaded");

    match cli.command {
        Commands::Evaluate { edits, all } => {
            evaluate(&mut model, &edits.set)?;
            let vars: Vec<_> = if all { model.store().iter().collect() } else { model.display_variables() };
            println!("{}", serde_json::to_string_pretty(&vars)?);
        }
        Commands::Flows { edits, mode, all } => {
            evaluate(&mut model, &edits.set)?;
            let source = flow_source(&model, all);
            let mode = mode.map(EdgeMode::from).unwrap_or(model.config().graph.mode);
            let out = match mode {
                EdgeMode::Aggregated => aggregated_json(&source),
                EdgeMode::Parallel => parallel_json(&source, model.config().graph.parallel_spacing),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Validate => match model.validate() {
            Ok(()) => println!("OK: {} variables, no findings", model.store().len()),
            Err(findings) => {
                for finding in &findings {
                    println!("{:?}: {}", finding.error_type, finding);
                }
                bail!("{} validation finding(s)", findings.len());
            }
        },
        Commands::Trace { id, edits } => {
            evaluate(&mut model, &edits.set)?;
            print!("{}", model.trace(&id));
        }
    }
    Ok(())
}

fn evaluate(model: &mut FlowModel, edits: &[(String, f64)]) -> anyhow::Result<()> {
    let report = if edits.is_empty() {
        model.evaluate_all()?
    } else {
        model.apply_edits(edits).map_err(|e| match e {
            ModelError::Edits(errors) => {
                let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                anyhow::anyhow!("edit batch rejected:\n  {}", lines.join("\n  "))
            }
            other => other.into(),
        })?
    };
    if !report.is_clean() {
        eprintln!("{} variable(s) failed to evaluate", report.failures.len());
    }
    Ok(())
}

/// Variables feeding the flow output: the display set, or everything with `--all`.
fn flow_source(model: &FlowModel, all: bool) -> Vec<&Variable> {
    if all {
        return model.store().iter().collect();
    }
    if model.store().display_ids().is_empty() {
        warn!("Display set is empty, no flows selected; pass --display or --all");
    }
    model.display_variables()
}

fn aggregated_json(source: &[&Variable]) -> serde_json::Value {
    let edges: Vec<_> = aggregate_flows(source.iter().copied())
        .values()
        .map(|edge| {
            json!({
                "from": edge.from,
                "to": edge.to,
                "total_value": edge.total_value,
                "count": edge.variable_count(),
                "is_loop": edge.is_loop(),
                "variables": edge.variables.iter().map(|v| v.n_id).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "mode": "aggregated", "edges": edges })
}

fn parallel_json(source: &[&Variable], spacing: f64) -> serde_json::Value {
    let parallel = parallel_edges(source.iter().copied());
    let edges: Vec<_> = parallel
        .iter()
        .map(|edge| {
            json!({
                "id": edge.id,
                "from": edge.from,
                "to": edge.to,
                "label": edge.label,
                "value": edge.value,
                "lane": edge.lane,
                "offset": edge.offset(spacing),
                "is_loop": edge.is_loop(),
            })
        })
        .collect();
    let multi: Vec<_> = multi_edge_pairs(&parallel)
        .into_iter()
        .map(|(key, count)| json!({ "from": key.from, "to": key.to, "count": count }))
        .collect();
    json!({ "mode": "parallel", "edges": edges, "multi_edge_pairs": multi })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rain_input=10", ("rain_input", 10.0))]
    #[case(" x = 2.5e1 ", ("x", 25.0))]
    fn test_parse_edit(#[case] raw: &str, #[case] expected: (&str, f64)) {
        assert_eq!(parse_edit(raw).unwrap(), (expected.0.to_string(), expected.1));
    }

    #[rstest]
    #[case("rain_input")]
    #[case("=3")]
    #[case("x=abc")]
    fn test_parse_edit_rejects(#[case] raw: &str) {
        assert!(parse_edit(raw).is_err());
    }

    #[test]
    fn test_flow_source_without_display_set() {
        use nflow_core::store::{Department, VariableStore};
        let store = VariableStore::from_variables([Variable::input(1, "f", Department::Industry, Some(2.0))
            .with_flow(Department::Industry, Department::Atmosphere)])
        .unwrap();
        let model = FlowModel::new(store, EngineConfig::default());

        assert!(flow_source(&model, false).is_empty());
        let all = flow_source(&model, true);
        assert_eq!(all.len(), 1);
        assert_eq!(aggregated_json(&all)["edges"][0]["total_value"], 2.0);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
