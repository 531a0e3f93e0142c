//! Model inspection commands

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::output::{self, OutputFormat};
use crate::AppContext;
use quarry_core::limits::{self, DEFAULT_DEPTH};
use quarry_core::{
    ExportOptions, HierarchyBuilder, ModelId, PopulationPlanner, SchemaRegistry,
};

#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommands,
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// List the models of the dataset
    List {
        /// Include component models
        #[arg(long)]
        all: bool,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show which models an export of MODEL reaches
    Tree {
        /// Model id or alias
        model: String,

        /// Levels to follow (1-20)
        #[arg(long)]
        depth: Option<u32>,

        /// Print the hierarchy as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the population plan used when fetching MODEL
    Plan {
        /// Model id or alias
        model: String,

        /// Levels to follow (1-20)
        #[arg(long)]
        depth: Option<u32>,
    },
}

/// One row of `quarry models list`
#[derive(Debug, Serialize)]
struct ModelSummary {
    uid: String,
    kind: String,
    attributes: usize,
    localized: bool,
    extension: bool,
    /// Part of a whole-database export
    exported: bool,
}

pub fn run(args: &ModelsArgs, config: &Config, ctx: &AppContext) -> anyhow::Result<()> {
    match &args.command {
        ModelsCommands::List { all, format } => run_list(ctx, config, *all, format),
        ModelsCommands::Tree { model, depth, json } => {
            run_tree(ctx, model, depth.or(config.depth), *json)
        }
        ModelsCommands::Plan { model, depth } => run_plan(ctx, model, depth.or(config.depth)),
    }
}

fn run_list(ctx: &AppContext, config: &Config, all: bool, format: &str) -> anyhow::Result<()> {
    let options = ExportOptions::default();
    let exported = ctx
        .registry
        .all_model_ids(config.include_extensions.unwrap_or(false));

    let mut summaries = Vec::new();
    for uid in ctx.registry.model_ids() {
        let model = ctx.registry.model(&uid)?;
        if model.is_component() && !all {
            continue;
        }
        summaries.push(ModelSummary {
            uid: uid.to_string(),
            kind: serde_json::to_value(model.kind)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            attributes: model.attributes.len(),
            localized: model.localized,
            extension: model.extension,
            exported: exported.contains(&uid) && !options.is_excluded(&uid),
        });
    }

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::json(&summaries)?),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = summaries
                .iter()
                .map(|s| {
                    vec![
                        s.uid.clone(),
                        s.kind.clone(),
                        s.attributes.to_string(),
                        flags(s),
                    ]
                })
                .collect();
            println!("{}", output::table(&["MODEL", "KIND", "ATTRS", "FLAGS"], &rows));
        }
    }
    Ok(())
}

fn flags(summary: &ModelSummary) -> String {
    let mut flags = Vec::new();
    if summary.localized {
        flags.push("localized");
    }
    if summary.extension {
        flags.push("extension");
    }
    if !summary.exported {
        flags.push("not-exported");
    }
    flags.join(",")
}

fn run_tree(ctx: &AppContext, model: &str, depth: Option<u32>, json: bool) -> anyhow::Result<()> {
    let depth = depth.unwrap_or(DEFAULT_DEPTH);
    limits::validate_depth(depth)?;

    let options = ExportOptions::default();
    let node = HierarchyBuilder::new(ctx.registry.as_ref(), &options.excluded_models)
        .build(&ModelId::new(model), depth)?;

    if json {
        println!("{}", output::json(&node)?);
    } else {
        println!("{}", output::tree(&node));
    }
    Ok(())
}

fn run_plan(ctx: &AppContext, model: &str, depth: Option<u32>) -> anyhow::Result<()> {
    let depth = depth.unwrap_or(DEFAULT_DEPTH);
    limits::validate_depth(depth)?;

    let options = ExportOptions::default();
    let model = ctx.registry.canonical(&ModelId::new(model))?;
    let plan = PopulationPlanner::new(ctx.registry.as_ref(), &options.excluded_models)
        .plan(&model, depth)?;

    match plan {
        Some(plan) => println!("{}", output::json(&plan)?),
        None => println!("{} is excluded from exports", model),
    }
    Ok(())
}
