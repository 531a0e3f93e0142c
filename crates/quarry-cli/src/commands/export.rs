//! Export command

use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use clap::Args;

use crate::config::Config;
use crate::AppContext;
use quarry_core::limits::{DEFAULT_DEPTH, DEFAULT_PAGE_SIZE};
use quarry_core::{
    ExportFormat, ExportOptions, ExportRequest, Exporter, FetchErrorPolicy, WHOLE_DATABASE,
};

#[derive(Args)]
pub struct ExportArgs {
    /// Model id, alias, or `custom:db` for the whole database
    #[arg(default_value = WHOLE_DATABASE)]
    pub scope: String,

    /// Search applied to the root records, e.g. `filters[title][$containsi]=rust&sort=id:desc`
    #[arg(short, long)]
    pub search: Option<String>,

    /// Levels to follow from the root model (1-20)
    #[arg(long, env = "QUARRY_DEPTH")]
    pub depth: Option<u32>,

    /// Records per fetch (1-1000)
    #[arg(long, env = "QUARRY_PAGE_SIZE")]
    pub page_size: Option<usize>,

    /// Output format: json, json-pretty
    #[arg(short, long, env = "QUARRY_FORMAT")]
    pub format: Option<String>,

    /// Include plugin-provided models in a whole-database export
    #[arg(long, env = "QUARRY_INCLUDE_EXTENSIONS")]
    pub include_extensions: bool,

    /// Fail on the first fetch error instead of skipping the branch
    #[arg(long, env = "QUARRY_PROPAGATE_FETCH_ERRORS")]
    pub propagate_fetch_errors: bool,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print run statistics to stderr
    #[arg(long)]
    pub stats: bool,
}

pub async fn run(args: &ExportArgs, config: &Config, ctx: &AppContext) -> anyhow::Result<()> {
    let depth = args.depth.or(config.depth).unwrap_or(DEFAULT_DEPTH);
    let page_size = args.page_size.or(config.page_size).unwrap_or(DEFAULT_PAGE_SIZE);
    let format_name = args
        .format
        .clone()
        .or_else(|| config.format.clone())
        .unwrap_or_else(|| ExportFormat::default().as_str().to_string());
    let include_extensions =
        args.include_extensions || config.include_extensions.unwrap_or(false);
    let policy = if args.propagate_fetch_errors || config.propagate_fetch_errors.unwrap_or(false) {
        FetchErrorPolicy::Propagate
    } else {
        FetchErrorPolicy::Stop
    };

    // Reject unknown formats before any record is fetched
    let format: ExportFormat = format_name.parse()?;

    let options = ExportOptions::default()
        .with_page_size(page_size)
        .with_fetch_error_policy(policy);
    let exporter =
        Exporter::new(ctx.registry.clone(), ctx.source.clone()).with_options(options);

    let mut request = ExportRequest::new(&args.scope)
        .with_depth(depth)
        .include_extensions(include_extensions)
        .with_format(format.as_str());
    if let Some(search) = &args.search {
        request = request.with_search(search);
    }

    tracing::debug!("Exporting scope '{}'", request.scope);
    let outcome = exporter.export_envelope(&request).await?;
    let content = format.convert(&outcome.envelope)?;

    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.stats)?);
    }

    if let Some(ref path) = args.output {
        // Write with secure permissions (0o600 = owner read/write only)
        #[cfg(unix)]
        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(path, &content)?;
        }
        println!(
            "Exported {} records to {:?}",
            outcome.envelope.data.len(),
            path
        );
    } else {
        println!("{}", content);
    }

    Ok(())
}
