//! CLI for the orgaudit organization access reporter.
//!
//! Pipeline: resolve token -> collect snapshot -> resolve memberships -> explain access -> report.

use clap::Parser;
use orgaudit_analyzer::sink::json_stream::JsonStreamSink;
use orgaudit_analyzer::{MembershipResolver, Report};
use orgaudit_core::{OrgAuditError, Snapshot};
use orgaudit_provider::config::DEFAULT_API_URL;
use orgaudit_provider::{resolve_token, Collector, GitHubProvider, ProviderConfig};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "orgaudit",
    version,
    about = "Report who can access what in a GitHub organization"
)]
struct Cli {
    /// Organization to audit.
    #[arg(short, long, env = "ORGAUDIT_ORG", required_unless_present = "from_snapshot")]
    org: Option<String>,

    /// API token. Falls back to GITHUB_TOKEN, then `git credential fill`.
    #[arg(short, long)]
    token: Option<String>,

    /// Markdown report destination; "-" writes to stdout.
    #[arg(long, default_value = "output.md")]
    output: PathBuf,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Max in-flight team / repository fetches.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Skip the per-member email lookup.
    #[arg(long, default_value_t = false)]
    skip_emails: bool,

    /// Read a JSON snapshot instead of contacting the API.
    #[arg(long, conflicts_with = "token")]
    from_snapshot: Option<PathBuf>,

    /// Write the collected snapshot as JSON.
    #[arg(long)]
    save_snapshot: Option<PathBuf>,

    /// Sink output: "ndjson" writes NDJSON to stdout,
    /// "ndjson:/path/to/file" writes to file.
    #[arg(long)]
    sink: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let t0 = Instant::now();

    // 1. Snapshot: from disk or from the API.
    let snapshot = match &cli.from_snapshot {
        Some(path) => load_snapshot(path, cli.org.as_deref())?,
        None => collect(&cli).await?,
    };
    let t_collect = t0.elapsed();
    tracing::info!(
        org = %snapshot.organization,
        elapsed_ms = t_collect.as_millis(),
        "snapshot ready"
    );

    if let Some(path) = &cli.save_snapshot {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &snapshot)?;
        out.flush()?;
        tracing::info!(path = %path.display(), "snapshot saved");
    }

    // 2. Resolve and explain.
    let resolver = MembershipResolver::new(&snapshot);
    let report = Report::build(&snapshot, &resolver);
    let t_total = t0.elapsed();
    let report = report.with_timings(t_collect, t_total);

    let unshared = report
        .resources
        .iter()
        .filter(|r| r.explanation.is_no_access())
        .count();
    tracing::info!(
        groups = resolver.len(),
        resources = report.resources.len(),
        unshared,
        elapsed_ms = t_total.as_millis(),
        "analysis complete"
    );

    // 3. Sink output.
    if let Some(sink_spec) = &cli.sink {
        write_sink(sink_spec, &report)?;
    }

    // 4. Markdown report.
    let rendered = report.render();
    if cli.output.as_os_str() == "-" {
        if cli.sink.as_deref() == Some("ndjson") {
            // stdout already carries NDJSON rows.
            eprint!("{rendered}");
        } else {
            print!("{rendered}");
        }
    } else {
        std::fs::write(&cli.output, rendered)?;
        tracing::info!(path = %cli.output.display(), "report written");
    }

    Ok(())
}

async fn collect(cli: &Cli) -> Result<Snapshot, OrgAuditError> {
    let org = cli
        .org
        .as_deref()
        .ok_or_else(|| OrgAuditError::InvalidInput("--org is required".into()))?;

    let token = resolve_token(cli.token.as_deref()).await?;
    tracing::info!(source = %token.source, api_url = %cli.api_url, "using token");

    let config = ProviderConfig::new(&cli.api_url)?
        .with_concurrency(cli.concurrency)
        .with_max_retries(cli.max_retries);
    let provider = GitHubProvider::new(token.into_secret(), config)?;

    Collector::new(provider)
        .with_emails(!cli.skip_emails)
        .collect(org)
        .await
}

/// Loads a saved snapshot. `--org`, when given, must match the snapshot.
fn load_snapshot(path: &Path, org: Option<&str>) -> Result<Snapshot, OrgAuditError> {
    let reader = BufReader::new(File::open(path)?);
    let snapshot: Snapshot = serde_json::from_reader(reader).map_err(|e| {
        OrgAuditError::InvalidInput(format!("invalid snapshot {}: {e}", path.display()))
    })?;

    if let Some(org) = org {
        if !org.eq_ignore_ascii_case(&snapshot.organization) {
            return Err(OrgAuditError::InvalidInput(format!(
                "snapshot is for {}, not {org}",
                snapshot.organization
            )));
        }
    }
    tracing::info!(path = %path.display(), "loaded snapshot");
    Ok(snapshot)
}

fn write_sink(spec: &str, report: &Report) -> Result<(), OrgAuditError> {
    let (summary, members, resources) = report.to_rows();

    let (rows, destination) = if spec == "ndjson" {
        let mut s = JsonStreamSink::stdout();
        s.write_summary(&summary)?;
        s.write_rows(&members)?;
        s.write_rows(&resources)?;
        (s.finish()?, "stdout")
    } else if let Some(path) = spec.strip_prefix("ndjson:") {
        let mut s = JsonStreamSink::new(File::create(path)?);
        s.write_summary(&summary)?;
        s.write_rows(&members)?;
        s.write_rows(&resources)?;
        (s.finish()?, path)
    } else {
        return Err(OrgAuditError::InvalidInput(format!(
            "unknown sink: {spec}. Use 'ndjson' or 'ndjson:/path'"
        )));
    };

    tracing::info!(rows, destination, "ndjson sink: done");
    Ok(())
}
