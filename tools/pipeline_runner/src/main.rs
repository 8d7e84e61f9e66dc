use esg_core::acquire::http::{FixtureFetcher, HttpFetcher, ReqwestFetcher};
use esg_core::catalog::OrgCatalog;
use esg_core::config::RunConfig;
use esg_core::pipeline::{run_full_pipeline, PipelineOptions};
use esg_core::rubric::load_rubric;
use esg_core::score::EvidenceCountModel;
use std::path::{Path, PathBuf};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "usage: pipeline_runner <org_catalog.yaml> <rubric.json> <data_root> <artifacts_root>"
        );
        std::process::exit(2);
    }
    let catalog_path = Path::new(&args[1]);
    let rubric_path = Path::new(&args[2]);
    let data_root = PathBuf::from(&args[3]);
    let artifacts_root = PathBuf::from(&args[4]);

    let exit = match run(catalog_path, rubric_path, &data_root, &artifacts_root) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pipeline_runner: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(exit);
}

fn run(
    catalog_path: &Path,
    rubric_path: &Path,
    data_root: &Path,
    artifacts_root: &Path,
) -> esg_core::error::CoreResult<i32> {
    let cwd = std::env::current_dir()?;
    let config = RunConfig::from_env(&cwd)?;
    let catalog = OrgCatalog::load(catalog_path)?;
    let rubric = load_rubric(rubric_path)?;

    // Network fetcher only when the catalog actually needs the network; a
    // fully-local matrix runs without a User-Agent.
    let fetcher: Box<dyn HttpFetcher> = if catalog.orgs.iter().any(|o| o.provider.needs_network()) {
        let ua = config.require_user_agent()?;
        Box::new(ReqwestFetcher::new(ua)?)
    } else {
        Box::new(FixtureFetcher::default())
    };

    let scan_root = cwd.join("core").join("src");
    let opts = PipelineOptions {
        authenticity_scan_root: scan_root.exists().then_some(scan_root),
        ..PipelineOptions::default()
    };

    let matrix = run_full_pipeline(
        &config,
        data_root,
        artifacts_root,
        &catalog,
        &rubric,
        &EvidenceCountModel,
        fetcher,
        &opts,
    )?;

    println!(
        "{}",
        serde_json::to_string_pretty(&matrix).unwrap_or_default()
    );
    Ok(if matrix.matrix_status == "ok" { 0 } else { 1 })
}
