use anyhow::{Context, Result, bail};
use args::Args;
use clap::Parser;
use gist_common::observability::{LogConfig, init_logging};
use gist_config::{GistConfig, GistConfigLoader};
use gist_llm::ensure_llm_ready;
use gist_pipeline::{
    PipelineOrchestrator, PipelineSettings, RequestScheduler, SchedulerConfig, Summarizer,
    WebDriverLauncher,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

mod args;
mod report;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    // 1) Config: explicit file, or the optional defaults; env wins either way.
    let loader = match &args.config {
        Some(path) => GistConfigLoader::new().with_file(path),
        None => GistConfigLoader::new().with_default_files(),
    };
    let cfg: GistConfig = loader.load().context("failed to load configuration")?;

    let log_path = init_logging(LogConfig {
        app_name: "gist",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr || args.verbose,
        format: cfg.logging.format,
        default_filter: if args.verbose {
            "debug".to_string()
        } else {
            cfg.logging.filter.clone()
        },
    })?;

    let run_id = Uuid::new_v4();
    let opts = args.summary_options();
    opts.validate()?;
    tracing::info!(%run_id, urls = args.urls.len(), log = %log_path.display(), "gist.start");

    // 2) Collaborators.
    let llm = ensure_llm_ready(&cfg.llm).await?;
    let scheduler = RequestScheduler::new(SchedulerConfig {
        max_concurrent: cfg.scheduler.max_concurrent,
        min_delay: Duration::from_millis(cfg.scheduler.min_delay_ms),
    });
    let summarizer = Summarizer::new(llm, scheduler).with_temperature(cfg.llm.temperature());

    let mut driver = cfg.browser.driver_options();
    if let Some(url) = &args.webdriver_url {
        driver.webdriver_url = url.clone();
    }
    if let Some(headless) = args.headless_override() {
        driver.headless = headless;
    }
    let orchestrator = PipelineOrchestrator::with_summarizer(
        Arc::new(WebDriverLauncher::new(driver)),
        summarizer,
        PipelineSettings {
            navigation_timeout: cfg.browser.navigation_timeout(),
            ..Default::default()
        },
    );

    // 3) Run.
    let report = match args.urls.as_slice() {
        [url] => orchestrator.summarize_url(url, &opts).await?,
        urls => orchestrator.summarize_batch(urls, &opts).await?,
    };

    let rendered = report::render(&report, &opts, run_id, args.json)?;
    print!("{rendered}");

    if let Some(path) = &opts.save_to_file {
        report::save(path, &rendered).await?;
        tracing::info!(path = %path.display(), "gist.report.saved");
    }

    tracing::info!(
        %run_id,
        succeeded = report.successes(),
        failed = report.failures(),
        "gist.done"
    );
    if report.successes() == 0 {
        bail!("all {} URLs failed", report.outcomes.len());
    }
    Ok(())
}
