//! Command handlers for llll.
//!
//! Each handler returns `Ok(true)` on success, `Ok(false)` when the command
//! ran but the outcome is a failure the user has already been shown, and
//! `Err` for everything else.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use llll_common::discovery::DEFAULT_DISCOVERY_TIMEOUT_SECS;
use llll_common::{
    discover, init_workspace, list_logs, list_programs, read_log, HubSnapshot, HubType,
    InitOutcome, LlllConfig, ProgramRunner, ProjectContext, ReleaseClient, RunRequest, Uploader,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::debug;

use crate::output;

/// Where a command runs and how it reports
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project: ProjectContext,
    /// Print machine-readable JSON instead of text
    pub json: bool,
}

impl CommandContext {
    pub fn new(project: ProjectContext, json: bool) -> Self {
        Self { project, json }
    }

    fn load_config(&self) -> Result<Option<LlllConfig>> {
        LlllConfig::load(&self.project).context("Failed to load project configuration")
    }

    fn runner(&self, config: Option<&LlllConfig>) -> ProgramRunner {
        let configured = config.and_then(|c| c.settings.uploader.as_deref());
        ProgramRunner::new(self.project.clone(), Uploader::resolve(configured))
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn ok_marker() -> String {
    "[OK]".bright_green().to_string()
}

fn fail_marker() -> String {
    "[FAIL]".bright_red().to_string()
}

/// Outcome of one discovery attempt, as printed with `--json`
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum DetectReport {
    Detected(HubSnapshot),
    Failed {
        error: String,
        /// Raw uploader output, when the probe got as far as running
        output: Option<String>,
    },
}

impl DetectReport {
    fn detected(&self) -> bool {
        matches!(self, DetectReport::Detected(_))
    }
}

#[derive(Debug, Serialize)]
struct InitReport {
    mcp_config: PathBuf,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detect: Option<DetectReport>,
}

/// Handle `llll init`
pub async fn init(
    ctx: &CommandContext,
    detect_hub: bool,
    hub_name: Option<String>,
    force: bool,
) -> Result<bool> {
    if !ctx.json {
        println!("Initializing llll workspace...");
        println!("Location: {}", ctx.project.root().display());
        println!();
    }

    let outcome = init_workspace(&ctx.project, force).context("Failed to write .mcp.json")?;
    let status = match &outcome {
        InitOutcome::Created(_) => "created",
        InitOutcome::Overwritten(_) => "overwritten",
        InitOutcome::Skipped(_) => "skipped",
    };

    if ctx.json {
        let detect = if detect_hub {
            Some(detect_and_save(ctx, hub_name, DEFAULT_DISCOVERY_TIMEOUT_SECS).await?)
        } else {
            None
        };
        let ok = detect.as_ref().map_or(true, DetectReport::detected);
        ctx.print_json(&InitReport {
            mcp_config: outcome.path().clone(),
            status,
            detect,
        })?;
        return Ok(ok);
    }

    match &outcome {
        InitOutcome::Created(_) => println!("{} Created .mcp.json", ok_marker()),
        InitOutcome::Overwritten(_) => println!("{} Overwrote .mcp.json", ok_marker()),
        InitOutcome::Skipped(_) => println!(
            "{} .mcp.json already exists, skipping (use --force to overwrite)",
            "[SKIP]".yellow()
        ),
    }
    println!();

    if !detect_hub {
        println!("Workspace initialized!");
        println!();
        println!("Next steps:");
        println!("  1. Configure your MCP client to use this workspace");
        println!("  2. Run 'llll init --detect' to auto-detect your LEGO hub (optional)");
        println!("  3. Start building robot programs");
        return Ok(true);
    }

    println!("Running hub detection...");
    println!();
    let detected = detect_and_save(ctx, hub_name, DEFAULT_DISCOVERY_TIMEOUT_SECS)
        .await?
        .detected();
    if !detected {
        println!();
        println!("You can run detection later with: llll init --detect");
    }
    Ok(detected)
}

/// Handle `llll detect`
pub async fn detect(
    ctx: &CommandContext,
    hub_name: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<bool> {
    let report = detect_and_save(
        ctx,
        hub_name,
        timeout_secs.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT_SECS),
    )
    .await?;
    if ctx.json {
        ctx.print_json(&report)?;
    }
    Ok(report.detected())
}

/// Run discovery and save the result. Text output is printed here; JSON is
/// left to the caller.
async fn detect_and_save(
    ctx: &CommandContext,
    hub_name: Option<String>,
    timeout_secs: u64,
) -> Result<DetectReport> {
    let previous = ctx.load_config()?;
    let runner = ctx.runner(previous.as_ref());

    let snapshot = match discover(&runner, hub_name, timeout_secs).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            if !ctx.json {
                println!("{} {}", fail_marker(), output::format_discovery_failure(&e));
            }
            return Ok(DetectReport::Failed {
                error: e.to_string(),
                output: e.raw_output().map(str::to_string),
            });
        }
    };

    let config = LlllConfig::from_snapshot(&snapshot, previous.map(|c| c.settings));
    let path = config.save(&ctx.project)?;

    if !ctx.json {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{} Hub detected and saved to {}", ok_marker(), file_name);
        println!();
        println!("{}", config.format_hub_info());
    }
    Ok(DetectReport::Detected(snapshot))
}

/// Handle `llll info`
pub fn info(ctx: &CommandContext) -> Result<bool> {
    let Some(config) = ctx.load_config()? else {
        println!("No llll.toml found. Run 'llll detect' to auto-detect the connected hub and its devices.");
        return Ok(false);
    };

    if ctx.json {
        ctx.print_json(&config)?;
    } else {
        println!("{}", config.format_hub_info());
    }
    Ok(true)
}

/// Handle `llll run`
pub async fn run(
    ctx: &CommandContext,
    file: PathBuf,
    hub_name: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<bool> {
    let config = ctx.load_config()?;

    let hub_name = hub_name.or_else(|| {
        config
            .as_ref()
            .and_then(|c| c.default_hub_name())
            .map(str::to_string)
    });
    let timeout_secs = timeout_secs
        .or_else(|| config.as_ref().map(|c| c.settings.timeout))
        .unwrap_or(llll_common::runner::DEFAULT_TIMEOUT_SECS);
    debug!("run {} hub={:?} timeout={}s", file.display(), hub_name, timeout_secs);

    let request = RunRequest::new(file.clone())
        .with_hub_name(hub_name)
        .with_timeout_secs(timeout_secs);
    let result = ctx.runner(config.as_ref()).run(&request).await?;

    if ctx.json {
        ctx.print_json(&result)?;
    } else {
        let marker = if result.success { ok_marker() } else { fail_marker() };
        println!("{} {}", marker, output::format_run_result(&file, &result));
    }
    Ok(result.success)
}

/// Handle `llll programs`
pub fn programs(ctx: &CommandContext, dir: &Path) -> Result<bool> {
    let programs = list_programs(&ctx.project, dir)?;
    if ctx.json {
        ctx.print_json(&programs)?;
    } else {
        println!("{}", output::format_programs(&programs, dir));
    }
    Ok(true)
}

/// Handle `llll logs`
pub fn logs(ctx: &CommandContext) -> Result<bool> {
    let entries = list_logs(&ctx.project).context("Failed to list run logs")?;
    if ctx.json {
        ctx.print_json(&entries)?;
    } else {
        println!("{}", output::format_log_list(&entries));
    }
    Ok(true)
}

/// Handle `llll log`
pub fn log(ctx: &CommandContext, name: Option<&str>) -> Result<bool> {
    let contents = read_log(&ctx.project, name)?;
    print!("{}", contents);
    Ok(true)
}

/// Hub type from the flag, else from the configured hub
fn resolve_hub_type(hub_type: Option<&str>, config: Option<&LlllConfig>) -> Result<HubType> {
    if let Some(name) = hub_type {
        return Ok(name.parse::<HubType>()?);
    }
    match config.and_then(|c| c.default_hub_type()) {
        Some(hub_type) => Ok(hub_type),
        None => bail!("No hub type given and no hub configured. Pass --hub-type or run 'llll detect' first."),
    }
}

/// Handle `llll firmware check`
pub async fn firmware_check(
    ctx: &CommandContext,
    current: Option<String>,
    hub_type: Option<&str>,
) -> Result<bool> {
    let config = ctx.load_config()?;
    let hub_type = resolve_hub_type(hub_type, config.as_ref())?;
    let current = current
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.hubs.first())
                .and_then(|h| h.firmware_version.clone())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let check = ReleaseClient::new()
        .check_update_available(&current, hub_type)
        .await;

    if ctx.json {
        ctx.print_json(&check)?;
    } else {
        println!("Hub: {}", hub_type);
        println!("{}", output::format_update_check(&check));
    }
    Ok(check.error.is_none())
}

/// Handle `llll firmware download`
pub async fn firmware_download(
    ctx: &CommandContext,
    hub_type: Option<&str>,
    dest: Option<PathBuf>,
) -> Result<bool> {
    let config = ctx.load_config()?;
    let hub_type = resolve_hub_type(hub_type, config.as_ref())?;
    let dest_dir = match dest {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => ctx.project.root().join(dir),
        None => ctx.project.root().to_path_buf(),
    };

    let path = ReleaseClient::new()
        .download_latest_firmware(hub_type, &dest_dir)
        .await?;

    println!("{} Downloaded {}", ok_marker(), path.display());
    Ok(true)
}
