use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use strand_core::{AppConfig, ProcessConfig, StrandResult};
use strand_runtime::platform::client::DynControlPlane;
use strand_runtime::{
    App, HttpControlPlane, InMemoryControlPlane, LocalRuntime, PlatformRuntime, RustcProbe,
    SpecStamp,
};
use strand_server::FunctionServer;

use crate::cli::{DeployArgs, PlanArgs};

pub async fn local(app: &dyn App, app_config: &Path) -> Result<()> {
    let mut runtime = LocalRuntime::from_path(app_config)?;
    app.run(&mut runtime).await?;
    Ok(())
}

/// Runs the app without provisioning anything.
///
/// The control plane handed to the runner is never contacted in this mode.
pub(crate) async fn dry_run(app: &dyn App, app_config: &Path) -> StrandResult<PlatformRuntime> {
    let config = AppConfig::load(app_config)?;
    let mut runtime = PlatformRuntime::new(config, Arc::new(InMemoryControlPlane::new()));
    app.run(&mut runtime).await?;
    runtime.ensure_healthy()?;
    Ok(runtime)
}

/// Runs the app in deploy mode against `client`.
///
/// A fatal failure the app swallowed still fails the deployment.
pub(crate) async fn provision(
    app: &dyn App,
    config: AppConfig,
    client: DynControlPlane,
    image: &str,
) -> StrandResult<PlatformRuntime> {
    let mut runtime = PlatformRuntime::deploying(config, client, image);
    app.run(&mut runtime).await?;
    runtime.ensure_healthy()?;
    Ok(runtime)
}

pub async fn plan(app: &dyn App, app_config: &Path, args: &PlanArgs) -> Result<()> {
    let runtime = dry_run(app, app_config).await?;
    print_spec(&runtime, args.app_name.as_deref(), &args.git_sha, &args.spec_version)
}

pub async fn deploy(
    app: &dyn App,
    app_config: &Path,
    process: &ProcessConfig,
    args: &DeployArgs,
) -> Result<()> {
    let config = AppConfig::load(app_config)?;
    let client = HttpControlPlane::from_config(process)?;
    let pipeline = config.pipeline.clone();

    let runtime = provision(app, config, Arc::new(client), &args.image_name).await?;
    tracing::info!(
        pipeline = %pipeline,
        functions = runtime.function_names().len(),
        resources = runtime.resources_used().len(),
        "deployment complete"
    );

    if let Some(version) = &args.spec_version {
        print_spec(&runtime, args.app_name.as_deref(), &args.git_sha, version)?;
    }
    Ok(())
}

pub async fn serve(
    app: &dyn App,
    app_config: &Path,
    process: &ProcessConfig,
    function: &str,
) -> Result<()> {
    let runtime = dry_run(app, app_config).await?;
    let server = FunctionServer::new(runtime.into_registry(), function, process)?;
    server.run().await
}

pub async fn functions(app: &dyn App, app_config: &Path) -> Result<()> {
    let runtime = dry_run(app, app_config).await?;
    let listing = serde_json::to_string(&runtime.function_names())
        .context("Failed to encode function list")?;
    println!("{listing}");
    Ok(())
}

pub async fn resources(app: &dyn App, app_config: &Path) -> Result<()> {
    let runtime = dry_run(app, app_config).await?;
    let listing = serde_json::to_string(runtime.resources_used())
        .context("Failed to encode resource list")?;
    println!("{listing}");
    Ok(())
}

fn print_spec(
    runtime: &PlatformRuntime,
    app_name: Option<&str>,
    git_sha: &str,
    spec_version: &str,
) -> Result<()> {
    let mut stamp = SpecStamp::new(app_name.unwrap_or(&runtime.config().name), git_sha);
    stamp.spec_version = spec_version.to_string();

    let spec = runtime.deploy_spec(&stamp, &RustcProbe::default())?;
    println!("{}", spec.to_json_pretty()?);
    Ok(())
}
