use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use strand_runtime::platform::spec::SPEC_VERSION;

#[derive(Debug, Parser)]
#[command(name = "strand")]
#[command(about = "Run, plan, deploy or serve a Strand data app")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// App description file
    #[arg(long, global = true, env = "STRAND_APP_CONFIG", default_value = "app.json")]
    pub app_config: PathBuf,

    /// Process settings file (TOML); environment variables take precedence
    #[arg(long, global = true, env = "STRAND_CONFIG")]
    pub config: Option<String>,

    /// Log level (overrides STRAND_LOG_LEVEL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the app against local fixture files
    Local,
    /// Print the deploy spec the app would produce, without contacting the platform
    Plan(PlanArgs),
    /// Provision the app's pipeline, connectors and functions on the platform
    Deploy(DeployArgs),
    /// Serve one of the app's functions
    Serve(ServeArgs),
    /// List the app's functions as JSON
    Functions,
    /// List the resources the app uses as JSON
    Resources,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// App name recorded in the deploy spec (defaults to the app config name)
    #[arg(long)]
    pub app_name: Option<String>,
    /// Source revision recorded in the deploy spec
    #[arg(long, env = "STRAND_GIT_SHA", default_value = "")]
    pub git_sha: String,
    /// Spec schema version
    #[arg(long = "spec", default_value = SPEC_VERSION)]
    pub spec_version: String,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Image the platform runs functions from
    #[arg(long)]
    pub image_name: String,
    /// App name recorded in the deploy spec (defaults to the app config name)
    #[arg(long)]
    pub app_name: Option<String>,
    /// Source revision recorded in the deploy spec
    #[arg(long, env = "STRAND_GIT_SHA", default_value = "")]
    pub git_sha: String,
    /// Also print the deploy spec, in this schema version
    #[arg(long = "spec")]
    pub spec_version: Option<String>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Registered function name
    pub function: String,
}
