//! verbump CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use verbump::{Cli, commands};
use verbump_core::config::ConfigLoader;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let _guard = observability::init(&observability::LogSettings {
        log_dir: config.log_dir.as_ref().map(|dir| dir.as_std_path()),
        default_level: config.log_level.as_str(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        ansi: cli.color.stderr_ansi(),
    })
    .context("failed to initialize logging")?;

    debug!(
        part = %cli.part,
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let result = commands::bump::cmd_bump(&cli, &config, &cwd);
    if let Err(ref err) = result {
        tracing::error!(
            target: observability::FATAL_TARGET,
            error = %format!("{err:#}"),
            "fatal error"
        );
    }
    result
}
