use anyhow::{Context, Result};
use std::path::Path;

use app_limiter::config::{EXAMPLE_CONFIG, get_config_path};
use app_limiter::{AppLimiter, Applied, LimiterConfig, PermissionOutcome, PermissionStatus};

use super::utils::{format_selection, format_window, init_logging};
use crate::cli::{Args, Commands};

/// Run a limiter command
pub fn run_limiter_command(args: Args) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => get_config_path()?,
    };

    // A broken config must not stop `init --force` from replacing it
    if let Commands::Init { force } = args.command {
        init_logging(args.verbose, "info");
        return init(&config_path, force);
    }

    let config = LimiterConfig::load_or_default(&config_path)?;
    init_logging(args.verbose, &config.logging.level);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(args.command, &config_path, &config))
}

/// Write the example configuration file
fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite",
            path.display()
        );
    }

    app_limiter::storage::atomic_write(path, EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    println!("✓ Created configuration file: {}", path.display());
    println!("\nEdit this file to change the monitoring window and storage locations.");
    Ok(())
}

async fn dispatch(command: Commands, config_path: &Path, config: &LimiterConfig) -> Result<()> {
    let limiter = AppLimiter::from_config(config)?;

    match command {
        Commands::Init { force } => init(config_path, force),
        Commands::Version => {
            println!("{}", limiter.platform_version());
            Ok(())
        }
        Commands::CheckPermissions => {
            let status = limiter.check_permissions().await?;
            println!("{}", status);
            Ok(())
        }
        Commands::RequestPermissions => {
            let outcome = limiter.request_permissions().await?;
            println!("{}", outcome);
            if outcome == PermissionOutcome::SettingsOpened {
                println!("Finish granting access in system settings, then run check-permissions.");
            }
            Ok(())
        }
        Commands::Status => {
            start(&limiter).await?;
            status(&limiter, config).await
        }
        Commands::Block(selection) => {
            start(&limiter).await?;
            let applied = limiter.block_apps(selection.into_selection()).await?;
            report_shield(&applied);
            Ok(())
        }
        Commands::Discourage(selection) => {
            start(&limiter).await?;
            let applied = limiter.set_discourage_selection(selection.into_selection()).await?;
            report_shield(&applied);
            Ok(())
        }
        Commands::Encourage(selection) => {
            start(&limiter).await?;
            let applied = limiter.set_encourage_selection(selection.into_selection()).await?;
            match &applied.value {
                Some(schedule) => println!("✓ Monitoring scheduled {}", format_window(schedule)),
                None => println!("✓ Monitoring stopped (nothing selected)"),
            }
            report_persistence(&applied);
            Ok(())
        }
        Commands::Clear => {
            start(&limiter).await?;
            let applied = limiter.clear_restrictions().await?;
            println!("✓ Restrictions cleared");
            report_persistence(&applied);
            Ok(())
        }
    }
}

async fn start(limiter: &AppLimiter) -> Result<()> {
    limiter
        .start()
        .await
        .context("Failed to load restriction state")?;
    Ok(())
}

async fn status(limiter: &AppLimiter, config: &LimiterConfig) -> Result<()> {
    let state = limiter.state().await?;
    let permission = limiter.check_permissions().await?;

    println!("App Limiter Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Platform:     {}", limiter.platform_version());
    println!(
        "Permission:   {}",
        if permission == PermissionStatus::Approved { "approved" } else { "denied" }
    );
    println!("Blocking:     {}", if state.blocking { "requested" } else { "off" });
    println!();
    println!("Shielded:     {}", format_selection(&state.discourage_selection));
    println!("Monitored:    {}", format_selection(&state.encourage_selection));

    let template = config.schedule.template()?;
    let schedule = template.schedule_for(&state.encourage_selection);
    let now = chrono::Local::now().time();
    println!(
        "Window:       {}{}",
        format_window(&schedule),
        if template.window.contains(now) { " (active now)" } else { "" }
    );

    Ok(())
}

fn report_shield(applied: &Applied<app_limiter::ShieldDirective>) {
    match &applied.value {
        Some(selection) => println!("✓ Shield applied: {}", format_selection(selection)),
        None => println!("✓ Shield removed"),
    }
    report_persistence(applied);
}

fn report_persistence<T>(applied: &Applied<T>) {
    if let Some(err) = &applied.persistence_error {
        eprintln!("Warning: change is active but was not saved: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("app-limiter.toml");

        init(&path, false).unwrap();

        let config = LimiterConfig::load(&path).unwrap();
        assert_eq!(config.schedule.start, "15:08");
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("app-limiter.toml");
        std::fs::write(&path, "not toml at all [").unwrap();

        let err = init(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        init(&path, true).unwrap();
        assert!(LimiterConfig::load(&path).is_ok());
    }
}
