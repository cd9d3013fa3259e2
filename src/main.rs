mod cli;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{ApplyArgs, CheckArgs, Cli, Command};
use declarative::DryRun;
use keel::config::Config;
use keel::engine::{self, ApplyOptions};
use keel::manifest::Manifest;
use keel::platform::Platform;
use keel::provider::{Kind, ProviderRegistry};
use keel::{Dsl, paths, ui};
use std::io;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reconciliation messages are info-level; apply shows them by default
    let base = match cli.command {
        Command::Apply(_) => 1,
        _ => 0,
    };
    let log_level = match cli.verbose.saturating_add(base) {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Apply(ref args) => apply(&cli, args),
        Command::Check(ref args) => check(&cli, args),
        Command::Platform => show_platform(&cli),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "keel", &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn registry(cli: &Cli) -> Result<ProviderRegistry> {
    let config = load_config(cli)?;
    let platform = config.platform(cli.platform)?;
    log::debug!("Platform: {platform}");
    config.registry(platform)
}

fn load_manifest(path: &std::path::Path) -> Result<Manifest> {
    let path = paths::expand(&path.to_string_lossy());
    Manifest::load(&path)
}

fn apply(cli: &Cli, args: &ApplyArgs) -> Result<()> {
    let dsl = Dsl::new(registry(cli)?, DryRun::global().clone());
    let manifest = load_manifest(&args.manifest)?;

    let summary = engine::apply(
        &dsl,
        manifest,
        ApplyOptions {
            dry_run: args.dry_run,
            keep_going: args.keep_going,
        },
    )
    .with_context(|| format!("Failed to apply {}", args.manifest.display()))?;

    if !summary.is_success() {
        bail!("{} resources failed", summary.failed);
    }
    Ok(())
}

fn check(cli: &Cli, args: &CheckArgs) -> Result<()> {
    let dsl = Dsl::new(registry(cli)?, DryRun::global().clone());
    let manifest = load_manifest(&args.manifest)?;

    let drift = engine::check(&dsl, manifest)
        .with_context(|| format!("Failed to check {}", args.manifest.display()))?;
    if drift.iter().any(|d| d.is_error()) {
        bail!("Some resources could not be checked");
    }
    Ok(())
}

fn show_platform(cli: &Cli) -> Result<()> {
    let registry = registry(cli)?;
    let detected = keel::platform::detect();

    ui::header("Platform");
    ui::kv("detected", detected.as_str());
    if registry.platform() != detected {
        ui::kv("using", registry.platform().as_str());
    }
    if registry.platform() == Platform::Unknown {
        ui::warn("No default providers for this platform");
    }

    ui::section("Providers");
    for kind in Kind::ALL {
        let available = ProviderRegistry::available(kind);
        let selected = match registry.provider_name(kind) {
            Some(name) if available.iter().any(|n| *n == name) => name.to_string(),
            Some(name) => format!("{name} (unknown)"),
            None => "(none)".to_string(),
        };
        ui::kv(
            kind.as_str(),
            &format!("{selected}  [{}]", available.join(", ")),
        );
    }
    match paths::config_file() {
        Ok(path) if path.exists() => ui::dim(&format!("Config: {}", path.display())),
        Ok(path) => ui::dim(&format!("Config: {} (not found)", path.display())),
        Err(e) => ui::error(&format!("Config: {e}")),
    }
    Ok(())
}
