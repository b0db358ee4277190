//! Capabilities command - list, inspect and check install state.

use anyhow::Result;
use colored::Colorize;
use hybrid_capabilities::Category;

use crate::app::{App, parse_name};
use crate::theme::Theme;

/// List registered capabilities, optionally filtered by category.
pub(crate) fn list(app: &App, category: Option<Category>) -> Result<()> {
    let registry = app.service.registry();
    let names = registry.list(category);
    if names.is_empty() {
        println!("{}", Theme::info("No capabilities registered"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Capabilities"));
    println!(
        "{:<16} {:<14} {}",
        "NAME".dimmed(),
        "CATEGORY".dimmed(),
        "STATE".dimmed()
    );
    println!("{}", Theme::separator());

    for name in names {
        let descriptor = registry.descriptor(&name)?;
        let installed = app.service.is_installed(&name)?;
        println!(
            "{:<16} {:<14} {}",
            name.as_str().bold(),
            descriptor.category().as_str(),
            Theme::installed(installed)
        );
    }
    println!();
    Ok(())
}

/// Show one capability's packages, features and metadata.
pub(crate) fn info(app: &App, raw: &str) -> Result<()> {
    let name = parse_name(raw)?;
    let descriptor = app.service.registry().descriptor(&name)?;
    let missing = app.service.missing_packages(&name)?;

    println!("\n{}", Theme::header(name.as_str()));
    println!("{}", Theme::separator());
    if let Some(meta) = descriptor.metadata() {
        if !meta.description.is_empty() {
            println!("{}", Theme::kv("Description", &meta.description));
        }
        if let Some(url) = &meta.repo_url {
            println!("{}", Theme::kv("Repository", url));
        }
    }
    println!("{}", Theme::kv("Category", descriptor.category().as_str()));
    println!(
        "{}",
        Theme::kv("State", &Theme::installed(app.service.is_installed(&name)?))
    );

    let features: Vec<&str> = descriptor.features().iter().map(|f| f.as_str()).collect();
    let features = if features.is_empty() {
        "none".to_string()
    } else {
        features.join(", ")
    };
    println!("{}", Theme::kv("Features", &features));
    if descriptor.no_dependency_resolution() {
        println!("{}", Theme::kv("Resolution", "--no-deps"));
    }

    println!("{}", Theme::kv("Packages", ""));
    for spec in descriptor.required_packages() {
        let marker = if missing.iter().any(|m| m.name() == spec.name()) {
            "✗".red()
        } else {
            "✓".green()
        };
        println!("    {marker} {spec}");
    }
    println!();
    Ok(())
}

/// Show every capability with its missing packages.
pub(crate) fn status(app: &App) -> Result<()> {
    let orchestrator = app.service.orchestrator();
    let resolver = orchestrator.resolver();

    println!("\n{}", Theme::header("Environment"));
    println!("{}", Theme::separator());
    println!(
        "{}",
        Theme::kv("Home", &app.home.root().display().to_string())
    );
    let target = if resolver.is_isolated_environment_active() {
        "active isolated environment".to_string()
    } else {
        resolver.venv_dir().display().to_string()
    };
    println!("{}", Theme::kv("Installs to", &target));
    println!(
        "{}",
        Theme::kv("Install log", &orchestrator.log().path().display().to_string())
    );

    println!("\n{}", Theme::header("Capabilities"));
    println!("{}", Theme::separator());
    for descriptor in app.service.registry().iter() {
        let name = descriptor.name();
        let missing = app.service.missing_packages(name)?;
        let line = if missing.is_empty() {
            Theme::installed(app.service.is_installed(name)?)
        } else {
            let listed: Vec<String> = missing.iter().map(ToString::to_string).collect();
            format!("{} {}", "missing".yellow(), Theme::dimmed(&listed.join(", ")))
        };
        println!("  {:<16} {line}", name.as_str().bold());
    }
    println!();
    Ok(())
}
