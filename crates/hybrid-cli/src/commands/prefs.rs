//! Prefs command - view and change preferences.

use anyhow::{Context, Result};
use hybrid_config::Preferences;
use hybrid_core::HybridHome;

use crate::theme::Theme;

/// Print preferences as JSON.
pub(crate) fn show(home: &HybridHome, preferences: &Preferences) -> Result<()> {
    println!(
        "{}",
        Theme::dimmed(&format!("# {}", home.preferences_path().display()))
    );
    println!("{}", serde_json::to_string_pretty(preferences)?);
    Ok(())
}

/// Set one key and save.
pub(crate) fn set(
    home: &HybridHome,
    mut preferences: Preferences,
    key: &str,
    value: &str,
) -> Result<()> {
    preferences.set(key, value)?;
    home.ensure()
        .with_context(|| format!("failed to create {}", home.root().display()))?;
    let path = home.preferences_path();
    preferences
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{}", Theme::success(&format!("{key} = {value}")));
    Ok(())
}
