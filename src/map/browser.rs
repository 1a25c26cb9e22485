use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Open a file in the system's default browser
pub fn open_in_browser(path: &Path) -> Result<()> {
    let full_path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let status = if cfg!(target_os = "windows") {
        Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(&full_path)
            .status()
    } else if cfg!(target_os = "macos") {
        Command::new("open").arg(&full_path).status()
    } else {
        Command::new("xdg-open").arg(&full_path).status()
    }
    .context("Failed to launch the browser")?;

    if !status.success() {
        bail!("Browser launcher exited with {}", status);
    }

    info!("Opened '{}' in the default browser", full_path.display());
    Ok(())
}
