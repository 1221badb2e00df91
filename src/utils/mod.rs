use anyhow::{Context, Result};
use std::path::Path;

/// Create a directory (and parents) if it does not already exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Round a monetary amount to cents. Totals are computed from REAL
/// columns, so every derived amount goes through this before persisting.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
