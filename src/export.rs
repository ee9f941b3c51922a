use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::CompanyDetailsIndex;

/// Write the accumulated company index as pretty-printed JSON.
pub fn write_company_index(index: &CompanyDetailsIndex, path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(index).context("failed to serialize company index")?;

    fs::write(path, json)
        .context(format!("failed to write company index to {}", path.display()))?;

    Ok(())
}
