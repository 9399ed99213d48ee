//! CLI command implementations

pub mod check;
pub mod load;

use anyhow::Result;

use linehaul_ingest::records::REGISTRY;

/// List every loadable table with its columns.
pub fn tables() -> Result<()> {
    for schema in REGISTRY {
        tracing::info!(
            table = schema.table,
            columns = schema.columns.join(", "),
            "registered table"
        );
    }
    Ok(())
}
