use anyhow::{Context, Result};
use log::*;
use std::{fs, path::Path};
use tickfill_shared::Packet;

/// Writes the packets to `path` as a pretty printed JSON array.
pub fn write_packets(path: &Path, packets: &[Packet]) -> Result<()> {
    let json = serde_json::to_string_pretty(packets)?;

    fs::write(path, json)
        .with_context(|| format!("failed to write packets to {}", path.display()))?;

    info!("Packets saved to {}", path.display());

    Ok(())
}
