//! Text and JSON views of a built context

use anyhow::Result;
use hwctx_core::Context;
use std::fmt::{self, Write};

use crate::config::{OutputConfig, OutputFormat};

pub fn render(ctx: &Context, output: &OutputConfig) -> Result<String> {
    match output.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(ctx)?),
        OutputFormat::Summary => Ok(summary(ctx, output.show_attributes)?),
    }
}

/// Indented tree, one line per device and channel
pub fn summary(ctx: &Context, show_attributes: bool) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let channels = ctx.channels().count();
    writeln!(
        out,
        "{} context: {} devices, {} channels",
        ctx.name(),
        ctx.device_count(),
        channels
    )?;

    for dev in ctx.devices() {
        match dev.name() {
            Some(name) => writeln!(out, "  - {} ({})", dev.id(), name)?,
            None => writeln!(out, "  - {}", dev.id())?,
        }
        if show_attributes && !dev.attrs().is_empty() {
            writeln!(out, "    attributes: {}", dev.attrs().join(", "))?;
        }

        for chn in dev.channels() {
            let label = chn
                .name()
                .map(|n| format!("{} ({})", chn.id(), n))
                .unwrap_or_else(|| chn.id().to_string());
            writeln!(out, "    * {} [{}]", label, chn.direction())?;
            if show_attributes && !chn.attrs().is_empty() {
                writeln!(out, "      attributes: {}", chn.attrs().join(", "))?;
            }
        }
    }

    Ok(out)
}
