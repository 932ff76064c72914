//! `livedev instrument`: show what a script looks like when served live.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::instrument::instrument;

/// Print the instrumented code of `file`, or its function ID map.
pub fn run(file: &Path, json: bool) -> Result<()> {
    let source =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    println!("{}", render(&source, json)?);
    Ok(())
}

fn render(source: &str, json: bool) -> Result<String> {
    let instrumented = instrument(source)?;
    if json {
        Ok(serde_json::to_string_pretty(&instrumented.ids)?)
    } else {
        Ok(instrumented.code)
    }
}
