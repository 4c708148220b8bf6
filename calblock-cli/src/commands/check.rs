use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use calblock_core::directive;

/// Dry-run the description parser so users can verify their event markup
/// before the event goes live.
pub fn run(file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Cannot read stdin")?;
            buf
        }
    };

    let parsed = directive::parse(&text);

    for warning in &parsed.warnings {
        eprintln!("warning: {}", warning);
    }

    if parsed.directive.is_empty() {
        println!("Nothing would be blocked.");
        return Ok(());
    }

    for app in &parsed.directive.apps {
        println!("app      {}", app);
    }
    for site in &parsed.directive.websites {
        println!("website  {}", site);
    }

    Ok(())
}
