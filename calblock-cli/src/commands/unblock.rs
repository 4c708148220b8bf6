use std::path::Path;

use anyhow::{Context, Result};

use crate::actuator::HostsFile;
use crate::config::Config;

/// Recovery path for an unclean exit: find every hosts entry we manage and
/// remove it.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let mut hosts = HostsFile::new(config.hosts_path.clone(), config.redirect_ip.clone());

    let leftovers = hosts
        .managed_entries()
        .with_context(|| format!("Cannot read {}", config.hosts_path.display()))?;

    if leftovers.is_empty() {
        println!("No managed hosts entries found.");
        return Ok(());
    }

    let report = hosts.unblock(&leftovers);
    for item in &report.succeeded {
        println!("unblocked {}", item);
    }
    for (item, reason) in &report.failed {
        eprintln!("failed to unblock {}: {}", item, reason);
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} entries could not be removed", report.failed.len());
    }
    Ok(())
}
