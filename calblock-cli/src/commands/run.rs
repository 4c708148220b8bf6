use std::path::Path;

use anyhow::{Context, Result};

use crate::actuator::SystemActuator;
use crate::config::Config;
use crate::feed::WebcalFeed;
use crate::scheduler::{Scheduler, SystemClock};
use crate::singleton;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;

    // Fail at startup, not mid-event, if we lack the privileges to block.
    config.ensure_hosts_writable()?;

    let _lock = singleton::acquire_default()?;

    let feed = WebcalFeed::new(&config.feed_url)?;
    let scheduler = Scheduler::new(
        &config,
        Box::new(feed),
        Box::new(SystemActuator::new(&config)),
        Box::new(SystemClock),
    );

    scheduler.run().await?;
    Ok(())
}
