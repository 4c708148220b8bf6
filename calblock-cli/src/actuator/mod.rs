//! OS-level block/unblock execution.
//!
//! The scheduler is written once against the `Actuator` trait; the platform
//! mechanics (hosts-file editing for websites, process termination for apps)
//! live behind it. Every operation is idempotent and reports per-item
//! outcomes so one stubborn item never poisons a whole tick.

mod hosts;
mod process;

use std::collections::BTreeSet;

pub use hosts::HostsFile;

use crate::config::Config;

/// Per-item result of one actuator call.
#[derive(Debug, Default, Clone)]
pub struct ActuationReport {
    pub succeeded: Vec<String>,
    /// (item, reason) pairs. Failed items stay out of BlockState and are
    /// retried on the next tick.
    pub failed: Vec<(String, String)>,
}

impl ActuationReport {
    pub fn all_ok(items: &BTreeSet<String>) -> Self {
        ActuationReport {
            succeeded: items.iter().cloned().collect(),
            failed: Vec::new(),
        }
    }

    pub fn all_failed(items: &BTreeSet<String>, reason: &str) -> Self {
        ActuationReport {
            succeeded: Vec::new(),
            failed: items.iter().map(|i| (i.clone(), reason.to_string())).collect(),
        }
    }
}

/// Platform executor of block/unblock operations.
///
/// Calling block on an already-blocked item (or unblock on an unblocked one)
/// must succeed without effect; the scheduler recomputes the diff from
/// scratch each tick rather than tracking event identity.
pub trait Actuator: Send {
    fn block_apps(&mut self, apps: &BTreeSet<String>) -> ActuationReport;
    fn unblock_apps(&mut self, apps: &BTreeSet<String>) -> ActuationReport;
    fn block_websites(&mut self, hosts: &BTreeSet<String>) -> ActuationReport;
    fn unblock_websites(&mut self, hosts: &BTreeSet<String>) -> ActuationReport;
}

/// The real actuator for the current platform.
pub struct SystemActuator {
    hosts: HostsFile,
}

impl SystemActuator {
    pub fn new(config: &Config) -> Self {
        SystemActuator {
            hosts: HostsFile::new(config.hosts_path.clone(), config.redirect_ip.clone()),
        }
    }
}

impl Actuator for SystemActuator {
    fn block_apps(&mut self, apps: &BTreeSet<String>) -> ActuationReport {
        let mut report = ActuationReport::default();
        for app in apps {
            match process::terminate(app) {
                Ok(()) => report.succeeded.push(app.clone()),
                Err(reason) => report.failed.push((app.clone(), reason)),
            }
        }
        report
    }

    /// Termination is one-shot; there is no process to restore, so this is
    /// bookkeeping only and always succeeds.
    fn unblock_apps(&mut self, apps: &BTreeSet<String>) -> ActuationReport {
        ActuationReport::all_ok(apps)
    }

    fn block_websites(&mut self, hosts: &BTreeSet<String>) -> ActuationReport {
        self.hosts.block(hosts)
    }

    fn unblock_websites(&mut self, hosts: &BTreeSet<String>) -> ActuationReport {
        self.hosts.unblock(hosts)
    }
}
