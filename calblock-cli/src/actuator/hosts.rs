//! Website blocking via the system hosts file.
//!
//! Blocked hosts are appended as `redirect_ip host # calblock` lines. The
//! trailing marker is what makes unblocking safe: only lines calblock wrote
//! are ever removed, user-managed entries are untouched.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use super::ActuationReport;

/// Marker appended to every line calblock manages.
pub const MANAGED_MARKER: &str = "# calblock";

pub struct HostsFile {
    path: PathBuf,
    redirect_ip: String,
}

impl HostsFile {
    pub fn new(path: PathBuf, redirect_ip: String) -> Self {
        HostsFile { path, redirect_ip }
    }

    /// Add redirect entries for `hosts`. Hosts that already have a managed
    /// entry are counted as succeeded without rewriting them.
    pub fn block(&mut self, hosts: &BTreeSet<String>) -> ActuationReport {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => return ActuationReport::all_failed(hosts, &e.to_string()),
        };

        let managed = managed_hosts(&content);
        let missing: Vec<&String> = hosts.iter().filter(|h| !managed.contains(*h)).collect();

        if missing.is_empty() {
            return ActuationReport::all_ok(hosts);
        }

        let mut updated = content;
        if !updated.ends_with('\n') && !updated.is_empty() {
            updated.push('\n');
        }
        for host in &missing {
            updated.push_str(&format!(
                "{} {} {}\n",
                self.redirect_ip, host, MANAGED_MARKER
            ));
        }

        match std::fs::write(&self.path, updated) {
            Ok(()) => {
                self.flush_dns();
                ActuationReport::all_ok(hosts)
            }
            Err(e) => ActuationReport::all_failed(hosts, &e.to_string()),
        }
    }

    /// Remove managed entries for `hosts`. Hosts with no managed entry are
    /// counted as succeeded (already unblocked).
    pub fn unblock(&mut self, hosts: &BTreeSet<String>) -> ActuationReport {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => return ActuationReport::all_failed(hosts, &e.to_string()),
        };

        let keep = |line: &&str| -> bool {
            match managed_host_of(line) {
                Some(host) => !hosts.contains(host),
                None => true,
            }
        };

        let remaining: Vec<&str> = content.lines().filter(keep).collect();
        let mut updated = remaining.join("\n");
        if content.ends_with('\n') && !updated.is_empty() {
            updated.push('\n');
        }

        if updated == content {
            return ActuationReport::all_ok(hosts);
        }

        match std::fs::write(&self.path, updated) {
            Ok(()) => {
                self.flush_dns();
                ActuationReport::all_ok(hosts)
            }
            Err(e) => ActuationReport::all_failed(hosts, &e.to_string()),
        }
    }

    /// All hosts currently carrying a managed entry. Used by `unblock --all`
    /// style recovery to find leftovers from a previous run.
    pub fn managed_entries(&self) -> std::io::Result<BTreeSet<String>> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(managed_hosts(&content))
    }

    /// Ask the OS to drop its DNS cache so edits take effect promptly.
    /// Failures are logged and ignored; the hosts file itself is already
    /// correct.
    fn flush_dns(&self) {
        for cmd in flush_commands() {
            let (program, args) = cmd.split_first().expect("flush command is non-empty");
            let result = Command::new(program)
                .args(args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Err(e) = result {
                debug!(command = program, error = %e, "DNS flush command failed");
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn flush_commands() -> Vec<Vec<&'static str>> {
    vec![
        vec!["dscacheutil", "-flushcache"],
        vec!["killall", "-HUP", "mDNSResponder"],
    ]
}

#[cfg(target_os = "windows")]
fn flush_commands() -> Vec<Vec<&'static str>> {
    vec![vec!["ipconfig", "/flushdns"]]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn flush_commands() -> Vec<Vec<&'static str>> {
    vec![vec!["resolvectl", "flush-caches"]]
}

/// If `line` is a calblock-managed entry, return the host it blocks.
fn managed_host_of(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if !trimmed.ends_with(MANAGED_MARKER) {
        return None;
    }
    trimmed.split_whitespace().nth(1)
}

fn managed_hosts(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter_map(managed_host_of)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn hosts_file(initial: &str) -> (tempfile::TempDir, HostsFile, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(initial.as_bytes()).unwrap();
        let hosts = HostsFile::new(path.clone(), "127.0.0.1".to_string());
        (dir, hosts, path)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_block_appends_managed_lines() {
        let (_dir, mut hosts, path) = hosts_file("127.0.0.1 localhost\n");

        let report = hosts.block(&set(&["www.facebook.com"]));
        assert_eq!(report.succeeded, vec!["www.facebook.com"]);
        assert!(report.failed.is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("127.0.0.1 www.facebook.com # calblock"));
        assert!(content.starts_with("127.0.0.1 localhost"));
    }

    #[test]
    fn test_block_is_idempotent() {
        let (_dir, mut hosts, path) = hosts_file("");

        hosts.block(&set(&["www.x.com"]));
        hosts.block(&set(&["www.x.com"]));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("www.x.com").count(), 1);
    }

    #[test]
    fn test_unblock_removes_only_managed_lines() {
        let (_dir, mut hosts, path) = hosts_file(
            "127.0.0.1 localhost\n127.0.0.1 www.x.com # user entry, not ours\n",
        );

        hosts.block(&set(&["www.x.com"]));
        let report = hosts.unblock(&set(&["www.x.com"]));
        assert_eq!(report.succeeded, vec!["www.x.com"]);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("www.x.com # user entry"));
        assert!(!content.contains(MANAGED_MARKER));
    }

    #[test]
    fn test_unblock_missing_entry_succeeds() {
        let (_dir, mut hosts, _path) = hosts_file("127.0.0.1 localhost\n");
        let report = hosts.unblock(&set(&["never.blocked.example"]));
        assert_eq!(report.succeeded.len(), 1);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_unreadable_file_fails_per_item() {
        let mut hosts = HostsFile::new(
            PathBuf::from("/nonexistent/hosts"),
            "127.0.0.1".to_string(),
        );
        let report = hosts.block(&set(&["a.example", "b.example"]));
        assert!(report.succeeded.is_empty());
        assert_eq!(report.failed.len(), 2);
    }

    #[test]
    fn test_managed_entries_lists_leftovers() {
        let (_dir, mut hosts, _path) = hosts_file("127.0.0.1 localhost\n");
        hosts.block(&set(&["a.example", "b.example"]));

        let entries = hosts.managed_entries().unwrap();
        assert_eq!(entries, set(&["a.example", "b.example"]));
    }
}
