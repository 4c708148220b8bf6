//! Currently-blocked items and the desired-vs-actual diff.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::directive::BlockDirective;

/// What mechanism an item is blocked with. Apps and websites are actuated
/// separately because the platform mechanics differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    App,
    Website,
}

/// The actuator's last known actual state: which items are blocked right now.
///
/// Only the scheduler mutates this, and only after a successful actuator
/// call for the item in question. Starts empty at process start; must be
/// drained (everything unblocked) before shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockState {
    apps: BTreeSet<String>,
    websites: BTreeSet<String>,
}

impl BlockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty() && self.websites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.apps.len() + self.websites.len()
    }

    pub fn contains(&self, kind: ItemKind, item: &str) -> bool {
        match kind {
            ItemKind::App => self.apps.contains(item),
            ItemKind::Website => self.websites.contains(item),
        }
    }

    /// Record a successful block. Re-inserting an already-blocked item is a
    /// no-op; the diff is recomputed from scratch each tick.
    pub fn mark_blocked(&mut self, kind: ItemKind, item: &str) {
        match kind {
            ItemKind::App => self.apps.insert(item.to_string()),
            ItemKind::Website => self.websites.insert(item.to_string()),
        };
    }

    /// Record a successful unblock.
    pub fn mark_unblocked(&mut self, kind: ItemKind, item: &str) {
        match kind {
            ItemKind::App => self.apps.remove(item),
            ItemKind::Website => self.websites.remove(item),
        };
    }

    /// Everything currently blocked, as a directive. Used to drive the
    /// shutdown unblock-all pass.
    pub fn snapshot(&self) -> BlockDirective {
        BlockDirective {
            apps: self.apps.clone(),
            websites: self.websites.clone(),
        }
    }
}

/// What the actuator must do to move the current state to the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPlan {
    pub to_block: BlockDirective,
    pub to_unblock: BlockDirective,
}

impl BlockPlan {
    pub fn is_empty(&self) -> bool {
        self.to_block.is_empty() && self.to_unblock.is_empty()
    }
}

/// Exact set difference between desired and current, per kind.
///
/// Applying `to_block` and `to_unblock` against `current` and recomputing
/// yields an empty plan; the diff is exact, not approximate.
pub fn diff(desired: &BlockDirective, current: &BlockState) -> BlockPlan {
    let minus = |a: &BTreeSet<String>, b: &BTreeSet<String>| -> BTreeSet<String> {
        a.difference(b).cloned().collect()
    };

    BlockPlan {
        to_block: BlockDirective {
            apps: minus(&desired.apps, &current.apps),
            websites: minus(&desired.websites, &current.websites),
        },
        to_unblock: BlockDirective {
            apps: minus(&current.apps, &desired.apps),
            websites: minus(&current.websites, &desired.websites),
        },
    }
}
