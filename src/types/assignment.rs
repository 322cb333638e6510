//! Per-fiber classification state and the run-level assignment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a label in the atlas load order.
///
/// Implements `Ord` so that "first in load order" is "smallest id".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(usize);

impl LabelId {
    /// Create a label id from an atlas position.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The atlas position.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification state of one subject fiber.
///
/// `Unevaluated` → `Evaluating` → `Assigned` | `Unassigned`.
/// The last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum FiberState {
    /// Not yet looked at.
    #[default]
    Unevaluated,
    /// Being compared against the atlas.
    Evaluating,
    /// Nearest label was within its threshold.
    Assigned {
        /// The winning label.
        label: LabelId,
        /// Distance to that label's representatives.
        distance: f64,
    },
    /// No label within threshold. A normal outcome.
    Unassigned,
}

impl FiberState {
    /// Whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Assigned { .. } | Self::Unassigned)
    }

    /// Assigned label, if any.
    pub fn label(&self) -> Option<LabelId> {
        match self {
            Self::Assigned { label, .. } => Some(*label),
            _ => None,
        }
    }
}

/// Mapping from subject fiber index to label (or unassigned).
///
/// Every fiber maps to at most one label, so the per-label member lists
/// always partition the assigned subset of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    states: Vec<FiberState>,
    label_count: usize,
}

impl Assignment {
    /// Wrap finished per-fiber states.
    ///
    /// `label_count` is the number of labels in the atlas the states refer to.
    pub fn new(states: Vec<FiberState>, label_count: usize) -> Self {
        Self { states, label_count }
    }

    /// Number of fibers covered.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no fibers were classified.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of labels in the atlas.
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// All states in fiber order.
    pub fn states(&self) -> &[FiberState] {
        &self.states
    }

    /// State of one fiber.
    pub fn state(&self, fiber: usize) -> Option<&FiberState> {
        self.states.get(fiber)
    }

    /// Label of one fiber, if assigned.
    pub fn label_of(&self, fiber: usize) -> Option<LabelId> {
        self.states.get(fiber).and_then(FiberState::label)
    }

    /// Whether every fiber reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(FiberState::is_terminal)
    }

    /// Member fiber indices for every label, ascending within each label.
    pub fn members_by_label(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.label_count];
        for (index, state) in self.states.iter().enumerate() {
            if let Some(label) = state.label() {
                if let Some(list) = members.get_mut(label.index()) {
                    list.push(index);
                }
            }
        }
        members
    }

    /// Member fiber indices for one label, ascending.
    pub fn members(&self, label: LabelId) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.label() == Some(label))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of unassigned fibers, ascending.
    pub fn unassigned(&self) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, FiberState::Unassigned))
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of assigned fibers.
    pub fn assigned_count(&self) -> usize {
        self.states.iter().filter(|s| s.label().is_some()).count()
    }

    /// Number of unassigned fibers.
    pub fn unassigned_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, FiberState::Unassigned))
            .count()
    }
}
