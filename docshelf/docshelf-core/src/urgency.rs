//! Date-driven urgency classification for files carrying a validity date.

use crate::model::{Node, NodeStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    Warning,
    Normal,
}

/// Classify how urgently a document needs attention.
///
/// Applies only to files with a validity date: due within seven days (or
/// already past) is `Critical`, within thirty days `Warning`, anything
/// later `Normal`. A file whose status is already `Expired` classifies
/// `Normal` regardless of its date: the terminal status suppresses the
/// banner. That suppression is intentional behavior, not an oversight.
pub fn classify(node: &Node, today: NaiveDate) -> Urgency {
    if !node.is_file() {
        return Urgency::Normal;
    }
    let Some(due) = node.validity_date else {
        return Urgency::Normal;
    };
    if node.status == Some(NodeStatus::Expired) {
        return Urgency::Normal;
    }
    let days_left = (due - today).num_days();
    if days_left <= 7 {
        Urgency::Critical
    } else if days_left <= 30 {
        Urgency::Warning
    } else {
        Urgency::Normal
    }
}
