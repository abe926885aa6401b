/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use chrono::{NaiveDate, Utc};
use strum::{Display, EnumIter, EnumString};

/// sentinel shown when no assignee was supplied
pub const UNASSIGNED: &str = "Unassigned";

/// prefix of locally generated placeholder ids, the remote store never
/// assigns ids of this shape
pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// first-letter-capitalized form the remote store keeps
    pub fn remote_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// unknown or absent remote values fall back to the default
    pub fn from_remote(value: &str) -> Self {
        value.to_lowercase().parse().unwrap_or_default()
    }
}

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Composition,
    Arrangement,
    Recording,
    Mixing,
    Review,
}

impl TaskKind {
    pub fn remote_name(&self) -> &'static str {
        match self {
            TaskKind::Composition => "Composition",
            TaskKind::Arrangement => "Arrangement",
            TaskKind::Recording => "Recording",
            TaskKind::Mixing => "Mixing",
            TaskKind::Review => "Review",
        }
    }

    pub fn from_remote(value: &str) -> Self {
        value.to_lowercase().parse().unwrap_or_default()
    }
}

/// the four fixed workflow stages, tasks never live anywhere else
#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[derive(Hash)]
pub enum ColumnId {
    #[default]
    Todo,
    InProgress,
    Review,
    Complete,
}

impl ColumnId {
    pub const ALL: [ColumnId; 4] = [
        ColumnId::Todo,
        ColumnId::InProgress,
        ColumnId::Review,
        ColumnId::Complete,
    ];

    /// space-separated Title Case form the remote store keeps, doubles as
    /// the human-readable column title
    pub fn remote_name(&self) -> &'static str {
        match self {
            ColumnId::Todo => "To Do",
            ColumnId::InProgress => "In Progress",
            ColumnId::Review => "Review",
            ColumnId::Complete => "Complete",
        }
    }

    /// inverts `remote_name` exactly for the four known statuses, anything
    /// else lands in `Todo`
    pub fn from_remote(value: &str) -> Self {
        value
            .to_lowercase()
            .replace(' ', "")
            .parse()
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Assignee {
    pub name: String,
}

impl Default for Assignee {
    fn default() -> Self {
        Self {
            name: UNASSIGNED.to_owned(),
        }
    }
}

impl Assignee {
    /// blank names collapse to the sentinel
    pub fn named(name: &str) -> Self {
        if name.trim().is_empty() {
            Self::default()
        } else {
            Self {
                name: name.to_owned(),
            }
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assignee: Assignee,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, rename = "type")]
    pub kind: TaskKind,
    /// canonical representation is whole seconds
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub status: ColumnId,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub youtube_url: Option<String>,
    /// seconds offset into the linked video
    #[serde(default)]
    pub timestamp: Option<u32>,
    #[serde(default)]
    pub screenshot_url: Option<String>,
}

impl Task {
    pub fn placeholder_id() -> String {
        format!("{}{}", LOCAL_ID_PREFIX, Utc::now().timestamp_millis())
    }

    /// false while the task only exists locally under a placeholder id
    pub fn is_persisted(&self) -> bool {
        !self.id.starts_with(LOCAL_ID_PREFIX)
    }

    /// merge an edit into the task in place
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(assignee) = &patch.assignee {
            self.assignee = Assignee::named(assignee);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(duration) = patch.duration {
            self.duration = Some(duration);
        }
        if let Some(instruments) = &patch.instruments {
            self.instruments = instruments.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(youtube_url) = &patch.youtube_url {
            self.youtube_url = Some(youtube_url.clone());
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = Some(timestamp);
        }
    }

    /// clone of the task fields minus the identity, title marked as a copy
    pub fn duplicate_draft(&self) -> TaskDraft {
        TaskDraft {
            title: format!("{} (Copy)", self.title),
            description: self.description.clone(),
            assignee: self.assignee.name.clone(),
            due_date: self.due_date,
            priority: self.priority,
            kind: self.kind,
            duration: self.duration,
            instruments: self.instruments.clone(),
            youtube_url: self.youtube_url.clone(),
            timestamp: self.timestamp,
            screenshot: None,
        }
    }
}

/// the fields a new task is created from, the captured screenshot rides
/// along until the record id exists and the image can be attached
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u32>,
    /// captured image as a base64 data uri, not a persisted field
    #[serde(default, skip_serializing)]
    pub screenshot: Option<String>,
}

impl TaskDraft {
    pub(crate) fn into_task(self, column: ColumnId) -> Task {
        Task {
            id: Task::placeholder_id(),
            title: self.title,
            description: self.description,
            assignee: Assignee::named(&self.assignee),
            due_date: self.due_date,
            priority: self.priority,
            kind: self.kind,
            duration: self.duration,
            instruments: self.instruments,
            status: column,
            completed: column == ColumnId::Complete,
            youtube_url: self.youtube_url,
            timestamp: self.timestamp,
            screenshot_url: None,
        }
    }
}

/// a partial edit, absent fields are left untouched
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub kind: Option<TaskKind>,
    pub duration: Option<u32>,
    pub instruments: Option<Vec<String>>,
    pub completed: Option<bool>,
    pub youtube_url: Option<String>,
    pub timestamp: Option<u32>,
    #[serde(default, skip_serializing)]
    pub screenshot: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_priority_round_trip() {
        for priority in Priority::iter() {
            assert_eq!(priority, Priority::from_remote(priority.remote_name()));
        }
        assert_eq!(Priority::Medium, Priority::from_remote("Urgent"));
        assert_eq!(Priority::Medium, Priority::from_remote(""));
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in TaskKind::iter() {
            assert_eq!(kind, TaskKind::from_remote(kind.remote_name()));
        }
        assert_eq!(TaskKind::Composition, TaskKind::from_remote("Foley"));
    }

    #[test]
    fn test_status_round_trip() {
        for column in ColumnId::iter() {
            assert_eq!(column, ColumnId::from_remote(column.remote_name()));
            // the local identifier is the lowercase no-space form
            assert_eq!(
                column.to_string(),
                column.remote_name().to_lowercase().replace(' ', "")
            );
        }
        assert_eq!(ColumnId::Todo, ColumnId::from_remote("Backlog"));
        assert_eq!(ColumnId::InProgress, ColumnId::from_remote("In Progress"));
    }

    #[test]
    fn test_placeholder_id() {
        let draft = TaskDraft {
            title: "Main title theme".to_owned(),
            ..TaskDraft::default()
        };
        let task = draft.into_task(ColumnId::Todo);
        assert!(!task.is_persisted());
        assert!(!task.completed);
        assert_eq!(UNASSIGNED, task.assignee.name.as_str());

        let mut persisted = task.clone();
        persisted.id = "recXYZ".to_owned();
        assert!(persisted.is_persisted());
    }

    #[test]
    fn test_apply_patch() {
        let mut task = TaskDraft {
            title: "Score cue".to_owned(),
            ..TaskDraft::default()
        }
        .into_task(ColumnId::Review);

        task.apply(&TaskPatch {
            title: Some("Score cue 2".to_owned()),
            priority: Some(Priority::High),
            instruments: Some(vec!["Cello".to_owned()]),
            ..TaskPatch::default()
        });

        assert_eq!("Score cue 2", task.title.as_str());
        assert_eq!(Priority::High, task.priority);
        assert_eq!(vec!["Cello".to_owned()], task.instruments);
        // untouched fields survive
        assert_eq!(ColumnId::Review, task.status);
        assert_eq!(TaskKind::Composition, task.kind);
    }

    #[test]
    fn test_duplicate_draft() {
        let task = TaskDraft {
            title: "Battle theme".to_owned(),
            assignee: "Hans".to_owned(),
            duration: Some(90),
            instruments: vec!["Brass".to_owned(), "Percussion".to_owned()],
            ..TaskDraft::default()
        }
        .into_task(ColumnId::InProgress);

        let draft = task.duplicate_draft();
        assert_eq!("Battle theme (Copy)", draft.title.as_str());
        assert_eq!("Hans", draft.assignee.as_str());
        assert_eq!(task.duration, draft.duration);
        assert_eq!(task.instruments, draft.instruments);
    }
}
