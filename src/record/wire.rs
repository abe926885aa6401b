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

use crate::task::{Assignee, ColumnId, Priority, Task, TaskKind, TaskPatch};
use chrono::NaiveDate;
use serde::Deserialize;

/// a single record as the remote store serves it
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: RemoteFields,
}

/// list response shape, `{ "records": [...] }`
#[derive(Deserialize, Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<Record>,
}

/// create/update request body, `{ "fields": {...} }`
#[derive(Serialize, Debug, Clone)]
pub struct RecordPayload {
    pub fields: RemoteFields,
}

/// the remote field set in its wire spelling. Every member is optional so
/// that partial updates only carry the touched fields and never clobber
/// unrelated remote columns with nulls.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RemoteFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// space-separated Title Case, e.g. "In Progress"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// first-letter-capitalized, e.g. "High"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
}

/// legacy records keep seconds in a text column, outgoing payloads always
/// write numbers. Unreadable values decode to absence instead of failing
/// the whole page.
fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u32),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Seconds(seconds)) => Some(seconds),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

impl RemoteFields {
    /// full outgoing payload for a task, empty values are omitted rather
    /// than sent as null
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: non_empty(&task.title),
            description: non_empty(&task.description),
            status: Some(task.status.remote_name().to_owned()),
            priority: Some(task.priority.remote_name().to_owned()),
            kind: Some(task.kind.remote_name().to_owned()),
            duration: task.duration,
            instruments: if task.instruments.is_empty() {
                None
            } else {
                Some(task.instruments.clone())
            },
            completed: Some(task.completed),
            due_date: task.due_date,
            youtube_url: task.youtube_url.as_deref().and_then(non_empty),
            timestamp: task.timestamp,
            screenshot_url: task.screenshot_url.as_deref().and_then(non_empty),
            assignee_name: non_empty(&task.assignee.name),
        }
    }

    /// partial payload carrying exactly the patched fields
    pub fn from_patch(patch: &TaskPatch) -> Self {
        Self {
            title: patch.title.as_deref().and_then(non_empty),
            description: patch.description.clone(),
            status: None,
            priority: patch.priority.map(|p| p.remote_name().to_owned()),
            kind: patch.kind.map(|k| k.remote_name().to_owned()),
            duration: patch.duration,
            instruments: patch.instruments.clone(),
            completed: patch.completed,
            due_date: patch.due_date,
            youtube_url: patch.youtube_url.clone(),
            timestamp: patch.timestamp,
            screenshot_url: None,
            assignee_name: patch.assignee.as_deref().and_then(non_empty),
        }
    }

    /// the status/completed pair a column move persists
    pub fn for_move(column: ColumnId) -> Self {
        Self {
            status: Some(column.remote_name().to_owned()),
            completed: Some(column == ColumnId::Complete),
            ..Self::default()
        }
    }

    /// the screenshot reference patched on after a media upload
    pub fn for_screenshot(url: &str) -> Self {
        Self {
            screenshot_url: Some(url.to_owned()),
            ..Self::default()
        }
    }
}

impl Record {
    /// remote record to local task, absent fields take the documented
    /// defaults
    pub fn into_task(self) -> Task {
        let fields = self.fields;
        Task {
            id: self.id,
            title: fields.title.unwrap_or_default(),
            description: fields.description.unwrap_or_default(),
            assignee: fields
                .assignee_name
                .as_deref()
                .map(Assignee::named)
                .unwrap_or_default(),
            due_date: fields.due_date,
            priority: fields
                .priority
                .as_deref()
                .map(Priority::from_remote)
                .unwrap_or_default(),
            kind: fields
                .kind
                .as_deref()
                .map(TaskKind::from_remote)
                .unwrap_or_default(),
            duration: fields.duration,
            instruments: fields.instruments.unwrap_or_default(),
            status: fields
                .status
                .as_deref()
                .map(ColumnId::from_remote)
                .unwrap_or_default(),
            completed: fields.completed.unwrap_or_default(),
            youtube_url: fields.youtube_url,
            timestamp: fields.timestamp,
            screenshot_url: fields.screenshot_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;

    #[test]
    fn test_record_into_task_defaults() {
        let record: Record = serde_json::from_value(json!({
            "id": "r1",
            "fields": { "title": "Theme", "status": "In Progress" }
        }))
        .unwrap();

        let task = record.into_task();
        assert_eq!("r1", task.id.as_str());
        assert_eq!("Theme", task.title.as_str());
        assert_eq!(ColumnId::InProgress, task.status);
        assert_eq!(Priority::Medium, task.priority);
        assert_eq!(TaskKind::Composition, task.kind);
        assert_eq!("Unassigned", task.assignee.name.as_str());
        assert!(!task.completed);
        assert!(task.instruments.is_empty());
    }

    #[test]
    fn test_legacy_text_durations_decode() {
        let record: Record = serde_json::from_value(json!({
            "id": "r1",
            "fields": {
                "title": "Theme",
                "duration": "90",
                "timestamp": " 15 "
            }
        }))
        .unwrap();

        let task = record.into_task();
        assert_eq!(Some(90), task.duration);
        assert_eq!(Some(15), task.timestamp);

        // unreadable text decodes to absence rather than failing the page
        let record: Record = serde_json::from_value(json!({
            "id": "r2",
            "fields": { "title": "Theme", "duration": "about two minutes" }
        }))
        .unwrap();
        assert_eq!(None, record.into_task().duration);

        // numbers keep decoding as before
        let record: Record = serde_json::from_value(json!({
            "id": "r3",
            "fields": { "title": "Theme", "duration": 120 }
        }))
        .unwrap();
        assert_eq!(Some(120), record.into_task().duration);
    }

    #[test]
    fn test_round_trip_enums() {
        let task = TaskDraft {
            title: "Finale".to_owned(),
            priority: Priority::High,
            kind: TaskKind::Mixing,
            ..TaskDraft::default()
        }
        .into_task(ColumnId::InProgress);

        let fields = RemoteFields::from_task(&task);
        assert_eq!(Some("High".to_owned()), fields.priority);
        assert_eq!(Some("Mixing".to_owned()), fields.kind);
        assert_eq!(Some("In Progress".to_owned()), fields.status);

        let back = Record {
            id: "r2".to_owned(),
            fields,
        }
        .into_task();
        assert_eq!(task.priority, back.priority);
        assert_eq!(task.kind, back.kind);
        assert_eq!(task.status, back.status);
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let task = TaskDraft {
            title: "Sketch".to_owned(),
            ..TaskDraft::default()
        }
        .into_task(ColumnId::Todo);

        let value = serde_json::to_value(RemoteFields::from_task(&task)).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("description"));
        assert!(!object.contains_key("due_date"));
        assert!(!object.contains_key("youtube_url"));
        assert!(!object.contains_key("screenshot_url"));
        assert!(!object.contains_key("instruments"));
        // the assignee sentinel still travels
        assert_eq!("Unassigned", object["assignee_name"].as_str().unwrap());
    }

    #[test]
    fn test_patch_payload_is_partial() {
        let patch = TaskPatch {
            priority: Some(Priority::Low),
            completed: Some(true),
            ..TaskPatch::default()
        };

        let value = serde_json::to_value(RemoteFields::from_patch(&patch)).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(2, object.len());
        assert_eq!("Low", object["priority"].as_str().unwrap());
        assert_eq!(true, object["completed"].as_bool().unwrap());
    }

    #[test]
    fn test_move_payload() {
        let value = serde_json::to_value(RemoteFields::for_move(ColumnId::Complete)).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(2, object.len());
        assert_eq!("Complete", object["status"].as_str().unwrap());
        assert!(object["completed"].as_bool().unwrap());
    }
}
