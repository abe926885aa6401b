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

use crate::config::Config;
use crate::error::{ApplicationError, Result};
use crate::task::{ColumnId, Priority, Task, TaskKind};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use strum::IntoEnumIterator;

pub mod wire;

pub use wire::{Record, RecordPage, RecordPayload, RemoteFields};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// the boundary the board store talks to, mocked in tests. Every operation
/// is single-shot, retry policy belongs to the caller.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    async fn list(&self, table: &str) -> Result<Vec<Task>>;
    async fn get(&self, table: &str, id: &str) -> Result<Task>;
    async fn create(&self, table: &str, fields: RemoteFields) -> Result<Task>;
    async fn update(&self, table: &str, id: &str, fields: RemoteFields) -> Result<Task>;
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

/// base metadata response, `{ "tables": [{ "name": ... }, ...] }`
#[derive(Deserialize, Debug, Clone)]
struct TableList {
    tables: Vec<TableInfo>,
}

#[derive(Deserialize, Debug, Clone)]
struct TableInfo {
    name: String,
}

/// http client against the remote record store
#[derive(Debug, Clone)]
pub struct RecordGateway {
    client: Client,
    base_url: Url,
    meta_url: Url,
    token: String,
}

impl RecordGateway {
    pub fn new(config: &Config) -> Result<Self> {
        let token = config.airtable_access_token().trim();
        let base_id = config.airtable_base_id().trim();
        if token.is_empty() || base_id.is_empty() {
            return Err(ApplicationError::Configuration(
                "missing record store credentials".to_owned(),
            ));
        }

        let api_url = config.airtable_api_url().trim_end_matches('/');
        let base_url = Url::parse(&format!("{api_url}/{base_id}"))
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        let meta_url = Url::parse(&format!("{api_url}/meta/bases/{base_id}/tables"))
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url,
            meta_url,
            token: token.to_owned(),
        })
    }

    /// names of the tables the base currently holds, for the configuration
    /// flow to choose from
    pub async fn table_names(&self) -> Result<Vec<String>> {
        debug!("Listing tables of the base");
        let response = self
            .client
            .get(self.meta_url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;

        let list: TableList = self.decode(response, "tables").await?;
        Ok(list.tables.into_iter().map(|table| table.name).collect())
    }

    /// create a table carrying the full board schema, returns the name the
    /// remote store assigned
    pub async fn create_table(&self, name: &str) -> Result<String> {
        info!("Creating table {name}");
        let response = self
            .client
            .post(self.meta_url.clone())
            .bearer_auth(&self.token)
            .json(&table_schema(name))
            .send()
            .await?;

        let created: TableInfo = self.decode(response, name).await?;
        Ok(created.name)
    }

    /// `<api>/<base>/<table>[/<id>]`, table names may contain spaces and are
    /// percent-encoded as path segments
    fn url(&self, table: &str, id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ApplicationError::Configuration("record api url cannot be a base".to_owned())
            })?;
            segments.push(table);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response, subject: &str) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        let body = classify(status, body, subject)?;

        serde_json::from_str::<T>(&body).map_err(|error| {
            ApplicationError::MalformedResponse(format!("{error}; body: {}", truncate(&body)))
        })
    }
}

fn classify(status: StatusCode, body: String, subject: &str) -> Result<String> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApplicationError::Auth),
        StatusCode::NOT_FOUND => Err(ApplicationError::NotFound(subject.to_owned())),
        status if !status.is_success() => Err(ApplicationError::RemoteUnavailable(format!(
            "{status}: {}",
            truncate(&body)
        ))),
        _ => Ok(body),
    }
}

/// the field schema a fresh board table is created with, select choices
/// derived from the local enums so the two cannot drift apart
fn table_schema(name: &str) -> serde_json::Value {
    let choices = |names: Vec<&str>| -> Vec<serde_json::Value> {
        names.into_iter().map(|name| json!({ "name": name })).collect()
    };

    json!({
        "name": name,
        "description": "Task management for music composition projects",
        "fields": [
            { "name": "title", "type": "singleLineText" },
            { "name": "description", "type": "multilineText" },
            {
                "name": "status",
                "type": "singleSelect",
                "options": {
                    "choices": choices(ColumnId::iter().map(|c| c.remote_name()).collect())
                }
            },
            {
                "name": "priority",
                "type": "singleSelect",
                "options": {
                    "choices": choices(Priority::iter().map(|p| p.remote_name()).collect())
                }
            },
            {
                "name": "type",
                "type": "singleSelect",
                "options": {
                    "choices": choices(TaskKind::iter().map(|k| k.remote_name()).collect())
                }
            },
            { "name": "assignee_name", "type": "singleLineText" },
            { "name": "duration", "type": "singleLineText" },
            {
                "name": "instruments",
                "type": "multipleSelects",
                "options": {
                    "choices": choices(vec![
                        "Piano", "Guitar", "Strings", "Drums",
                        "Bass", "Vocals", "Synth", "Orchestra",
                    ])
                }
            },
            { "name": "due_date", "type": "date" },
            { "name": "completed", "type": "checkbox" },
            { "name": "youtube_url", "type": "url" },
            { "name": "timestamp", "type": "singleLineText" },
            { "name": "screenshot_url", "type": "url" },
        ]
    })
}

fn truncate(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(500)
        .map(|(index, _)| index)
        .unwrap_or(body.len());
    &body[..end]
}

impl RecordStore for RecordGateway {
    async fn list(&self, table: &str) -> Result<Vec<Task>> {
        debug!("Listing records from table {table}");
        let response = self
            .client
            .get(self.url(table, None)?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let page: RecordPage = self.decode(response, table).await?;
        Ok(page
            .records
            .into_iter()
            .map(Record::into_task)
            .collect())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Task> {
        let response = self
            .client
            .get(self.url(table, Some(id))?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let record: Record = self.decode(response, id).await?;
        Ok(record.into_task())
    }

    async fn create(&self, table: &str, fields: RemoteFields) -> Result<Task> {
        debug!("Creating record in table {table}");
        let response = self
            .client
            .post(self.url(table, None)?)
            .bearer_auth(&self.token)
            .json(&RecordPayload { fields })
            .send()
            .await?;

        let record: Record = self.decode(response, table).await?;
        Ok(record.into_task())
    }

    async fn update(&self, table: &str, id: &str, fields: RemoteFields) -> Result<Task> {
        debug!("Updating record {id} in table {table}");
        let response = self
            .client
            .patch(self.url(table, Some(id))?)
            .bearer_auth(&self.token)
            .json(&RecordPayload { fields })
            .send()
            .await?;

        let record: Record = self.decode(response, id).await?;
        Ok(record.into_task())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        debug!("Deleting record {id} from table {table}");
        let response = self
            .client
            .delete(self.url(table, Some(id))?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        classify(status, body, id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RecordGateway {
        let config = envy::from_iter::<_, Config>(vec![
            ("AIRTABLE_ACCESS_TOKEN".to_owned(), "pat.secret".to_owned()),
            ("AIRTABLE_BASE_ID".to_owned(), "appBase".to_owned()),
        ])
        .unwrap();

        RecordGateway::new(&config).unwrap()
    }

    #[test]
    fn test_rejects_blank_credentials() {
        let config = envy::from_iter::<_, Config>(vec![
            ("AIRTABLE_ACCESS_TOKEN".to_owned(), "  ".to_owned()),
            ("AIRTABLE_BASE_ID".to_owned(), "appBase".to_owned()),
        ])
        .unwrap();

        assert!(matches!(
            RecordGateway::new(&config),
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[test]
    fn test_url_encodes_table_segment() {
        let gateway = gateway();

        let url = gateway.url("Film Cues", None).unwrap();
        assert_eq!(
            "https://api.airtable.com/v0/appBase/Film%20Cues",
            url.as_str()
        );

        let url = gateway.url("Tasks", Some("rec1")).unwrap();
        assert_eq!("https://api.airtable.com/v0/appBase/Tasks/rec1", url.as_str());
    }

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, String::new(), "Tasks"),
            Err(ApplicationError::Auth)
        ));
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, String::new(), "rec9"),
            Err(ApplicationError::NotFound(id)) if id == "rec9"
        ));
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, "upstream".to_owned(), "Tasks"),
            Err(ApplicationError::RemoteUnavailable(_))
        ));
        assert_eq!(
            "{}",
            classify(StatusCode::OK, "{}".to_owned(), "Tasks").unwrap()
        );
    }

    #[test]
    fn test_meta_url_targets_the_base() {
        let gateway = gateway();
        assert_eq!(
            "https://api.airtable.com/v0/meta/bases/appBase/tables",
            gateway.meta_url.as_str()
        );
    }

    #[test]
    fn test_table_list_decodes_names() {
        let list: TableList = serde_json::from_value(json!({
            "tables": [
                { "id": "tbl1", "name": "Film Cues" },
                { "id": "tbl2", "name": "Archive" }
            ]
        }))
        .unwrap();

        let names: Vec<String> = list.tables.into_iter().map(|table| table.name).collect();
        assert_eq!(vec!["Film Cues".to_owned(), "Archive".to_owned()], names);
    }

    #[test]
    fn test_table_schema_covers_the_board_fields() {
        let schema = table_schema("Film Cues");
        assert_eq!("Film Cues", schema["name"].as_str().unwrap());

        let fields = schema["fields"].as_array().unwrap();
        let names: Vec<&str> = fields
            .iter()
            .map(|field| field["name"].as_str().unwrap())
            .collect();
        for expected in [
            "title",
            "description",
            "status",
            "priority",
            "type",
            "assignee_name",
            "duration",
            "instruments",
            "due_date",
            "completed",
            "youtube_url",
            "timestamp",
            "screenshot_url",
        ] {
            assert!(names.contains(&expected), "missing field {expected}");
        }

        // select choices carry the exact remote spellings
        let status = fields.iter().find(|f| f["name"] == "status").unwrap();
        let choices: Vec<&str> = status["options"]["choices"]
            .as_array()
            .unwrap()
            .iter()
            .map(|choice| choice["name"].as_str().unwrap())
            .collect();
        assert_eq!(vec!["To Do", "In Progress", "Review", "Complete"], choices);
    }

    #[test]
    fn test_malformed_page_is_detected() {
        // a payload without the records array must not decode
        assert!(serde_json::from_str::<RecordPage>(r#"{"error": "oops"}"#).is_err());
        assert!(serde_json::from_str::<RecordPage>("not json").is_err());
    }
}
