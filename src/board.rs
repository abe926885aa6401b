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

use crate::config::BoardConfig;
use crate::error::{ApplicationError, Result};
use crate::media::MediaGateway;
use crate::record::{RecordStore, RemoteFields};
use crate::task::{ColumnId, Task, TaskDraft, TaskPatch};
use std::collections::HashMap;

/// an ordered bucket of tasks for one workflow stage. The four columns are
/// fixed, only their task sequences mutate.
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub id: ColumnId,
    pub tasks: Vec<Task>,
}

impl Column {
    pub fn title(&self) -> &'static str {
        self.id.remote_name()
    }
}

/// result of a mutation that may carry a non-fatal screenshot warning,
/// attachment failure never fails the task operation itself
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: Task,
    pub attach_warning: Option<String>,
}

/// in-memory board grouped by status, every mutation is applied locally
/// first and confirmed against the record store afterwards. Rollback is the
/// exact inverse of the optimistic mutation, a full `load` stays available
/// as the manual resynchronization path.
#[derive(Getters)]
pub struct BoardStore<S> {
    records: S,
    media: Option<MediaGateway>,
    table: String,
    #[get = "pub"]
    columns: Vec<Column>,
    /// per-task monotonic revisions, a confirmation reply is merged only
    /// while the revision it was issued under is still current
    revisions: HashMap<String, u64>,
    #[get = "pub"]
    last_error: Option<String>,
}

impl<S: RecordStore> BoardStore<S> {
    pub fn new(records: S, media: Option<MediaGateway>, config: &BoardConfig) -> Self {
        Self {
            records,
            media,
            table: config.table_name.clone(),
            columns: ColumnId::ALL
                .into_iter()
                .map(|id| Column {
                    id,
                    tasks: Vec::new(),
                })
                .collect(),
            revisions: HashMap::new(),
            last_error: None,
        }
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        self.columns
            .iter()
            .find(|column| column.id == id)
            .expect("the four columns are fixed")
    }

    pub fn find(&self, id: &str) -> Option<(ColumnId, usize)> {
        self.columns.iter().find_map(|column| {
            column
                .tasks
                .iter()
                .position(|task| task.id == id)
                .map(|index| (column.id, index))
        })
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.columns
            .iter()
            .find_map(|column| column.tasks.iter().find(|task| task.id == id))
    }

    /// full fetch-and-replace of all four columns. On failure the previous
    /// columns stay visible and the error is kept for the retry affordance.
    pub async fn load(&mut self) -> Result<()> {
        self.last_error = None;

        match self.records.list(&self.table).await {
            Ok(tasks) => {
                let mut grouped: HashMap<ColumnId, Vec<Task>> = HashMap::new();
                for task in tasks {
                    grouped.entry(task.status).or_default().push(task);
                }

                for column in &mut self.columns {
                    column.tasks = grouped.remove(&column.id).unwrap_or_default();
                }
                // a resync invalidates every in-flight confirmation
                self.revisions.clear();
                info!("Loaded board from table {}", self.table);
                Ok(())
            }
            Err(error) => {
                error!("Failed to load board: {error}");
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// drag a task to `to_index` within the target column. Optimistic, a
    /// failed confirmation moves the task back to its original slot.
    pub async fn move_task(
        &mut self,
        id: &str,
        from: ColumnId,
        to: ColumnId,
        to_index: usize,
    ) -> Result<()> {
        let from_index = self
            .position_in(from, id)
            .ok_or_else(|| ApplicationError::NotFound(id.to_owned()))?;

        let mut task = self.column_mut(from).tasks.remove(from_index);
        let prior_status = task.status;
        let prior_completed = task.completed;
        task.status = to;
        task.completed = to == ColumnId::Complete;
        let persisted = task.is_persisted();

        let target = self.column_mut(to);
        let to_index = to_index.min(target.tasks.len());
        target.tasks.insert(to_index, task);
        self.bump(id);

        // a task that only exists locally has nothing to confirm yet
        if !persisted {
            return Ok(());
        }

        match self
            .records
            .update(&self.table, id, RemoteFields::for_move(to))
            .await
        {
            Ok(_) => Ok(()),
            Err(error) => {
                error!("Failed to persist move of {id}: {error}");
                if let Some(index) = self.position_in(to, id) {
                    let mut task = self.column_mut(to).tasks.remove(index);
                    task.status = prior_status;
                    task.completed = prior_completed;
                    let source = self.column_mut(from);
                    let from_index = from_index.min(source.tasks.len());
                    source.tasks.insert(from_index, task);
                    self.bump(id);
                }
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// append a new task to a column. The placeholder id is replaced with
    /// the server-assigned one on confirmation; a screenshot captured in
    /// the form is attached in a second phase once the record id exists.
    pub async fn add(&mut self, column: ColumnId, draft: TaskDraft) -> Result<TaskOutcome> {
        if draft.title.trim().is_empty() {
            return Err(ApplicationError::Validation(
                "task title is required".to_owned(),
            ));
        }

        let screenshot = draft.screenshot.clone();
        let task = draft.into_task(column);
        let placeholder = task.id.clone();
        let payload = RemoteFields::from_task(&task);

        self.column_mut(column).tasks.push(task);
        let revision = self.bump(&placeholder);

        let created = match self.records.create(&self.table, payload).await {
            Ok(created) => created,
            Err(error) => {
                error!("Failed to create task: {error}");
                self.remove_local(&placeholder);
                self.revisions.remove(&placeholder);
                self.last_error = Some(error.to_string());
                return Err(error);
            }
        };

        let confirmed = self
            .confirm_created(&placeholder, revision, &created)
            .unwrap_or_else(|| created.clone());

        let mut outcome = TaskOutcome {
            task: confirmed,
            attach_warning: None,
        };

        if let Some(data_uri) = screenshot {
            outcome.attach_warning = self.attach_screenshot(&created.id, &data_uri).await;
            if let Some(task) = self.task(&created.id) {
                outcome.task = task.clone();
            }
        }

        Ok(outcome)
    }

    /// merge an edit into the task in place. A failed confirmation restores
    /// the exact pre-mutation snapshot.
    pub async fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<TaskOutcome> {
        let (column, index) = self
            .find(id)
            .ok_or_else(|| ApplicationError::NotFound(id.to_owned()))?;

        let snapshot = self.columns[self.column_index(column)].tasks[index].clone();
        let payload = RemoteFields::from_patch(&patch);

        let task = &mut self.column_mut(column).tasks[index];
        task.apply(&patch);
        let persisted = task.is_persisted();
        let task = task.clone();
        self.bump(id);

        if persisted {
            if let Err(error) = self.records.update(&self.table, id, payload).await {
                error!("Failed to persist update of {id}: {error}");
                if let Some((column, index)) = self.find(id) {
                    self.column_mut(column).tasks[index] = snapshot;
                    self.bump(id);
                }
                self.last_error = Some(error.to_string());
                return Err(error);
            }
        }

        let mut outcome = TaskOutcome {
            task,
            attach_warning: None,
        };

        if let Some(data_uri) = &patch.screenshot {
            if persisted {
                outcome.attach_warning = self.attach_screenshot(id, data_uri).await;
            } else {
                outcome.attach_warning =
                    Some("task is not persisted yet, screenshot skipped".to_owned());
            }
            if let Some(task) = self.task(id) {
                outcome.task = task.clone();
            }
        }

        Ok(outcome)
    }

    /// remove a task. Locally idempotent: an id that is already gone is a
    /// no-op; placeholder tasks are dropped without a remote call.
    pub async fn delete(&mut self, id: &str, column: ColumnId) -> Result<()> {
        let Some(index) = self.position_in(column, id) else {
            return Ok(());
        };

        let task = self.column_mut(column).tasks.remove(index);
        if !task.is_persisted() {
            self.revisions.remove(id);
            return Ok(());
        }
        self.bump(id);

        match self.records.delete(&self.table, id).await {
            Ok(()) => {
                self.revisions.remove(id);
                Ok(())
            }
            Err(error) => {
                error!("Failed to delete {id}: {error}");
                let target = self.column_mut(column);
                let index = index.min(target.tasks.len());
                target.tasks.insert(index, task);
                self.bump(id);
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// clone a task into the same column, identity dropped and title
    /// suffixed " (Copy)"
    pub async fn duplicate(&mut self, id: &str, column: ColumnId) -> Result<TaskOutcome> {
        let draft = self
            .column(column)
            .tasks
            .iter()
            .find(|task| task.id == id)
            .map(Task::duplicate_draft)
            .ok_or_else(|| ApplicationError::NotFound(id.to_owned()))?;

        self.add(column, draft).await
    }

    /// replace the placeholder id with the server-assigned one, discarded
    /// when the task was mutated or removed while the create was in flight
    pub(crate) fn confirm_created(
        &mut self,
        placeholder: &str,
        revision: u64,
        created: &Task,
    ) -> Option<Task> {
        if self.revision(placeholder) != revision {
            warn!("Discarding stale create confirmation for {placeholder}");
            return None;
        }

        let (column, index) = self.find(placeholder)?;
        let task = &mut self.column_mut(column).tasks[index];
        task.id = created.id.clone();
        let task = task.clone();

        self.revisions.remove(placeholder);
        self.revisions.insert(created.id.clone(), revision);
        Some(task)
    }

    /// merge the uploaded screenshot url, discarded when stale
    pub(crate) fn confirm_screenshot(&mut self, id: &str, revision: u64, url: &str) -> bool {
        if self.revision(id) != revision {
            warn!("Discarding stale screenshot confirmation for {id}");
            return false;
        }

        match self.find(id) {
            Some((column, index)) => {
                self.column_mut(column).tasks[index].screenshot_url = Some(url.to_owned());
                true
            }
            None => false,
        }
    }

    /// second phase of a create/update carrying a captured image, returns
    /// the warning when attachment fails (never an error, the task stands)
    async fn attach_screenshot(&mut self, id: &str, data_uri: &str) -> Option<String> {
        let Some(media) = self.media.clone() else {
            warn!("Screenshot captured but no media service is configured");
            return Some("media service not configured, screenshot dropped".to_owned());
        };

        let revision = self.revision(id);
        match media.attach(&self.records, &self.table, id, data_uri).await {
            Ok(url) => {
                self.confirm_screenshot(id, revision, &url);
                None
            }
            Err(error) => {
                warn!("Screenshot attachment for {id} failed: {error}");
                Some(error.to_string())
            }
        }
    }

    fn column_index(&self, id: ColumnId) -> usize {
        self.columns
            .iter()
            .position(|column| column.id == id)
            .expect("the four columns are fixed")
    }

    fn column_mut(&mut self, id: ColumnId) -> &mut Column {
        let index = self.column_index(id);
        &mut self.columns[index]
    }

    fn position_in(&self, column: ColumnId, id: &str) -> Option<usize> {
        self.column(column).tasks.iter().position(|task| task.id == id)
    }

    fn remove_local(&mut self, id: &str) {
        if let Some((column, index)) = self.find(id) {
            self.column_mut(column).tasks.remove(index);
        }
    }

    fn revision(&self, id: &str) -> u64 {
        self.revisions.get(id).copied().unwrap_or(0)
    }

    fn bump(&mut self, id: &str) -> u64 {
        let revision = self.revisions.entry(id.to_owned()).or_insert(0);
        *revision += 1;
        *revision
    }
}
