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

#[macro_use]
extern crate serde;
#[macro_use]
extern crate thiserror;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate serde_json;

pub mod board;
pub mod capture;
pub mod config;
pub mod error;
pub mod media;
pub mod record;
pub mod task;


pub mod prelude {
    pub use crate::board::{BoardStore, Column, TaskOutcome};
    pub use crate::capture::{extract_video_id, CaptureClient};
    pub use crate::config::{BoardConfig, Config};
    pub use crate::error::*;
    pub use crate::media::MediaGateway;
    pub use crate::record::{RecordGateway, RecordStore};
    pub use crate::task::{Assignee, ColumnId, Priority, Task, TaskDraft, TaskKind, TaskPatch};
}
