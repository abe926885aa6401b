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

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cueboard::board::BoardStore;
use cueboard::capture::{extract_video_id, CaptureClient};
use cueboard::config::{BoardConfig, Config};
use cueboard::error::ApplicationError;
use cueboard::media::MediaGateway;
use cueboard::record::{RecordGateway, RecordStore};
use cueboard::task::{ColumnId, Priority, TaskDraft, TaskKind, TaskPatch, UNASSIGNED};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "cueboard", version, about = "Kanban board for film-score composition work")]
struct Cli {
    /// board settings file holding the configured table name
    #[arg(long, default_value = ".cueboard.json")]
    settings: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the board
    Board,
    /// choose the remote table backing the board, without arguments the
    /// available tables are listed
    Configure {
        table: Option<String>,
        /// create the table with the full board schema first
        #[arg(long)]
        create: bool,
    },
    /// create a task in a column
    Add {
        title: String,
        #[arg(long, default_value = "todo")]
        column: ColumnId,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long = "type")]
        kind: Option<TaskKind>,
        /// duration in seconds
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        instrument: Vec<String>,
        #[arg(long)]
        youtube_url: Option<String>,
        /// seconds offset into the linked video
        #[arg(long)]
        timestamp: Option<u32>,
        /// capture a reference screenshot from the linked video
        #[arg(long)]
        capture: bool,
    },
    /// move a task to another column
    Move {
        id: String,
        #[arg(long)]
        from: ColumnId,
        #[arg(long)]
        to: ColumnId,
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// edit fields of a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long = "type")]
        kind: Option<TaskKind>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        youtube_url: Option<String>,
        #[arg(long)]
        timestamp: Option<u32>,
    },
    /// delete a task
    Delete {
        id: String,
        #[arg(long)]
        column: ColumnId,
    },
    /// duplicate a task within its column
    Duplicate {
        id: String,
        #[arg(long)]
        column: ColumnId,
    },
    /// capture a screenshot from the task's video reference and attach it
    Capture {
        id: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 0)]
        timestamp: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let records = RecordGateway::new(&config)?;

    if let Command::Configure { table, create } = &cli.command {
        configure_board(&records, &cli.settings, table.as_deref(), *create).await?;
        return Ok(());
    }

    // everything else requires a configured board
    let board_config = match BoardConfig::load(&cli.settings)? {
        Some(board_config) => board_config,
        None => match config.airtable_table_name().as_deref() {
            Some(table) => BoardConfig::new(table)?,
            None => {
                eprintln!("No board configured yet, run `cueboard configure <table>` first");
                std::process::exit(2);
            }
        },
    };

    // the media service is optional, screenshots degrade to a warning
    let media = MediaGateway::new(&config).ok();
    let mut board = BoardStore::new(records, media, &board_config);
    board.load().await?;

    match cli.command {
        Command::Board => print_board(&board),
        Command::Add {
            title,
            column,
            description,
            assignee,
            due,
            priority,
            kind,
            duration,
            instrument,
            youtube_url,
            timestamp,
            capture,
        } => {
            let screenshot = if capture {
                let url = youtube_url.as_deref().ok_or_else(|| {
                    ApplicationError::Validation("--capture requires --youtube-url".to_owned())
                })?;
                Some(capture_frame(&config, url, timestamp.unwrap_or(0)).await?)
            } else {
                None
            };

            let outcome = board
                .add(
                    column,
                    TaskDraft {
                        title,
                        description: description.unwrap_or_default(),
                        assignee: assignee.unwrap_or_default(),
                        due_date: due,
                        priority: priority.unwrap_or_default(),
                        kind: kind.unwrap_or_default(),
                        duration,
                        instruments: instrument,
                        youtube_url,
                        timestamp,
                        screenshot,
                    },
                )
                .await?;

            println!("Created task {} in {}", outcome.task.id, column);
            warn_on_attach(&outcome.attach_warning);
        }
        Command::Move {
            id,
            from,
            to,
            index,
        } => {
            board.move_task(&id, from, to, index).await?;
            println!("Moved {id} to {to}");
        }
        Command::Edit {
            id,
            title,
            description,
            assignee,
            due,
            priority,
            kind,
            duration,
            completed,
            youtube_url,
            timestamp,
        } => {
            let outcome = board
                .update_task(
                    &id,
                    TaskPatch {
                        title,
                        description,
                        assignee,
                        due_date: due,
                        priority,
                        kind,
                        duration,
                        instruments: None,
                        completed,
                        youtube_url,
                        timestamp,
                        screenshot: None,
                    },
                )
                .await?;
            println!("Updated {}", outcome.task.id);
        }
        Command::Delete { id, column } => {
            board.delete(&id, column).await?;
            println!("Deleted {id}");
        }
        Command::Duplicate { id, column } => {
            let outcome = board.duplicate(&id, column).await?;
            println!("Created {} ({})", outcome.task.id, outcome.task.title);
        }
        Command::Capture { id, url, timestamp } => {
            let screenshot = capture_frame(&config, &url, timestamp).await?;
            let outcome = board
                .update_task(
                    &id,
                    TaskPatch {
                        youtube_url: Some(url),
                        timestamp: Some(timestamp),
                        screenshot: Some(screenshot),
                        ..TaskPatch::default()
                    },
                )
                .await?;

            match outcome.task.screenshot_url {
                Some(image_url) => println!("Attached screenshot: {image_url}"),
                None => warn_on_attach(&outcome.attach_warning),
            }
        }
        Command::Configure { .. } => unreachable!("handled before the board is loaded"),
    }

    Ok(())
}

/// the configuration flow discovers the tables the base holds; a table
/// name is only accepted once it exists remotely (or was just created)
async fn configure_board(
    records: &RecordGateway,
    settings: &std::path::Path,
    table: Option<&str>,
    create: bool,
) -> Result<(), ApplicationError> {
    let Some(table) = table else {
        let names = records.table_names().await?;
        if names.is_empty() {
            println!("The base holds no tables yet, create one with `cueboard configure <table> --create`");
        } else {
            println!("Available tables:");
            for name in &names {
                println!("  {name}");
            }
            println!("Pick one with `cueboard configure <table>`");
        }
        return Ok(());
    };

    let board_config = BoardConfig::new(table)?;
    if create {
        let created = records.create_table(&board_config.table_name).await?;
        println!("Created table \"{created}\"");
    } else {
        let names = records.table_names().await?;
        if !names.contains(&board_config.table_name) {
            return Err(ApplicationError::Validation(format!(
                "table \"{}\" does not exist in the base (available: {}), create it with `cueboard configure {} --create`",
                board_config.table_name,
                names.join(", "),
                board_config.table_name,
            )));
        }
    }

    board_config.save(settings)?;
    println!("Board configured for table \"{}\"", board_config.table_name);
    Ok(())
}

async fn capture_frame(
    config: &Config,
    url: &str,
    timestamp: u32,
) -> Result<String, ApplicationError> {
    let video_id = extract_video_id(url)
        .ok_or_else(|| ApplicationError::Validation(format!("not a video url: {url}")))?;
    CaptureClient::new(config)?.capture(&video_id, timestamp).await
}

fn warn_on_attach(warning: &Option<String>) {
    if let Some(warning) = warning {
        eprintln!("Warning: {warning}");
    }
}

fn print_board<S: RecordStore>(board: &BoardStore<S>) {
    for column in board.columns() {
        println!("{} ({})", column.title(), column.tasks.len());
        for task in &column.tasks {
            let marker = if task.completed { "x" } else { " " };
            print!("  [{marker}] {}  {}", task.id, task.title);
            if task.assignee.name != UNASSIGNED {
                print!("  @{}", task.assignee.name);
            }
            if let Some(due) = task.due_date {
                print!("  due {due}");
            }
            println!("  [{} | {}]", task.priority, task.kind);
        }
    }
}
