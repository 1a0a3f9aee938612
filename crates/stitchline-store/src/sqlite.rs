//! SQLite implementation of the [`ProjectStore`] trait.
//!
//! Projects live only on the device. The store uses rusqlite with bundled
//! SQLite, wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;

use stitchline_core::UserId;

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::project::{NewProject, Project, ProjectId};
use crate::traits::ProjectStore;

const SELECT_PROJECT: &str = "SELECT id, name, yarn_name, yarn_type, yarn_weight, hook_size,
        needle_size, is_completed, image_file, owner FROM projects";

/// SQLite-based project store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteProjectStore {
    conn: Arc<Mutex<Connection>>,
    changes: watch::Sender<Arc<Vec<Project>>>,
}

impl SqliteProjectStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        let current = load_all(&conn)?;
        let (changes, _) = watch::channel(Arc::new(current));
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }

    /// Run a mutation, then publish the resulting project list.
    async fn mutate<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (value, all) = self
            .run(move |conn| {
                let value = f(conn)?;
                Ok((value, load_all(conn)?))
            })
            .await?;
        self.changes.send_replace(Arc::new(all));
        Ok(value)
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId(row.get("id")?),
        name: row.get("name")?,
        yarn_name: row.get("yarn_name")?,
        yarn_type: row.get("yarn_type")?,
        yarn_weight: row.get("yarn_weight")?,
        hook_size: row.get("hook_size")?,
        needle_size: row.get("needle_size")?,
        is_completed: row.get::<_, i64>("is_completed")? != 0,
        image_file: row.get("image_file")?,
        owner: UserId::new(row.get::<_, String>("owner")?),
    })
}

fn load_all(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY name, id", SELECT_PROJECT))?;
    let projects = stmt
        .query_map([], row_to_project)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

fn load_one(conn: &Connection, id: ProjectId) -> Result<Option<Project>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_PROJECT),
            params![id.0],
            row_to_project,
        )
        .optional()?)
}

#[async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn create(&self, project: NewProject) -> Result<Project> {
        self.mutate(move |conn| {
            // The id is a placeholder until the insert assigns one.
            let project = project.into_project(ProjectId(0));
            conn.execute(
                "INSERT INTO projects (
                    name, yarn_name, yarn_type, yarn_weight, hook_size, needle_size,
                    is_completed, image_file, owner, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    project.name,
                    project.yarn_name,
                    project.yarn_type,
                    project.yarn_weight,
                    project.hook_size,
                    project.needle_size,
                    project.is_completed as i64,
                    project.image_file,
                    project.owner.as_str(),
                    now_millis(),
                ],
            )?;
            Ok(Project {
                id: ProjectId(conn.last_insert_rowid()),
                ..project
            })
        })
        .await
    }

    async fn delete(&self, id: ProjectId) -> Result<bool> {
        self.mutate(move |conn| {
            let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id.0])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn toggle_completion(&self, id: ProjectId) -> Result<Project> {
        self.mutate(move |conn| {
            let updated = conn.execute(
                "UPDATE projects SET is_completed = 1 - is_completed WHERE id = ?1",
                params![id.0],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("project {}", id)));
            }
            load_one(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("project {}", id)))
        })
        .await
    }

    async fn fetch_all(&self) -> Result<Vec<Project>> {
        self.run(|conn| load_all(conn)).await
    }

    fn subscribe(&self) -> watch::Receiver<Arc<Vec<Project>>> {
        self.changes.subscribe()
    }
}
