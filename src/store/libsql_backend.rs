//! libSQL backend: async `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text, calendar dates as `YYYY-MM-DD`, enums as their wire
//! strings.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::records::{
    Agreement, Application, ApplicationStatus, Document, DocumentUpload, Event, Profile,
    ProfileFields, Resource, Task, TaskStatus,
};
use crate::store::migrations;
use crate::store::traits::{RecordStore, StatusUpdate};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a query and map the first row, if any.
    async fn query_one<T>(
        &self,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
        op: &str,
    ) -> Result<Option<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(map(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op} row: {e}"))),
        }
    }

    /// Run a query and map every row.
    async fn query_all<T>(
        &self,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
        op: &str,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut out = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => out.push(map(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{op} row: {e}"))),
            }
        }
        Ok(out)
    }

    async fn execute(
        &self,
        sql: &str,
        params: impl IntoParams,
        op: &str,
    ) -> Result<u64, DatabaseError> {
        self.conn()
            .execute(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime() output with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    // Try SQLite datetime() output without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Wire string for a serde enum (e.g. `TaskStatus::InProgress` → `"in-progress"`).
fn enum_str<T: Serialize>(value: &T) -> Result<String, DatabaseError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(DatabaseError::Serialization(format!(
            "expected string enum, got {other}"
        ))),
        Err(e) => Err(DatabaseError::Serialization(e.to_string())),
    }
}

fn parse_enum<T: DeserializeOwned>(column: &str, s: String) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s))
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn text(row: &libsql::Row, idx: i32, column: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{column}: {e}")))
}

/// Nullable text column. Empty strings read back as `None`.
fn opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok().filter(|s| !s.is_empty())
}

fn uuid(row: &libsql::Row, idx: i32, column: &str) -> Result<Uuid, DatabaseError> {
    let raw = text(row, idx, column)?;
    Uuid::parse_str(&raw).map_err(|e| DatabaseError::Query(format!("{column} parse: {e}")))
}

const AGREEMENT_COLUMNS: &str = "id, user_id, agreement_version, agreed_at";

fn row_to_agreement(row: &libsql::Row) -> Result<Agreement, DatabaseError> {
    Ok(Agreement {
        id: uuid(row, 0, "agreement.id")?,
        user_id: text(row, 1, "agreement.user_id")?,
        version: text(row, 2, "agreement.agreement_version")?,
        agreed_at: parse_datetime(&text(row, 3, "agreement.agreed_at")?),
    })
}

const PROFILE_COLUMNS: &str = "user_id, first_name, last_name, phone, gender, date_of_birth, address, city, state, zip_code, country, emergency_contact_name, emergency_contact_phone, emergency_contact_relation, department, position, employee_id, join_date, created_at, updated_at";

fn row_to_profile(row: &libsql::Row) -> Result<Profile, DatabaseError> {
    Ok(Profile {
        user_id: text(row, 0, "profile.user_id")?,
        first_name: opt_text(row, 1),
        last_name: opt_text(row, 2),
        phone: opt_text(row, 3),
        gender: opt_text(row, 4),
        date_of_birth: opt_text(row, 5).and_then(|s| parse_date(&s)),
        address: opt_text(row, 6),
        city: opt_text(row, 7),
        state: opt_text(row, 8),
        zip_code: opt_text(row, 9),
        country: opt_text(row, 10),
        emergency_contact_name: opt_text(row, 11),
        emergency_contact_phone: opt_text(row, 12),
        emergency_contact_relation: opt_text(row, 13),
        department: opt_text(row, 14),
        position: opt_text(row, 15),
        employee_id: opt_text(row, 16),
        join_date: opt_text(row, 17).and_then(|s| parse_date(&s)),
        created_at: parse_datetime(&text(row, 18, "profile.created_at")?),
        updated_at: parse_datetime(&text(row, 19, "profile.updated_at")?),
    })
}

const DOCUMENT_COLUMNS: &str =
    "id, user_id, document_type, file_name, file_type, file_size, file_path, uploaded_at, verified";

fn row_to_document(row: &libsql::Row) -> Result<Document, DatabaseError> {
    let size: i64 = row.get(5).unwrap_or(0);
    let verified: i64 = row.get(8).unwrap_or(0);
    Ok(Document {
        id: uuid(row, 0, "document.id")?,
        user_id: text(row, 1, "document.user_id")?,
        document_type: parse_enum("document.document_type", text(row, 2, "document.document_type")?)?,
        file_name: text(row, 3, "document.file_name")?,
        file_type: opt_text(row, 4).unwrap_or_default(),
        file_size: u64::try_from(size).unwrap_or(0),
        file_path: text(row, 6, "document.file_path")?,
        uploaded_at: parse_datetime(&text(row, 7, "document.uploaded_at")?),
        verified: verified != 0,
    })
}

const APPLICATION_COLUMNS: &str = "id, user_id, status, admin_notes, created_at, updated_at";

fn row_to_application(row: &libsql::Row) -> Result<Application, DatabaseError> {
    Ok(Application {
        id: uuid(row, 0, "application.id")?,
        user_id: text(row, 1, "application.user_id")?,
        status: parse_enum("application.status", text(row, 2, "application.status")?)?,
        admin_notes: opt_text(row, 3),
        created_at: parse_datetime(&text(row, 4, "application.created_at")?),
        updated_at: parse_datetime(&text(row, 5, "application.updated_at")?),
    })
}

const TASK_COLUMNS: &str =
    "id, user_id, title, description, due_date, priority, status, assigned_by, created_at, updated_at";

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    Ok(Task {
        id: uuid(row, 0, "task.id")?,
        user_id: text(row, 1, "task.user_id")?,
        title: text(row, 2, "task.title")?,
        description: opt_text(row, 3),
        due_date: opt_text(row, 4).and_then(|s| parse_date(&s)),
        priority: parse_enum("task.priority", text(row, 5, "task.priority")?)?,
        status: parse_enum("task.status", text(row, 6, "task.status")?)?,
        assigned_by: opt_text(row, 7),
        created_at: parse_datetime(&text(row, 8, "task.created_at")?),
        updated_at: parse_datetime(&text(row, 9, "task.updated_at")?),
    })
}

const EVENT_COLUMNS: &str = "id, title, description, date, time, event_type, created_at";

fn row_to_event(row: &libsql::Row) -> Result<Event, DatabaseError> {
    let date_str = text(row, 3, "event.date")?;
    let date = parse_date(&date_str)
        .ok_or_else(|| DatabaseError::Query(format!("event.date parse: {date_str}")))?;
    Ok(Event {
        id: uuid(row, 0, "event.id")?,
        title: text(row, 1, "event.title")?,
        description: opt_text(row, 2),
        date,
        time: opt_text(row, 4),
        event_type: opt_text(row, 5),
        created_at: parse_datetime(&text(row, 6, "event.created_at")?),
    })
}

const RESOURCE_COLUMNS: &str = "id, title, description, resource_type, url, created_at";

fn row_to_resource(row: &libsql::Row) -> Result<Resource, DatabaseError> {
    Ok(Resource {
        id: uuid(row, 0, "resource.id")?,
        title: text(row, 1, "resource.title")?,
        description: opt_text(row, 2),
        resource_type: text(row, 3, "resource.resource_type")?,
        url: opt_text(row, 4),
        created_at: parse_datetime(&text(row, 5, "resource.created_at")?),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Agreements ──────────────────────────────────────────────────

    async fn get_agreement(&self, user_id: &str) -> Result<Option<Agreement>, DatabaseError> {
        self.query_one(
            &format!("SELECT {AGREEMENT_COLUMNS} FROM agreements WHERE user_id = ?1"),
            params![user_id],
            row_to_agreement,
            "get_agreement",
        )
        .await
    }

    async fn create_agreement(
        &self,
        user_id: &str,
        version: &str,
    ) -> Result<Agreement, DatabaseError> {
        let agreement = Agreement::new(user_id, version);
        let inserted = self
            .execute(
                "INSERT OR IGNORE INTO agreements (id, user_id, agreement_version, agreed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    agreement.id.to_string(),
                    user_id,
                    version,
                    agreement.agreed_at.to_rfc3339(),
                ],
                "create_agreement",
            )
            .await?;
        if inserted == 0 {
            debug!(user_id, "Agreement already recorded");
        }

        self.get_agreement(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "agreement".into(),
                id: user_id.into(),
            })
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        self.query_one(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
            params![user_id],
            row_to_profile,
            "get_profile",
        )
        .await
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        fields: &ProfileFields,
    ) -> Result<Profile, DatabaseError> {
        let mut profile = self
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id));
        profile.apply(fields);

        self.execute(
            &format!(
                "INSERT INTO profiles ({PROFILE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                 ON CONFLICT(user_id) DO UPDATE SET
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    phone = excluded.phone,
                    gender = excluded.gender,
                    date_of_birth = excluded.date_of_birth,
                    address = excluded.address,
                    city = excluded.city,
                    state = excluded.state,
                    zip_code = excluded.zip_code,
                    country = excluded.country,
                    emergency_contact_name = excluded.emergency_contact_name,
                    emergency_contact_phone = excluded.emergency_contact_phone,
                    emergency_contact_relation = excluded.emergency_contact_relation,
                    department = excluded.department,
                    position = excluded.position,
                    employee_id = excluded.employee_id,
                    join_date = excluded.join_date,
                    updated_at = excluded.updated_at"
            ),
            params![
                profile.user_id.as_str(),
                profile.first_name.clone(),
                profile.last_name.clone(),
                profile.phone.clone(),
                profile.gender.clone(),
                profile.date_of_birth.map(|d| d.to_string()),
                profile.address.clone(),
                profile.city.clone(),
                profile.state.clone(),
                profile.zip_code.clone(),
                profile.country.clone(),
                profile.emergency_contact_name.clone(),
                profile.emergency_contact_phone.clone(),
                profile.emergency_contact_relation.clone(),
                profile.department.clone(),
                profile.position.clone(),
                profile.employee_id.clone(),
                profile.join_date.map(|d| d.to_string()),
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
            "upsert_profile",
        )
        .await?;

        Ok(profile)
    }

    // ── Documents ───────────────────────────────────────────────────

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, DatabaseError> {
        self.query_all(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ?1 ORDER BY uploaded_at ASC"
            ),
            params![user_id],
            row_to_document,
            "list_documents",
        )
        .await
    }

    async fn put_document(
        &self,
        user_id: &str,
        upload: &DocumentUpload,
    ) -> Result<Document, DatabaseError> {
        let document_type = enum_str(&upload.document_type)?;
        let size = i64::try_from(upload.file_size)
            .map_err(|_| DatabaseError::Constraint(format!("file size {} out of range", upload.file_size)))?;

        self.execute(
            "INSERT INTO documents (id, user_id, document_type, file_name, file_type, file_size, file_path, uploaded_at, verified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
             ON CONFLICT(user_id, document_type) DO UPDATE SET
                file_name = excluded.file_name,
                file_type = excluded.file_type,
                file_size = excluded.file_size,
                file_path = excluded.file_path,
                uploaded_at = excluded.uploaded_at,
                verified = 0",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                document_type.as_str(),
                upload.file_name.as_str(),
                upload.file_type.as_str(),
                size,
                upload.storage_path(user_id),
                Utc::now().to_rfc3339(),
            ],
            "put_document",
        )
        .await?;

        self.query_one(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ?1 AND document_type = ?2"
            ),
            params![user_id, document_type.as_str()],
            row_to_document,
            "put_document",
        )
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "document".into(),
            id: format!("{user_id}/{document_type}"),
        })
    }

    // ── Applications ────────────────────────────────────────────────

    async fn get_application(&self, user_id: &str) -> Result<Option<Application>, DatabaseError> {
        self.query_one(
            &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ?1"),
            params![user_id],
            row_to_application,
            "get_application",
        )
        .await
    }

    async fn create_application(&self, user_id: &str) -> Result<Application, DatabaseError> {
        let app = Application::new(user_id);
        self.execute(
            "INSERT OR IGNORE INTO applications (id, user_id, status, admin_notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
            params![
                app.id.to_string(),
                user_id,
                app.status.as_str(),
                app.created_at.to_rfc3339(),
                app.updated_at.to_rfc3339(),
            ],
            "create_application",
        )
        .await?;

        self.get_application(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "application".into(),
                id: user_id.into(),
            })
    }

    async fn update_application_status(
        &self,
        user_id: &str,
        status: ApplicationStatus,
        admin_notes: Option<&str>,
    ) -> Result<StatusUpdate, DatabaseError> {
        let updated = self
            .execute(
                "UPDATE applications
                 SET status = ?1, admin_notes = COALESCE(?2, admin_notes), updated_at = ?3
                 WHERE user_id = ?4 AND status NOT IN ('selected', 'rejected')",
                params![status.as_str(), admin_notes, Utc::now().to_rfc3339(), user_id],
                "update_application_status",
            )
            .await?;

        let current = self.get_application(user_id).await?;
        Ok(match current {
            Some(app) if updated > 0 => StatusUpdate::Updated(app),
            Some(app) => {
                debug!(user_id, status = %app.status, "Status write refused on final application");
                StatusUpdate::Final(app)
            }
            None => StatusUpdate::Missing,
        })
    }

    async fn list_applications(&self) -> Result<Vec<Application>, DatabaseError> {
        self.query_all(
            &format!("SELECT {APPLICATION_COLUMNS} FROM applications ORDER BY updated_at DESC"),
            (),
            row_to_application,
            "list_applications",
        )
        .await
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let priority = enum_str(&task.priority)?;
        let status = enum_str(&task.status)?;
        self.execute(
            &format!(
                "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                task.id.to_string(),
                task.user_id.as_str(),
                task.title.as_str(),
                task.description.as_deref(),
                task.due_date.map(|d| d.to_string()),
                priority,
                status,
                task.assigned_by.as_deref(),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
            "create_task",
        )
        .await?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        self.query_one(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id.to_string()],
            row_to_task,
            "get_task",
        )
        .await
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        self.query_all(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1
                 ORDER BY due_date IS NULL, due_date ASC, created_at ASC"
            ),
            params![user_id],
            row_to_task,
            "list_tasks",
        )
        .await
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, DatabaseError> {
        let status_str = enum_str(&status)?;
        let updated = self
            .execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status_str, Utc::now().to_rfc3339(), id.to_string()],
                "update_task_status",
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_task(id).await
    }

    // ── Reference data ──────────────────────────────────────────────

    async fn create_event(&self, event: &Event) -> Result<(), DatabaseError> {
        self.execute(
            &format!("INSERT INTO events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                event.id.to_string(),
                event.title.as_str(),
                event.description.as_deref(),
                event.date.to_string(),
                event.time.as_deref(),
                event.event_type.as_deref(),
                event.created_at.to_rfc3339(),
            ],
            "create_event",
        )
        .await?;
        Ok(())
    }

    async fn list_upcoming_events(&self, from: NaiveDate) -> Result<Vec<Event>, DatabaseError> {
        self.query_all(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE date >= ?1 ORDER BY date ASC, time ASC"
            ),
            params![from.to_string()],
            row_to_event,
            "list_upcoming_events",
        )
        .await
    }

    async fn create_resource(&self, resource: &Resource) -> Result<(), DatabaseError> {
        self.execute(
            &format!("INSERT INTO resources ({RESOURCE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                resource.id.to_string(),
                resource.title.as_str(),
                resource.description.as_deref(),
                resource.resource_type.as_str(),
                resource.url.as_deref(),
                resource.created_at.to_rfc3339(),
            ],
            "create_resource",
        )
        .await?;
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, DatabaseError> {
        self.query_all(
            &format!("SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY title ASC"),
            (),
            row_to_resource,
            "list_resources",
        )
        .await
    }
}
