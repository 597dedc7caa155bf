//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs over the `documents` table.
//! - Keep SQL details and ordering behavior inside repository boundary.
//!
//! # Invariants
//! - Listings are ordered newest first: `created_at DESC, rowid DESC`.
//! - Each write is a single statement, so root-level effects are atomic.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::document::{Document, DocumentId, DocumentPatch};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    title,
    owner_id,
    parent_id,
    is_archived,
    is_published,
    content,
    cover_image_url,
    icon,
    created_at,
    updated_at
FROM documents";

const NEWEST_FIRST: &str = "ORDER BY created_at DESC, rowid DESC";

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

const REQUIRED_COLUMNS: [&str; 11] = [
    "id",
    "title",
    "owner_id",
    "parent_id",
    "is_archived",
    "is_published",
    "content",
    "cover_image_url",
    "icon",
    "created_at",
    "updated_at",
];

/// Result type used by document repository operations.
pub type DocumentRepoResult<T> = Result<T, DocumentRepoError>;

/// Errors from document repository operations.
#[derive(Debug)]
pub enum DocumentRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target document does not exist.
    NotFound(DocumentId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid document.
    InvalidData(String),
}

impl Display for DocumentRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "document repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "document repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
        }
    }
}

impl Error for DocumentRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for DocumentRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DocumentRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for document storage.
pub trait DocumentRepository {
    /// Inserts a new document and returns it with store-assigned timestamps.
    fn insert_document(&self, document: &Document) -> DocumentRepoResult<Document>;
    /// Loads one document by id.
    fn get_document(&self, id: DocumentId) -> DocumentRepoResult<Option<Document>>;
    /// Lists one owner's documents under `parent_id` (`None` = roots) with the
    /// given archived flag.
    fn list_by_parent(
        &self,
        owner_id: &str,
        parent_id: Option<DocumentId>,
        archived: bool,
    ) -> DocumentRepoResult<Vec<Document>>;
    /// Lists all of one owner's documents with the given archived flag.
    fn list_by_owner(&self, owner_id: &str, archived: bool) -> DocumentRepoResult<Vec<Document>>;
    /// Lists ids of direct children in the given archived state.
    fn list_child_ids(
        &self,
        owner_id: &str,
        parent_id: DocumentId,
        archived: bool,
    ) -> DocumentRepoResult<Vec<DocumentId>>;
    /// Applies a partial update. Empty patches return the current record.
    fn apply_patch(&self, id: DocumentId, patch: &DocumentPatch) -> DocumentRepoResult<Document>;
    /// Sets the archived flag, optionally detaching the document from its
    /// parent in the same write. Unchanged rows keep their `updated_at`.
    fn set_archived(
        &self,
        id: DocumentId,
        archived: bool,
        detach_parent: bool,
    ) -> DocumentRepoResult<Document>;
    /// Flips the archived flag only if it currently equals `!archived`.
    ///
    /// Returns whether the row changed.
    fn flip_archived_if(&self, id: DocumentId, archived: bool) -> DocumentRepoResult<bool>;
    /// Clears the icon field.
    fn clear_icon(&self, id: DocumentId) -> DocumentRepoResult<Document>;
    /// Clears the cover image field.
    fn clear_cover_image(&self, id: DocumentId) -> DocumentRepoResult<Document>;
    /// Permanently deletes one row. Children are left untouched.
    fn delete_document(&self, id: DocumentId) -> DocumentRepoResult<Document>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DocumentRepoResult<Self> {
        ensure_document_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates repository from a connection already checked by `try_new`.
    pub(crate) fn assume_ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn insert_document(&self, document: &Document) -> DocumentRepoResult<Document> {
        self.conn.execute(
            "INSERT INTO documents (
                id,
                title,
                owner_id,
                parent_id,
                is_archived,
                is_published,
                content,
                cover_image_url,
                icon
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                document.id.to_string(),
                document.title.as_str(),
                document.owner_id.as_str(),
                document.parent_id.map(|value| value.to_string()),
                bool_to_int(document.is_archived),
                bool_to_int(document.is_published),
                document.content.as_deref(),
                document.cover_image_url.as_deref(),
                document.icon.as_deref(),
            ],
        )?;
        load_required(self.conn, document.id)
    }

    fn get_document(&self, id: DocumentId) -> DocumentRepoResult<Option<Document>> {
        load_optional(self.conn, id)
    }

    fn list_by_parent(
        &self,
        owner_id: &str,
        parent_id: Option<DocumentId>,
        archived: bool,
    ) -> DocumentRepoResult<Vec<Document>> {
        match parent_id {
            Some(parent_id) => query_documents(
                self.conn,
                &format!(
                    "{DOCUMENT_SELECT_SQL}
                     WHERE owner_id = ?1
                       AND parent_id = ?2
                       AND is_archived = ?3
                     {NEWEST_FIRST};"
                ),
                params![owner_id, parent_id.to_string(), bool_to_int(archived)],
            ),
            None => query_documents(
                self.conn,
                &format!(
                    "{DOCUMENT_SELECT_SQL}
                     WHERE owner_id = ?1
                       AND parent_id IS NULL
                       AND is_archived = ?2
                     {NEWEST_FIRST};"
                ),
                params![owner_id, bool_to_int(archived)],
            ),
        }
    }

    fn list_by_owner(&self, owner_id: &str, archived: bool) -> DocumentRepoResult<Vec<Document>> {
        query_documents(
            self.conn,
            &format!(
                "{DOCUMENT_SELECT_SQL}
                 WHERE owner_id = ?1
                   AND is_archived = ?2
                 {NEWEST_FIRST};"
            ),
            params![owner_id, bool_to_int(archived)],
        )
    }

    fn list_child_ids(
        &self,
        owner_id: &str,
        parent_id: DocumentId,
        archived: bool,
    ) -> DocumentRepoResult<Vec<DocumentId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM documents
             WHERE owner_id = ?1
               AND parent_id = ?2
               AND is_archived = ?3;",
        )?;
        let mut rows = stmt.query(params![
            owner_id,
            parent_id.to_string(),
            bool_to_int(archived)
        ])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "documents.id")?);
        }
        Ok(ids)
    }

    fn apply_patch(&self, id: DocumentId, patch: &DocumentPatch) -> DocumentRepoResult<Document> {
        if patch.is_empty() {
            return load_required(self.conn, id);
        }

        let changed = self.conn.execute(
            &format!(
                "UPDATE documents
                 SET title = COALESCE(?2, title),
                     content = COALESCE(?3, content),
                     cover_image_url = COALESCE(?4, cover_image_url),
                     icon = COALESCE(?5, icon),
                     is_published = COALESCE(?6, is_published),
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id.to_string(),
                patch.title.as_deref(),
                patch.content.as_deref(),
                patch.cover_image_url.as_deref(),
                patch.icon.as_deref(),
                patch.is_published.map(bool_to_int),
            ],
        )?;
        if changed == 0 {
            return Err(DocumentRepoError::NotFound(id));
        }
        load_required(self.conn, id)
    }

    fn set_archived(
        &self,
        id: DocumentId,
        archived: bool,
        detach_parent: bool,
    ) -> DocumentRepoResult<Document> {
        self.conn.execute(
            &format!(
                "UPDATE documents
                 SET is_archived = ?2,
                     parent_id = CASE WHEN ?3 = 1 THEN NULL ELSE parent_id END,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1
                   AND (is_archived <> ?2 OR (?3 = 1 AND parent_id IS NOT NULL));"
            ),
            params![
                id.to_string(),
                bool_to_int(archived),
                bool_to_int(detach_parent)
            ],
        )?;
        load_required(self.conn, id)
    }

    fn flip_archived_if(&self, id: DocumentId, archived: bool) -> DocumentRepoResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE documents
                 SET is_archived = ?2,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1
                   AND is_archived = ?3;"
            ),
            params![
                id.to_string(),
                bool_to_int(archived),
                bool_to_int(!archived)
            ],
        )?;
        Ok(changed == 1)
    }

    fn clear_icon(&self, id: DocumentId) -> DocumentRepoResult<Document> {
        clear_column(self.conn, id, "icon")
    }

    fn clear_cover_image(&self, id: DocumentId) -> DocumentRepoResult<Document> {
        clear_column(self.conn, id, "cover_image_url")
    }

    fn delete_document(&self, id: DocumentId) -> DocumentRepoResult<Document> {
        let snapshot = load_required(self.conn, id)?;
        self.conn
            .execute("DELETE FROM documents WHERE id = ?1;", [id.to_string()])?;
        Ok(snapshot)
    }
}

fn clear_column(
    conn: &Connection,
    id: DocumentId,
    column: &'static str,
) -> DocumentRepoResult<Document> {
    let changed = conn.execute(
        &format!(
            "UPDATE documents
             SET {column} = NULL,
                 updated_at = {NOW_MS_SQL}
             WHERE id = ?1;"
        ),
        [id.to_string()],
    )?;
    if changed == 0 {
        return Err(DocumentRepoError::NotFound(id));
    }
    load_required(conn, id)
}

fn query_documents(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> DocumentRepoResult<Vec<Document>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        documents.push(parse_document_row(row)?);
    }
    Ok(documents)
}

fn load_optional(conn: &Connection, id: DocumentId) -> DocumentRepoResult<Option<Document>> {
    let mut stmt = conn.prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_document_row(row)?));
    }
    Ok(None)
}

fn load_required(conn: &Connection, id: DocumentId) -> DocumentRepoResult<Document> {
    load_optional(conn, id)?.ok_or(DocumentRepoError::NotFound(id))
}

fn parse_document_row(row: &Row<'_>) -> DocumentRepoResult<Document> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "documents.id")?;

    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "documents.parent_id"))
        .transpose()?;

    let title: String = row.get("title")?;
    if title.trim().is_empty() {
        return Err(DocumentRepoError::InvalidData(format!(
            "blank title for document {id}"
        )));
    }

    Ok(Document {
        id,
        title,
        owner_id: row.get("owner_id")?,
        parent_id,
        is_archived: parse_flag(row.get("is_archived")?, "documents.is_archived")?,
        is_published: parse_flag(row.get("is_published")?, "documents.is_published")?,
        content: row.get("content")?,
        cover_image_url: row.get("cover_image_url")?,
        icon: row.get("icon")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_flag(value: i64, column: &'static str) -> DocumentRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DocumentRepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn parse_uuid(value: &str, column: &'static str) -> DocumentRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| DocumentRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn ensure_document_connection_ready(conn: &Connection) -> DocumentRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(DocumentRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "documents")? {
        return Err(DocumentRepoError::MissingRequiredTable("documents"));
    }

    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "documents", column)? {
            return Err(DocumentRepoError::MissingRequiredColumn {
                table: "documents",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DocumentRepoResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DocumentRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
