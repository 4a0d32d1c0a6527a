//! Remote document storage over libsql.
//!
//! Two-table layout shared with the other scraper pipelines: a parent
//! `documents` table keyed by `(source_type, external_id)` holding the
//! cross-source columns, and a per-source child table `scjn_documents` with
//! the domain-specific columns plus JSON arrays for articles and reforms.
//! Chunks upsert into `scjn_chunks` keyed by `chunk_id`.

use lex_core::entities::{Document, TextChunk};
use lex_core::enums::EmbeddingStatus;

use crate::error::StoreError;

const SOURCE_TYPE: &str = "scjn";

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        source_type TEXT NOT NULL,
        external_id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        publication_date TEXT,
        UNIQUE (source_type, external_id)
    )",
    "CREATE TABLE IF NOT EXISTS scjn_documents (
        id TEXT PRIMARY KEY,
        q_param TEXT NOT NULL UNIQUE,
        short_title TEXT,
        category TEXT NOT NULL,
        scope TEXT NOT NULL,
        status TEXT NOT NULL,
        state TEXT,
        expedition_date TEXT,
        subject_matters TEXT NOT NULL DEFAULT '[]',
        articles TEXT NOT NULL DEFAULT '[]',
        reforms TEXT NOT NULL DEFAULT '[]',
        source_url TEXT NOT NULL DEFAULT '',
        chunk_count INTEGER NOT NULL DEFAULT 0,
        embedding_status TEXT NOT NULL DEFAULT 'pending'
    )",
    "CREATE TABLE IF NOT EXISTS scjn_chunks (
        chunk_id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        token_count INTEGER NOT NULL
    )",
];

/// libsql-backed store for the remote/dual storage modes.
#[derive(Debug)]
pub struct RemoteDocumentStore {
    conn: libsql::Connection,
}

impl RemoteDocumentStore {
    /// Connect to a remote libsql database and apply migrations.
    ///
    /// # Errors
    ///
    /// [`StoreError::Remote`] on connection or migration failure.
    pub async fn connect(url: &str, auth_token: &str) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await?;
        let conn = db.connect()?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    /// Connect to a local libsql file (tests and air-gapped runs).
    ///
    /// # Errors
    ///
    /// [`StoreError::Remote`] on connection or migration failure.
    pub async fn connect_local(path: &str) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            self.conn.execute(statement, ()).await?;
        }
        Ok(())
    }

    /// Upsert the parent and child rows for a document.
    ///
    /// # Errors
    ///
    /// [`StoreError::Remote`] / [`StoreError::Json`] on failure; callers
    /// downgrade to a warning and rely on the local write.
    pub async fn upsert_document(&self, document: &Document) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO documents (id, source_type, external_id, title, publication_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (source_type, external_id) DO UPDATE SET
                     id = excluded.id,
                     title = excluded.title,
                     publication_date = excluded.publication_date",
                libsql::params![
                    document.id.as_str(),
                    SOURCE_TYPE,
                    document.q_param.as_str(),
                    document.title.as_str(),
                    document.publication_date.map(|d| d.to_string()),
                ],
            )
            .await?;

        let subject_matters = serde_json::to_string(&document.subject_matters)?;
        let articles = serde_json::to_string(&document.articles)?;
        let reforms = serde_json::to_string(&document.reforms)?;

        self.conn
            .execute(
                "INSERT INTO scjn_documents
                     (id, q_param, short_title, category, scope, status, state,
                      expedition_date, subject_matters, articles, reforms, source_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT (q_param) DO UPDATE SET
                     id = excluded.id,
                     short_title = excluded.short_title,
                     category = excluded.category,
                     scope = excluded.scope,
                     status = excluded.status,
                     state = excluded.state,
                     expedition_date = excluded.expedition_date,
                     subject_matters = excluded.subject_matters,
                     articles = excluded.articles,
                     reforms = excluded.reforms,
                     source_url = excluded.source_url",
                libsql::params![
                    document.id.as_str(),
                    document.q_param.as_str(),
                    document.short_title.as_deref(),
                    document.category.as_str(),
                    document.scope.as_str(),
                    document.status.as_str(),
                    document.state.as_deref(),
                    document.expedition_date.map(|d| d.to_string()),
                    subject_matters,
                    articles,
                    reforms,
                    document.source_url.as_str(),
                ],
            )
            .await?;

        Ok(())
    }

    /// Whether a document with this `q_param` exists in the child table.
    ///
    /// # Errors
    ///
    /// [`StoreError::Remote`] on query failure.
    pub async fn exists(&self, q_param: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM scjn_documents WHERE q_param = ?1", [q_param])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Batched chunk upsert keyed by `chunk_id`; also refreshes the
    /// document's `chunk_count`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Remote`] on failure.
    pub async fn upsert_chunks(
        &self,
        document_id: &str,
        chunks: &[TextChunk],
    ) -> Result<(), StoreError> {
        for chunk in chunks {
            self.conn
                .execute(
                    "INSERT INTO scjn_chunks (chunk_id, document_id, chunk_index, content, token_count)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT (chunk_id) DO UPDATE SET
                         content = excluded.content,
                         token_count = excluded.token_count",
                    libsql::params![
                        chunk.id.as_str(),
                        chunk.document_id.as_str(),
                        i64::try_from(chunk.chunk_index).unwrap_or(i64::MAX),
                        chunk.content.as_str(),
                        i64::try_from(chunk.token_count).unwrap_or(i64::MAX),
                    ],
                )
                .await?;
        }

        self.conn
            .execute(
                "UPDATE scjn_documents SET chunk_count = ?2 WHERE id = ?1",
                libsql::params![document_id, i64::try_from(chunks.len()).unwrap_or(i64::MAX)],
            )
            .await?;
        Ok(())
    }

    /// Advance the document's embedding status column.
    ///
    /// # Errors
    ///
    /// [`StoreError::Remote`] on failure.
    pub async fn set_embedding_status(
        &self,
        document_id: &str,
        status: EmbeddingStatus,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE scjn_documents SET embedding_status = ?2 WHERE id = ?1",
                libsql::params![document_id, status.as_str()],
            )
            .await?;
        Ok(())
    }
}
