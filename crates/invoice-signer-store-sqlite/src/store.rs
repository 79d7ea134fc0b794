// crates/invoice-signer-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Signing Store
// Description: Durable SigningStore backed by SQLite.
// Purpose: Run claim, page, delta, and sweep statements against invoice rows.
// Dependencies: invoice-signer-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`SigningStore`] over `SQLite`. Claims are marker
//! updates on the `invoices` table; pages join customer and provider contact
//! data; delta inserts and their `(Unclaimed, Done)` flips share one
//! transaction. The atomic claim path runs count-then-mark inside a
//! `BEGIN IMMEDIATE` transaction so exclusivity holds across processes.
//!
//! Every statement binds values as parameters. Ownership predicates are built
//! from the fixed type-code suffix tables, never from caller input.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use invoice_signer_core::ActorId;
use invoice_signer_core::BROKER_MEDIATED_SUFFIXES;
use invoice_signer_core::CertificateSerial;
use invoice_signer_core::ClaimOutcome;
use invoice_signer_core::ClaimScope;
use invoice_signer_core::ClaimState;
use invoice_signer_core::CustomerProfile;
use invoice_signer_core::DIRECT_ISSUER_SUFFIXES;
use invoice_signer_core::RecordId;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::RecordState;
use invoice_signer_core::SignableRecord;
use invoice_signer_core::SignedArtifact;
use invoice_signer_core::SignedResult;
use invoice_signer_core::SigningStore;
use invoice_signer_core::StoreError;
use invoice_signer_core::SuccessState;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Columns selected for a signable page row.
const PAGE_COLUMNS: &str = "a.record_id, a.type_code, a.issuer_id, a.issuer_email, \
                            a.counterpart_id, a.counterpart_email, a.broker_id, a.broker_email, \
                            NULLIF(b.provider_id, ''), c.contact_email, a.issue_date, \
                            a.document_json";

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` signing store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Referenced row does not exist.
    #[error("sqlite store row not found: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::VersionMismatch(message) => Self::Store(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

/// Maps a `rusqlite` error into a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn db_err(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================//
// SECTION: Scope Filters
// ============================================================================//

/// SQL predicate plus its bound parameters.
struct ScopeFilter {
    /// Predicate text over alias `a`, starting with `AND`.
    sql: String,
    /// Parameters in placeholder order.
    params: Vec<Value>,
}

/// Returns the ownership predicate over alias `a` with two actor placeholders.
fn ownership_predicate() -> String {
    format!(
        "((substr(a.type_code, -2) IN ({}) AND a.issuer_id = ?) OR (substr(a.type_code, -2) IN \
         ({}) AND a.broker_id = ?))",
        quoted_list(&DIRECT_ISSUER_SUFFIXES),
        quoted_list(&BROKER_MEDIATED_SUFFIXES)
    )
}

/// Renders fixed suffixes as a quoted SQL list.
fn quoted_list(values: &[&str]) -> String {
    values.iter().map(|value| format!("'{value}'")).collect::<Vec<_>>().join(", ")
}

/// Builds the ownership and selector predicate for a scope.
fn scope_filter(scope: &ClaimScope) -> ScopeFilter {
    let actor = scope.actor_id.as_str().to_string();
    let mut sql = format!(" AND {}", ownership_predicate());
    let mut params = vec![Value::Text(actor.clone()), Value::Text(actor)];
    match &scope.selector {
        RecordSelector::Ids(ids) => {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND a.record_id IN ({placeholders})"));
            params.extend(ids.iter().map(|id| Value::Text(id.as_str().to_string())));
        }
        RecordSelector::DateRange(range) => {
            sql.push_str(" AND a.issue_date >= ? AND a.issue_date <= ?");
            params.push(Value::Integer(range.from_unix()));
            params.push(Value::Integer(range.till_unix()));
        }
        RecordSelector::Unrestricted => {}
    }
    ScopeFilter {
        sql,
        params,
    }
}

/// Converts an optional quantity into a `SQLite` LIMIT value (-1 = unbounded).
fn limit_value(quantity: Option<usize>) -> Result<i64, SqliteStoreError> {
    quantity.map_or(Ok(-1), |quantity| {
        i64::try_from(quantity).map_err(|_| SqliteStoreError::Invalid("quantity too large".to_string()))
    })
}

/// Converts a row count into `usize`.
fn count_value(count: i64) -> Result<usize, SqliteStoreError> {
    usize::try_from(count).map_err(|_| SqliteStoreError::Invalid(format!("negative row count {count}")))
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed signing store.
#[derive(Clone)]
pub struct SqliteSigningStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSigningStore {
    /// Opens an `SQLite`-backed signing store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Inserts a pending invoice row in `(Unclaimed, NotDone)` state.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn insert_invoice(&self, record: &SignableRecord) -> Result<(), SqliteStoreError> {
        let document = serde_json::to_string(&record.document)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        self.lock()?
            .execute(
                "INSERT INTO invoices (record_id, type_code, issuer_id, issuer_email, \
                 counterpart_id, counterpart_email, broker_id, broker_email, issue_date, \
                 document_json, claim_state, success_state) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, \
                 ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.record_id.as_str(),
                    record.type_code,
                    record.issuer_id.as_str(),
                    record.issuer_email,
                    record.counterpart_id,
                    record.counterpart_email,
                    record.broker_id.as_ref().map(ActorId::as_str),
                    record.broker_email,
                    record.issue_date,
                    document,
                    ClaimState::Unclaimed.code(),
                    SuccessState::NotDone.code(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Inserts or replaces a customer profile.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the upsert fails.
    pub fn upsert_customer(&self, profile: &CustomerProfile) -> Result<(), SqliteStoreError> {
        self.lock()?
            .execute(
                "INSERT INTO customers (customer_id, provider_id, signing_type, sign_from_day, \
                 sign_till_day) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(customer_id) DO UPDATE \
                 SET provider_id = excluded.provider_id, signing_type = excluded.signing_type, \
                 sign_from_day = excluded.sign_from_day, sign_till_day = excluded.sign_till_day",
                params![
                    profile.customer_id.as_str(),
                    profile.provider_id,
                    profile.signing_type,
                    profile.sign_from_day,
                    profile.sign_till_day,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Inserts or replaces a provider contact email.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the upsert fails.
    pub fn upsert_provider(&self, provider_id: &str, email: &str) -> Result<(), SqliteStoreError> {
        self.lock()?
            .execute(
                "INSERT INTO providers (provider_id, contact_email) VALUES (?1, ?2) \
                 ON CONFLICT(provider_id) DO UPDATE SET contact_email = excluded.contact_email",
                params![provider_id, email],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Returns every invoice id with its markers, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or a marker is unknown.
    pub fn record_states(&self) -> Result<Vec<(RecordId, RecordState)>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare("SELECT record_id, claim_state, success_state FROM invoices ORDER BY record_id")
            .map_err(db_err)?;
        let rows = statement
            .query_map(params![], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(db_err)?;
        let mut states = Vec::new();
        for row in rows {
            let (record_id, claim, success) = row.map_err(db_err)?;
            states.push((RecordId::new(record_id), parse_state(&claim, &success)?));
        }
        Ok(states)
    }

    /// Returns every persisted delta row in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn signed_results(&self) -> Result<Vec<SignedResult>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT record_id, actor_id, type_code, issuer_email, counterpart_email, \
                 broker_email, provider_id, provider_email, signer_serial, digest, signature, \
                 signed_document, signed_at FROM signed_results ORDER BY delta_id",
            )
            .map_err(db_err)?;
        let rows = statement
            .query_map(params![], |row| {
                Ok(SignedResult {
                    record_id: RecordId::new(row.get::<_, String>(0)?),
                    actor_id: ActorId::new(row.get::<_, String>(1)?),
                    type_code: row.get(2)?,
                    issuer_email: row.get(3)?,
                    counterpart_email: row.get(4)?,
                    broker_email: row.get(5)?,
                    provider_id: row.get(6)?,
                    provider_email: row.get(7)?,
                    artifact: SignedArtifact {
                        signer_serial: CertificateSerial::new(row.get::<_, String>(8)?),
                        digest: row.get(9)?,
                        signature: row.get(10)?,
                        signed_document: row.get(11)?,
                    },
                    signed_at_ms: row.get(12)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    /// Counts claimed rows in scope.
    fn count_claimed_in(connection: &Connection, scope: &ClaimScope) -> Result<usize, SqliteStoreError> {
        let filter = scope_filter(scope);
        let mut params = vec![Value::Text(ClaimState::Claimed.code().to_string())];
        params.extend(filter.params);
        let count: i64 = connection
            .query_row(
                &format!("SELECT COUNT(*) FROM invoices a WHERE a.claim_state = ?{}", filter.sql),
                params_from_iter(params),
                |row| row.get(0),
            )
            .map_err(db_err)?;
        count_value(count)
    }

    /// Marks eligible rows in scope, lowest ids first.
    fn mark_claimed_in(connection: &Connection, scope: &ClaimScope) -> Result<usize, SqliteStoreError> {
        let filter = scope_filter(scope);
        let mut params = vec![
            Value::Text(ClaimState::Claimed.code().to_string()),
            Value::Text(ClaimState::Unclaimed.code().to_string()),
            Value::Text(SuccessState::Done.code().to_string()),
        ];
        params.extend(filter.params);
        params.push(Value::Integer(limit_value(scope.quantity)?));
        connection
            .execute(
                &format!(
                    "UPDATE invoices SET claim_state = ? WHERE record_id IN (SELECT a.record_id \
                     FROM invoices a WHERE a.claim_state = ? AND a.success_state != ?{} ORDER BY \
                     a.record_id LIMIT ?)",
                    filter.sql
                ),
                params_from_iter(params),
            )
            .map_err(db_err)
    }

    /// Loads a claimed page.
    fn load_page(&self, scope: &ClaimScope, limit: usize) -> Result<Vec<SignableRecord>, SqliteStoreError> {
        let filter = scope_filter(scope);
        let mut params = vec![Value::Text(ClaimState::Claimed.code().to_string())];
        params.extend(filter.params);
        params.push(Value::Integer(limit_value(Some(limit))?));
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(&format!(
                "SELECT {PAGE_COLUMNS} FROM invoices a LEFT JOIN customers b ON a.counterpart_id \
                 = b.customer_id LEFT JOIN (SELECT * FROM providers WHERE NULLIF(provider_id, '') \
                 IS NOT NULL) c ON b.provider_id = c.provider_id WHERE a.claim_state = ?{} ORDER \
                 BY a.record_id LIMIT ?",
                filter.sql
            ))
            .map_err(db_err)?;
        let rows = statement.query_map(params_from_iter(params), page_row).map_err(db_err)?;
        let mut page = Vec::new();
        for row in rows {
            let (record, document) = row.map_err(db_err)?;
            let document = serde_json::from_str(&document).map_err(|err| {
                SqliteStoreError::Invalid(format!("document_json for {}: {err}", record.record_id))
            })?;
            page.push(SignableRecord {
                document,
                ..record
            });
        }
        Ok(page)
    }

    /// Inserts delta rows and flips their records to `(Unclaimed, Done)`.
    fn insert_results(&self, results: &[SignedResult]) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        for result in results {
            tx.execute(
                "INSERT INTO signed_results (record_id, actor_id, type_code, issuer_email, \
                 counterpart_email, broker_email, provider_id, provider_email, signer_serial, \
                 digest, signature, signed_document, signed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, \
                 ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    result.record_id.as_str(),
                    result.actor_id.as_str(),
                    result.type_code,
                    result.issuer_email,
                    result.counterpart_email,
                    result.broker_email,
                    result.provider_id,
                    result.provider_email,
                    result.artifact.signer_serial.as_str(),
                    result.artifact.digest,
                    result.artifact.signature,
                    result.artifact.signed_document,
                    result.signed_at_ms,
                ],
            )
            .map_err(db_err)?;
            let updated = tx
                .execute(
                    "UPDATE invoices SET claim_state = ?1, success_state = ?2 WHERE record_id = ?3",
                    params![
                        ClaimState::Unclaimed.code(),
                        SuccessState::Done.code(),
                        result.record_id.as_str()
                    ],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(SqliteStoreError::NotFound(format!("invoice {}", result.record_id)));
            }
        }
        tx.commit().map_err(db_err)?;
        drop(guard);
        Ok(())
    }

    /// Resets claimed rows for one actor or every actor.
    fn reset_claims(&self, actor: Option<&ActorId>) -> Result<usize, SqliteStoreError> {
        let mut params = vec![
            Value::Text(ClaimState::Unclaimed.code().to_string()),
            Value::Text(SuccessState::NotDone.code().to_string()),
            Value::Text(ClaimState::Claimed.code().to_string()),
        ];
        let owner_filter = actor.map_or_else(String::new, |actor| {
            params.push(Value::Text(actor.as_str().to_string()));
            params.push(Value::Text(actor.as_str().to_string()));
            format!(" AND {}", ownership_predicate())
        });
        let sql = format!(
            "UPDATE invoices SET claim_state = ?, success_state = ? WHERE record_id IN (SELECT \
             a.record_id FROM invoices a WHERE a.claim_state = ?{owner_filter})"
        );
        self.lock()?.execute(&sql, params_from_iter(params)).map_err(db_err)
    }

    /// Looks up a customer profile.
    fn load_customer(&self, actor: &ActorId) -> Result<Option<CustomerProfile>, SqliteStoreError> {
        self.lock()?
            .query_row(
                "SELECT customer_id, provider_id, signing_type, sign_from_day, sign_till_day FROM \
                 customers WHERE customer_id = ?1",
                params![actor.as_str()],
                |row| {
                    Ok(CustomerProfile {
                        customer_id: ActorId::new(row.get::<_, String>(0)?),
                        provider_id: row.get(1)?,
                        signing_type: row.get(2)?,
                        sign_from_day: row.get(3)?,
                        sign_till_day: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }
}

impl SigningStore for SqliteSigningStore {
    fn count_claimed(&self, scope: &ClaimScope) -> Result<usize, StoreError> {
        let guard = self.lock()?;
        Ok(Self::count_claimed_in(&guard, scope)?)
    }

    fn mark_claimed(&self, scope: &ClaimScope) -> Result<usize, StoreError> {
        let guard = self.lock()?;
        Ok(Self::mark_claimed_in(&guard, scope)?)
    }

    fn claim_exclusive(&self, scope: &ClaimScope) -> Result<ClaimOutcome, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
        let working_rows = Self::count_claimed_in(&tx, scope)?;
        let outcome = if working_rows > 0 {
            ClaimOutcome::Reentrant {
                working_rows,
            }
        } else {
            ClaimOutcome::Claimed(Self::mark_claimed_in(&tx, scope)?)
        };
        tx.commit().map_err(db_err)?;
        drop(guard);
        Ok(outcome)
    }

    fn load_claimed_page(
        &self,
        scope: &ClaimScope,
        limit: usize,
    ) -> Result<Vec<SignableRecord>, StoreError> {
        Ok(self.load_page(scope, limit)?)
    }

    fn insert_delta(&self, results: &[SignedResult]) -> Result<(), StoreError> {
        Ok(self.insert_results(results)?)
    }

    fn clear_claims(&self, actor: Option<&ActorId>) -> Result<usize, StoreError> {
        Ok(self.reset_claims(actor)?)
    }

    fn customer_profile(&self, actor: &ActorId) -> Result<Option<CustomerProfile>, StoreError> {
        Ok(self.load_customer(actor)?)
    }
}

// ============================================================================//
// SECTION: Row Mapping
// ============================================================================//

/// Maps a page row; the document column is returned raw for parsing.
fn page_row(row: &Row<'_>) -> rusqlite::Result<(SignableRecord, String)> {
    let record = SignableRecord {
        record_id: RecordId::new(row.get::<_, String>(0)?),
        type_code: row.get(1)?,
        issuer_id: ActorId::new(row.get::<_, String>(2)?),
        issuer_email: row.get(3)?,
        counterpart_id: row.get(4)?,
        counterpart_email: row.get(5)?,
        broker_id: row.get::<_, Option<String>>(6)?.map(ActorId::new),
        broker_email: row.get(7)?,
        provider_id: row.get(8)?,
        provider_email: row.get(9)?,
        issue_date: row.get(10)?,
        document: serde_json::Value::Null,
    };
    Ok((record, row.get(11)?))
}

/// Parses stored marker codes.
fn parse_state(claim: &str, success: &str) -> Result<RecordState, SqliteStoreError> {
    let claim = ClaimState::from_code(claim)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unknown claim_state {claim}")))?;
    let success = SuccessState::from_code(success)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unknown success_state {success}")))?;
    Ok(RecordState {
        claim,
        success,
    })
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH) {
        return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_err)?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS invoices (
                    record_id TEXT PRIMARY KEY,
                    type_code TEXT NOT NULL,
                    issuer_id TEXT NOT NULL,
                    issuer_email TEXT,
                    counterpart_id TEXT,
                    counterpart_email TEXT,
                    broker_id TEXT,
                    broker_email TEXT,
                    issue_date INTEGER NOT NULL,
                    document_json TEXT NOT NULL,
                    claim_state TEXT NOT NULL DEFAULT 'F' CHECK (claim_state IN ('F', 'X')),
                    success_state TEXT NOT NULL DEFAULT 'F' CHECK (success_state IN ('F', 'T'))
                );
                CREATE INDEX IF NOT EXISTS idx_invoices_issuer_claim
                    ON invoices (issuer_id, claim_state);
                CREATE INDEX IF NOT EXISTS idx_invoices_broker_claim
                    ON invoices (broker_id, claim_state);
                CREATE TABLE IF NOT EXISTS customers (
                    customer_id TEXT PRIMARY KEY,
                    provider_id TEXT,
                    signing_type TEXT NOT NULL,
                    sign_from_day INTEGER NOT NULL,
                    sign_till_day INTEGER
                );
                CREATE TABLE IF NOT EXISTS providers (
                    provider_id TEXT PRIMARY KEY,
                    contact_email TEXT
                );
                CREATE TABLE IF NOT EXISTS signed_results (
                    delta_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    record_id TEXT NOT NULL,
                    actor_id TEXT NOT NULL,
                    type_code TEXT NOT NULL,
                    issuer_email TEXT,
                    counterpart_email TEXT,
                    broker_email TEXT,
                    provider_id TEXT,
                    provider_email TEXT,
                    signer_serial TEXT NOT NULL,
                    digest TEXT NOT NULL,
                    signature TEXT NOT NULL,
                    signed_document BLOB NOT NULL,
                    signed_at INTEGER NOT NULL,
                    FOREIGN KEY (record_id) REFERENCES invoices(record_id)
                );
                CREATE INDEX IF NOT EXISTS idx_signed_results_record_id
                    ON signed_results (record_id);",
            )
            .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}
