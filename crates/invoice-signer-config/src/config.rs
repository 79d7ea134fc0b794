// crates/invoice-signer-config/src/config.rs
// ============================================================================
// Module: Invoice Signer Configuration
// Description: Configuration loading and validation for the invoice signer.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: invoice-signer-core, invoice-signer-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. The file carries four
//! sections: `[store]`, `[engine]`, `[audit]`, and `[certificate]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use invoice_signer_core::ActorId;
use invoice_signer_core::CertificateSerial;
use invoice_signer_core::EngineConfig;
use invoice_signer_core::FileAuditSink;
use invoice_signer_core::NoopAuditSink;
use invoice_signer_core::SignerAuditSink;
use invoice_signer_core::SigningCertificate;
use invoice_signer_core::StderrAuditSink;
use invoice_signer_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "invoice-signer.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "INVOICE_SIGNER_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum signing key file size in bytes.
const MAX_SIGNING_KEY_BYTES: u64 = 4096;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of identifiers in config.
const MAX_IDENTIFIER_LENGTH: usize = 256;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level invoice signer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceSignerConfig {
    /// `SQLite` store configuration.
    pub store: SqliteStoreConfig,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Signing certificate for the configured actor.
    pub certificate: CertificateConfig,
}

impl InvoiceSignerConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order is the explicit `path`, then [`CONFIG_ENV_VAR`], then
    /// `invoice-signer.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("store.path", &self.store.path.to_string_lossy())?;
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store.busy_timeout_ms must be greater than zero".to_string()));
        }
        self.engine.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        self.audit.validate()?;
        self.certificate.validate()
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path (required for the file sink).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates the audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", &path.to_string_lossy()),
            (_, Some(_)) => Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string())),
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn SignerAuditSink>, ConfigError> {
        match self.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::File => {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| ConfigError::Invalid("audit.path is required for the file sink".to_string()))?;
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }
}

// ============================================================================
// SECTION: Certificate
// ============================================================================

/// Signing certificate configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificateConfig {
    /// Actor the certificate belongs to.
    pub subject_id: String,
    /// Certificate serial.
    pub serial: String,
    /// Path to the ed25519 seed (32 raw bytes or base64 text).
    pub key_path: PathBuf,
    /// Start of validity (RFC 3339).
    #[serde(default)]
    pub not_before: Option<String>,
    /// End of validity (RFC 3339).
    #[serde(default)]
    pub not_after: Option<String>,
}

impl CertificateConfig {
    /// Validates certificate fields without touching the key file.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier("certificate.subject_id", &self.subject_id)?;
        validate_identifier("certificate.serial", &self.serial)?;
        validate_path_string("certificate.key_path", &self.key_path.to_string_lossy())?;
        let not_before = parse_instant("certificate.not_before", self.not_before.as_deref())?;
        let not_after = parse_instant("certificate.not_after", self.not_after.as_deref())?;
        if let (Some(start), Some(end)) = (not_before, not_after)
            && start > end
        {
            return Err(ConfigError::Invalid(
                "certificate.not_before must not be after certificate.not_after".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads the signing certificate, reading the key from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the key cannot be read or decoded.
    pub fn load_certificate(&self) -> Result<SigningCertificate, ConfigError> {
        self.validate()?;
        let signing_key = load_signing_key(&self.key_path)?;
        let certificate = SigningCertificate::new(
            ActorId::new(self.subject_id.trim()),
            CertificateSerial::new(self.serial.trim()),
            signing_key,
        );
        Ok(certificate.with_validity(
            parse_instant("certificate.not_before", self.not_before.as_deref())?,
            parse_instant("certificate.not_after", self.not_after.as_deref())?,
        ))
    }
}

/// Loads an ed25519 signing key from disk.
fn load_signing_key(path: &Path) -> Result<SigningKey, ConfigError> {
    let size = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?.len();
    if size > MAX_SIGNING_KEY_BYTES {
        return Err(ConfigError::Invalid("signing key file exceeds size limit".to_string()));
    }
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let key_bytes = if bytes.len() == 32 {
        bytes
    } else {
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("signing key must be utf-8 base64".to_string()))?;
        BASE64
            .decode(text.trim().as_bytes())
            .map_err(|_| ConfigError::Invalid("invalid base64 signing key".to_string()))?
    };
    let key: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ConfigError::Invalid("signing key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&key))
}

/// Parses an optional RFC 3339 instant.
fn parse_instant(field: &str, value: Option<&str>) -> Result<Option<OffsetDateTime>, ConfigError> {
    value
        .map(|value| {
            OffsetDateTime::parse(value.trim(), &Rfc3339)
                .map_err(|err| ConfigError::Invalid(format!("{field} must be RFC 3339: {err}")))
        })
        .transpose()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a non-empty, bounded identifier.
fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}
