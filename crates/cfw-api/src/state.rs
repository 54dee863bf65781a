//! # Application State
//!
//! Configuration, the per-tenant catalogs, and the optional database pool.
//!
//! Each tenant's [`TenantCatalog`] sits behind its own async read/write
//! lock. A tenant is hydrated from Postgres on first use (schema created if
//! missing); without a pool it starts empty. Different tenants never
//! contend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cfw_core::{IdentityError, TenantId};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::catalog::TenantCatalog;
use crate::error::AppError;

pub const DEFAULT_PLUGIN_KEY: &str = "custom-framework-import";
pub const DEFAULT_MAX_IMPORT_BYTES: usize = 4 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("CFW_DEFAULT_TENANT: {0}")]
    DefaultTenant(#[from] IdentityError),

    #[error("CFW_ALLOWED_TENANTS: {0}")]
    AllowedTenant(IdentityError),
}

/// Service configuration, read from the environment.
///
/// Every distinct tenant id that reaches the service gets a catalog kept
/// for the life of the process and, with a pool, its own Postgres schema.
/// Nothing evicts either. Set `allowed_tenants` when the tenant header is
/// not already constrained upstream.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Path segment the API is mounted under: `/plugins/{plugin_key}`.
    pub plugin_key: String,
    /// Tenant used when a request carries no `X-Tenant-Id` header.
    pub default_tenant: Option<TenantId>,
    /// When set, requests for any other tenant are refused with 403.
    pub allowed_tenants: Option<HashSet<TenantId>>,
    /// Request body limit for the import endpoints.
    pub max_import_bytes: usize,
    pub metrics_enabled: bool,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            plugin_key: DEFAULT_PLUGIN_KEY.to_string(),
            default_tenant: None,
            allowed_tenants: None,
            max_import_bytes: DEFAULT_MAX_IMPORT_BYTES,
            metrics_enabled: true,
            log_json: false,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, expected, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let plugin_key = lookup("CFW_PLUGIN_KEY")
            .map(|k| k.trim().trim_matches('/').to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or(defaults.plugin_key);
        let default_tenant = lookup("CFW_DEFAULT_TENANT")
            .filter(|t| !t.trim().is_empty())
            .map(TenantId::new)
            .transpose()?;
        let allowed_tenants = lookup("CFW_ALLOWED_TENANTS")
            .filter(|list| !list.trim().is_empty())
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(TenantId::new)
                    .collect::<Result<HashSet<_>, _>>()
                    .map_err(ConfigError::AllowedTenant)
            })
            .transpose()?;

        Ok(Self {
            port: parse_var(&lookup, "PORT", "a port number")?.unwrap_or(defaults.port),
            plugin_key,
            default_tenant,
            allowed_tenants,
            max_import_bytes: parse_var(&lookup, "CFW_MAX_IMPORT_BYTES", "a byte count")?
                .unwrap_or(defaults.max_import_bytes),
            metrics_enabled: lookup("CFW_METRICS_ENABLED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            log_json: lookup("CFW_LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Whether requests may act on `tenant`.
    pub fn permits(&self, tenant: &TenantId) -> bool {
        self.allowed_tenants.as_ref().map_or(true, |allowed| allowed.contains(tenant))
    }
}

type CatalogCell = Arc<OnceCell<Arc<tokio::sync::RwLock<TenantCatalog>>>>;

/// Lazily hydrated catalogs, one per tenant.
#[derive(Debug, Clone, Default)]
pub struct TenantCatalogs {
    cells: Arc<RwLock<HashMap<TenantId, CatalogCell>>>,
}

impl TenantCatalogs {
    fn cell(&self, tenant: &TenantId) -> CatalogCell {
        if let Some(cell) = self.cells.read().get(tenant) {
            return cell.clone();
        }
        self.cells.write().entry(tenant.clone()).or_default().clone()
    }

    /// The tenant's catalog, hydrating it from `pool` on first use.
    pub async fn get(
        &self,
        tenant: &TenantId,
        pool: Option<&PgPool>,
    ) -> Result<Arc<tokio::sync::RwLock<TenantCatalog>>, sqlx::Error> {
        let cell = self.cell(tenant);
        let catalog = cell
            .get_or_try_init(|| async {
                let catalog = match pool {
                    Some(pool) => {
                        crate::db::ensure_schema(pool, tenant).await?;
                        crate::db::load_catalog(pool, tenant).await?
                    }
                    None => TenantCatalog::default(),
                };
                Ok::<_, sqlx::Error>(Arc::new(tokio::sync::RwLock::new(catalog)))
            })
            .await?;
        Ok(catalog.clone())
    }

    /// Number of tenants touched so far.
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalogs: TenantCatalogs,
    /// When `None`, the service runs in-memory only.
    pub db_pool: Option<PgPool>,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tenants", &self.catalogs.len())
            .field("database", &self.db_pool.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            catalogs: TenantCatalogs::default(),
            db_pool: None,
            metrics: None,
        }
    }

    pub fn with_pool(mut self, pool: Option<PgPool>) -> Self {
        self.db_pool = pool;
        self
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// The tenant's catalog; hydration failures surface as 503.
    pub async fn catalog(&self, tenant: &TenantId) -> Result<Arc<tokio::sync::RwLock<TenantCatalog>>, AppError> {
        self.catalogs
            .get(tenant, self.db_pool.as_ref())
            .await
            .map_err(|e| {
                tracing::error!(%tenant, error = %e, "tenant catalog hydration failed");
                AppError::ServiceUnavailable(format!("tenant {tenant} could not be loaded"))
            })
    }
}
