//! App credential registry
//!
//! CRUD over the `appManager.array.apps` collection of the Soketi config
//! file. Every mutation writes the whole document back and restarts Soketi
//! so the server picks up the change.
//!
//! Stored records stay raw JSON. Only the record being created is built
//! from a typed [`App`]; updates merge into the stored object, and every
//! other record is written back exactly as it was read.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::error::{ManagerError, Result};
use crate::supervisor::{RestartOutcome, ServerRestarter};

/// JSON pointer of the apps collection inside the config document
pub const APPS_POINTER: &str = "/appManager/array/apps";

const APPS_PATH: [&str; 3] = ["appManager", "array", "apps"];

pub const DEFAULT_MAX_CONNECTIONS: i64 = 100;

/// A new tenant credential record as written to the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub key: String,
    pub secret: String,
    pub enabled: bool,
    pub enable_client_messages: bool,
    pub max_connections: i64,
}

/// Create request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApp {
    pub id: Option<String>,
    pub key: Option<String>,
    pub secret: Option<String>,
    pub enabled: Option<bool>,
    pub enable_client_messages: Option<bool>,
    pub max_connections: Option<i64>,
}

/// Update request; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPatch {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub enabled: Option<bool>,
    pub enable_client_messages: Option<bool>,
    pub max_connections: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a create or update
#[derive(Debug, Clone, Serialize)]
pub struct AppChange {
    /// Stored record, secret removed
    pub app: Value,
    pub restart: RestartOutcome,
}

pub struct AppRegistry {
    store: Arc<ConfigStore>,
    restarter: Arc<dyn ServerRestarter>,
    mutation_lock: Mutex<()>,
}

impl AppRegistry {
    pub fn new(store: Arc<ConfigStore>, restarter: Arc<dyn ServerRestarter>) -> Self {
        Self {
            store,
            restarter,
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// All apps, secrets removed
    pub async fn list(&self) -> Result<Vec<Value>> {
        let document = self.store.read().await?;
        Ok(read_apps(&document)?.iter().map(redacted).collect())
    }

    /// One app by id, secret removed
    pub async fn get(&self, id: &str) -> Result<Value> {
        let document = self.store.read().await?;
        read_apps(&document)?
            .iter()
            .find(|record| field_matches(record, "id", id))
            .map(redacted)
            .ok_or_else(|| ManagerError::not_found("App not found"))
    }

    pub async fn create(&self, request: NewApp) -> Result<AppChange> {
        let app = build_app(request)?;

        let _guard = self.mutation_lock.lock().await;
        let mut document = self.store.read().await?;
        let mut apps = read_apps(&document)?;

        if apps.iter().any(|record| field_matches(record, "id", &app.id)) {
            return Err(ManagerError::conflict("App ID already exists"));
        }
        if apps.iter().any(|record| field_matches(record, "key", &app.key)) {
            return Err(ManagerError::conflict("App key already exists"));
        }

        let record = serde_json::to_value(&app).map_err(|e| ManagerError::Internal(e.into()))?;
        apps.push(record.clone());
        self.persist(&mut document, apps).await?;
        info!("➕ Created app '{}'", app.id);

        let restart = self.restarter.restart().await;
        Ok(AppChange {
            app: redacted(&record),
            restart,
        })
    }

    pub async fn update(&self, id: &str, patch: AppPatch) -> Result<AppChange> {
        let _guard = self.mutation_lock.lock().await;
        let mut document = self.store.read().await?;
        let mut apps = read_apps(&document)?;

        let index = apps
            .iter()
            .position(|record| field_matches(record, "id", id))
            .ok_or_else(|| ManagerError::not_found("App not found"))?;

        if let Some(ref key) = patch.key {
            if key.is_empty() {
                return Err(ManagerError::validation("key must not be empty"));
            }
            let taken = apps
                .iter()
                .enumerate()
                .any(|(i, other)| i != index && field_matches(other, "key", key));
            if taken {
                return Err(ManagerError::conflict("App key already exists"));
            }
        }
        if let Some(max) = patch.max_connections {
            if max < 1 {
                return Err(ManagerError::validation("maxConnections must be at least 1"));
            }
        }

        let record = apps[index]
            .as_object_mut()
            .ok_or_else(|| malformed_record(id))?;
        apply_patch(record, patch);
        let updated = apps[index].clone();

        self.persist(&mut document, apps).await?;
        info!("✏️ Updated app '{}'", id);

        let restart = self.restarter.restart().await;
        Ok(AppChange {
            app: redacted(&updated),
            restart,
        })
    }

    pub async fn delete(&self, id: &str) -> Result<RestartOutcome> {
        let _guard = self.mutation_lock.lock().await;
        let mut document = self.store.read().await?;
        let mut apps = read_apps(&document)?;

        let index = apps
            .iter()
            .position(|record| field_matches(record, "id", id))
            .ok_or_else(|| ManagerError::not_found("App not found"))?;

        apps.remove(index);
        self.persist(&mut document, apps).await?;
        info!("🗑️ Deleted app '{}'", id);

        Ok(self.restarter.restart().await)
    }

    async fn persist(&self, document: &mut Value, apps: Vec<Value>) -> Result<()> {
        let count = apps.len();
        *apps_slot(document)? = Value::Array(apps);
        self.store.write(document).await?;
        debug!("Persisted {} apps to {:?}", count, self.store.path());
        Ok(())
    }
}

fn build_app(request: NewApp) -> Result<App> {
    let required = |value: Option<String>| value.filter(|v| !v.is_empty());
    let (id, key, secret) = match (
        required(request.id),
        required(request.key),
        required(request.secret),
    ) {
        (Some(id), Some(key), Some(secret)) => (id, key, secret),
        _ => {
            return Err(ManagerError::validation(
                "Missing required fields: id, key, secret",
            ))
        }
    };

    let max_connections = match request.max_connections {
        None | Some(0) => DEFAULT_MAX_CONNECTIONS,
        Some(n) if n < 0 => {
            return Err(ManagerError::validation("maxConnections must be at least 1"))
        }
        Some(n) => n,
    };

    Ok(App {
        id,
        key,
        secret,
        enabled: request.enabled.unwrap_or(true),
        enable_client_messages: request.enable_client_messages.unwrap_or(true),
        max_connections,
    })
}

fn apply_patch(record: &mut Map<String, Value>, patch: AppPatch) {
    if let Some(key) = patch.key {
        record.insert("key".to_string(), Value::from(key));
    }
    if let Some(secret) = patch.secret {
        record.insert("secret".to_string(), Value::from(secret));
    }
    if let Some(enabled) = patch.enabled {
        record.insert("enabled".to_string(), Value::from(enabled));
    }
    if let Some(enabled) = patch.enable_client_messages {
        record.insert("enableClientMessages".to_string(), Value::from(enabled));
    }
    if let Some(max) = patch.max_connections {
        record.insert("maxConnections".to_string(), Value::from(max));
    }
    for (field, value) in patch.extra {
        // The id is fixed by the path.
        if field != "id" {
            record.insert(field, value);
        }
    }
}

/// Soketi compares ids and keys loosely, so `12345` matches `"12345"`
fn field_matches(record: &Value, field: &str, wanted: &str) -> bool {
    match record.get(field) {
        Some(Value::String(value)) => value == wanted,
        Some(Value::Number(value)) => value.to_string() == wanted,
        _ => false,
    }
}

/// Copy without the secret, for API responses
fn redacted(record: &Value) -> Value {
    let mut record = record.clone();
    if let Some(object) = record.as_object_mut() {
        object.remove("secret");
    }
    record
}

/// Raw app records in `document`; a missing collection is empty
fn read_apps(document: &Value) -> Result<Vec<Value>> {
    match document.pointer(APPS_POINTER) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => Ok(records.clone()),
        Some(_) => Err(malformed_collection()),
    }
}

/// The apps array, created along with its parents when missing
fn apps_slot(document: &mut Value) -> Result<&mut Value> {
    let mut current = document;
    for (depth, field) in APPS_PATH.iter().enumerate() {
        let object = current.as_object_mut().ok_or_else(malformed_collection)?;
        let is_leaf = depth == APPS_PATH.len() - 1;
        current = object.entry(field.to_string()).or_insert_with(|| {
            if is_leaf {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            }
        });
    }
    if current.is_null() {
        *current = Value::Array(Vec::new());
    }
    if !current.is_array() {
        return Err(malformed_collection());
    }
    Ok(current)
}

fn malformed_collection() -> ManagerError {
    ManagerError::Internal(anyhow::anyhow!(
        "Config file field appManager.array.apps is not an array"
    ))
}

fn malformed_record(id: &str) -> ManagerError {
    ManagerError::Internal(anyhow::anyhow!("App record '{}' is not an object", id))
}
