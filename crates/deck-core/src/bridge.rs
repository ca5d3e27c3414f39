//! Command bridge contract
//!
//! The privileged backend that actually touches the system. Every call is a
//! suspension point and may fail with an opaque [`BridgeError`]; the core never
//! synthesizes timeouts, so a hung call must be surfaced by the bridge itself.

use crate::error::BridgeError;
use crate::types::{CommandOutput, ServiceDescriptor};
use async_trait::async_trait;

/// Result alias for bridge calls
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Narrow interface to the privileged backend
#[async_trait]
pub trait CommandBridge: Send + Sync {
    // Services

    /// List known service units
    async fn list_services(&self) -> BridgeResult<Vec<ServiceDescriptor>>;
    /// Start a unit
    async fn start_service(&self, name: &str) -> BridgeResult<()>;
    /// Stop a unit
    async fn stop_service(&self, name: &str) -> BridgeResult<()>;
    /// Status text of a unit
    async fn service_status(&self, name: &str) -> BridgeResult<String>;
    /// Install a unit file
    async fn create_service(&self, name: &str, unit_content: &str) -> BridgeResult<()>;

    // Scheduled jobs

    /// List scheduled job lines
    async fn list_scheduled_jobs(&self) -> BridgeResult<Vec<String>>;
    /// Add a job with a five-field schedule
    async fn create_scheduled_job(&self, schedule: &str, command: &str) -> BridgeResult<()>;
    /// Remove a job
    async fn delete_scheduled_job(&self, id: &str) -> BridgeResult<()>;

    // Containers

    /// List container names
    async fn list_containers(&self) -> BridgeResult<Vec<String>>;
    /// Capture current desktop configuration into a container
    async fn create_container(&self, name: &str) -> BridgeResult<()>;
    /// Restore a container onto the live desktop
    async fn load_container(&self, name: &str) -> BridgeResult<()>;
    /// Delete a container
    async fn delete_container(&self, name: &str) -> BridgeResult<()>;

    // Rice configuration

    /// Current live content of a component's config
    async fn get_rice_config(&self, component: &str) -> BridgeResult<String>;
    /// Diff-like preview of writing `content`
    async fn preview_rice_config(&self, component: &str, content: &str) -> BridgeResult<String>;
    /// Durably write `content` to the component's config
    async fn apply_rice_config(&self, component: &str, content: &str) -> BridgeResult<()>;

    // Snapshots

    /// Create a named restore point
    async fn create_snapshot(&self, name: &str) -> BridgeResult<()>;
    /// List snapshot names
    async fn list_snapshots(&self) -> BridgeResult<Vec<String>>;
    /// Restore a snapshot onto the live system
    async fn restore_snapshot(&self, name: &str) -> BridgeResult<()>;

    // Loadouts

    /// List loadout names
    async fn list_loadouts(&self) -> BridgeResult<Vec<String>>;
    /// Load a loadout's structured config
    async fn load_loadout(&self, name: &str) -> BridgeResult<serde_json::Value>;
    /// Save a loadout's structured config
    async fn save_loadout(&self, name: &str, config: &serde_json::Value) -> BridgeResult<()>;

    // Commands and advice

    /// Run a shell command
    async fn run_command(&self, command: &str) -> BridgeResult<CommandOutput>;
    /// Ask the upstream advisory engine, using the named loadout
    async fn send_advisory_message(&self, message: &str, loadout: &str) -> BridgeResult<String>;
}
