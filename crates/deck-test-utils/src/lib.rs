//! Testing utilities for the NixDeck workspace
//!
//! [`ScriptedBridge`] is an in-memory command bridge with a call log, fault
//! injection and an apply gate for concurrency tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use deck_core::{
    BridgeError, BridgeResult, CommandBridge, CommandOutput, DeckConfig, DeckSession, Loadout,
    ServiceDescriptor,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct BridgeState {
    calls: Vec<String>,
    faults: HashMap<&'static str, String>,
    configs: HashMap<String, String>,
    snapshots: Vec<(String, HashMap<String, String>)>,
    services: BTreeMap<String, String>,
    jobs: Vec<(String, String, String)>,
    next_job: u64,
    containers: Vec<String>,
    loadouts: BTreeMap<String, serde_json::Value>,
    command_outputs: HashMap<String, CommandOutput>,
    advisory_reply: String,
}

/// In-memory [`CommandBridge`] driven by the test
#[derive(Debug, Default)]
pub struct ScriptedBridge {
    state: Mutex<BridgeState>,
    apply_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed live content for a component
    pub fn with_config(self, component: &str, content: &str) -> Self {
        self.state
            .lock()
            .configs
            .insert(component.to_string(), content.to_string());
        self
    }

    /// Reply returned by every advisory message
    pub fn with_advisory_reply(self, reply: &str) -> Self {
        self.state.lock().advisory_reply = reply.to_string();
        self
    }

    /// Seed a stored loadout
    pub fn with_loadout(self, loadout: &Loadout) -> Self {
        let value = serde_json::to_value(loadout).unwrap();
        self.state.lock().loadouts.insert(loadout.name.clone(), value);
        self
    }

    /// Seed a raw loadout record
    pub fn with_raw_loadout(self, name: &str, value: serde_json::Value) -> Self {
        self.state.lock().loadouts.insert(name.to_string(), value);
        self
    }

    /// Seed a service unit with a status
    pub fn with_service(self, name: &str, status: &str) -> Self {
        self.state
            .lock()
            .services
            .insert(name.to_string(), status.to_string());
        self
    }

    /// Output returned for an exact command line
    pub fn with_command_output(self, command: &str, output: CommandOutput) -> Self {
        self.state
            .lock()
            .command_outputs
            .insert(command.to_string(), output);
        self
    }

    /// Make every call to `method` fail with `reason` until cleared
    pub fn fail_on(&self, method: &'static str, reason: &str) {
        self.state.lock().faults.insert(method, reason.to_string());
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Block the next `apply_rice_config` until the returned handle is notified
    pub fn gate_apply(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.apply_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Every call so far as `"method arg"`, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of calls to `method`, failed ones included
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    /// Index of the first call to `method`
    pub fn position(&self, method: &str) -> Option<usize> {
        self.state
            .lock()
            .calls
            .iter()
            .position(|c| c.split(' ').next() == Some(method))
    }

    /// Live content of a component
    pub fn config(&self, component: &str) -> Option<String> {
        self.state.lock().configs.get(component).cloned()
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        self.state
            .lock()
            .snapshots
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn status(&self, service: &str) -> Option<String> {
        self.state.lock().services.get(service).cloned()
    }

    /// Scheduled jobs as `(id, schedule, command)`
    pub fn jobs(&self) -> Vec<(String, String, String)> {
        self.state.lock().jobs.clone()
    }

    pub fn containers(&self) -> Vec<String> {
        self.state.lock().containers.clone()
    }

    pub fn stored_loadout(&self, name: &str) -> Option<serde_json::Value> {
        self.state.lock().loadouts.get(name).cloned()
    }

    fn enter(&self, method: &'static str, arg: &str) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("{method} {arg}"));
        match state.faults.get(method) {
            Some(reason) => Err(BridgeError::new(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommandBridge for ScriptedBridge {
    async fn list_services(&self) -> BridgeResult<Vec<ServiceDescriptor>> {
        self.enter("list_services", "")?;
        Ok(self
            .state
            .lock()
            .services
            .iter()
            .map(|(name, status)| ServiceDescriptor {
                name: name.clone(),
                status: status.clone(),
            })
            .collect())
    }

    async fn start_service(&self, name: &str) -> BridgeResult<()> {
        self.enter("start_service", name)?;
        self.state
            .lock()
            .services
            .insert(name.to_string(), "active".to_string());
        Ok(())
    }

    async fn stop_service(&self, name: &str) -> BridgeResult<()> {
        self.enter("stop_service", name)?;
        self.state
            .lock()
            .services
            .insert(name.to_string(), "inactive".to_string());
        Ok(())
    }

    async fn service_status(&self, name: &str) -> BridgeResult<String> {
        self.enter("service_status", name)?;
        self.state
            .lock()
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::new(format!("unit {name} not found")))
    }

    async fn create_service(&self, name: &str, _unit_content: &str) -> BridgeResult<()> {
        self.enter("create_service", name)?;
        self.state
            .lock()
            .services
            .insert(name.to_string(), "inactive".to_string());
        Ok(())
    }

    async fn list_scheduled_jobs(&self) -> BridgeResult<Vec<String>> {
        self.enter("list_scheduled_jobs", "")?;
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .map(|(_, schedule, command)| format!("{schedule} {command}"))
            .collect())
    }

    async fn create_scheduled_job(&self, schedule: &str, command: &str) -> BridgeResult<()> {
        self.enter("create_scheduled_job", schedule)?;
        let mut state = self.state.lock();
        state.next_job += 1;
        let id = format!("job-{}", state.next_job);
        state
            .jobs
            .push((id, schedule.to_string(), command.to_string()));
        Ok(())
    }

    async fn delete_scheduled_job(&self, id: &str) -> BridgeResult<()> {
        self.enter("delete_scheduled_job", id)?;
        let mut state = self.state.lock();
        let before = state.jobs.len();
        state.jobs.retain(|(job, _, _)| job != id);
        if state.jobs.len() == before {
            return Err(BridgeError::new(format!("job {id} not found")));
        }
        Ok(())
    }

    async fn list_containers(&self) -> BridgeResult<Vec<String>> {
        self.enter("list_containers", "")?;
        Ok(self.state.lock().containers.clone())
    }

    async fn create_container(&self, name: &str) -> BridgeResult<()> {
        self.enter("create_container", name)?;
        self.state.lock().containers.push(name.to_string());
        Ok(())
    }

    async fn load_container(&self, name: &str) -> BridgeResult<()> {
        self.enter("load_container", name)?;
        if self.state.lock().containers.iter().any(|c| c == name) {
            Ok(())
        } else {
            Err(BridgeError::new(format!("container {name} not found")))
        }
    }

    async fn delete_container(&self, name: &str) -> BridgeResult<()> {
        self.enter("delete_container", name)?;
        self.state.lock().containers.retain(|c| c != name);
        Ok(())
    }

    async fn get_rice_config(&self, component: &str) -> BridgeResult<String> {
        self.enter("get_rice_config", component)?;
        Ok(self
            .state
            .lock()
            .configs
            .get(component)
            .cloned()
            .unwrap_or_default())
    }

    async fn preview_rice_config(&self, component: &str, content: &str) -> BridgeResult<String> {
        self.enter("preview_rice_config", component)?;
        Ok(format!("{component}: {} bytes", content.len()))
    }

    async fn apply_rice_config(&self, component: &str, content: &str) -> BridgeResult<()> {
        self.enter("apply_rice_config", component)?;
        let gate = self.apply_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.state
            .lock()
            .configs
            .insert(component.to_string(), content.to_string());
        Ok(())
    }

    async fn create_snapshot(&self, name: &str) -> BridgeResult<()> {
        self.enter("create_snapshot", name)?;
        let mut state = self.state.lock();
        let configs = state.configs.clone();
        state.snapshots.push((name.to_string(), configs));
        Ok(())
    }

    async fn list_snapshots(&self) -> BridgeResult<Vec<String>> {
        self.enter("list_snapshots", "")?;
        Ok(self.snapshot_names())
    }

    async fn restore_snapshot(&self, name: &str) -> BridgeResult<()> {
        self.enter("restore_snapshot", name)?;
        let mut state = self.state.lock();
        let configs = state
            .snapshots
            .iter()
            .find(|(snapshot, _)| snapshot == name)
            .map(|(_, configs)| configs.clone())
            .ok_or_else(|| BridgeError::new(format!("snapshot {name} not found")))?;
        state.configs = configs;
        Ok(())
    }

    async fn list_loadouts(&self) -> BridgeResult<Vec<String>> {
        self.enter("list_loadouts", "")?;
        Ok(self.state.lock().loadouts.keys().cloned().collect())
    }

    async fn load_loadout(&self, name: &str) -> BridgeResult<serde_json::Value> {
        self.enter("load_loadout", name)?;
        self.state
            .lock()
            .loadouts
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::new(format!("loadout {name} not found")))
    }

    async fn save_loadout(&self, name: &str, config: &serde_json::Value) -> BridgeResult<()> {
        self.enter("save_loadout", name)?;
        self.state
            .lock()
            .loadouts
            .insert(name.to_string(), config.clone());
        Ok(())
    }

    async fn run_command(&self, command: &str) -> BridgeResult<CommandOutput> {
        self.enter("run_command", command)?;
        Ok(self
            .state
            .lock()
            .command_outputs
            .get(command)
            .cloned()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }

    async fn send_advisory_message(&self, _message: &str, loadout: &str) -> BridgeResult<String> {
        self.enter("send_advisory_message", loadout)?;
        Ok(self.state.lock().advisory_reply.clone())
    }
}

/// Configuration whose terminal operations expire immediately
pub fn fast_config() -> DeckConfig {
    DeckConfig::new().with_completed_grace(Duration::ZERO)
}

/// Session over `bridge` with default configuration
pub fn setup_session(bridge: &Arc<ScriptedBridge>) -> DeckSession {
    let bridge: Arc<dyn CommandBridge> = Arc::clone(bridge) as Arc<dyn CommandBridge>;
    DeckSession::new(bridge, DeckConfig::new()).unwrap()
}

/// Session over `bridge` with `config`
pub fn setup_session_with(bridge: &Arc<ScriptedBridge>, config: DeckConfig) -> DeckSession {
    let bridge: Arc<dyn CommandBridge> = Arc::clone(bridge) as Arc<dyn CommandBridge>;
    DeckSession::new(bridge, config).unwrap()
}
