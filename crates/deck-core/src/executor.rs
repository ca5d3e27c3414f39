//! Operation executors
//!
//! Maps an APPLYING operation onto command bridge calls. Config and rice
//! operations are not executed here: they go through the
//! [`SafeApplyCoordinator`](crate::coordinator::SafeApplyCoordinator), which
//! drives the operation's states itself.

use crate::bridge::CommandBridge;
use crate::error::{BridgeError, DeckError, DeckResult};
use crate::presets::PresetCatalog;
use crate::types::Operation;
use async_trait::async_trait;
use std::sync::Arc;

/// Operation category, parsed from the marker kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Service unit control
    Service,
    /// Scheduled job from a template
    Job,
    /// Desktop container capture
    Container,
    /// Rice component configuration
    Config,
    /// Anything else
    Other,
}

impl OperationKind {
    /// Parse a marker kind, ignoring ASCII case
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        const TABLE: [(&str, OperationKind); 5] = [
            ("service", OperationKind::Service),
            ("job", OperationKind::Job),
            ("container", OperationKind::Container),
            ("config", OperationKind::Config),
            ("rice", OperationKind::Config),
        ];
        TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(kind))
            .map_or(Self::Other, |(_, parsed)| *parsed)
    }
}

/// Service action parsed from a `<unit>-<verb>` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceVerb {
    /// Start the unit
    Start,
    /// Stop the unit
    Stop,
    /// Stop then start the unit
    Restart,
}

/// Split a service label into unit name and verb
///
/// A label whose last dash-separated segment is not a known verb names the
/// whole unit and defaults to [`ServiceVerb::Start`].
#[must_use]
pub fn parse_service_label(label: &str) -> (&str, ServiceVerb) {
    let Some((unit, verb)) = label.rsplit_once('-') else {
        return (label, ServiceVerb::Start);
    };
    if unit.is_empty() {
        return (label, ServiceVerb::Start);
    }
    match verb {
        "start" => (unit, ServiceVerb::Start),
        "stop" => (unit, ServiceVerb::Stop),
        "restart" => (unit, ServiceVerb::Restart),
        _ => (label, ServiceVerb::Start),
    }
}

/// Executes one operation's side effects
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute the operation
    ///
    /// # Errors
    /// Any error fails the operation; its text is kept as the failure reason.
    async fn execute(&self, operation: &Operation) -> DeckResult<()>;
}

/// Default executor backed by the command bridge
pub struct BridgeOperationExecutor {
    bridge: Arc<dyn CommandBridge>,
    presets: PresetCatalog,
}

impl std::fmt::Debug for BridgeOperationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeOperationExecutor").finish_non_exhaustive()
    }
}

impl BridgeOperationExecutor {
    /// Create executor over `bridge`
    #[must_use]
    pub fn new(bridge: Arc<dyn CommandBridge>) -> Self {
        Self {
            bridge,
            presets: PresetCatalog::new(),
        }
    }

    async fn run_service(&self, label: &str) -> Result<(), BridgeError> {
        let (unit, verb) = parse_service_label(label);
        match verb {
            ServiceVerb::Start => self.bridge.start_service(unit).await,
            ServiceVerb::Stop => self.bridge.stop_service(unit).await,
            ServiceVerb::Restart => {
                self.bridge.stop_service(unit).await?;
                self.bridge.start_service(unit).await
            }
        }
    }
}

#[async_trait]
impl OperationExecutor for BridgeOperationExecutor {
    async fn execute(&self, operation: &Operation) -> DeckResult<()> {
        let label = operation.label.as_str();
        let result = match OperationKind::parse(&operation.kind) {
            OperationKind::Service => self.run_service(label).await,
            OperationKind::Job => {
                let template = self.presets.job_template(label)?;
                self.bridge
                    .create_scheduled_job(template.schedule, template.command)
                    .await
            }
            OperationKind::Container => self.bridge.create_container(label).await,
            OperationKind::Config | OperationKind::Other => Err(BridgeError::new(format!(
                "no executor for kind {}",
                operation.kind
            ))),
        };

        result.map_err(|reason| {
            tracing::error!(
                operation = %operation.id,
                kind = %operation.kind,
                error = %reason,
                "operation execution failed"
            );
            DeckError::ApplyFailed {
                target: label.to_string(),
                reason,
            }
        })
    }
}
