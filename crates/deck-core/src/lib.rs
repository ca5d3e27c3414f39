//! NixDeck Core - operation lifecycle and safe-apply engine
//!
//! The part of NixDeck that sits between advisory text and the live system:
//! - Extracts `[OPERATION:kind:label]` markers into PENDING operations
//! - Tracks every operation through a fixed lifecycle
//! - Buffers configuration edits per component with dirty tracking
//! - Applies edits only after a snapshot succeeds
//! - Exposes static schedule, job, unit and reload presets
//!
//! # Example
//!
//! ```rust,ignore
//! use deck_core::{DeckConfig, DeckSession};
//!
//! # async fn example(bridge: std::sync::Arc<dyn deck_core::CommandBridge>) -> deck_core::DeckResult<()> {
//! let session = DeckSession::new(bridge, DeckConfig::new())?;
//!
//! session.load_target("waybar").await?;
//! session.edit_target("waybar", "{\"height\": 30}")?;
//! let report = session.apply_target("waybar").await?;
//!
//! println!("backed up as {}", report.snapshot.name);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod executor;
pub mod extractor;
pub mod loadout;
pub mod presets;
pub mod registry;
pub mod session;
pub mod state_machine;
pub mod target_store;
pub mod types;

// Re-exports for convenience
pub use bridge::{BridgeResult, CommandBridge};
pub use config::DeckConfig;
pub use coordinator::{ApplyReport, ReloadReport, SafeApplyCoordinator, TargetPreview};
pub use error::{BridgeError, DeckError, DeckResult, NotFoundKind};
pub use events::{ApplyOutcome, DeckEvent, EventBus};
pub use executor::{BridgeOperationExecutor, OperationExecutor, OperationKind};
pub use extractor::{ActionDescriptor, ActionExtractor, MARKER_OPEN};
pub use loadout::{ActiveLoadout, Loadout};
pub use presets::{JobTemplate, PresetCatalog, UnitTemplate};
pub use registry::OperationRegistry;
pub use session::{Advice, DeckSession};
pub use state_machine::{allowed_transitions, validate_transition, IllegalTransition};
pub use target_store::{ConfigTarget, ConfigTargetStore, TargetSwitch};
pub use types::{
    CommandOutput, Operation, OperationId, OperationPreview, OperationState, ServiceDescriptor,
    Snapshot,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with NixDeck Core
    pub use crate::{
        CommandBridge, DeckConfig, DeckError, DeckEvent, DeckResult, DeckSession, Operation,
        OperationId, OperationState, TargetSwitch,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
