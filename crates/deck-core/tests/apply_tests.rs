use deck_core::{
    ApplyOutcome, CommandOutput, DeckConfig, DeckError, DeckEvent, NotFoundKind, OperationState,
};
use deck_test_utils::{setup_session, setup_session_with, ScriptedBridge};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn waybar_bridge() -> Arc<ScriptedBridge> {
    Arc::new(ScriptedBridge::new().with_config("waybar", "A"))
}

#[tokio::test]
async fn test_backup_failure_aborts_before_write() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    assert!(session.edit_target("waybar", "B").unwrap());
    bridge.fail_on("create_snapshot", "disk full");

    let err = session.apply_target("waybar").await.unwrap_err();
    match &err {
        DeckError::BackupFailed { target, reason, .. } => {
            assert_eq!(target, "waybar");
            assert_eq!(reason.as_str(), "disk full");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.system_untouched());

    assert_eq!(bridge.call_count("apply_rice_config"), 0);
    assert_eq!(bridge.config("waybar").as_deref(), Some("A"));

    let target = session.target("waybar").unwrap();
    assert_eq!(target.pending_content, "B");
    assert_eq!(target.original_content, "A");
    assert!(session.is_target_dirty("waybar"));
}

#[tokio::test]
async fn test_successful_apply_snapshots_first() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let report = session.apply_target("waybar").await.unwrap();

    let snapshot_at = bridge.position("create_snapshot").unwrap();
    let apply_at = bridge.position("apply_rice_config").unwrap();
    assert!(snapshot_at < apply_at);

    assert!(report.snapshot.name.starts_with("waybar-"));
    assert_eq!(bridge.snapshot_names(), vec![report.snapshot.name.clone()]);
    assert!(report.reload_available);
    assert_eq!(report.operation, None);

    assert_eq!(bridge.config("waybar").as_deref(), Some("B"));
    assert!(!session.is_target_dirty("waybar"));
    let target = session.target("waybar").unwrap();
    assert_eq!(target.original_content, "B");
}

#[tokio::test]
async fn test_apply_failure_keeps_edits() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    bridge.fail_on("apply_rice_config", "permission denied");

    let err = session.apply_target("waybar").await.unwrap_err();
    assert_eq!(err.upstream_reason(), Some("permission denied"));
    assert!(matches!(err, DeckError::ApplyFailed { .. }));
    assert!(err.is_retryable());

    assert_eq!(bridge.snapshot_names().len(), 1);
    assert!(session.is_target_dirty("waybar"));

    bridge.clear_faults();
    session.apply_target("waybar").await.unwrap();
    assert!(!session.is_target_dirty("waybar"));
    assert_eq!(bridge.snapshot_names().len(), 2);
}

#[tokio::test]
async fn test_clean_target_has_nothing_to_apply() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);
    session.load_target("waybar").await.unwrap();

    let err = session.apply_target("waybar").await.unwrap_err();
    assert!(matches!(err, DeckError::NothingToApply(ref t) if t == "waybar"));
    assert_eq!(bridge.call_count("create_snapshot"), 0);

    // editing back to the baseline is clean again
    session.edit_target("waybar", "B").unwrap();
    assert!(!session.edit_target("waybar", "A").unwrap());
    assert!(session.apply_target("waybar").await.is_err());
}

#[tokio::test]
async fn test_unloaded_target_not_found() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    let err = session.apply_target("polybar").await.unwrap_err();
    assert!(matches!(err, DeckError::NotFound(NotFoundKind::Target, _)));
    assert!(session.edit_target("polybar", "x").is_err());
}

#[tokio::test]
async fn test_concurrent_apply_rejected() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let gate = bridge.gate_apply();

    let first = session.apply_target("waybar");
    tokio::pin!(first);
    assert!(futures::poll!(&mut first).is_pending());

    let err = session.apply_target("waybar").await.unwrap_err();
    assert!(matches!(err, DeckError::ApplyInProgress(ref t) if t == "waybar"));
    assert!(err.system_untouched());

    gate.notify_one();
    let report = first.await.unwrap();
    assert_eq!(report.target, "waybar");
    assert_eq!(bridge.call_count("apply_rice_config"), 1);
    assert_eq!(bridge.call_count("create_snapshot"), 1);

    // the guard is released once the first sequence ends
    session.edit_target("waybar", "C").unwrap();
    session.apply_target("waybar").await.unwrap();
}

#[tokio::test]
async fn test_switch_away_during_apply_rejected() {
    let bridge = Arc::new(
        ScriptedBridge::new()
            .with_config("waybar", "A")
            .with_config("polybar", "P"),
    );
    let session = setup_session(&bridge);

    session.select_target("waybar", false).unwrap();
    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let ops = session.ingest("[OPERATION:config:waybar]");
    let gate = bridge.gate_apply();

    let first = session.apply_operation(ops[0].id);
    tokio::pin!(first);
    assert!(futures::poll!(&mut first).is_pending());
    assert_eq!(
        session.preview_operation(ops[0].id).unwrap().state,
        OperationState::Applying
    );

    let err = session.select_target("polybar", true).unwrap_err();
    assert!(matches!(err, DeckError::ApplyInProgress(ref t) if t == "waybar"));
    assert_eq!(session.active_target().as_deref(), Some("waybar"));

    gate.notify_one();
    let done = first.await.unwrap();
    assert_eq!(done.state, OperationState::Completed);
    assert_eq!(bridge.config("waybar").as_deref(), Some("B"));
    assert!(!session.is_target_dirty("waybar"));

    session.select_target("polybar", false).unwrap();
    assert_eq!(session.active_target().as_deref(), Some("polybar"));
}

#[tokio::test]
async fn test_load_during_apply_rejected() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let gate = bridge.gate_apply();

    let first = session.apply_target("waybar");
    tokio::pin!(first);
    assert!(futures::poll!(&mut first).is_pending());

    let err = session.load_target("waybar").await.unwrap_err();
    assert!(matches!(err, DeckError::ApplyInProgress(ref t) if t == "waybar"));
    assert_eq!(bridge.call_count("get_rice_config"), 1);

    gate.notify_one();
    first.await.unwrap();
    let target = session.target("waybar").unwrap();
    assert_eq!(target.original_content, "B");
    assert_eq!(target.pending_content, "B");
}

#[tokio::test]
async fn test_edit_during_apply_is_overwritten_by_commit() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let gate = bridge.gate_apply();

    let first = session.apply_target("waybar");
    tokio::pin!(first);
    assert!(futures::poll!(&mut first).is_pending());

    assert!(session.edit_target("waybar", "C").unwrap());

    gate.notify_one();
    first.await.unwrap();
    let target = session.target("waybar").unwrap();
    assert_eq!(target.original_content, "B");
    assert_eq!(target.pending_content, "B");
    assert!(!session.is_target_dirty("waybar"));
    assert_eq!(bridge.config("waybar").as_deref(), Some("B"));
}

#[tokio::test]
async fn test_reload_failure_does_not_revert() {
    let bridge = Arc::new(
        ScriptedBridge::new()
            .with_config("eww", "old")
            .with_command_output("eww reload", CommandOutput::failed("daemon not running")),
    );
    let session = setup_session(&bridge);

    session.load_target("eww").await.unwrap();
    session.edit_target("eww", "new").unwrap();
    session.apply_target("eww").await.unwrap();

    let report = session.reload_target("eww").await.unwrap();
    assert!(!report.success);
    assert_eq!(report.command, "eww reload");
    assert_eq!(report.detail, "daemon not running");

    assert_eq!(bridge.config("eww").as_deref(), Some("new"));
    assert!(!session.is_target_dirty("eww"));
    assert_eq!(session.target("eww").unwrap().original_content, "new");
}

#[tokio::test]
async fn test_reload_without_command() {
    let bridge = Arc::new(ScriptedBridge::new().with_config("sway", "x"));
    let session = setup_session(&bridge);

    let err = session.reload_target("sway").await.unwrap_err();
    assert!(matches!(err, DeckError::NotFound(NotFoundKind::ReloadCommand, _)));
    assert_eq!(bridge.call_count("run_command"), 0);
}

#[tokio::test]
async fn test_load_discards_edits() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    assert_eq!(session.load_target("waybar").await.unwrap(), "A");
    session.edit_target("waybar", "B").unwrap();
    assert_eq!(session.load_target("waybar").await.unwrap(), "A");

    let target = session.target("waybar").unwrap();
    assert_eq!(target.pending_content, "A");
    assert!(!session.is_target_dirty("waybar"));
}

#[tokio::test]
async fn test_load_failure_leaves_buffers() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    bridge.fail_on("get_rice_config", "bridge down");

    let err = session.load_target("waybar").await.unwrap_err();
    assert!(matches!(err, DeckError::BridgeUnavailable(_)));
    assert_eq!(session.target("waybar").unwrap().pending_content, "B");
}

#[tokio::test]
async fn test_revert_restores_baseline() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    session.revert_target("waybar").unwrap();

    assert!(!session.is_target_dirty("waybar"));
    assert_eq!(session.target("waybar").unwrap().pending_content, "A");
}

#[tokio::test]
async fn test_preview_is_read_only() {
    let bridge = Arc::new(ScriptedBridge::new().with_config("kitty", "font_size 11\ntheme dark\n"));
    let session = setup_session(&bridge);

    session.load_target("kitty").await.unwrap();
    session
        .edit_target("kitty", "font_size 13\ntheme dark\nopacity 0.9\n")
        .unwrap();

    let preview = session.preview_target("kitty").await.unwrap();
    assert!(preview.dirty);
    assert_eq!(preview.lines_added, 2);
    assert_eq!(preview.lines_removed, 1);
    assert!(preview.unified_diff.contains("-font_size 11"));
    assert!(preview.unified_diff.contains("+font_size 13"));
    assert!(preview.unified_diff.contains("+opacity 0.9"));
    assert!(preview.bridge_preview.is_some());

    assert_eq!(bridge.call_count("create_snapshot"), 0);
    assert_eq!(bridge.call_count("apply_rice_config"), 0);
    assert!(session.is_target_dirty("kitty"));
}

#[tokio::test]
async fn test_preview_survives_bridge_failure() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    bridge.fail_on("preview_rice_config", "renderer offline");

    let preview = session.preview_target("waybar").await.unwrap();
    assert!(preview.dirty);
    assert_eq!(preview.bridge_preview, None);
    assert!(preview.unified_diff.contains("+B"));
    assert_eq!(preview.lines_added, 1);
    assert_eq!(preview.lines_removed, 1);
}

#[tokio::test]
async fn test_preview_clean_target() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);
    session.load_target("waybar").await.unwrap();

    let preview = session.preview_target("waybar").await.unwrap();
    assert!(!preview.dirty);
    assert_eq!((preview.lines_added, preview.lines_removed), (0, 0));
    assert!(preview.unified_diff.is_empty());
}

#[tokio::test]
async fn test_config_operation_completes() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let ops = session.ingest("Bump the bar height. [OPERATION:config:waybar]");
    assert_eq!(ops.len(), 1);

    let done = session.apply_operation(ops[0].id).await.unwrap();
    assert_eq!(done.state, OperationState::Completed);
    assert_eq!(bridge.config("waybar").as_deref(), Some("B"));
}

#[tokio::test]
async fn test_refused_config_operation_stays_pending() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    let ops = session.ingest("[OPERATION:rice:waybar]");

    let err = session.apply_operation(ops[0].id).await.unwrap_err();
    assert!(matches!(err, DeckError::NothingToApply(_)));
    assert_eq!(
        session.preview_operation(ops[0].id).unwrap().state,
        OperationState::Pending
    );

    session.edit_target("waybar", "B").unwrap();
    let done = session.apply_operation(ops[0].id).await.unwrap();
    assert_eq!(done.state, OperationState::Completed);
}

#[tokio::test]
async fn test_config_operation_backup_failure() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    bridge.fail_on("create_snapshot", "disk full");
    let ops = session.ingest("[OPERATION:config:waybar]");

    let err = session.apply_operation(ops[0].id).await.unwrap_err();
    assert!(matches!(err, DeckError::BackupFailed { .. }));

    let preview = session.preview_operation(ops[0].id).unwrap();
    assert_eq!(preview.state, OperationState::Failed);
    assert_eq!(preview.failure.as_deref(), Some("disk full"));
    assert!(session.is_target_dirty("waybar"));
}

#[tokio::test]
async fn test_restore_refreshes_baseline() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let report = session.apply_target("waybar").await.unwrap();

    session
        .restore_snapshot(&report.snapshot.name, Some("waybar"))
        .await
        .unwrap();

    assert_eq!(bridge.config("waybar").as_deref(), Some("A"));
    assert_eq!(session.target("waybar").unwrap().original_content, "A");
    assert_eq!(
        session.list_snapshots().await.unwrap(),
        vec![report.snapshot.name]
    );
}

#[tokio::test]
async fn test_restore_unknown_snapshot() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);

    let err = session.restore_snapshot("nope", None).await.unwrap_err();
    assert_eq!(err.upstream_reason(), Some("snapshot nope not found"));
}

#[tokio::test]
async fn test_snapshot_prefix_applied() {
    let bridge = waybar_bridge();
    let session = setup_session_with(&bridge, DeckConfig::new().with_snapshot_prefix("nixdeck-"));

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let report = session.apply_target("waybar").await.unwrap();

    assert!(report.snapshot.name.starts_with("nixdeck-waybar-"));
}

#[tokio::test]
async fn test_apply_events_in_order() {
    let bridge = waybar_bridge();
    let session = setup_session(&bridge);
    let mut rx = session.subscribe();

    session.load_target("waybar").await.unwrap();
    session.edit_target("waybar", "B").unwrap();
    let report = session.apply_target("waybar").await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            DeckEvent::TargetDirtyChanged {
                target: "waybar".to_string(),
                dirty: true,
            },
            DeckEvent::SnapshotCreated {
                target: "waybar".to_string(),
                snapshot: report.snapshot.name.clone(),
            },
            DeckEvent::TargetDirtyChanged {
                target: "waybar".to_string(),
                dirty: false,
            },
            DeckEvent::ApplyFinished {
                target: "waybar".to_string(),
                snapshot: Some(report.snapshot.name.clone()),
                outcome: ApplyOutcome::Applied,
                reload_available: true,
            },
        ]
    );
}
