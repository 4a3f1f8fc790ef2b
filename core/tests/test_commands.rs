//! Operator command queue coverage (SPEC_FULL.md §4.8).

use town_arena_core::commands;
use town_arena_core::models::{CommandIntent, CommandMode, CommandStatus, EconomyPool, IssuerType};
use town_arena_core::store::Store;

fn store() -> Store {
    Store::new(EconomyPool::new(1000, 1000, 30))
}

fn queue(store: &Store, priority: u8, created_tick: u64) -> town_arena_core::models::AgentCommand {
    let cmd = commands::build_command(
        store,
        "agent-1".to_string(),
        IssuerType::Telegram,
        Some("operator-1".to_string()),
        CommandMode::Suggest,
        CommandIntent::Rest,
        serde_json::json!({}),
        serde_json::json!({}),
        Some(priority),
        created_tick,
        None,
    );
    store.commands.insert(cmd.id.clone(), cmd.clone());
    cmd
}

#[test]
fn command_progression_queued_to_accepted_to_executed() {
    let store = store();
    let cmd = queue(&store, 50, 0);
    assert_eq!(cmd.status, CommandStatus::Queued);

    let accepted = commands::accept_next_command(&store, "agent-1", 5).unwrap();
    assert_eq!(accepted.status, CommandStatus::Accepted);

    let executed = commands::mark_executed(&store, &accepted.id, serde_json::json!({"ok": true})).unwrap();
    assert_eq!(executed.status, CommandStatus::Executed);
}

#[test]
fn override_mode_gets_the_highest_base_priority() {
    let store = store();
    let cmd = commands::build_command(
        &store,
        "agent-1".to_string(),
        IssuerType::Telegram,
        Some("operator-1".to_string()),
        CommandMode::Override,
        CommandIntent::PlayArena,
        serde_json::json!({}),
        serde_json::json!({}),
        None,
        0,
        None,
    );
    assert_eq!(cmd.priority, 95);
}

#[test]
fn a_lower_priority_command_never_preempts_a_queued_higher_priority_one() {
    let store = store();
    let low = queue(&store, 40, 0);
    let high = queue(&store, 90, 1);
    let accepted = commands::accept_next_command(&store, "agent-1", 10).unwrap();
    assert_eq!(accepted.id, high.id);
    assert_ne!(accepted.id, low.id);
}

#[test]
fn expired_commands_are_swept_before_acceptance() {
    let store = store();
    let cmd = commands::build_command(
        &store,
        "agent-1".to_string(),
        IssuerType::System,
        None,
        CommandMode::Suggest,
        CommandIntent::Rest,
        serde_json::json!({}),
        serde_json::json!({}),
        None,
        0,
        Some(3),
    );
    store.commands.insert(cmd.id.clone(), cmd.clone());
    assert!(commands::accept_next_command(&store, "agent-1", 10).is_none());
    assert_eq!(store.commands.get(&cmd.id).unwrap().status, CommandStatus::Expired);
}

#[test]
fn cancel_is_rejected_once_a_command_reaches_a_terminal_state() {
    let store = store();
    let cmd = queue(&store, 50, 0);
    commands::mark_rejected(&store, &cmd.id, serde_json::json!({})).unwrap();
    let err = commands::cancel_command(&store, &cmd.id, "too late").unwrap_err();
    assert_eq!(err.code(), "PRECONDITION");
}
