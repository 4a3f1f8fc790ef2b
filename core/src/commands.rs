//! Operator command queue (C8, SPEC_FULL.md §4.8).

use thiserror::Error;

use crate::models::{AgentCommand, CommandId, CommandMode, CommandStatus};
use crate::store::{Store, StoreError};

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("command {0} is not in a cancelable state")]
    NotCancelable(CommandId),
    #[error("command {0} is not QUEUED")]
    NotQueued(CommandId),
    #[error("command {0} is not ACCEPTED")]
    NotAccepted(CommandId),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Store(e) => e.code(),
            CommandError::NotCancelable(_) => "PRECONDITION",
            CommandError::NotQueued(_) => "PRECONDITION",
            CommandError::NotAccepted(_) => "PRECONDITION",
        }
    }
}

/// Build a new QUEUED command with a clamped priority, defaulting to the
/// mode's base priority when `priority` is `None`.
#[allow(clippy::too_many_arguments)]
pub fn build_command(
    store: &Store,
    agent_id: String,
    issuer_type: crate::models::IssuerType,
    issuer_telegram_user_id: Option<String>,
    mode: CommandMode,
    intent: crate::models::CommandIntent,
    params: serde_json::Value,
    constraints: serde_json::Value,
    priority: Option<u8>,
    created_tick: u64,
    expires_at_tick: Option<u64>,
) -> AgentCommand {
    AgentCommand {
        id: store.new_id("cmd"),
        agent_id,
        issuer_type,
        issuer_telegram_user_id,
        mode,
        intent,
        params,
        constraints,
        audit_meta: serde_json::json!({}),
        priority: priority.unwrap_or(mode.base_priority()).min(100),
        created_tick,
        created_seq: store.next_seq(),
        expires_at_tick,
        status: CommandStatus::Queued,
        audit_result: None,
    }
}

/// Mark every QUEUED command for `agent_id` whose `expires_at_tick` has
/// passed as EXPIRED, then CAS-accept the highest-priority remaining
/// QUEUED command (tiebreak: `created_tick` then `created_seq` ascending).
pub fn accept_next_command(store: &Store, agent_id: &str, current_tick: u64) -> Option<AgentCommand> {
    expire_queued_commands(store, agent_id, current_tick);

    let best_id = store
        .commands
        .iter()
        .filter(|c| c.agent_id == agent_id && c.status == CommandStatus::Queued)
        .map(|c| (c.priority, c.created_tick, c.created_seq, c.id.clone()))
        .min_by_key(|(priority, created_tick, created_seq, _)| {
            (std::cmp::Reverse(*priority), *created_tick, *created_seq)
        })
        .map(|(_, _, _, id)| id)?;

    let mut cmd = store.commands.get(&best_id)?.clone();
    cmd.status = CommandStatus::Accepted;
    store.commands.insert(best_id, cmd.clone());
    Some(cmd)
}

pub fn expire_queued_commands(store: &Store, agent_id: &str, current_tick: u64) -> u32 {
    let mut count = 0;
    let expired_ids: Vec<CommandId> = store
        .commands
        .iter()
        .filter(|c| {
            c.agent_id == agent_id
                && c.status == CommandStatus::Queued
                && c.expires_at_tick.map(|t| t < current_tick).unwrap_or(false)
        })
        .map(|c| c.id.clone())
        .collect();

    for id in expired_ids {
        if let Some(mut cmd) = store.commands.get(&id).map(|c| c.clone()) {
            cmd.status = CommandStatus::Expired;
            store.commands.insert(id, cmd);
            count += 1;
        }
    }
    count
}

pub fn cancel_queued_commands(store: &Store, agent_id: &str) -> u32 {
    let mut count = 0;
    let ids: Vec<CommandId> = store
        .commands
        .iter()
        .filter(|c| c.agent_id == agent_id && c.status == CommandStatus::Queued)
        .map(|c| c.id.clone())
        .collect();
    for id in ids {
        if let Some(mut cmd) = store.commands.get(&id).map(|c| c.clone()) {
            cmd.status = CommandStatus::Cancelled;
            store.commands.insert(id, cmd);
            count += 1;
        }
    }
    count
}

fn transition(
    store: &Store,
    command_id: &str,
    expected: &[CommandStatus],
    next: CommandStatus,
    audit_result: Option<serde_json::Value>,
) -> Result<AgentCommand, CommandError> {
    let mut cmd = store
        .commands
        .get(command_id)
        .map(|c| c.clone())
        .ok_or_else(|| CommandError::Store(StoreError::NotFound(format!("command {command_id}"))))?;

    if !expected.contains(&cmd.status) {
        return Err(CommandError::NotQueued(command_id.to_string()));
    }

    cmd.status = next;
    cmd.audit_result = audit_result;
    store.commands.insert(command_id.to_string(), cmd.clone());
    Ok(cmd)
}

pub fn mark_executed(store: &Store, command_id: &str, audit_result: serde_json::Value) -> Result<AgentCommand, CommandError> {
    transition(
        store,
        command_id,
        &[CommandStatus::Accepted, CommandStatus::Queued],
        CommandStatus::Executed,
        Some(audit_result),
    )
}

pub fn mark_rejected(store: &Store, command_id: &str, audit_result: serde_json::Value) -> Result<AgentCommand, CommandError> {
    transition(
        store,
        command_id,
        &[CommandStatus::Accepted, CommandStatus::Queued],
        CommandStatus::Rejected,
        Some(audit_result),
    )
}

pub fn cancel_command(store: &Store, command_id: &str, reason: &str) -> Result<AgentCommand, CommandError> {
    let mut cmd = store
        .commands
        .get(command_id)
        .map(|c| c.clone())
        .ok_or_else(|| CommandError::Store(StoreError::NotFound(format!("command {command_id}"))))?;

    if !matches!(cmd.status, CommandStatus::Queued | CommandStatus::Accepted) {
        return Err(CommandError::NotCancelable(command_id.to_string()));
    }
    cmd.status = CommandStatus::Cancelled;
    cmd.audit_result = Some(serde_json::json!({ "reason": reason }));
    store.commands.insert(command_id.to_string(), cmd.clone());
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommandIntent, EconomyPool, IssuerType};

    fn store() -> Store {
        Store::new(EconomyPool::new(1000, 1000, 30))
    }

    fn queue(store: &Store, agent_id: &str, priority: u8, created_tick: u64) -> AgentCommand {
        let cmd = build_command(
            store,
            agent_id.to_string(),
            IssuerType::System,
            None,
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
    fn accept_next_picks_highest_priority_then_oldest() {
        let store = store();
        queue(&store, "a", 50, 5);
        let high = queue(&store, "a", 90, 10);
        let accepted = accept_next_command(&store, "a", 20).unwrap();
        assert_eq!(accepted.id, high.id);
        assert_eq!(accepted.status, CommandStatus::Accepted);
    }

    #[test]
    fn expired_commands_are_skipped_by_accept() {
        let store = store();
        let cmd = build_command(
            &store,
            "a".to_string(),
            IssuerType::System,
            None,
            CommandMode::Suggest,
            CommandIntent::Rest,
            serde_json::json!({}),
            serde_json::json!({}),
            None,
            0,
            Some(5),
        );
        store.commands.insert(cmd.id.clone(), cmd.clone());
        let accepted = accept_next_command(&store, "a", 10);
        assert!(accepted.is_none());
        assert_eq!(store.commands.get(&cmd.id).unwrap().status, CommandStatus::Expired);
    }

    #[test]
    fn cancel_command_rejects_terminal_states() {
        let store = store();
        let cmd = queue(&store, "a", 50, 0);
        mark_executed(&store, &cmd.id, serde_json::json!({})).unwrap();
        let err = cancel_command(&store, &cmd.id, "changed mind").unwrap_err();
        assert_eq!(err.code(), "PRECONDITION");
    }

    #[test]
    fn base_priority_defaults_apply() {
        let store = store();
        let cmd = build_command(
            &store,
            "a".to_string(),
            IssuerType::Telegram,
            Some("u1".to_string()),
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
}
