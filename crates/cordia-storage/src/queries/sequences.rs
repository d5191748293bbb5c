// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequence definitions (versioned, immutable) and per-lead sequence states.
//!
//! State updates are optimistic via `row_version`; the dispatcher's due scan
//! claims rows atomically so concurrent workers never double-pick.

use chrono::{DateTime, Utc};
use cordia_core::CordiaError;
use cordia_core::types::{
    FollowUpSequence, LeadId, SequenceState, SequenceStatus, StepAttempt, TenantId,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const STATE_COLUMNS: &str = "id, tenant_id, lead_id, sequence_id, sequence_version, status, \
     current_step_index, started_at, last_step_scheduled_at, last_step_completed_at, \
     last_interaction_type, paused_until, hold_count, next_action_at, completed_at, row_version";

// --- Sequence definitions ---

/// Store a sequence definition version. Definitions are immutable; an edit
/// is a new row with `version + 1`.
pub async fn store_sequence(db: &Database, sequence: &FollowUpSequence) -> Result<(), CordiaError> {
    let sequence = sequence.clone();
    let steps_json = serde_json::to_string(&sequence.steps).map_err(|e| CordiaError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO follow_up_sequences
                     (id, tenant_id, name, trigger_key, steps, is_active, is_default, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    sequence.id,
                    sequence.tenant_id.0,
                    sequence.name,
                    sequence.trigger,
                    steps_json,
                    sequence.is_active,
                    sequence.is_default,
                    sequence.version,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a specific version of a sequence definition.
pub async fn get_sequence(
    db: &Database,
    tenant: &TenantId,
    id: &str,
    version: i64,
) -> Result<Option<FollowUpSequence>, CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sequence = conn
                .query_row(
                    "SELECT id, tenant_id, name, trigger_key, steps, is_active, is_default, version
                     FROM follow_up_sequences
                     WHERE tenant_id = ?1 AND id = ?2 AND version = ?3",
                    params![tenant, id, version],
                    row_to_sequence,
                )
                .optional()?;
            Ok(sequence)
        })
        .await
        .map_err(map_tr_err)
}

/// The tenant's default active sequence, latest version.
pub async fn default_sequence(
    db: &Database,
    tenant: &TenantId,
) -> Result<Option<FollowUpSequence>, CordiaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let sequence = conn
                .query_row(
                    "SELECT id, tenant_id, name, trigger_key, steps, is_active, is_default, version
                     FROM follow_up_sequences
                     WHERE tenant_id = ?1 AND is_default = 1 AND is_active = 1
                     ORDER BY version DESC LIMIT 1",
                    params![tenant],
                    row_to_sequence,
                )
                .optional()?;
            Ok(sequence)
        })
        .await
        .map_err(map_tr_err)
}

/// The tenant's active sequence for a trigger key, latest version.
pub async fn sequence_by_trigger(
    db: &Database,
    tenant: &TenantId,
    trigger: &str,
) -> Result<Option<FollowUpSequence>, CordiaError> {
    let tenant = tenant.0.clone();
    let trigger = trigger.to_string();
    db.connection()
        .call(move |conn| {
            let sequence = conn
                .query_row(
                    "SELECT id, tenant_id, name, trigger_key, steps, is_active, is_default, version
                     FROM follow_up_sequences
                     WHERE tenant_id = ?1 AND trigger_key = ?2 AND is_active = 1
                     ORDER BY version DESC LIMIT 1",
                    params![tenant, trigger],
                    row_to_sequence,
                )
                .optional()?;
            Ok(sequence)
        })
        .await
        .map_err(map_tr_err)
}

// --- Sequence states ---

/// Create a new sequence state.
pub async fn create_sequence_state(db: &Database, state: &SequenceState) -> Result<(), CordiaError> {
    let state = state.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sequence_states
                     (id, tenant_id, lead_id, sequence_id, sequence_version, status,
                      current_step_index, started_at, last_step_scheduled_at,
                      last_step_completed_at, last_interaction_type, paused_until,
                      hold_count, next_action_at, completed_at, row_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    state.id,
                    state.tenant_id.0,
                    state.lead_id.0,
                    state.sequence_id,
                    state.sequence_version,
                    state.status.as_str(),
                    state.current_step_index as i64,
                    state.started_at,
                    state.last_step_scheduled_at,
                    state.last_step_completed_at,
                    state.last_interaction_type,
                    state.paused_until,
                    state.hold_count,
                    state.next_action_at,
                    state.completed_at,
                    state.row_version,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a sequence state by id.
pub async fn get_sequence_state(
    db: &Database,
    tenant: &TenantId,
    id: &str,
) -> Result<Option<SequenceState>, CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let state = conn
                .query_row(
                    &format!(
                        "SELECT {STATE_COLUMNS} FROM sequence_states
                         WHERE tenant_id = ?1 AND id = ?2"
                    ),
                    params![tenant, id],
                    row_to_state,
                )
                .optional()?;
            Ok(state)
        })
        .await
        .map_err(map_tr_err)
}

/// The non-terminal state for `(lead, sequence)`, if any. At most one exists.
pub async fn open_sequence_state(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    sequence_id: &str,
) -> Result<Option<SequenceState>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    let sequence_id = sequence_id.to_string();
    db.connection()
        .call(move |conn| {
            let state = conn
                .query_row(
                    &format!(
                        "SELECT {STATE_COLUMNS} FROM sequence_states
                         WHERE tenant_id = ?1 AND lead_id = ?2 AND sequence_id = ?3
                           AND status NOT IN ('completed', 'stopped')
                         LIMIT 1"
                    ),
                    params![tenant, lead, sequence_id],
                    row_to_state,
                )
                .optional()?;
            Ok(state)
        })
        .await
        .map_err(map_tr_err)
}

/// All non-terminal states for a lead.
pub async fn open_states_for_lead(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<Vec<SequenceState>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STATE_COLUMNS} FROM sequence_states
                 WHERE tenant_id = ?1 AND lead_id = ?2
                   AND status NOT IN ('completed', 'stopped')
                 ORDER BY started_at ASC"
            ))?;
            let states = stmt
                .query_map(params![tenant, lead], row_to_state)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(states)
        })
        .await
        .map_err(map_tr_err)
}

/// Optimistic update guarded by `expected_version`.
///
/// Bumps `row_version` and clears the dispatcher claim. Returns `false`
/// when no row matched (lost update); the caller re-reads and re-advances.
pub async fn update_sequence_state(
    db: &Database,
    state: &SequenceState,
    expected_version: i64,
) -> Result<bool, CordiaError> {
    let state = state.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sequence_states SET
                     status = ?3, current_step_index = ?4, last_step_scheduled_at = ?5,
                     last_step_completed_at = ?6, last_interaction_type = ?7,
                     paused_until = ?8, hold_count = ?9, next_action_at = ?10,
                     completed_at = ?11, row_version = row_version + 1, claimed_until = NULL
                 WHERE tenant_id = ?1 AND id = ?2 AND row_version = ?12",
                params![
                    state.tenant_id.0,
                    state.id,
                    state.status.as_str(),
                    state.current_step_index as i64,
                    state.last_step_scheduled_at,
                    state.last_step_completed_at,
                    state.last_interaction_type,
                    state.paused_until,
                    state.hold_count,
                    state.next_action_at,
                    state.completed_at,
                    expected_version,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim due states for a dispatcher worker.
///
/// A single transaction selects non-terminal states whose `next_action_at`
/// has passed and whose claim has expired, then stamps `claimed_until`.
/// Two workers ticking concurrently see disjoint result sets.
pub async fn claim_due_states(
    db: &Database,
    tenant: &TenantId,
    now: DateTime<Utc>,
    claim_until: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<SequenceState>, CordiaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let states = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {STATE_COLUMNS} FROM sequence_states
                     WHERE tenant_id = ?1
                       AND status NOT IN ('completed', 'stopped')
                       AND next_action_at IS NOT NULL AND next_action_at <= ?2
                       AND (claimed_until IS NULL OR claimed_until <= ?2)
                     ORDER BY next_action_at ASC LIMIT ?3"
                ))?;
                stmt.query_map(params![tenant, now, limit as i64], row_to_state)?
                    .collect::<Result<Vec<_>, _>>()?
            };

            for state in &states {
                tx.execute(
                    "UPDATE sequence_states SET claimed_until = ?3
                     WHERE tenant_id = ?1 AND id = ?2",
                    params![tenant, state.id, claim_until],
                )?;
            }
            tx.commit()?;
            Ok(states)
        })
        .await
        .map_err(map_tr_err)
}

/// States in `waiting_response` whose last step completed before `cutoff`.
pub async fn waiting_states_older_than(
    db: &Database,
    tenant: &TenantId,
    cutoff: DateTime<Utc>,
) -> Result<Vec<SequenceState>, CordiaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STATE_COLUMNS} FROM sequence_states
                 WHERE tenant_id = ?1 AND status = 'waiting_response'
                   AND last_step_completed_at IS NOT NULL
                   AND last_step_completed_at <= ?2"
            ))?;
            let states = stmt
                .query_map(params![tenant, cutoff], row_to_state)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(states)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all sequence states for a lead (GDPR wipe).
pub async fn delete_sequence_states(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM sequence_states WHERE tenant_id = ?1 AND lead_id = ?2",
                params![tenant, lead],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

// --- Step attempts ---

/// Record a step attempt outcome under its dedup key.
pub async fn record_step_attempt(db: &Database, attempt: &StepAttempt) -> Result<(), CordiaError> {
    let attempt = attempt.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO step_attempts
                     (dedup_key, state_id, step_index, action, outcome, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    attempt.dedup_key,
                    attempt.state_id,
                    attempt.step_index as i64,
                    attempt.action,
                    attempt.outcome.to_string(),
                    attempt.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a prior attempt by dedup key.
pub async fn get_step_attempt(
    db: &Database,
    dedup_key: &str,
) -> Result<Option<StepAttempt>, CordiaError> {
    let dedup_key = dedup_key.to_string();
    db.connection()
        .call(move |conn| {
            let attempt = conn
                .query_row(
                    "SELECT dedup_key, state_id, step_index, action, outcome, created_at
                     FROM step_attempts WHERE dedup_key = ?1",
                    params![dedup_key],
                    |row| {
                        let outcome: String = row.get(4)?;
                        Ok(StepAttempt {
                            dedup_key: row.get(0)?,
                            state_id: row.get(1)?,
                            step_index: row.get::<_, i64>(2)? as usize,
                            action: row.get(3)?,
                            outcome: serde_json::from_str(&outcome)
                                .unwrap_or(serde_json::Value::Null),
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(attempt)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_sequence(row: &rusqlite::Row) -> Result<FollowUpSequence, rusqlite::Error> {
    let steps: String = row.get(4)?;
    Ok(FollowUpSequence {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        name: row.get(2)?,
        trigger: row.get(3)?,
        steps: serde_json::from_str(&steps).unwrap_or_default(),
        is_active: row.get(5)?,
        is_default: row.get(6)?,
        version: row.get(7)?,
    })
}

fn row_to_state(row: &rusqlite::Row) -> Result<SequenceState, rusqlite::Error> {
    let status: String = row.get(5)?;
    Ok(SequenceState {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        lead_id: LeadId(row.get(2)?),
        sequence_id: row.get(3)?,
        sequence_version: row.get(4)?,
        status: SequenceStatus::from_str_value(&status),
        current_step_index: row.get::<_, i64>(6)? as usize,
        started_at: row.get(7)?,
        last_step_scheduled_at: row.get(8)?,
        last_step_completed_at: row.get(9)?,
        last_interaction_type: row.get(10)?,
        paused_until: row.get(11)?,
        hold_count: row.get(12)?,
        next_action_at: row.get(13)?,
        completed_at: row.get(14)?,
        row_version: row.get(15)?,
    })
}
