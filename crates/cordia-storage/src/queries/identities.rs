// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel identity lookups and upkeep.

use chrono::{DateTime, Utc};
use cordia_core::CordiaError;
use cordia_core::types::{ChannelIdentity, ChannelType, LeadId, TenantId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Insert a new channel identity.
///
/// Fails on a `(tenant, channel, identifier)` collision; callers resolve the
/// existing identity first.
pub async fn create_identity(db: &Database, identity: &ChannelIdentity) -> Result<(), CordiaError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_identities
                     (id, tenant_id, lead_id, channel, identifier, last_active_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    identity.id,
                    identity.tenant_id.0,
                    identity.lead_id.0,
                    identity.channel.as_str(),
                    identity.identifier,
                    identity.last_active_at,
                    identity.metadata.to_string(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up an identity by `(channel, identifier)`.
pub async fn get_identity(
    db: &Database,
    tenant: &TenantId,
    channel: ChannelType,
    identifier: &str,
) -> Result<Option<ChannelIdentity>, CordiaError> {
    let tenant = tenant.0.clone();
    let identifier = identifier.to_string();
    db.connection()
        .call(move |conn| {
            let identity = conn
                .query_row(
                    "SELECT id, tenant_id, lead_id, channel, identifier, last_active_at, metadata
                     FROM channel_identities
                     WHERE tenant_id = ?1 AND channel = ?2 AND identifier = ?3",
                    params![tenant, channel.as_str(), identifier],
                    row_to_identity,
                )
                .optional()?;
            Ok(identity)
        })
        .await
        .map_err(map_tr_err)
}

/// The lead's identity on a channel, most recently active first.
pub async fn identity_for_lead(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    channel: ChannelType,
) -> Result<Option<ChannelIdentity>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let identity = conn
                .query_row(
                    "SELECT id, tenant_id, lead_id, channel, identifier, last_active_at, metadata
                     FROM channel_identities
                     WHERE tenant_id = ?1 AND lead_id = ?2 AND channel = ?3
                     ORDER BY last_active_at DESC LIMIT 1",
                    params![tenant, lead, channel.as_str()],
                    row_to_identity,
                )
                .optional()?;
            Ok(identity)
        })
        .await
        .map_err(map_tr_err)
}

/// Update an identity's `last_active_at`.
pub async fn touch_identity(
    db: &Database,
    tenant: &TenantId,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_identities SET last_active_at = ?3
                 WHERE tenant_id = ?1 AND id = ?2",
                params![tenant, id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all identities for a lead.
pub async fn delete_identities(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM channel_identities WHERE tenant_id = ?1 AND lead_id = ?2",
                params![tenant, lead],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_identity(row: &rusqlite::Row) -> Result<ChannelIdentity, rusqlite::Error> {
    let channel: String = row.get(3)?;
    let metadata: String = row.get(6)?;
    Ok(ChannelIdentity {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        lead_id: LeadId(row.get(2)?),
        channel: ChannelType::from_str_value(&channel).unwrap_or(ChannelType::Whatsapp),
        identifier: row.get(4)?,
        last_active_at: row.get(5)?,
        metadata: serde_json::from_str(&metadata)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
    })
}
