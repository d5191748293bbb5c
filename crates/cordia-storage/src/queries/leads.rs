// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead CRUD and duplicate-check lookups.

use chrono::{DateTime, Utc};
use cordia_core::CordiaError;
use cordia_core::traits::storage::DedupField;
use cordia_core::types::{ChannelType, ContactStatus, Lead, LeadId, TenantId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const LEAD_COLUMNS: &str = "id, tenant_id, name, preferred_channel, timezone, language, \
     contact_status, contact_count, last_contact_at, score, tags, custom_fields, \
     email, phone, social_handle, source, created_at, updated_at";

/// Insert a new lead.
pub async fn create_lead(db: &Database, lead: &Lead) -> Result<(), CordiaError> {
    let lead = lead.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO leads (id, tenant_id, name, preferred_channel, timezone, language,
                     contact_status, contact_count, last_contact_at, score, tags, custom_fields,
                     email, phone, social_handle, source, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    lead.id.0,
                    lead.tenant_id.0,
                    lead.name,
                    lead.preferred_channel.map(|c| c.as_str()),
                    lead.timezone,
                    lead.language,
                    lead.contact_status.as_str(),
                    lead.contact_count,
                    lead.last_contact_at,
                    lead.score,
                    serde_json::to_string(&lead.tags).unwrap_or_else(|_| "[]".into()),
                    lead.custom_fields.to_string(),
                    lead.email,
                    lead.phone,
                    lead.social_handle,
                    lead.source,
                    lead.created_at,
                    lead.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a lead by id.
pub async fn get_lead(
    db: &Database,
    tenant: &TenantId,
    id: &LeadId,
) -> Result<Option<Lead>, CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let lead = conn
                .query_row(
                    &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE tenant_id = ?1 AND id = ?2"),
                    params![tenant, id],
                    row_to_lead,
                )
                .optional()?;
            Ok(lead)
        })
        .await
        .map_err(map_tr_err)
}

/// Update all mutable fields of a lead.
pub async fn update_lead(db: &Database, lead: &Lead) -> Result<(), CordiaError> {
    let lead = lead.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET name = ?3, preferred_channel = ?4, timezone = ?5,
                     language = ?6, contact_status = ?7, contact_count = ?8,
                     last_contact_at = ?9, score = ?10, tags = ?11, custom_fields = ?12,
                     email = ?13, phone = ?14, social_handle = ?15, source = ?16,
                     updated_at = ?17
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    lead.tenant_id.0,
                    lead.id.0,
                    lead.name,
                    lead.preferred_channel.map(|c| c.as_str()),
                    lead.timezone,
                    lead.language,
                    lead.contact_status.as_str(),
                    lead.contact_count,
                    lead.last_contact_at,
                    lead.score,
                    serde_json::to_string(&lead.tags).unwrap_or_else(|_| "[]".into()),
                    lead.custom_fields.to_string(),
                    lead.email,
                    lead.phone,
                    lead.social_handle,
                    lead.source,
                    lead.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a lead by one normalized duplicate-check field.
pub async fn find_lead_by_field(
    db: &Database,
    tenant: &TenantId,
    field: DedupField,
    normalized: &str,
) -> Result<Option<Lead>, CordiaError> {
    let column = match field {
        DedupField::SocialHandle => "social_handle",
        DedupField::Email => "email",
        DedupField::Phone => "phone",
        DedupField::Name => "name",
    };
    let sql = format!(
        "SELECT {LEAD_COLUMNS} FROM leads
         WHERE tenant_id = ?1 AND LOWER(TRIM({column})) = ?2 LIMIT 1"
    );
    let tenant = tenant.0.clone();
    let normalized = normalized.to_string();
    db.connection()
        .call(move |conn| {
            let lead = conn
                .query_row(&sql, params![tenant, normalized], row_to_lead)
                .optional()?;
            Ok(lead)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a lead row. Child rows cascade via foreign keys.
pub async fn delete_lead(
    db: &Database,
    tenant: &TenantId,
    id: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM leads WHERE tenant_id = ?1 AND id = ?2",
                params![tenant, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Convert a rusqlite Row to a Lead struct.
pub(crate) fn row_to_lead(row: &rusqlite::Row) -> Result<Lead, rusqlite::Error> {
    let preferred: Option<String> = row.get(3)?;
    let status: String = row.get(6)?;
    let tags_json: String = row.get(10)?;
    let custom_json: String = row.get(11)?;
    Ok(Lead {
        id: LeadId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        name: row.get(2)?,
        preferred_channel: preferred.as_deref().and_then(ChannelType::from_str_value),
        timezone: row.get(4)?,
        language: row.get(5)?,
        contact_status: ContactStatus::from_str_value(&status),
        contact_count: row.get(7)?,
        last_contact_at: row.get::<_, Option<DateTime<Utc>>>(8)?,
        score: row.get(9)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        custom_fields: serde_json::from_str(&custom_json)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        email: row.get(12)?,
        phone: row.get(13)?,
        social_handle: row.get(14)?,
        source: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_lead(id: &str, tenant: &str) -> Lead {
        Lead::stub(
            LeadId(id.to_string()),
            TenantId(tenant.to_string()),
            "Test Lead",
            ChannelType::Whatsapp,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn create_and_get_lead() {
        let db = setup_db().await;
        let lead = make_lead("l-1", "t-1");
        create_lead(&db, &lead).await.unwrap();

        let fetched = get_lead(&db, &lead.tenant_id, &lead.id).await.unwrap();
        let fetched = fetched.expect("lead should exist");
        assert_eq!(fetched.id, lead.id);
        assert_eq!(fetched.contact_status, ContactStatus::NeverContacted);
        assert_eq!(fetched.preferred_channel, Some(ChannelType::Whatsapp));
    }

    #[tokio::test]
    async fn get_lead_respects_tenant() {
        let db = setup_db().await;
        let lead = make_lead("l-1", "t-1");
        create_lead(&db, &lead).await.unwrap();

        let other = get_lead(&db, &TenantId("t-2".into()), &lead.id)
            .await
            .unwrap();
        assert!(other.is_none(), "lead must not leak across tenants");
    }

    #[tokio::test]
    async fn update_lead_persists_mutable_fields() {
        let db = setup_db().await;
        let mut lead = make_lead("l-1", "t-1");
        create_lead(&db, &lead).await.unwrap();

        lead.contact_status = ContactStatus::InSequence;
        lead.contact_count = 3;
        lead.email = Some("ana@example.com".into());
        lead.tags = vec!["vip".into()];
        update_lead(&db, &lead).await.unwrap();

        let fetched = get_lead(&db, &lead.tenant_id, &lead.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.contact_status, ContactStatus::InSequence);
        assert_eq!(fetched.contact_count, 3);
        assert_eq!(fetched.email.as_deref(), Some("ana@example.com"));
        assert_eq!(fetched.tags, vec!["vip".to_string()]);
    }

    #[tokio::test]
    async fn find_by_field_matches_normalized_value() {
        let db = setup_db().await;
        let mut lead = make_lead("l-1", "t-1");
        lead.email = Some("ana@example.com".into());
        lead.phone = Some("+491234567890".into());
        create_lead(&db, &lead).await.unwrap();

        let by_email =
            find_lead_by_field(&db, &lead.tenant_id, DedupField::Email, "ana@example.com")
                .await
                .unwrap();
        assert!(by_email.is_some());

        let by_phone =
            find_lead_by_field(&db, &lead.tenant_id, DedupField::Phone, "+491234567890")
                .await
                .unwrap();
        assert!(by_phone.is_some());

        let miss = find_lead_by_field(&db, &lead.tenant_id, DedupField::Email, "bob@example.com")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn delete_lead_removes_row() {
        let db = setup_db().await;
        let lead = make_lead("l-1", "t-1");
        create_lead(&db, &lead).await.unwrap();
        delete_lead(&db, &lead.tenant_id, &lead.id).await.unwrap();
        assert!(
            get_lead(&db, &lead.tenant_id, &lead.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
