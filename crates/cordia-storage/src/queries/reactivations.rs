// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persisted reactivation queue for ghosted and lost leads.

use chrono::{DateTime, Utc};
use cordia_core::CordiaError;
use cordia_core::types::{LeadId, ReactivationTask, TenantId};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Schedule a reactivation.
pub async fn schedule_reactivation(
    db: &Database,
    task: &ReactivationTask,
) -> Result<(), CordiaError> {
    let task = task.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO reactivation_tasks
                     (id, tenant_id, lead_id, sequence_id, due_at, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task.id,
                    task.tenant_id.0,
                    task.lead_id.0,
                    task.sequence_id,
                    task.due_at,
                    task.status,
                    task.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Pending reactivations whose due time has passed, oldest first.
pub async fn due_reactivations(
    db: &Database,
    tenant: &TenantId,
    now: DateTime<Utc>,
) -> Result<Vec<ReactivationTask>, CordiaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, lead_id, sequence_id, due_at, status, created_at
                 FROM reactivation_tasks
                 WHERE tenant_id = ?1 AND status = 'pending' AND due_at <= ?2
                 ORDER BY due_at ASC",
            )?;
            let tasks = stmt
                .query_map(params![tenant, now], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a reactivation done.
pub async fn complete_reactivation(
    db: &Database,
    tenant: &TenantId,
    id: &str,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE reactivation_tasks SET status = 'done'
                 WHERE tenant_id = ?1 AND id = ?2 AND status = 'pending'",
                params![tenant, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all reactivations for a lead (GDPR wipe).
pub async fn delete_reactivations(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM reactivation_tasks WHERE tenant_id = ?1 AND lead_id = ?2",
                params![tenant, lead],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_task(row: &rusqlite::Row) -> Result<ReactivationTask, rusqlite::Error> {
    Ok(ReactivationTask {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        lead_id: LeadId(row.get(2)?),
        sequence_id: row.get(3)?,
        due_at: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, due_at: DateTime<Utc>) -> ReactivationTask {
        ReactivationTask {
            id: id.to_string(),
            tenant_id: TenantId("t-1".to_string()),
            lead_id: LeadId("l-1".to_string()),
            sequence_id: Some("seq-react".to_string()),
            due_at,
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn due_scan_honors_due_time_and_status() {
        let db = Database::open_in_memory().await.unwrap();
        let tenant = TenantId("t-1".to_string());
        let now = Utc::now();

        schedule_reactivation(&db, &make_task("r1", now - chrono::Duration::days(1)))
            .await
            .unwrap();
        schedule_reactivation(&db, &make_task("r2", now + chrono::Duration::days(70)))
            .await
            .unwrap();

        let due = due_reactivations(&db, &tenant, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "r1");

        complete_reactivation(&db, &tenant, "r1").await.unwrap();
        let due = due_reactivations(&db, &tenant, now).await.unwrap();
        assert!(due.is_empty());

        // 71 days later the second task surfaces.
        let later = now + chrono::Duration::days(71);
        let due = due_reactivations(&db, &tenant, later).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "r2");
    }
}
