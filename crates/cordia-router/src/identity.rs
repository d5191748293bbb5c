// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity resolution: `(channel, identifier)` to lead, with duplicate
//! detection and the tenant's unknown-identity policy.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use cordia_bus::{EventChain, EventLog};
use cordia_config::model::{IdentityConfig, UnknownIdentityPolicy};
use cordia_core::traits::Clock;
use cordia_core::traits::storage::DedupField;
use cordia_core::types::{ChannelIdentity, ChannelType, Event, EventKind, Lead, LeadId, TenantId};
use cordia_core::{CordiaError, StorageAdapter};

/// Minimum digits for a phone match in the duplicate passes.
const MIN_PHONE_DIGITS: usize = 6;
/// Minimum characters for every other duplicate-pass field.
const MIN_FIELD_CHARS: usize = 3;

/// Lowercase and trim an email address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Strip a phone number to digits plus a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }
    out
}

/// Strip a social handle of `@` and URL prefixes.
pub fn normalize_handle(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    for prefix in ["https://", "http://", "www."] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    if let Some(slash) = s.rfind('/') {
        s = s[slash + 1..].to_string();
    }
    s.trim_start_matches('@').to_string()
}

/// Lowercase, trim, and collapse whitespace in a display name.
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// The result of resolving an inbound identifier.
pub struct ResolvedLead {
    pub lead: Lead,
    pub was_created: bool,
    /// The `lead.created` event when a stub was created; pending until the
    /// caller dispatches it.
    pub created_event: Option<Event>,
}

/// Maps inbound `(channel, identifier)` pairs to leads.
pub struct IdentityResolver {
    storage: Arc<dyn StorageAdapter>,
    event_log: Arc<EventLog>,
    clock: Arc<dyn Clock>,
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        event_log: Arc<EventLog>,
        clock: Arc<dyn Clock>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            storage,
            event_log,
            clock,
            config,
        }
    }

    /// Resolve an identifier to its lead.
    ///
    /// A known identity refreshes `last_active_at` and returns the owner.
    /// An unknown identifier follows the tenant policy; stub creation first
    /// runs the duplicate passes (social handle, email, phone, normalized
    /// name, in that order) and attaches to a matching lead instead of
    /// creating one.
    pub async fn resolve(
        &self,
        tenant: &TenantId,
        channel: ChannelType,
        identifier: &str,
        display_name: Option<&str>,
    ) -> Result<ResolvedLead, CordiaError> {
        let now = self.clock.now();

        if let Some(identity) = self.storage.get_identity(tenant, channel, identifier).await? {
            self.storage.touch_identity(tenant, &identity.id, now).await?;
            let Some(lead) = self.storage.get_lead(tenant, &identity.lead_id).await? else {
                return Err(CordiaError::not_found("lead", identity.lead_id.0.clone()));
            };
            return Ok(ResolvedLead {
                lead,
                was_created: false,
                created_event: None,
            });
        }

        match self.config.unknown_policy {
            UnknownIdentityPolicy::Reject => {
                debug!(identifier, "unknown identity rejected by policy");
                Err(CordiaError::not_found("lead", identifier))
            }
            UnknownIdentityPolicy::EnqueueForManualReview => {
                self.event_log
                    .append(
                        tenant,
                        EventKind::IdentityReviewRequested,
                        serde_json::json!({
                            "channel": channel.as_str(),
                            "identifier": identifier,
                            "display_name": display_name,
                        }),
                        "identity",
                        EventChain::root(),
                    )
                    .await?;
                info!(identifier, "unknown identity queued for manual review");
                Err(CordiaError::not_found("lead", identifier))
            }
            UnknownIdentityPolicy::CreateLeadStub => {
                self.create_or_attach(tenant, channel, identifier, display_name, now)
                    .await
            }
        }
    }

    async fn create_or_attach(
        &self,
        tenant: &TenantId,
        channel: ChannelType,
        identifier: &str,
        display_name: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<ResolvedLead, CordiaError> {
        let phone = normalize_phone(identifier);
        let looks_like_phone = digit_count(&phone) >= MIN_PHONE_DIGITS;
        let email = identifier.contains('@').then(|| normalize_email(identifier));
        let handle = (!looks_like_phone && email.is_none()).then(|| normalize_handle(identifier));
        let name = display_name.map(normalize_name);

        // Duplicate passes, in priority order. The first match attaches.
        let passes: [(DedupField, Option<&String>, usize); 4] = [
            (DedupField::SocialHandle, handle.as_ref(), MIN_FIELD_CHARS),
            (DedupField::Email, email.as_ref(), MIN_FIELD_CHARS),
            (
                DedupField::Phone,
                looks_like_phone.then_some(&phone),
                MIN_PHONE_DIGITS,
            ),
            (DedupField::Name, name.as_ref(), MIN_FIELD_CHARS),
        ];
        for (field, value, min_len) in passes {
            let Some(value) = value else { continue };
            let strong_enough = match field {
                DedupField::Phone => digit_count(value) >= min_len,
                _ => value.chars().count() >= min_len,
            };
            if !strong_enough {
                continue;
            }
            if let Some(existing) = self.storage.find_lead_by_field(tenant, field, value).await? {
                info!(lead = %existing.id, ?field, "duplicate pass matched, attaching identity");
                self.attach_identity(tenant, &existing.id, channel, identifier, now)
                    .await?;
                return Ok(ResolvedLead {
                    lead: existing,
                    was_created: false,
                    created_event: None,
                });
            }
        }

        // No match: create the stub and its identity.
        let mut lead = Lead::stub(
            LeadId(Uuid::new_v4().to_string()),
            tenant.clone(),
            display_name.unwrap_or(identifier),
            channel,
            now,
        );
        if looks_like_phone {
            lead.phone = Some(phone);
        } else if let Some(email) = email {
            lead.email = Some(email);
        } else if let Some(handle) = handle.filter(|h| !h.is_empty()) {
            lead.social_handle = Some(handle);
        }
        self.storage.create_lead(&lead).await?;

        if let Err(e) = self
            .attach_identity(tenant, &lead.id, channel, identifier, now)
            .await
        {
            // Lost the race against a concurrent webhook for the same
            // identifier: adopt the winner's lead and drop our stub.
            if let Some(existing) = self.storage.get_identity(tenant, channel, identifier).await? {
                warn!(identifier, "concurrent identity creation, adopting existing lead");
                self.storage.delete_lead(tenant, &lead.id).await?;
                let Some(winner) = self.storage.get_lead(tenant, &existing.lead_id).await? else {
                    return Err(CordiaError::not_found("lead", existing.lead_id.0.clone()));
                };
                return Ok(ResolvedLead {
                    lead: winner,
                    was_created: false,
                    created_event: None,
                });
            }
            return Err(e);
        }

        let created_event = self
            .event_log
            .append(
                tenant,
                EventKind::LeadCreated,
                serde_json::json!({
                    "lead_id": lead.id.0,
                    "channel": channel.as_str(),
                    "identifier": identifier,
                }),
                "identity",
                EventChain::root(),
            )
            .await?;
        metrics::counter!("cordia_leads_created", "channel" => channel.as_str()).increment(1);
        info!(lead = %lead.id, channel = %channel, "lead stub created");

        Ok(ResolvedLead {
            lead,
            was_created: true,
            created_event: Some(created_event),
        })
    }

    async fn attach_identity(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        channel: ChannelType,
        identifier: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), CordiaError> {
        self.storage
            .create_identity(&ChannelIdentity {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant.clone(),
                lead_id: lead.clone(),
                channel,
                identifier: identifier.to_string(),
                last_active_at: now,
                metadata: serde_json::Value::Object(Default::default()),
            })
            .await
    }
}
