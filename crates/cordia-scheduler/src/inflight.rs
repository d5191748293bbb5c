// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! At-most-one outbound action in flight per lead.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use cordia_core::types::{LeadId, TenantId};

/// Process-wide set of leads with an open outbound action.
#[derive(Clone, Default)]
pub struct InFlightGuard {
    leads: Arc<DashMap<String, ()>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lead's slot. `None` while another action holds it; the
    /// permit releases on drop.
    pub fn try_acquire(&self, tenant: &TenantId, lead: &LeadId) -> Option<InFlightPermit> {
        let key = format!("{}:{}", tenant.0, lead.0);
        match self.leads.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(InFlightPermit {
                    leads: self.leads.clone(),
                    key,
                })
            }
        }
    }
}

/// RAII permit for a lead's in-flight slot.
pub struct InFlightPermit {
    leads: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.leads.remove(&self.key);
    }
}
