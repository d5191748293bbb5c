// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier newtypes shared across the workspace.

use serde::{Deserialize, Serialize};

/// Unique identifier for a tenant.
///
/// Every persisted row carries a tenant id; query functions require one so
/// a cross-tenant access path cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a lead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_serde() {
        let tenant = TenantId("t-1".into());
        let json = serde_json::to_string(&tenant).unwrap();
        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(tenant, parsed);

        let lead = LeadId("l-1".into());
        assert_eq!(lead.to_string(), "l-1");
    }
}
