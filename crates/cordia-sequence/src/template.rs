// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step template rendering seam.
//!
//! Template authoring lives outside the core; the engine only needs a key to
//! text resolution with lead variables filled in.

use std::collections::HashMap;

use cordia_core::CordiaError;
use cordia_core::types::Lead;

/// Resolves a step's template key into outbound message text.
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render(&self, template_key: &str, lead: &Lead) -> Result<String, CordiaError>;
}

/// A fixed key-to-text table with `{{name}}` substitution.
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }
}

impl TemplateRenderer for StaticTemplates {
    fn render(&self, template_key: &str, lead: &Lead) -> Result<String, CordiaError> {
        let body = self
            .templates
            .get(template_key)
            .ok_or_else(|| CordiaError::not_found("template", template_key))?;
        Ok(body.replace("{{name}}", &lead.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cordia_core::types::{ChannelType, LeadId, TenantId};

    #[test]
    fn renders_with_lead_name() {
        let templates = StaticTemplates::new(HashMap::from([(
            "intro".to_string(),
            "Hallo {{name}}, schön von dir zu hören!".to_string(),
        )]));
        let lead = Lead::stub(
            LeadId("l-1".into()),
            TenantId("t-1".into()),
            "Ana",
            ChannelType::Whatsapp,
            Utc::now(),
        );
        assert_eq!(
            templates.render("intro", &lead).unwrap(),
            "Hallo Ana, schön von dir zu hören!"
        );
        assert!(matches!(
            templates.render("missing", &lead),
            Err(CordiaError::NotFound { .. })
        ));
    }
}
