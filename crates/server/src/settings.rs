//! Typed view over the persisted configuration documents.
//!
//! The store keeps three JSON documents in the settings table: the reminder
//! day-thresholds and the two mail templates. This module decodes them into
//! one aggregate loaded per engine pass, seeds defaults on first start and
//! validates updates before they are written back.

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::render;
use crate::store;

pub const REMINDER_RULES_KEY: &str = "reminder_rules";
pub const EMAIL_TEMPLATE_KEY: &str = "email_template";
pub const RENEWAL_CONFIRM_TEMPLATE_KEY: &str = "renewal_confirm_template";

pub const DEFAULT_RULES: [i64; 4] = [30, 7, 1, 0];

/// An operator-editable mail template: subject and HTML body, both in
/// template syntax.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDoc {
    pub subject: String,
    pub html: String,
}

pub fn default_email_template() -> TemplateDoc {
    TemplateDoc {
        subject: "[Renewal reminder] {{ product.name }} expires on {{ product.expires_at }}"
            .to_string(),
        html: r#"<p>Hi {{ customer.name or customer.email }},</p>
<p>Your product <b>{{ product.name }}</b> expires on <b>{{ product.expires_at }}</b>.</p>
<p><b>{{ days_left }}</b> day(s) left until expiry.</p>
{% if product.content %}<p>Note: {{ product.content }}</p>{% endif %}
<hr/>
<p>To keep using it, please contact <a href="{{ contact_url }}" target="_blank" rel="noopener noreferrer">{{ contact_name }}</a>.</p>
<p>Best regards,<br/>{{ company }}</p>
"#
        .to_string(),
    }
}

pub fn default_renewal_template() -> TemplateDoc {
    TemplateDoc {
        subject: "[Renewal confirmed] {{ product.name }} is now valid until {{ new_expires_at }}"
            .to_string(),
        html: r#"<p>Hi {{ customer.name or customer.email }},</p>
<p>Your product <b>{{ product.name }}</b> has been renewed.</p>
<p>Previous expiry date: <b>{{ old_expires_at }}</b></p>
<p>New expiry date: <b>{{ new_expires_at }}</b></p>
{% if product.content %}<p>Product info: {{ product.content }}</p>{% endif %}
<hr/>
<p>Best regards,<br/>{{ company }}</p>
"#
        .to_string(),
    }
}

/// The configuration aggregate one engine pass works from.
#[derive(Clone, Debug)]
pub struct ReminderSettings {
    /// Sorted descending, deduplicated.
    pub rules: Vec<i64>,
    pub email_template: TemplateDoc,
    pub renewal_template: TemplateDoc,
}

impl ReminderSettings {
    /// Loads the three documents, falling back to the defaults for any key a
    /// fresh database has not been seeded with yet.
    pub async fn load(db: &DatabaseConnection) -> Result<Self, SettingsError> {
        let rules = match store::settings::get(db, REMINDER_RULES_KEY).await? {
            Some(raw) => normalize_rules(decode(REMINDER_RULES_KEY, &raw)?),
            None => normalize_rules(DEFAULT_RULES.to_vec()),
        };
        let email_template = match store::settings::get(db, EMAIL_TEMPLATE_KEY).await? {
            Some(raw) => decode(EMAIL_TEMPLATE_KEY, &raw)?,
            None => default_email_template(),
        };
        let renewal_template = match store::settings::get(db, RENEWAL_CONFIRM_TEMPLATE_KEY).await? {
            Some(raw) => decode(RENEWAL_CONFIRM_TEMPLATE_KEY, &raw)?,
            None => default_renewal_template(),
        };
        Ok(Self {
            rules,
            email_template,
            renewal_template,
        })
    }

    /// The window an automatic scan uses: the largest configured rule.
    pub fn auto_threshold(&self) -> i64 {
        self.rules.first().copied().unwrap_or(0)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    key: &'static str,
    raw: &str,
) -> Result<T, SettingsError> {
    serde_json::from_str(raw).map_err(|source| SettingsError::Json { key, source })
}

fn encode<T: Serialize>(key: &'static str, value: &T) -> Result<String, SettingsError> {
    serde_json::to_string(value).map_err(|source| SettingsError::Json { key, source })
}

/// Deduplicates and sorts descending. Write paths reject negatives before
/// this runs; values read back from an old database pass through as stored.
pub fn normalize_rules(mut values: Vec<i64>) -> Vec<i64> {
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.dedup();
    values
}

/// Seeds any missing settings document. Existing values are never touched.
pub async fn ensure_defaults(db: &DatabaseConnection) -> Result<(), SettingsError> {
    if store::settings::get(db, REMINDER_RULES_KEY).await?.is_none() {
        set_rules(db, DEFAULT_RULES.to_vec()).await?;
    }
    if store::settings::get(db, EMAIL_TEMPLATE_KEY).await?.is_none() {
        set_email_template(db, &default_email_template()).await?;
    }
    if store::settings::get(db, RENEWAL_CONFIRM_TEMPLATE_KEY)
        .await?
        .is_none()
    {
        set_renewal_template(db, &default_renewal_template()).await?;
    }
    Ok(())
}

pub async fn set_rules(db: &DatabaseConnection, rules: Vec<i64>) -> Result<(), SettingsError> {
    if let Some(bad) = rules.iter().copied().find(|r| *r < 0) {
        return Err(SettingsError::NegativeRule(bad));
    }
    let rules = normalize_rules(rules);
    let encoded = encode(REMINDER_RULES_KEY, &rules)?;
    store::settings::set(db, REMINDER_RULES_KEY, &encoded).await?;
    Ok(())
}

pub async fn set_email_template(
    db: &DatabaseConnection,
    doc: &TemplateDoc,
) -> Result<(), SettingsError> {
    render::validate(doc)?;
    let encoded = encode(EMAIL_TEMPLATE_KEY, doc)?;
    store::settings::set(db, EMAIL_TEMPLATE_KEY, &encoded).await?;
    Ok(())
}

pub async fn set_renewal_template(
    db: &DatabaseConnection,
    doc: &TemplateDoc,
) -> Result<(), SettingsError> {
    render::validate(doc)?;
    let encoded = encode(RENEWAL_CONFIRM_TEMPLATE_KEY, doc)?;
    store::settings::set(db, RENEWAL_CONFIRM_TEMPLATE_KEY, &encoded).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sorts_descending_and_dedups() {
        assert_eq!(normalize_rules(vec![1, 30, 7, 30, 0, 7]), vec![30, 7, 1, 0]);
        assert_eq!(normalize_rules(vec![]), Vec::<i64>::new());
    }

    #[test]
    fn default_templates_parse() {
        assert!(render::validate(&default_email_template()).is_ok());
        assert!(render::validate(&default_renewal_template()).is_ok());
    }

    #[test]
    fn template_doc_round_trips_through_json() {
        let doc = default_email_template();
        let encoded = serde_json::to_string(&doc).expect("encode");
        let decoded: TemplateDoc = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, doc);
    }
}
