//! Scan passes and single-subscription sends.
//!
//! Every path funnels through the same per-subscription send and the daily
//! guard in `store::sends`, so a timer scan, a manual scan and an explicit
//! "send now" can never together produce more than one reminder per
//! subscription per local calendar day.
//!
//! Known gap: the send-then-mark sequence is not atomic across a crash. A
//! crash after the SMTP transaction succeeds but before the daily record is
//! written can produce one duplicate reminder on the next scan. Accepted;
//! the guard promises at-most-one-per-day only while the process lives.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use minijinja::context;
use serde::Serialize;
use tracing::{info, warn};

use crate::AppResources;
use crate::config::AppConfig;
use crate::error::{EngineError, MailError, SendError, StoreError};
use crate::reminder::rules::pick_display_rule;
use crate::render;
use crate::settings::{ReminderSettings, TemplateDoc};
use crate::store::subscriptions::SubscriptionDetail;
use crate::store::{sends, subscriptions};

/// Upper bound on the candidate set a single scan walks.
pub const SCAN_PAGE_LIMIT: u64 = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Auto,
    Manual,
}

/// Aggregate counters for one scan pass.
#[derive(Clone, Debug, Serialize)]
pub struct ScanStats {
    pub mode: ScanMode,
    pub threshold_days: i64,
    pub auto_threshold: i64,
    pub checked_subscriptions: u64,
    pub eligible: u64,
    pub skipped_already_sent_today: u64,
    pub sent: u64,
    pub errors: u64,
}

/// Structured result of a single-subscription entry point.
#[derive(Clone, Debug, Serialize)]
pub struct SendOutcome {
    pub ok: bool,
    pub reason: Option<&'static str>,
    pub to: Option<String>,
    pub sent_date: Option<NaiveDate>,
    pub days_left: Option<i64>,
}

impl SendOutcome {
    fn failed(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            to: None,
            sent_date: None,
            days_left: None,
        }
    }

    fn delivered(to: String, sent_date: NaiveDate, days_left: i64) -> Self {
        Self {
            ok: true,
            reason: None,
            to: Some(to),
            sent_date: Some(sent_date),
            days_left: Some(days_left),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RenewalOutcome {
    pub subscription_id: i32,
    pub old_expires_at: NaiveDate,
    pub new_expires_at: NaiveDate,
    pub confirmation: SendOutcome,
}

fn local_now(tz: Tz) -> (DateTime<Tz>, NaiveDate) {
    let now = Utc::now().with_timezone(&tz);
    let today = now.date_naive();
    (now, today)
}

fn days_until(expires_at: NaiveDate, today: NaiveDate) -> i64 {
    (expires_at - today).num_days()
}

/// One scan over all subscriptions.
///
/// Automatic mode (`explicit_threshold == None`) reminds daily once
/// `days_left` drops to the largest configured rule, stops once expired more
/// than one day, and never sends more than once per subscription per day.
/// A manual scan substitutes its own window but keeps the same guard.
pub async fn scan_and_send(
    resources: &AppResources,
    explicit_threshold: Option<i64>,
) -> Result<ScanStats, EngineError> {
    let (now, today) = local_now(resources.config.tz());
    let settings = ReminderSettings::load(&resources.db).await?;
    let auto_threshold = settings.auto_threshold();
    let (threshold_days, mode) = match explicit_threshold {
        Some(days) => (days, ScanMode::Manual),
        None => (auto_threshold, ScanMode::Auto),
    };

    let candidates =
        subscriptions::list_all_details(&resources.db, None, 0, SCAN_PAGE_LIMIT).await?;

    let mut stats = ScanStats {
        mode,
        threshold_days,
        auto_threshold,
        checked_subscriptions: 0,
        eligible: 0,
        skipped_already_sent_today: 0,
        sent: 0,
        errors: 0,
    };

    for detail in &candidates {
        stats.checked_subscriptions += 1;

        let days_left = days_until(detail.expires_at, today);
        // Stop reminding once more than one day past expiry.
        if days_left < -1 {
            continue;
        }
        if days_left > threshold_days {
            continue;
        }
        stats.eligible += 1;

        if sends::was_sent_on(&resources.db, detail.id, today).await? {
            stats.skipped_already_sent_today += 1;
            continue;
        }

        let display_rule = pick_display_rule(&settings.rules, days_left);
        let attempt = send_reminder(
            resources,
            &settings.email_template,
            detail,
            now,
            days_left,
            display_rule,
            threshold_days,
        )
        .await;
        match attempt {
            Ok(()) => {
                // Only a confirmed send is recorded; a failure stays
                // unmarked and is retried by the next scan.
                sends::mark_sent_on(&resources.db, detail.id, today, Utc::now()).await?;
                stats.sent += 1;
            }
            Err(err) => {
                stats.errors += 1;
                warn!(
                    subscription_id = detail.id,
                    customer = %detail.customer_email,
                    error = %err,
                    "reminder send failed"
                );
            }
        }
    }

    Ok(stats)
}

/// Sends immediately for one subscription, bypassing the window check but
/// still writing the daily record so the next automatic scan on the same day
/// skips it.
pub async fn send_subscription_now(
    resources: &AppResources,
    subscription_id: i32,
) -> Result<SendOutcome, EngineError> {
    let (now, today) = local_now(resources.config.tz());
    let settings = ReminderSettings::load(&resources.db).await?;

    let Some(detail) = subscriptions::get_detail(&resources.db, subscription_id).await? else {
        return Ok(SendOutcome::failed("subscription_not_found"));
    };
    if detail.customer_email.trim().is_empty() {
        return Ok(SendOutcome::failed("customer_email_empty"));
    }

    let days_left = days_until(detail.expires_at, today);
    let display_rule = pick_display_rule(&settings.rules, days_left);
    send_reminder(
        resources,
        &settings.email_template,
        &detail,
        now,
        days_left,
        display_rule,
        settings.auto_threshold(),
    )
    .await
    .map_err(EngineError::from)?;

    sends::mark_sent_on(&resources.db, subscription_id, today, Utc::now()).await?;
    info!(
        subscription_id,
        to = %detail.customer_email,
        "manual reminder sent"
    );
    Ok(SendOutcome::delivered(
        detail.customer_email,
        today,
        days_left,
    ))
}

/// Sends the renewal confirmation and marks today's daily record on success,
/// which deliberately suppresses that subscription's ordinary reminder on
/// the day the renewal notice just went out.
pub async fn send_renewal_confirm(
    resources: &AppResources,
    subscription_id: i32,
    old_expires_at: NaiveDate,
    new_expires_at: NaiveDate,
    renew_days: i64,
) -> Result<SendOutcome, EngineError> {
    let (now, today) = local_now(resources.config.tz());
    let settings = ReminderSettings::load(&resources.db).await?;

    let Some(detail) = subscriptions::get_detail(&resources.db, subscription_id).await? else {
        return Ok(SendOutcome::failed("subscription_not_found"));
    };
    let to = detail.customer_email.trim().to_string();
    if to.is_empty() {
        return Ok(SendOutcome::failed("customer_email_empty"));
    }

    let days_left = days_until(new_expires_at, today);
    let ctx = context! {
        old_expires_at => old_expires_at.to_string(),
        new_expires_at => new_expires_at.to_string(),
        renew_days => renew_days,
        ..base_context(&detail, now, days_left, 0, &resources.config)
    };
    let (subject, html) = render::render(&settings.renewal_template, &ctx)?;
    resources.mailer.send_html(&to, &subject, &html).await?;

    sends::mark_sent_on(&resources.db, subscription_id, today, Utc::now()).await?;
    info!(subscription_id, to = %to, "renewal confirmation sent");
    Ok(SendOutcome::delivered(to, today, days_left))
}

/// Admin renewal action: push the expiry forward by `add_days` from whichever
/// is later, the current expiry or today, then send the confirmation. The
/// expiry mutation stands even when the confirmation mail fails.
pub async fn renew_subscription(
    resources: &AppResources,
    subscription_id: i32,
    add_days: i64,
) -> Result<RenewalOutcome, EngineError> {
    let (_, today) = local_now(resources.config.tz());

    let detail = subscriptions::get_detail(&resources.db, subscription_id)
        .await?
        .ok_or(StoreError::NotFound("subscription"))?;
    let old_expires_at = detail.expires_at;
    let new_expires_at = compute_renewal(old_expires_at, today, add_days);

    subscriptions::update_expiry(&resources.db, subscription_id, new_expires_at).await?;

    let confirmation = match send_renewal_confirm(
        resources,
        subscription_id,
        old_expires_at,
        new_expires_at,
        add_days,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(
                subscription_id,
                error = %err,
                "renewal confirmation failed; expiry update stands"
            );
            SendOutcome::failed("confirmation_send_failed")
        }
    };

    Ok(RenewalOutcome {
        subscription_id,
        old_expires_at,
        new_expires_at,
        confirmation,
    })
}

/// New expiry for a renewal: `add_days` on top of the current expiry, or on
/// top of today once the subscription has already lapsed.
pub fn compute_renewal(old_expires_at: NaiveDate, today: NaiveDate, add_days: i64) -> NaiveDate {
    let base = if old_expires_at >= today {
        old_expires_at
    } else {
        today
    };
    base + Duration::days(add_days)
}

async fn send_reminder(
    resources: &AppResources,
    template: &TemplateDoc,
    detail: &SubscriptionDetail,
    now: DateTime<Tz>,
    days_left: i64,
    display_rule: i64,
    threshold_days: i64,
) -> Result<(), SendError> {
    let to = detail.customer_email.trim();
    if to.is_empty() {
        return Err(SendError::Mail(MailError::EmptyRecipient));
    }
    let ctx = context! {
        threshold => threshold_days,
        ..base_context(detail, now, days_left, display_rule, &resources.config)
    };
    let (subject, html) = render::render(template, &ctx)?;
    resources.mailer.send_html(to, &subject, &html).await?;
    Ok(())
}

fn base_context(
    detail: &SubscriptionDetail,
    now: DateTime<Tz>,
    days_left: i64,
    days_before: i64,
    config: &AppConfig,
) -> minijinja::Value {
    // The template-facing `product` merges the catalog row with the
    // subscription: its expiry, and the note overriding the shared content.
    let content = detail
        .note
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| detail.product_content.clone());

    context! {
        customer => context! {
            id => detail.customer_id,
            email => detail.customer_email,
            name => detail.customer_name,
        },
        product => context! {
            id => detail.product_id,
            name => detail.product_name,
            content => content,
            expires_at => detail.expires_at.to_string(),
        },
        product_def => context! {
            id => detail.product_id,
            name => detail.product_name,
            content => detail.product_content,
        },
        subscription => context! {
            id => detail.id,
            customer_id => detail.customer_id,
            product_id => detail.product_id,
            expires_at => detail.expires_at.to_string(),
            note => detail.note,
        },
        days_before => days_before,
        days_left => days_left,
        now => now.to_rfc3339_opts(SecondsFormat::Secs, false),
        company => config.company_name,
        contact_name => config.contact_name,
        contact_url => config.contact_url,
    }
}
