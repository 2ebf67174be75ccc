//! Outbound mail transport on top of lettre.
//!
//! Messages go out as `multipart/alternative` with a plain-text part
//! synthesized from the HTML body, plus the standard anti-auto-reply
//! headers. The trait seam exists so the engine can run against a recording
//! mailer in tests.

use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::error::MailError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport from config. Port 465 means implicit TLS; any
    /// other port attempts an opportunistic STARTTLS upgrade before
    /// authenticating.
    pub fn from_config(smtp: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = smtp.from.parse()?;

        let mut builder = if smtp.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.server)?
        } else {
            let tls = TlsParameters::new(smtp.server.clone())?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.server)
                .tls(Tls::Opportunistic(tls))
        };
        builder = builder
            .port(smtp.port)
            .timeout(Some(Duration::from_secs(smtp.timeout_seconds)));
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(MailError::EmptyRecipient);
        }

        let message = Message::builder()
            .from(self.from.clone())
            .reply_to(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(lettre::message::header::MIME_VERSION_1_0)
            .header(AutoSubmittedHeader::from("auto-generated".to_string()))
            .header(AutoResponseSuppressHeader::from("All".to_string()))
            .message_id(None)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(html_to_text(html)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }
}

static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static P_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static P_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p\b[^>]*>").unwrap());
static LI_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</li\s*>").unwrap());
static LI_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li\b[^>]*>").unwrap());
static BLOCK_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(?:div|h\d|ul|ol|table|tr)>").unwrap());
static HR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<hr\b[^>]*>").unwrap());
static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0b\x0c]+").unwrap());
static MULTI_NL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Small HTML to text conversion, enough to provide a text/plain part for
/// the multipart message.
pub fn html_to_text(html: &str) -> String {
    let s = html.replace('\r', "");
    let s = BR_RE.replace_all(&s, "\n");
    let s = P_CLOSE_RE.replace_all(&s, "\n\n");
    let s = P_OPEN_RE.replace_all(&s, "");
    let s = LI_CLOSE_RE.replace_all(&s, "\n");
    let s = LI_OPEN_RE.replace_all(&s, "\u{2022} ");
    let s = BLOCK_CLOSE_RE.replace_all(&s, "\n");
    let s = HR_RE.replace_all(&s, "\n----------------\n");
    let s = SCRIPT_RE.replace_all(&s, "");
    let s = STYLE_RE.replace_all(&s, "");
    let s = TAG_RE.replace_all(&s, "");
    let s = unescape_entities(&s);
    let s = s.replace('\u{a0}', " ");
    let s = WS_RE.replace_all(&s, " ");
    let s = s.trim();
    let s = s.replace(" \n", "\n").replace("\n ", "\n");
    let s = MULTI_NL_RE.replace_all(&s, "\n\n").into_owned();
    if s.is_empty() {
        "(no content)".to_string()
    } else {
        s
    }
}

fn unescape_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// `Auto-Submitted: auto-generated`, hinting that the mail is automated so
/// receiving systems suppress vacation replies and loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSubmittedHeader(String);

impl Header for AutoSubmittedHeader {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Auto-Submitted")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn core::error::Error + Send + Sync>> {
        Ok(Self(s.into()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

impl From<String> for AutoSubmittedHeader {
    fn from(content: String) -> Self {
        Self(content)
    }
}

/// `X-Auto-Response-Suppress: All` for Exchange-family receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoResponseSuppressHeader(String);

impl Header for AutoResponseSuppressHeader {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Auto-Response-Suppress")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn core::error::Error + Send + Sync>> {
        Ok(Self(s.into()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

impl From<String> for AutoResponseSuppressHeader {
    fn from(content: String) -> Self {
        Self(content)
    }
}
