//! Two-strategy MIME decoding with output-quality scoring.
//!
//! Both strategies produce the same [`DecodedMessage`] shape and differ only
//! in how 8-bit header and body text is mapped to Unicode: the primary path
//! uses `mail-parser`'s native charset conversion, the fallback uses
//! `mailparse`'s. Nothing here fixes bad encoding itself — the decoder
//! detects when the primary produced visibly garbled output and prefers the
//! fallback, then runs every text field through the charset normalizer.

use std::collections::BTreeMap;

use mail_parser::{MessageParser, MimeHeaders};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::decode::charset::{TextScore, normalize_header};
use crate::decode::message::{DecodedAttachment, DecodedMessage};
use crate::error::DecodeError;

/// Fields are scored on a bounded prefix to keep the cost of pathological
/// bodies flat.
const SCORE_PREFIX_CHARS: usize = 4096;

/// A way of turning raw message octets into a [`DecodedMessage`].
///
/// Strategies are chosen statically at construction time; the decoder picks
/// between their outputs per message.
pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, raw: &[u8]) -> Result<DecodedMessage, DecodeError>;
}

/// MIME decoder that scores two strategies against each other.
pub struct MimeDecoder {
    primary: Box<dyn DecodeStrategy>,
    fallback: Box<dyn DecodeStrategy>,
}

impl MimeDecoder {
    pub fn new(primary: Box<dyn DecodeStrategy>, fallback: Box<dyn DecodeStrategy>) -> Self {
        Self { primary, fallback }
    }

    /// The production strategy pair.
    pub fn with_default_strategies() -> Self {
        Self::new(Box::new(MailParserStrategy), Box::new(MailparseStrategy))
    }

    /// Decode raw message octets into a structured message.
    ///
    /// Fails with a parse error only on structurally invalid input; garbled
    /// but well-framed messages always decode, through one strategy or the
    /// other.
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
        if raw.is_empty() {
            return Err(DecodeError::Parse("empty message".into()));
        }

        let mut msg = match self.primary.decode(raw) {
            Ok(primary) => {
                let primary_score = garble_score(&primary);
                if primary_score == 0 {
                    primary
                } else {
                    // Visible damage: see whether the other charset path
                    // does better. Ties keep the primary.
                    match self.fallback.decode(raw) {
                        Ok(alt) if garble_score(&alt) < primary_score => {
                            tracing::debug!(
                                primary = self.primary.name(),
                                fallback = self.fallback.name(),
                                "Fallback decode scored better"
                            );
                            alt
                        }
                        _ => primary,
                    }
                }
            }
            Err(primary_err) => {
                tracing::debug!(
                    primary = self.primary.name(),
                    error = %primary_err,
                    "Primary decode failed, falling back"
                );
                self.fallback.decode(raw)?
            }
        };

        msg.headers = header_map(raw);

        // Subject second pass: decode RFC 2047 words straight from the raw
        // header line, which the general decoder may already have degraded.
        if let Some(candidate) = rfc2047_subject(raw)
            && TextScore::of(&candidate).badness() < TextScore::of(&msg.subject).badness()
        {
            msg.subject = candidate;
        }

        msg.subject = normalize_header(&msg.subject);
        msg.from = normalize_header(&msg.from);
        for to in &mut msg.to {
            *to = normalize_header(to);
        }
        msg.text_body = normalize_header(&msg.text_body);
        msg.html_body = normalize_header(&msg.html_body);

        Ok(msg)
    }
}

/// Total damage score over the fields a bad charset mapping garbles.
pub(crate) fn garble_score(msg: &DecodedMessage) -> usize {
    let mut total = TextScore::of(score_prefix(&msg.subject)).badness()
        + TextScore::of(score_prefix(&msg.text_body)).badness()
        + TextScore::of(score_prefix(&msg.html_body)).badness()
        + TextScore::of(score_prefix(&msg.from)).badness();
    for to in &msg.to {
        total += TextScore::of(score_prefix(to)).badness();
    }
    total
}

fn score_prefix(text: &str) -> &str {
    match text.char_indices().nth(SCORE_PREFIX_CHARS) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Header mapping from the raw header block: first occurrence wins, key
/// case preserved as received, values RFC 2047-decoded and unfolded.
fn header_map(raw: &[u8]) -> BTreeMap<String, String> {
    let Ok((headers, _)) = mailparse::parse_headers(raw) else {
        return BTreeMap::new();
    };
    let mut map = BTreeMap::new();
    for h in &headers {
        map.entry(h.get_key()).or_insert_with(|| h.get_value());
    }
    map
}

/// RFC 2047 decode of the subject from the raw header line.
fn rfc2047_subject(raw: &[u8]) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(raw).ok()?;
    headers.get_first_value("Subject")
}

// ── Primary strategy: mail-parser ───────────────────────────────────

/// Decode via `mail-parser`, which converts charsets natively.
pub struct MailParserStrategy;

impl DecodeStrategy for MailParserStrategy {
    fn name(&self) -> &'static str {
        "mail-parser"
    }

    fn decode(&self, raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| DecodeError::Parse("unparseable message structure".into()))?;

        let mut msg = DecodedMessage {
            subject: parsed.subject().unwrap_or_default().to_string(),
            from: collect_addresses(parsed.from()).join(", "),
            to: collect_addresses(parsed.to()),
            text_body: parsed
                .body_text(0)
                .map(|body| body.into_owned())
                .unwrap_or_default(),
            html_body: parsed
                .body_html(0)
                .map(|body| body.into_owned())
                .unwrap_or_default(),
            ..Default::default()
        };

        for (index, part) in parsed.attachments().enumerate() {
            let content = part.contents().to_vec();
            msg.attachments.push(DecodedAttachment {
                filename: part.attachment_name().map(String::from),
                content_type: part.content_type().map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                }),
                size: content.len(),
                content_id: part.content_id().map(String::from),
                content,
                index,
            });
        }

        Ok(msg)
    }
}

fn collect_addresses(addr: Option<&mail_parser::Address<'_>>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs.iter().map(display_address).collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().map(display_address))
            .collect(),
    }
}

fn display_address(addr: &mail_parser::Addr<'_>) -> String {
    match (addr.name.as_deref(), addr.address.as_deref()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (None, Some(email)) => email.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

// ── Fallback strategy: mailparse ────────────────────────────────────

/// Decode via `mailparse`, whose charset conversion goes through
/// `charset`/`encoding_rs`.
pub struct MailparseStrategy;

impl DecodeStrategy for MailparseStrategy {
    fn name(&self) -> &'static str {
        "mailparse"
    }

    fn decode(&self, raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
        let mail = mailparse::parse_mail(raw).map_err(|e| DecodeError::Parse(e.to_string()))?;

        let mut msg = DecodedMessage {
            subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
            from: mail
                .headers
                .get_first_value("From")
                .map(|v| display_addresses(&v).join(", "))
                .unwrap_or_default(),
            to: mail
                .headers
                .get_first_value("To")
                .map(|v| display_addresses(&v))
                .unwrap_or_default(),
            ..Default::default()
        };

        let mut index = 0;
        collect_parts(&mail, &mut msg, &mut index)?;
        Ok(msg)
    }
}

fn collect_parts(
    part: &ParsedMail<'_>,
    msg: &mut DecodedMessage,
    index: &mut usize,
) -> Result<(), DecodeError> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, msg, index)?;
        }
        return Ok(());
    }

    let mimetype = part.ctype.mimetype.to_lowercase();
    if mimetype.starts_with("multipart/") {
        return Ok(());
    }

    let disposition = part.get_content_disposition();
    let is_attachment = matches!(disposition.disposition, DispositionType::Attachment);

    if !is_attachment && mimetype == "text/plain" && msg.text_body.is_empty() {
        msg.text_body = part
            .get_body()
            .map_err(|e| DecodeError::Parse(e.to_string()))?;
    } else if !is_attachment && mimetype == "text/html" && msg.html_body.is_empty() {
        msg.html_body = part
            .get_body()
            .map_err(|e| DecodeError::Parse(e.to_string()))?;
    } else {
        let content = part
            .get_body_raw()
            .map_err(|e| DecodeError::Parse(e.to_string()))?;
        msg.attachments.push(DecodedAttachment {
            filename: disposition
                .params
                .get("filename")
                .or_else(|| part.ctype.params.get("name"))
                .cloned(),
            content_type: Some(part.ctype.mimetype.clone()),
            size: content.len(),
            content_id: part
                .headers
                .get_first_value("Content-ID")
                .map(|cid| cid.trim_matches(['<', '>']).to_string()),
            content,
            index: *index,
        });
        *index += 1;
    }

    Ok(())
}

fn display_addresses(value: &str) -> Vec<String> {
    match mailparse::addrparse(value) {
        Ok(list) => {
            let mut out = Vec::new();
            for addr in list.iter() {
                match addr {
                    mailparse::MailAddr::Single(single) => out.push(display_single(single)),
                    mailparse::MailAddr::Group(group) => {
                        out.extend(group.addrs.iter().map(display_single));
                    }
                }
            }
            out
        }
        Err(_) => vec![value.to_string()],
    }
}

fn display_single(single: &mailparse::SingleInfo) -> String {
    match &single.display_name {
        Some(name) if !name.is_empty() => format!("{name} <{}>", single.addr),
        _ => single.addr.clone(),
    }
}
