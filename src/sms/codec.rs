//! SMS wire codec (spec §4.2): reversible compression of a request tuple
//! into <= 160 ASCII characters, and decoding of gateway reply bodies.
//!
//! Pure, synchronous, allocation-only — no I/O, no dependency on the rest
//! of the crate beyond [`crate::core::result`]. Deliberately hand-rolled
//! instead of reaching for `regex`: the two patterns involved (`CMD` table
//! lookup, `^[A-Z]+[0-9]+$` id shape) are cheap to recognize with plain
//! `char` iteration and the crate otherwise has no other use for a regex
//! engine.

use crate::core::result::{Error, Result};

const MAX_SMS_LEN: usize = 160;
const FIELD_SEP: char = '#';

/// A decoded request tuple, field-for-field with the wire shape
/// `CMD#ID#AMOUNT#USER#AUTH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRequest {
    pub command: String,
    pub id: String,
    pub amount: String,
    pub user: String,
    pub auth: String,
}

impl SmsRequest {
    pub fn new(
        command: impl Into<String>,
        id: impl Into<String>,
        amount: impl Into<String>,
        user: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            id: id.into(),
            amount: amount.into(),
            user: user.into(),
            auth: auth.into(),
        }
    }
}

/// Parsed gateway reply (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayReply {
    /// `OK#<id>#<k:v>...` — success.
    Ok { id: String, fields: Vec<(String, String)> },
    /// `ERR#<id>#<code>[#<k:v>...]` — error.
    Err { id: String, code: String, fields: Vec<(String, String)> },
    /// Anything else: treated as a success with the raw body.
    Raw(String),
}

impl GatewayReply {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayReply::Ok { .. } | GatewayReply::Raw(_) => 200,
            GatewayReply::Err { .. } => 400,
        }
    }
}

fn command_table() -> &'static [(&'static str, &'static str)] {
    &[
        ("TRANSFER", "T"),
        ("PAYMENT", "P"),
        ("BALANCE", "B"),
        ("DEPOSIT", "D"),
        ("WITHDRAWAL", "W"),
        ("VERIFY", "V"),
    ]
}

fn compress_command(command: &str) -> String {
    let upper = command.to_ascii_uppercase();
    command_table()
        .iter()
        .find(|(long, _)| *long == upper)
        .map(|(_, short)| short.to_string())
        .unwrap_or(command.to_string())
}

fn expand_command(short: &str) -> String {
    command_table()
        .iter()
        .find(|(_, s)| *s == short)
        .map(|(long, _)| long.to_string())
        .unwrap_or(short.to_string())
}

/// Compress an amount per spec §4.2: `>= 1_000_000` -> `<n>M`, `>= 1_000` ->
/// `<n>K`, else the plain integer string. Strips a trailing `.0`.
fn compress_amount(amount: &str) -> String {
    let Ok(value) = amount.parse::<f64>() else {
        return amount.to_string();
    };

    let format_unit = |scaled: f64, suffix: &str| -> String {
        if scaled.fract().abs() < f64::EPSILON {
            format!("{}{}", scaled as i64, suffix)
        } else {
            format!("{:.1}{}", scaled, suffix)
        }
    };

    if value >= 1_000_000.0 {
        format_unit(value / 1_000_000.0, "M")
    } else if value >= 1_000.0 {
        format_unit(value / 1_000.0, "K")
    } else if value.fract().abs() < f64::EPSILON {
        format!("{}", value as i64)
    } else {
        amount.to_string()
    }
}

fn expand_amount(encoded: &str) -> String {
    let (scale, suffix_len) = if let Some(stripped) = encoded.strip_suffix('M') {
        (1_000_000.0, stripped.len())
    } else if let Some(stripped) = encoded.strip_suffix('K') {
        (1_000.0, stripped.len())
    } else {
        return encoded.to_string();
    };
    let numeric = &encoded[..suffix_len];
    match numeric.parse::<f64>() {
        Ok(value) => {
            let full = value * scale;
            if full.fract().abs() < f64::EPSILON {
                format!("{}", full as i64)
            } else {
                format!("{}", full)
            }
        }
        Err(_) => encoded.to_string(),
    }
}

/// Spec §4.2: if the id matches `^[A-Z]+[0-9]+$`, emit the first letter of
/// the alpha prefix plus the last 4 digits; otherwise the last 6 characters
/// of the raw id. Empty id stays empty.
fn compress_id(id: &str) -> String {
    if id.is_empty() {
        return String::new();
    }
    if let Some((prefix, suffix)) = split_alpha_numeric(id) {
        if let Some(first_letter) = prefix.chars().next() {
            let last_four: String = suffix.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            return format!("{first_letter}{last_four}");
        }
    }
    id.chars().rev().take(6).collect::<Vec<_>>().into_iter().rev().collect()
}

/// Returns `Some((alpha_prefix, digit_suffix))` iff `id` is one-or-more
/// uppercase ASCII letters followed by one-or-more ASCII digits and nothing
/// else (the `^[A-Z]+[0-9]+$` shape from spec §4.2).
fn split_alpha_numeric(id: &str) -> Option<(&str, &str)> {
    let split_at = id.find(|c: char| c.is_ascii_digit())?;
    let (prefix, suffix) = id.split_at(split_at);
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((prefix, suffix))
}

/// Encode a request tuple into the `CMD#ID#AMOUNT#USER#AUTH` wire shape.
/// Fails with [`Error::SmsTooLarge`] if the result exceeds 160 characters.
pub fn encode(request: &SmsRequest) -> Result<String> {
    let fields = [
        compress_command(&request.command),
        compress_id(&request.id),
        compress_amount(&request.amount),
        request.user.clone(),
        request.auth.clone(),
    ];
    let encoded = fields.join(&FIELD_SEP.to_string());
    if encoded.len() > MAX_SMS_LEN {
        return Err(Error::SmsTooLarge { len: encoded.len() });
    }
    Ok(encoded)
}

/// Decode a previously-encoded wire string. Never fails per spec §4.2:
/// unrecognizable input yields a single-field result with everything else
/// left empty.
pub fn decode(wire: &str) -> SmsRequest {
    let mut fields = wire.splitn(5, FIELD_SEP);
    let command = fields.next().unwrap_or_default();
    let id = fields.next().unwrap_or_default();
    let amount = fields.next().unwrap_or_default();
    let user = fields.next().unwrap_or_default();
    let auth = fields.next().unwrap_or_default();
    SmsRequest::new(expand_command(command), id, expand_amount(amount), user, auth)
}

/// Parse a gateway reply body (spec §4.2).
pub fn decode_gateway_reply(body: &str) -> GatewayReply {
    let mut parts = body.split(FIELD_SEP);
    match parts.next() {
        Some("OK") => {
            let id = parts.next().unwrap_or_default().to_string();
            GatewayReply::Ok { id, fields: parse_kv_fields(parts) }
        }
        Some("ERR") => {
            let id = parts.next().unwrap_or_default().to_string();
            let code = parts.next().unwrap_or_default().to_string();
            GatewayReply::Err { id, code, fields: parse_kv_fields(parts) }
        }
        _ => GatewayReply::Raw(body.to_string()),
    }
}

fn parse_kv_fields<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    parts
        .filter_map(|field| field.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
