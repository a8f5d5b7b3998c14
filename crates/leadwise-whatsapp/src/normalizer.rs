// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw session-gateway message to [`NormalizedMessage`].
//!
//! The gateway forwards messages in the multi-device web client shape:
//! `key.remoteJid`, `key.id`, `key.fromMe`, `key.participant`, a `message`
//! object with one typed sub-object, `messageTimestamp`, and `pushName`.
//! Missing pieces default to empty values; normalization never fails.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use leadwise_core::types::{ContentType, NormalizedMessage};
use serde_json::Value;

const USER_SUFFIXES: &[&str] = &["@s.whatsapp.net", "@c.us", "@g.us", "@lid", "@broadcast"];
const STATUS_BROADCAST: &str = "status@broadcast";

/// Strips the transport suffix and any device part from an address.
///
/// `15551234567:12@s.whatsapp.net` becomes `15551234567`.
pub fn strip_address(jid: &str) -> String {
    let mut address = jid;
    for suffix in USER_SUFFIXES {
        if let Some(stripped) = address.strip_suffix(suffix) {
            address = stripped;
            break;
        }
    }
    address.split(':').next().unwrap_or(address).to_string()
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Parses `messageTimestamp`, which arrives as seconds in a number, a
/// string, or a `{low, high}` long object.
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    let secs = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Object(o) => o.get("low").and_then(Value::as_i64).map(|low| {
            let high = o.get("high").and_then(Value::as_i64).unwrap_or(0);
            (high << 32) | (low & 0xFFFF_FFFF)
        }),
        _ => None,
    }?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Accepts a sender clock up to this far ahead of ours.
const MAX_CLOCK_SKEW_SECS: i64 = 24 * 60 * 60;

/// Keeps transport timestamps between the epoch and a day past `now`.
fn plausible(ts: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let skew = TimeDelta::try_seconds(MAX_CLOCK_SKEW_SECS)?;
    let latest = now.checked_add_signed(skew)?;
    (ts.timestamp() >= 0 && ts <= latest).then_some(ts)
}

/// Content, content type, and media URL from the `message` object.
fn extract_content(message: &Value) -> (String, ContentType, Option<String>) {
    if let Some(text) = str_at(message, &["conversation"])
        .or_else(|| str_at(message, &["extendedTextMessage", "text"]))
    {
        return (text.to_string(), ContentType::Text, None);
    }

    let media = |key: &str| message.get(key).filter(|v| v.is_object());
    let url = |v: &Value| str_at(v, &["url"]).map(str::to_string);

    if let Some(image) = media("imageMessage") {
        let caption = str_at(image, &["caption"]).unwrap_or("Image message");
        return (caption.to_string(), ContentType::Image, url(image));
    }
    if let Some(video) = media("videoMessage") {
        let caption = str_at(video, &["caption"]).unwrap_or("Video message");
        return (caption.to_string(), ContentType::Video, url(video));
    }
    if let Some(doc) = media("documentMessage") {
        let caption = str_at(doc, &["caption"])
            .or_else(|| str_at(doc, &["fileName"]))
            .unwrap_or("Document message");
        return (caption.to_string(), ContentType::Document, url(doc));
    }
    if let Some(audio) = media("audioMessage") {
        let voice = audio.get("ptt").and_then(Value::as_bool).unwrap_or(false);
        return if voice {
            ("Voice message".to_string(), ContentType::VoiceNote, url(audio))
        } else {
            ("Audio message".to_string(), ContentType::Audio, url(audio))
        };
    }
    if let Some(sticker) = media("stickerMessage") {
        return ("Sticker message".to_string(), ContentType::Sticker, url(sticker));
    }
    if let Some(location) = media("locationMessage") {
        let lat = location.get("degreesLatitude").and_then(Value::as_f64);
        let lng = location.get("degreesLongitude").and_then(Value::as_f64);
        let content = match (lat, lng) {
            (Some(lat), Some(lng)) => format!("Location: {lat},{lng}"),
            _ => "Location message".to_string(),
        };
        return (content, ContentType::Location, None);
    }

    ("Unsupported message".to_string(), ContentType::Unsupported, None)
}

/// Converts a raw gateway message into its canonical form.
///
/// `recipient` is the gateway's `ownerJid` annotation when present. For
/// self-sent messages sender and recipient swap roles.
pub fn normalize(raw: &Value) -> NormalizedMessage {
    let remote_jid = str_at(raw, &["key", "remoteJid"]).unwrap_or_default();
    let is_group = remote_jid.ends_with("@g.us");
    let is_status_broadcast = remote_jid == STATUS_BROADCAST;
    let from_me = raw
        .pointer("/key/fromMe")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let remote = if is_group {
        str_at(raw, &["key", "participant"])
            .map(strip_address)
            .unwrap_or_default()
    } else {
        strip_address(remote_jid)
    };
    let owner = str_at(raw, &["ownerJid"]).map(strip_address).unwrap_or_default();
    let (sender, recipient) = if from_me { (owner, remote) } else { (remote, owner) };

    let (content, content_type, media_url) = raw
        .get("message")
        .filter(|m| m.is_object())
        .map(extract_content)
        .unwrap_or_else(|| (String::new(), ContentType::Unsupported, None));

    let now = Utc::now();
    let timestamp = raw
        .get("messageTimestamp")
        .and_then(parse_timestamp)
        .and_then(|ts| plausible(ts, now))
        .unwrap_or(now);

    NormalizedMessage {
        external_id: str_at(raw, &["key", "id"]).unwrap_or_default().to_string(),
        sender,
        recipient,
        content,
        content_type,
        timestamp,
        media_url,
        push_name: str_at(raw, &["pushName"]).map(str::to_string),
        is_group,
        is_status_broadcast,
        from_me,
    }
}
