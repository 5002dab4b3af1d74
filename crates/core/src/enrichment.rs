//! Event enrichment from request metadata.
//!
//! Parses the user agent with woothee (browser, OS, device category),
//! falls back to `Accept-Language` for the language, and normalizes the
//! CDN country hint.

use woothee::parser::Parser;

use crate::event::{ClientHints, TrackingEvent};

/// Stateless enricher applied to each event before persistence.
pub struct Enricher {
    parser: Parser,
}

impl Enricher {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Fill derived fields that the client did not supply.
    pub fn enrich(&self, event: &mut TrackingEvent, hints: &ClientHints) {
        self.enrich_user_agent(event);

        if event.language.is_none() {
            event.language = hints.accept_language.as_deref().and_then(primary_language);
        }

        event.country = event
            .country
            .take()
            .or_else(|| hints.country.clone())
            .and_then(|c| normalize_country(&c));
    }

    fn enrich_user_agent(&self, event: &mut TrackingEvent) {
        if event.user_agent.is_empty() {
            return;
        }

        let Some(result) = self.parser.parse(&event.user_agent) else {
            event.device_type.get_or_insert_with(|| "unknown".to_string());
            return;
        };

        if !result.name.is_empty() && result.name != "UNKNOWN" {
            event.browser = Some(result.name.to_string());
        }
        if !result.os.is_empty() && result.os != "UNKNOWN" {
            event.os = Some(result.os.to_string());
        }

        // woothee categories: pc, smartphone, mobilephone, crawler, appliance, misc
        let device_type = match result.category {
            "pc" => "desktop",
            "smartphone" | "mobilephone" => "mobile",
            "crawler" => "bot",
            "appliance" | "misc" => "other",
            _ => "unknown",
        };
        event.device_type = Some(device_type.to_string());
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

/// First tag of an `Accept-Language` header, without its quality value.
fn primary_language(header: &str) -> Option<String> {
    let tag = header.split(',').next()?.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" || tag.len() > crate::limits::MAX_LANGUAGE_LEN {
        return None;
    }
    Some(tag.to_string())
}

/// Two-letter upper-case country code; `XX` and `T1` (unknown, Tor) are dropped.
fn normalize_country(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if code == "XX" || code == "T1" {
        return None;
    }
    Some(code)
}
