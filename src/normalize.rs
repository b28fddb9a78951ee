//! Text and link normalization.
//!
//! [`clean`] turns scraped text into something fit for classification and
//! display: entity decoding, mojibake repair, Unicode NFKC, control-character
//! stripping, boilerplate removal, punctuation spacing, whitespace collapse and
//! sentence capitalization.
//!
//! [`canonical_link`] and [`dedupe`] produce the deduplication key: an absolute
//! http(s) URL with fragments and tracking parameters removed, so
//! `/news/story` and `/news/story#comments` collapse into a single entry.

use crate::models::{NormalizedHeadline, RawHeadline};
use crate::utils::upcase;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// UTF-8 text that was decoded as Windows-1252 and re-encoded.
/// Longer sequences come first so prefixes don't shadow them.
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€\u{9d}", "\u{201D}"),
    ("â€™", "\u{2019}"),
    ("â€˜", "\u{2018}"),
    ("â€œ", "\u{201C}"),
    ("â€“", "\u{2013}"),
    ("â€”", "\u{2014}"),
    ("â€¦", "\u{2026}"),
    ("â€¢", "\u{2022}"),
    ("â€", "\u{201D}"),
    ("Â\u{a0}", " "),
    ("Â«", "\u{00AB}"),
    ("Â»", "\u{00BB}"),
    ("Â£", "\u{00A3}"),
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ãª", "ê"),
    ("Ã«", "ë"),
    ("Ã¡", "á"),
    ("Ã\u{a0}", "à"),
    ("Ã¢", "â"),
    ("Ã¤", "ä"),
    ("Ã£", "ã"),
    ("Ã§", "ç"),
    ("Ã\u{ad}", "í"),
    ("Ã¯", "ï"),
    ("Ã³", "ó"),
    ("Ã´", "ô"),
    ("Ã¶", "ö"),
    ("Ãµ", "õ"),
    ("Ãº", "ú"),
    ("Ã¼", "ü"),
    ("Ã±", "ñ"),
    ("Ã‰", "É"),
];

/// Sentences containing any of these are site chrome, not article text.
const BOILERPLATE: &[&str] = &[
    "under maintenance",
    "scheduled maintenance",
    "temporarily unavailable",
    "subscribe to our newsletter",
    "sign up for our",
    "sign up for the",
    "all rights reserved",
    "cookie policy",
    "accept cookies",
    "enable javascript",
    "advertisement",
    "click here to",
    "follow us on",
];

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());
static RE_MISSING_SPACE_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,;!?])([A-Za-z])").unwrap());
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());

/// Repair known mis-encoded byte sequences.
pub fn fix_mojibake(text: &str) -> String {
    if !text.contains('â') && !text.contains('Ã') && !text.contains('Â') {
        return text.to_string();
    }
    MOJIBAKE
        .iter()
        .fold(text.to_string(), |acc, (bad, good)| acc.replace(bad, good))
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}' | '\u{00AD}'
    ) || (c.is_control() && !c.is_whitespace())
}

/// Titles and short forms whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs", "gov", "sen", "rep", "gen", "lt",
    "col", "sgt", "capt", "rev", "inc", "corp", "ltd", "no", "approx",
];

/// Whether the last word of `chunk` is an abbreviation such as `U.S.` or `Dr.`.
fn ends_with_abbreviation(chunk: &str) -> bool {
    let Some(word) = chunk.split_whitespace().last() else {
        return false;
    };
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
    let Some(stem) = word.strip_suffix('.') else {
        return false;
    };
    let initials = stem
        .split('.')
        .all(|part| part.chars().count() == 1 && part.chars().all(char::is_alphabetic));
    initials || ABBREVIATIONS.contains(&stem.to_lowercase().as_str())
}

/// Split after `.`, `!` or `?` when followed by whitespace, except after abbreviations.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (i, c) in text.char_indices() {
        if prev_terminal && c.is_whitespace() && !ends_with_abbreviation(&text[start..i]) {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = i;
        }
        prev_terminal = matches!(c, '.' | '!' | '?');
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn is_boilerplate(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    BOILERPLATE.iter().any(|marker| lower.contains(marker))
}

/// Normalize scraped text for classification and display.
pub fn clean(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let untagged = RE_TAGS.replace_all(&decoded, " ");
    let repaired = fix_mojibake(&untagged);

    let normalized: String = repaired
        .nfkc()
        .filter(|c| !is_invisible(*c))
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            other => other,
        })
        .collect();

    let collapsed = RE_WS.replace_all(&normalized, " ");
    let spaced = RE_SPACE_BEFORE_PUNCT.replace_all(collapsed.trim(), "$1");
    let spaced = RE_MISSING_SPACE_AFTER.replace_all(&spaced, "$1 $2");

    split_sentences(&spaced)
        .into_iter()
        .filter(|s| !is_boilerplate(s))
        .map(upcase)
        .join(" ")
}

/// Absolute, fragment-free, tracking-free form of `link` resolved against `base`.
///
/// Returns `None` for non-http(s) targets (`mailto:`, `javascript:`) and links
/// that cannot be resolved.
pub fn canonical_link(base: &Url, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() || link.starts_with('#') {
        return None;
    }
    let mut url = base.join(link).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    Some(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || matches!(key.as_str(), "fbclid" | "gclid" | "ocid" | "cmpid")
}

/// Keep the first headline for each canonical link, preserving order.
pub fn dedupe(headlines: Vec<NormalizedHeadline>) -> Vec<NormalizedHeadline> {
    headlines
        .into_iter()
        .unique_by(|h| h.canonical_link.clone())
        .collect()
}

/// Clean headlines, absolutize their links against `base`, then dedupe.
pub fn normalize_headlines(base: &Url, raw: Vec<RawHeadline>) -> Vec<NormalizedHeadline> {
    let total = raw.len();
    let normalized: Vec<NormalizedHeadline> = raw
        .into_iter()
        .filter_map(|r| {
            let canonical_link = canonical_link(base, &r.link)?;
            let headline = clean(&r.headline);
            if headline.is_empty() {
                return None;
            }
            Some(NormalizedHeadline {
                headline,
                canonical_link,
            })
        })
        .collect();
    let unique = dedupe(normalized);
    debug!(total, unique = unique.len(), "Normalized headlines");
    unique
}

/// Lowercase alphanumeric tokens.
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}
