//! Phone-number heuristics and canonicalization.

use crate::extraction::{Candidate, Canonicalizer, ExtractionHeuristic, FieldExtractor, Snapshot};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

/// Country code applied to domestic numbers when none is configured.
pub const DEFAULT_COUNTRY_CODE: u8 = 1;

/// Context kept around a pattern match, in bytes on either side.
const CONTEXT_RADIUS: usize = 32;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+?\d[\s.\-]?)?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}")
            .expect("phone regex is valid")
    })
}

/// Canonicalize a raw phone string to `+<country><number>`.
///
/// All non-digits are stripped. Ten digits are treated as domestic and
/// get `country_code` prefixed. Eleven digits starting with the country
/// digit are kept; eleven digits starting with anything else have the
/// leading digit replaced. Any other length is rejected.
pub fn canonicalize_phone(raw: &str, country_code: u8) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let cc = char::from_digit(u32::from(country_code), 10)?;
    match digits.len() {
        10 => Some(format!("+{cc}{digits}")),
        11 if digits.starts_with(cc) => Some(format!("+{digits}")),
        11 => Some(format!("+{cc}{}", &digits[1..])),
        _ => None,
    }
}

/// [`Canonicalizer`] for phone numbers with a single-digit country code.
#[derive(Debug, Clone, Copy)]
pub struct PhoneCanonicalizer {
    pub country_code: u8,
}

impl Default for PhoneCanonicalizer {
    fn default() -> Self {
        Self {
            country_code: DEFAULT_COUNTRY_CODE,
        }
    }
}

impl Canonicalizer for PhoneCanonicalizer {
    fn canonicalize(&self, raw: &str) -> Option<String> {
        canonicalize_phone(raw, self.country_code)
    }
}

/// `a[href^="tel:"]` links. The raw value is the link target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelLinkHeuristic;

impl ExtractionHeuristic for TelLinkHeuristic {
    fn name(&self) -> &str {
        "tel_link"
    }

    fn scan(&self, snapshot: &Snapshot) -> Vec<Candidate> {
        let sel = Selector::parse(r#"a[href^="tel:"], a[href^="TEL:"]"#)
            .expect("tel selector is valid");
        snapshot
            .document()
            .select(&sel)
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                let target = href[4..].trim();
                let target = urlencoding::decode(target)
                    .map(|t| t.trim().to_string())
                    .unwrap_or_else(|_| target.to_string());
                if target.is_empty() {
                    return None;
                }
                Some(Candidate::new(target, element_text(&el)))
            })
            .collect()
    }
}

/// Phone numbers in the text next to a phone icon.
///
/// Icons are matched by class, `data-icon` or `aria-label`; the number is
/// searched in the icon's parent element.
#[derive(Debug, Default, Clone, Copy)]
pub struct IconAdjacentHeuristic;

impl ExtractionHeuristic for IconAdjacentHeuristic {
    fn name(&self) -> &str {
        "icon_adjacent"
    }

    fn scan(&self, snapshot: &Snapshot) -> Vec<Candidate> {
        let sel = Selector::parse(
            r#"i[class*="phone"], span[class*="phone-icon"], svg[class*="phone"],
               [data-icon*="phone"], img[alt*="phone"], img[alt*="Phone"],
               [aria-label="phone"], [aria-label="Phone"]"#,
        )
        .expect("icon selector is valid");

        let mut out = Vec::new();
        for icon in snapshot.document().select(&sel) {
            let Some(parent) = icon.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            let context = element_text(&parent);
            if let Some(m) = phone_regex().find(&context) {
                let candidate = Candidate::new(m.as_str(), context.clone());
                if !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
        out
    }
}

/// Regex matches anywhere in the page's visible text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternTextHeuristic;

impl ExtractionHeuristic for PatternTextHeuristic {
    fn name(&self) -> &str {
        "pattern_text"
    }

    fn scan(&self, snapshot: &Snapshot) -> Vec<Candidate> {
        let text = snapshot.text();
        phone_regex()
            .find_iter(text)
            .map(|m| {
                let context = surrounding(text, m.start(), m.end(), CONTEXT_RADIUS);
                Candidate::new(m.as_str().trim(), context)
            })
            .collect()
    }
}

/// Phone extractor with the default priority: icon adjacency, `tel:`
/// links, free-text pattern.
pub fn phone_extractor(country_code: u8) -> FieldExtractor {
    FieldExtractor::new("phone", PhoneCanonicalizer { country_code })
        .heuristic(IconAdjacentHeuristic)
        .heuristic(TelLinkHeuristic)
        .heuristic(PatternTextHeuristic)
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn surrounding(text: &str, start: usize, end: usize, radius: usize) -> String {
    let mut from = start.saturating_sub(radius);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + radius).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_formatted_domestic() {
        assert_eq!(
            canonicalize_phone("(203) 832-4011", 1).as_deref(),
            Some("+12038324011")
        );
    }

    #[test]
    fn test_canonicalize_eleven_digits_with_country_code() {
        assert_eq!(
            canonicalize_phone("12038324011", 1).as_deref(),
            Some("+12038324011")
        );
        assert_eq!(
            canonicalize_phone("+1 (203) 832-4011", 1).as_deref(),
            Some("+12038324011")
        );
    }

    #[test]
    fn test_canonicalize_eleven_digits_wrong_leading_digit() {
        assert_eq!(
            canonicalize_phone("22038324011", 1).as_deref(),
            Some("+12038324011")
        );
    }

    #[test]
    fn test_canonicalize_rejects_other_lengths() {
        assert_eq!(canonicalize_phone("203-832-401", 1), None);
        assert_eq!(canonicalize_phone("", 1), None);
        assert_eq!(canonicalize_phone("447911123456", 1), None);
    }

    #[test]
    fn test_canonicalize_other_country_code() {
        assert_eq!(
            canonicalize_phone("7911123456", 4).as_deref(),
            Some("+47911123456")
        );
        assert_eq!(canonicalize_phone("7911123456", 12), None);
    }

    #[test]
    fn test_tel_link_beats_earlier_text_match() {
        let html = r#"<html><body>
            <p>Fax: 555-999-8888</p>
            <a href="tel:+15551234567">Call the office</a>
        </body></html>"#;
        let extractor = FieldExtractor::new("phone", PhoneCanonicalizer::default())
            .heuristic(TelLinkHeuristic)
            .heuristic(PatternTextHeuristic);
        let result = extractor.extract_html(html);

        assert_eq!(result.final_value.as_deref(), Some("+15551234567"));
        let selected = result.selected.as_ref().unwrap();
        assert_eq!(selected.method, "tel_link");
        assert_eq!(selected.context, "Call the office");
        let by_method = result.candidates_by_method();
        assert_eq!(by_method["pattern_text"][0].raw, "555-999-8888");
    }

    #[test]
    fn test_icon_adjacent_has_top_priority() {
        let html = r#"<html><body>
            <div class="footer">Main line (800) 555-0100</div>
            <a href="tel:8005550199">Sales</a>
            <div class="contact"><i class="fa fa-phone"></i> <span>(203) 832-4011</span></div>
        </body></html>"#;
        let result = phone_extractor(1).extract_html(html);

        assert_eq!(result.final_value.as_deref(), Some("+12038324011"));
        assert_eq!(result.selected.as_ref().unwrap().method, "icon_adjacent");
        assert_eq!(result.reports.len(), 3);
        assert_eq!(result.candidates_by_method()["tel_link"][0].raw, "8005550199");
    }

    #[test]
    fn test_tel_link_target_is_percent_decoded() {
        let html = r#"<body><a href="tel:%2B1%20(555)%20123-4567">Front desk</a></body>"#;
        let result = phone_extractor(1).extract_html(html);

        assert_eq!(result.final_value.as_deref(), Some("+15551234567"));
        let selected = result.selected.as_ref().unwrap();
        assert_eq!(selected.method, "tel_link");
        assert_eq!(selected.raw, "+1 (555) 123-4567");
    }

    #[test]
    fn test_pattern_context_is_captured() {
        let html = "<body><p>Questions? Reach us at 203.832.4011 any weekday.</p></body>";
        let result = phone_extractor(1).extract_html(html);
        let selected = result.selected.unwrap();
        assert_eq!(selected.method, "pattern_text");
        assert_eq!(selected.raw, "203.832.4011");
        assert!(selected.context.contains("Reach us at"));
        assert_eq!(result.final_value.as_deref(), Some("+12038324011"));
    }

    #[test]
    fn test_selected_candidate_rejected_by_canonicalization() {
        let html = r#"<body><a href="tel:911">Emergency</a></body>"#;
        let result = phone_extractor(1).extract_html(html);
        assert!(result.final_value.is_none());
        assert!(matches!(
            result.failure,
            Some(crate::extraction::ExtractionFailure::Rejected { ref raw, .. }) if raw == "911"
        ));
    }

    #[test]
    fn test_no_phone_on_page() {
        let result = phone_extractor(1).extract_html("<body><p>No contact info.</p></body>");
        assert!(!result.is_found());
        assert!(result.reports.iter().all(|r| r.candidates.is_empty()));
    }

    #[test]
    fn test_surrounding_respects_char_boundaries() {
        let text = "ééééé 203-832-4011 ééééé";
        let m = phone_regex().find(text).unwrap();
        let ctx = surrounding(text, m.start(), m.end(), 3);
        assert!(ctx.contains("203-832-4011"));
    }
}
