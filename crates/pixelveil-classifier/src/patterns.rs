// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Regex tier: a fixed table of PII patterns evaluated in a fixed category
// order.  The first category with any matching pattern wins, so results never
// depend on hash ordering.

use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::PiiCategory;
use regex::Regex;

/// Order in which categories are tried.  Also the order of the binary regex
/// features fed to the model tier.
pub const REGEX_CATEGORY_ORDER: [PiiCategory; 8] = [
    PiiCategory::NationalId,
    PiiCategory::Email,
    PiiCategory::CreditCard,
    PiiCategory::Phone,
    PiiCategory::Birthday,
    PiiCategory::Address,
    PiiCategory::Login,
    PiiCategory::Name,
];

/// Number of binary regex predicates (one per category above).
pub const REGEX_FEATURE_COUNT: usize = REGEX_CATEGORY_ORDER.len();

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec";

fn pattern_table() -> Vec<(PiiCategory, Vec<String>)> {
    vec![
        (
            PiiCategory::NationalId,
            vec![
                // NRIC/FIN style: letter, seven digits, checksum letter.
                r"\b[A-Z]\d{7}[A-Z]\b".into(),
                // US social security number.
                r"\b\d{3}-\d{2}-\d{4}\b".into(),
                r"(?i)\b(?:nric|fin|ssn|passport)\s*(?:no\.?|number|#)?\s*[:#]?\s*[A-Z0-9]{6,12}\b"
                    .into(),
            ],
        ),
        (
            PiiCategory::Email,
            vec![r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b".into()],
        ),
        (
            PiiCategory::CreditCard,
            // 13-19 digits, optionally grouped by spaces or dashes.
            vec![r"\b(?:\d[ -]?){12,18}\d\b".into()],
        ),
        (
            PiiCategory::Phone,
            vec![
                r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,4}){2,3}\b".into(),
                r"\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b".into(),
                // Local eight-digit numbers need a separator or a label;
                // a bare run is as likely to be an order or invoice number.
                r"\b[689]\d{3}[\s-]\d{4}\b".into(),
                r"(?i)\b(?:tel|phone|mobile|mob|hp|contact)\b\.?\s*(?:no\.?)?\s*[:.]?\s*[689]\d{7}\b"
                    .into(),
            ],
        ),
        (
            PiiCategory::Birthday,
            vec![
                r"\b\d{1,2}[/.-]\d{1,2}[/.-](?:\d{4}|\d{2})\b".into(),
                r"\b(?:19|20)\d{2}[/.-]\d{1,2}[/.-]\d{1,2}\b".into(),
                format!(
                    r"(?i)\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{MONTHS})[a-z]*\.?,?\s+\d{{4}}\b"
                ),
                format!(
                    r"(?i)\b(?:{MONTHS})[a-z]*\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}\b"
                ),
                r"(?i)\b(?:dob|d\.o\.b\.?|date of birth|birth\s?date|birthday|born on)\b".into(),
            ],
        ),
        (
            PiiCategory::Address,
            vec![
                r"(?i)\b\d{1,5}[a-z]?\s+(?:[a-z0-9'.-]+\s+){0,4}(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|way|court|ct|place|pl|crescent|cres|close|terrace|highway|hwy)\b"
                    .into(),
                r"(?i)\b(?:blk|block)\s*\d{1,4}[a-z]?\b".into(),
                r"#\d{1,3}-\d{1,5}\b".into(),
                r"(?i)\bsingapore\s+\d{6}\b".into(),
                r"(?i)\bp\.?\s?o\.?\s*box\s*\d+".into(),
                r"(?i)\b(?:address|addr)\s*[:=]".into(),
            ],
        ),
        (
            PiiCategory::Login,
            vec![
                r"(?i)\b(?:username|user\s*name|user\s*id|userid|login|password|passwd|pwd|passcode|pin)\s*[:=]"
                    .into(),
                r"(?i)\b(?:otp|2fa)\s*(?:code)?\s*[:=]?\s*\d{4,8}\b".into(),
            ],
        ),
        (
            PiiCategory::Name,
            vec![
                r"(?i)\b(?:name|full\s+name|surname|given\s+name|first\s+name|last\s+name)\s*[:=]\s*\S+"
                    .into(),
                r"\b(?:Mr|Mrs|Ms|Miss|Mdm|Dr|Prof)\.?\s+[A-Z][a-z]+".into(),
            ],
        ),
    ]
}

/// Compiled regex tier.  Built once, read-only afterwards.
pub struct RegexTier {
    rules: Vec<(PiiCategory, Vec<Regex>)>,
}

impl RegexTier {
    /// Compile the built-in pattern table.
    pub fn new() -> Result<Self> {
        let table = pattern_table();
        debug_assert!(
            table
                .iter()
                .map(|(c, _)| *c)
                .eq(REGEX_CATEGORY_ORDER.iter().copied()),
            "pattern table must follow REGEX_CATEGORY_ORDER"
        );

        let rules = table
            .into_iter()
            .map(|(category, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            PixelveilError::InvalidPattern(format!("{category}: {e}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((category, compiled))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// First category (in fixed order) with a matching pattern.
    pub fn first_match(&self, text: &str) -> Option<PiiCategory> {
        self.rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
            .map(|(category, _)| *category)
    }

    /// One boolean per category in [`REGEX_CATEGORY_ORDER`].
    pub fn predicates(&self, text: &str) -> [bool; REGEX_FEATURE_COUNT] {
        let mut out = [false; REGEX_FEATURE_COUNT];
        for (slot, (_, patterns)) in out.iter_mut().zip(&self.rules) {
            *slot = patterns.iter().any(|re| re.is_match(text));
        }
        out
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.iter().map(|(_, p)| p.len()).sum()
    }
}
