//! Field extraction from pasted carrier emails and notices.
//!
//! Each field owns an ordered list of patterns and a normalizer. The first
//! capture that normalizes wins; anything else is reported as missing.

use chrono::NaiveDate;
use db::models::{
    attachment::{AttachmentDetails, AttachmentType},
    carrier::Carrier,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Carrier,
    PolicyNumber,
    Reason,
    Amount,
    EffectiveDate,
    InsuredName,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Carrier,
        Field::PolicyNumber,
        Field::Reason,
        Field::Amount,
        Field::EffectiveDate,
        Field::InsuredName,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Carrier => "Carrier",
            Field::PolicyNumber => "Policy Number",
            Field::Reason => "Reason",
            Field::Amount => "Amount",
            Field::EffectiveDate => "Effective Date",
            Field::InsuredName => "Insured Name",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ExtractedFields {
    pub carrier_id: Option<Uuid>,
    pub carrier_name: Option<String>,
    pub policy_number: Option<String>,
    pub reason: Option<String>,
    pub amount: Option<f64>,
    pub effective_date: Option<NaiveDate>,
    pub insured_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Extraction {
    pub attachment_type: AttachmentType,
    pub fields: ExtractedFields,
    /// Human readable `Extracted <label>: <value>` lines, in field order.
    pub extracted: Vec<String>,
    pub missing: Vec<Field>,
}

impl Extraction {
    pub fn is_missing(&self, field: Field) -> bool {
        self.missing.contains(&field)
    }

    /// Seed attachment details from the parsed fields.
    pub fn into_details(self, raw_text: Option<String>) -> AttachmentDetails {
        AttachmentDetails {
            attachment_type: self.attachment_type,
            carrier_id: self.fields.carrier_id,
            carrier_name: self.fields.carrier_name,
            policy_number: self.fields.policy_number,
            insured_name: self.fields.insured_name,
            reason: self.fields.reason,
            amount: self.fields.amount,
            effective_date: self.fields.effective_date,
            raw_text,
            application_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Amount(f64),
    Date(NaiveDate),
}

impl Value {
    fn display(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            Value::Amount(amount) => format!("{amount:.2}"),
            Value::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

struct Rule {
    field: Field,
    patterns: Vec<Regex>,
    normalize: fn(&str) -> Option<Value>,
}

impl Rule {
    fn new(field: Field, patterns: &[&str], normalize: fn(&str) -> Option<Value>) -> Self {
        Self {
            field,
            patterns: patterns.iter().map(|pattern| compile(pattern)).collect(),
            normalize,
        }
    }

    fn apply(&self, text: &str) -> Option<Value> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures_iter(text)
                .filter_map(|captures| captures.get(1))
                .find_map(|capture| (self.normalize)(capture.as_str()))
        })
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extraction pattern must compile")
}

const DATE_VALUE: &str = r"(\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4})";

/// Where a free-text value ends: the label of another field or the end of the line.
const LABEL_STOP: &str = r"(?:\s+(?:policy(?:holder)?|reason|amount|effective|insured|carrier|client)(?:\s+(?:number|num|no\.?|name|date|due|for\s+return))?\s*[:#-]|\s*$)";

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let effective_labeled = format!(r"(?i)effective(?:\s+date)?\s*[:-]?\s*{DATE_VALUE}");
    let carrier_labeled = format!(r"(?im)carrier(?:\s+name)?\s*[:-]\s*([^\r\n]+?){LABEL_STOP}");
    let reason_labeled =
        format!(r"(?im)reason(?:\s+for\s+return)?\s*[:-]\s*([^\r\n]+?){LABEL_STOP}");
    let reason_phrase = format!(
        r"(?im)(?:returned|declined|rejected)\s+(?:due to|because of|for)\s+([^\r\n.]+?)(?:\.|{LABEL_STOP})"
    );
    let insured_labeled = format!(
        r"(?im)insured(?:'s)?(?:\s+name)?\s*[:-]\s*([A-Za-z][A-Za-z .'-]*?){LABEL_STOP}"
    );
    let holder_labeled = format!(
        r"(?im)(?:client|policyholder|policy\s+owner|owner)(?:\s+name)?\s*[:-]\s*([A-Za-z][A-Za-z .'-]*?){LABEL_STOP}"
    );
    vec![
        Rule::new(
            Field::Carrier,
            &[carrier_labeled.as_str()],
            normalize_text,
        ),
        Rule::new(
            Field::PolicyNumber,
            &[
                r"(?i)policy\s*(?:number|num|no\.?|#)\s*[:#-]?\s*([A-Z0-9][A-Z0-9-]{3,})",
                r"(?i)policy\s*[:#-]\s*([A-Z0-9][A-Z0-9-]{3,})",
                r"\b([A-Z]{1,3}\d{6,})\b",
            ],
            normalize_policy_number,
        ),
        Rule::new(
            Field::Reason,
            &[reason_labeled.as_str(), reason_phrase.as_str()],
            normalize_text,
        ),
        Rule::new(
            Field::Amount,
            &[
                r"(?i)amount\s*(?:due)?\s*[:-]?\s*\$?\s*([\d,]+(?:\.\d+)?)",
                r"(?i)(?:premium|payment|balance|draft)\s*(?:amount|due)?\s*[:-]?\s*\$\s*([\d,]+(?:\.\d+)?)",
                r"\$\s*([\d,]+(?:\.\d{1,2})?)",
            ],
            normalize_amount,
        ),
        Rule::new(
            Field::EffectiveDate,
            &[
                effective_labeled.as_str(),
                r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b",
                r"\b(\d{4}-\d{1,2}-\d{1,2})\b",
                r"(?i)\b((?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4})\b",
            ],
            normalize_date,
        ),
        Rule::new(
            Field::InsuredName,
            &[insured_labeled.as_str(), holder_labeled.as_str()],
            normalize_name,
        ),
    ]
});

static DRAFT_RETURN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(?:draft\s+return(?:ed)?|returned\s+draft|draft\s+was\s+returned|nsf|insufficient\s+funds|returned\s+payment)\b",
    )
});

fn normalize_text(raw: &str) -> Option<Value> {
    let text = raw.trim();
    (!text.is_empty()).then(|| Value::Text(text.to_string()))
}

fn normalize_name(raw: &str) -> Option<Value> {
    let name = raw.trim().trim_matches(|c: char| matches!(c, '.' | '-' | '\'') || c.is_whitespace());
    (!name.is_empty()).then(|| Value::Text(name.to_string()))
}

fn normalize_policy_number(raw: &str) -> Option<Value> {
    let number = raw.trim().trim_end_matches('-').to_ascii_uppercase();
    // Words such as "updated" can follow "policy no."; a number has digits.
    if number.len() < 4 || !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(Value::Text(number))
}

fn normalize_amount(raw: &str) -> Option<Value> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect();
    let amount: f64 = cleaned.parse().ok()?;
    amount.is_finite().then_some(Value::Amount(amount))
}

fn normalize_date(raw: &str) -> Option<Value> {
    let cleaned = raw.replace('.', "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.contains('/') {
        let two_digit_year = cleaned.rsplit('/').next().is_some_and(|year| year.len() == 2);
        let format = if two_digit_year { "%m/%d/%y" } else { "%m/%d/%Y" };
        return NaiveDate::parse_from_str(&cleaned, format)
            .ok()
            .map(Value::Date);
    }

    ["%Y-%m-%d", "%B %d, %Y", "%B %d %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
        .map(Value::Date)
}

/// Known carrier whose name appears in the text; longest names win.
fn match_known_carrier<'a>(text: &str, carriers: &'a [Carrier]) -> Option<&'a Carrier> {
    let haystack = text.to_lowercase();
    let mut candidates: Vec<&Carrier> = carriers
        .iter()
        .filter(|carrier| !carrier.name.trim().is_empty())
        .collect();
    candidates.sort_by_key(|carrier| std::cmp::Reverse(carrier.name.len()));
    candidates
        .into_iter()
        .find(|carrier| haystack.contains(&carrier.name.trim().to_lowercase()))
}

pub fn is_draft_return(text: &str) -> bool {
    DRAFT_RETURN.is_match(text)
}

/// Parse `text` into attachment fields. Never fails; empty input misses every field.
pub fn extract(text: &str, carriers: &[Carrier]) -> Extraction {
    let mut fields = ExtractedFields::default();
    let mut extracted = Vec::new();
    let mut missing = Vec::new();

    for rule in RULES.iter() {
        let value = if rule.field == Field::Carrier {
            match match_known_carrier(text, carriers) {
                Some(carrier) => {
                    fields.carrier_id = Some(carrier.id);
                    Some(Value::Text(carrier.name.trim().to_string()))
                }
                None => rule.apply(text),
            }
        } else {
            rule.apply(text)
        };

        let Some(value) = value else {
            missing.push(rule.field);
            continue;
        };

        extracted.push(format!("Extracted {}: {}", rule.field.label(), value.display()));
        match (rule.field, value) {
            (Field::Carrier, Value::Text(name)) => fields.carrier_name = Some(name),
            (Field::PolicyNumber, Value::Text(number)) => fields.policy_number = Some(number),
            (Field::Reason, Value::Text(reason)) => fields.reason = Some(reason),
            (Field::Amount, Value::Amount(amount)) => fields.amount = Some(amount),
            (Field::EffectiveDate, Value::Date(date)) => fields.effective_date = Some(date),
            (Field::InsuredName, Value::Text(name)) => fields.insured_name = Some(name),
            (field, value) => {
                tracing::warn!(%field, ?value, "normalizer produced an unexpected value kind");
                extracted.pop();
                missing.push(field);
            }
        }
    }

    let attachment_type = if is_draft_return(text) {
        AttachmentType::DraftReturn
    } else if fields.policy_number.is_some() {
        AttachmentType::PolicyUpdate
    } else {
        AttachmentType::Other
    };

    Extraction {
        attachment_type,
        fields,
        extracted,
        missing,
    }
}
