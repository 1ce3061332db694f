//! Weighted record similarity for fuzzy duplicate detection.
//!
//! Exact-match fields (ids, e-mail, phone) carry weight 3; free-text
//! fields carry weight 1 and are scored by normalized edit distance.

use crate::record::Record;
use crate::schema::FieldName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    Exact,
    Text,
}

const WEIGHTED_FIELDS: [(FieldName, u32, Compare); 5] = [
    (FieldName::CaseId, 3, Compare::Exact),
    (FieldName::CustomerEmail, 3, Compare::Exact),
    (FieldName::CallerPhone, 3, Compare::Exact),
    (FieldName::Subject, 1, Compare::Text),
    (FieldName::Notes, 1, Compare::Text),
];

/// Subject characters used as a last-resort blocking key.
const SUBJECT_BLOCK_LEN: usize = 12;

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `(maxLen - distance) / maxLen`; two empty strings are identical.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

fn normalize(field: FieldName, value: &str) -> String {
    match field {
        FieldName::CallerPhone => value.chars().filter(|c| c.is_ascii_digit()).collect(),
        _ => value.trim().to_lowercase(),
    }
}

/// Weighted similarity in `0.0..=1.0`.
///
/// Fields empty on both sides are ignored; a field set on only one side
/// scores zero. Records sharing no comparable field score zero.
pub fn record_similarity(a: &Record, b: &Record) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0u32;

    for (field, weight, compare) in WEIGHTED_FIELDS {
        let (left, right) = match (a.text(field), b.text(field)) {
            (None, None) => continue,
            (Some(l), Some(r)) => (normalize(field, &l), normalize(field, &r)),
            _ => {
                total += weight;
                continue;
            }
        };
        let score = match compare {
            Compare::Exact => f64::from(u8::from(left == right)),
            Compare::Text => text_similarity(&left, &right),
        };
        weighted += score * f64::from(weight);
        total += weight;
    }

    if total == 0 {
        0.0
    } else {
        weighted / f64::from(total)
    }
}

/// Candidate-pair bucket: e-mail, else phone digits, else subject prefix.
///
/// Records without any of the three are never compared.
pub fn blocking_key(record: &Record) -> Option<String> {
    if let Some(email) = record.text(FieldName::CustomerEmail) {
        return Some(format!("email:{}", normalize(FieldName::CustomerEmail, &email)));
    }
    if let Some(phone) = record.text(FieldName::CallerPhone) {
        let digits = normalize(FieldName::CallerPhone, &phone);
        if !digits.is_empty() {
            return Some(format!("phone:{}", digits));
        }
    }
    record.text(FieldName::Subject).map(|subject| {
        let prefix: String = normalize(FieldName::Subject, &subject)
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(SUBJECT_BLOCK_LEN)
            .collect();
        format!("subject:{}", prefix)
    })
}
