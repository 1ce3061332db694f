//! Logical fields, their kinds, and the closed value domains.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::storage::CellValue;

/// Every logical field a case table can carry.
///
/// Field names are stable across table variants even where the
/// physical columns differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldName {
    CaseId,
    OpenedAt,
    Channel,
    CustomerEmail,
    CallerPhone,
    CallMinutes,
    Subject,
    Status,
    Assignee,
    FirstResponseAt,
    ResponseDeadline,
    ClosedAt,
    ExcludeFromSla,
    Spam,
    Notes,
}

impl FieldName {
    pub const ALL: [FieldName; 15] = [
        FieldName::CaseId,
        FieldName::OpenedAt,
        FieldName::Channel,
        FieldName::CustomerEmail,
        FieldName::CallerPhone,
        FieldName::CallMinutes,
        FieldName::Subject,
        FieldName::Status,
        FieldName::Assignee,
        FieldName::FirstResponseAt,
        FieldName::ResponseDeadline,
        FieldName::ClosedAt,
        FieldName::ExcludeFromSla,
        FieldName::Spam,
        FieldName::Notes,
    ];

    /// The header text written in row 1.
    pub fn display_name(&self) -> &'static str {
        match self {
            FieldName::CaseId => "Case ID",
            FieldName::OpenedAt => "Opened At",
            FieldName::Channel => "Channel",
            FieldName::CustomerEmail => "Customer Email",
            FieldName::CallerPhone => "Caller Phone",
            FieldName::CallMinutes => "Call Minutes",
            FieldName::Subject => "Subject",
            FieldName::Status => "Status",
            FieldName::Assignee => "Assignee",
            FieldName::FirstResponseAt => "First Response At",
            FieldName::ResponseDeadline => "Response Deadline",
            FieldName::ClosedAt => "Closed At",
            FieldName::ExcludeFromSla => "Exclude From SLA",
            FieldName::Spam => "Spam",
            FieldName::Notes => "Notes",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldName::CaseId | FieldName::Subject | FieldName::Notes => FieldKind::Text,
            FieldName::CustomerEmail | FieldName::Assignee => FieldKind::Email,
            FieldName::CallerPhone => FieldKind::Phone,
            FieldName::CallMinutes => FieldKind::Number,
            FieldName::OpenedAt
            | FieldName::FirstResponseAt
            | FieldName::ResponseDeadline
            | FieldName::ClosedAt => FieldKind::DateTime,
            FieldName::Channel => FieldKind::Channel,
            FieldName::Status => FieldKind::Status,
            FieldName::ExcludeFromSla | FieldName::Spam => FieldKind::Flag,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for FieldName {
    type Err = Error;

    /// Accepts the header text, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        FieldName::ALL
            .into_iter()
            .find(|f| f.display_name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| Error::validation(needle, "unknown field"))
    }
}

/// Value domain of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Number,
    DateTime,
    Flag,
    Channel,
    Status,
}

impl FieldKind {
    /// Check a non-empty value against this domain.
    pub fn check(&self, value: &CellValue) -> std::result::Result<(), String> {
        match self {
            FieldKind::Text => match value {
                CellValue::Text(_) | CellValue::Number(_) => Ok(()),
                other => Err(format!("expected text, got {:?}", other)),
            },
            FieldKind::Email => {
                let s = value.as_text().ok_or("expected an e-mail address")?;
                if is_email(s) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not an e-mail address", s))
                }
            }
            FieldKind::Phone => match value {
                CellValue::Number(_) => Ok(()),
                CellValue::Text(s) if is_phone(s) => Ok(()),
                other => Err(format!("'{}' is not a phone number", other)),
            },
            FieldKind::Number => match parse_number(value) {
                Some(n) if n >= 0.0 => Ok(()),
                Some(n) => Err(format!("{} is negative", n)),
                None => Err(format!("'{}' is not a number", value)),
            },
            FieldKind::DateTime => match value {
                CellValue::Text(s) if parse_datetime(s).is_some() => Ok(()),
                other => Err(format!("'{}' is not an RFC 3339 timestamp", other)),
            },
            FieldKind::Flag => parse_flag(value)
                .map(|_| ())
                .ok_or_else(|| format!("'{}' is not TRUE or FALSE", value)),
            FieldKind::Channel => {
                let s = value.as_text().unwrap_or_default();
                s.parse::<ChannelTag>()
                    .map(|_| ())
                    .map_err(|_| format!("'{}' is not a known channel", value))
            }
            FieldKind::Status => {
                let s = value.as_text().unwrap_or_default();
                s.parse::<CaseStatus>()
                    .map(|_| ())
                    .map_err(|_| format!("'{}' is not an allowed status", value))
            }
        }
    }
}

fn is_email(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn is_phone(s: &str) -> bool {
    let allowed = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ' | '.'));
    allowed && s.chars().filter(|c| c.is_ascii_digit()).count() >= 7
}

pub fn parse_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_flag(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Bool(b) => Some(*b),
        CellValue::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        CellValue::Text(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Support channel a table serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelTag {
    Email,
    WebForm,
    Chat,
    Social,
    Phone,
    Voicemail,
}

impl ChannelTag {
    pub const ALL: [ChannelTag; 6] = [
        ChannelTag::Email,
        ChannelTag::WebForm,
        ChannelTag::Chat,
        ChannelTag::Social,
        ChannelTag::Phone,
        ChannelTag::Voicemail,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChannelTag::Email => "Email",
            ChannelTag::WebForm => "Web Form",
            ChannelTag::Chat => "Chat",
            ChannelTag::Social => "Social",
            ChannelTag::Phone => "Phone",
            ChannelTag::Voicemail => "Voicemail",
        }
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChannelTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ChannelTag::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("Channel", format!("unknown channel '{}'", s)))
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    Open,
    Assigned,
    InProgress,
    AwaitingCustomer,
    Escalated,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 7] = [
        CaseStatus::Open,
        CaseStatus::Assigned,
        CaseStatus::InProgress,
        CaseStatus::AwaitingCustomer,
        CaseStatus::Escalated,
        CaseStatus::Resolved,
        CaseStatus::Closed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CaseStatus::Open => "Open",
            CaseStatus::Assigned => "Assigned",
            CaseStatus::InProgress => "In Progress",
            CaseStatus::AwaitingCustomer => "Awaiting Customer",
            CaseStatus::Escalated => "Escalated",
            CaseStatus::Resolved => "Resolved",
            CaseStatus::Closed => "Closed",
        }
    }

    /// Nobody has picked the case up yet.
    pub fn is_unassigned(&self) -> bool {
        matches!(self, CaseStatus::Open)
    }

    /// Statuses that only make sense with an assignee.
    pub fn requires_assignee(&self) -> bool {
        matches!(
            self,
            CaseStatus::Assigned | CaseStatus::InProgress | CaseStatus::Escalated
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Closed)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CaseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CaseStatus::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("Status", format!("unknown status '{}'", s)))
    }
}
