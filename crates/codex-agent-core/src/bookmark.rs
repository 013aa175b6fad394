//! Bookmark record, with the cross-contamination validation rules from §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkType {
    Session,
    Message,
    Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BookmarkType,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_message_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookmarkValidationError {
    #[error("message bookmarks require message_id")]
    MissingMessageId,
    #[error("range bookmarks require both from_message_id and to_message_id")]
    MissingRangeEndpoints,
    #[error("session bookmarks only allow base fields")]
    UnexpectedFields,
}

/// Dedupe and trim tags, dropping empty entries, preserving first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let trimmed = tag.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.clone()) {
            out.push(trimmed);
        }
    }
    out
}

impl Bookmark {
    pub fn validate(&self) -> Result<(), BookmarkValidationError> {
        match self.kind {
            BookmarkType::Session => {
                if self.message_id.is_some()
                    || self.from_message_id.is_some()
                    || self.to_message_id.is_some()
                {
                    return Err(BookmarkValidationError::UnexpectedFields);
                }
            }
            BookmarkType::Message => {
                if self.message_id.is_none() {
                    return Err(BookmarkValidationError::MissingMessageId);
                }
                if self.from_message_id.is_some() || self.to_message_id.is_some() {
                    return Err(BookmarkValidationError::UnexpectedFields);
                }
            }
            BookmarkType::Range => {
                if self.from_message_id.is_none() || self.to_message_id.is_none() {
                    return Err(BookmarkValidationError::MissingRangeEndpoints);
                }
                if self.message_id.is_some() {
                    return Err(BookmarkValidationError::UnexpectedFields);
                }
            }
        }
        Ok(())
    }

    pub fn new_session(session_id: String, name: String, description: Option<String>, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: BookmarkType::Session,
            session_id,
            message_id: None,
            from_message_id: None,
            to_message_id: None,
            name,
            description,
            tags: normalize_tags(tags),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_message(
        session_id: String,
        message_id: String,
        name: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: BookmarkType::Message,
            session_id,
            message_id: Some(message_id),
            from_message_id: None,
            to_message_id: None,
            name,
            description,
            tags: normalize_tags(tags),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_range(
        session_id: String,
        from_message_id: String,
        to_message_id: String,
        name: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: BookmarkType::Range,
            session_id,
            message_id: None,
            from_message_id: Some(from_message_id),
            to_message_id: Some(to_message_id),
            name,
            description,
            tags: normalize_tags(tags),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_bookmark_rejects_message_id() {
        let mut b = Bookmark::new_session("s1".into(), "n".into(), None, vec![]);
        b.message_id = Some("m1".into());
        assert_eq!(b.validate(), Err(BookmarkValidationError::UnexpectedFields));
    }

    #[test]
    fn message_bookmark_requires_message_id() {
        let b = Bookmark::new_session("s1".into(), "n".into(), None, vec![]);
        let mut b = b;
        b.kind = BookmarkType::Message;
        assert_eq!(b.validate(), Err(BookmarkValidationError::MissingMessageId));
    }

    #[test]
    fn range_bookmark_requires_both_endpoints() {
        let mut b = Bookmark::new_range("s1".into(), "a".into(), "b".into(), "n".into(), None, vec![]);
        b.to_message_id = None;
        assert_eq!(b.validate(), Err(BookmarkValidationError::MissingRangeEndpoints));
    }

    #[test]
    fn tags_deduped_trimmed_nonempty() {
        let tags = normalize_tags(vec![
            "  a ".to_string(),
            "a".to_string(),
            "".to_string(),
            "  ".to_string(),
            "b".to_string(),
        ]);
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
    }
}
