//! Event: one scheduled meetup, mirrored from the remote `Events` collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{to_fields, Document, Fields, FromDocument, IntoFields};
use crate::error::{DecodeError, EncodeError};
use crate::types::{EventId, UserId};

/// Craft an event is aimed at. Stored remotely as an integer 0–3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ArtType {
    #[default]
    All,
    Knitting,
    Crochet,
    Embroidery,
}

impl ArtType {
    pub const fn code(self) -> i64 {
        match self {
            ArtType::All => 0,
            ArtType::Knitting => 1,
            ArtType::Crochet => 2,
            ArtType::Embroidery => 3,
        }
    }

    /// Picker label, as offered when creating an event.
    pub const fn short_label(self) -> &'static str {
        match self {
            ArtType::All => "All",
            ArtType::Knitting => "Knit",
            ArtType::Crochet => "Crochet",
            ArtType::Embroidery => "Embroidery",
        }
    }

    /// Tag label, as shown on an event.
    pub const fn label(self) -> &'static str {
        match self {
            ArtType::All => "All Art Types",
            ArtType::Knitting => "Knitting",
            ArtType::Crochet => "Crochet",
            ArtType::Embroidery => "Embroidery",
        }
    }
}

impl TryFrom<i64> for ArtType {
    type Error = DecodeError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ArtType::All),
            1 => Ok(ArtType::Knitting),
            2 => Ok(ArtType::Crochet),
            3 => Ok(ArtType::Embroidery),
            other => Err(DecodeError::OutOfRange {
                field: "artType",
                value: other,
            }),
        }
    }
}

impl From<ArtType> for i64 {
    fn from(art: ArtType) -> Self {
        art.code()
    }
}

/// Experience level an event is aimed at. Stored remotely as an integer 0–3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SkillLevel {
    #[default]
    All,
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub const fn code(self) -> i64 {
        match self {
            SkillLevel::All => 0,
            SkillLevel::Beginner => 1,
            SkillLevel::Intermediate => 2,
            SkillLevel::Advanced => 3,
        }
    }

    pub const fn short_label(self) -> &'static str {
        match self {
            SkillLevel::All => "All",
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SkillLevel::All => "All Skill Levels",
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
        }
    }
}

impl TryFrom<i64> for SkillLevel {
    type Error = DecodeError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SkillLevel::All),
            1 => Ok(SkillLevel::Beginner),
            2 => Ok(SkillLevel::Intermediate),
            3 => Ok(SkillLevel::Advanced),
            other => Err(DecodeError::OutOfRange {
                field: "skillLevel",
                value: other,
            }),
        }
    }
}

impl From<SkillLevel> for i64 {
    fn from(level: SkillLevel) -> Self {
        level.code()
    }
}

/// An event document.
///
/// `id` is `None` until the first successful write assigns one. Every other
/// field maps one-to-one onto the remote document; absent fields decode to
/// their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    #[serde(skip)]
    pub id: Option<EventId>,
    pub name: String,
    #[serde(rename = "about")]
    pub description: String,
    /// Scheduled start, Unix ms. `None` means "to be confirmed".
    #[serde(rename = "datetime", skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<i64>,
    pub address: String,
    pub art_type: ArtType,
    pub skill_level: SkillLevel,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Event {
    /// Build an unsaved event hosted by `host`.
    pub fn from_draft(draft: EventDraft, host: UserId) -> Self {
        Self {
            id: None,
            name: draft.name,
            description: draft.description,
            scheduled_at: draft.scheduled_at,
            address: draft.address,
            art_type: draft.art_type,
            skill_level: draft.skill_level,
            capacity: draft.capacity,
            host: Some(host),
            image: draft.image,
            latitude: draft.latitude,
            longitude: draft.longitude,
        }
    }

    /// Whether the schedule is still "to be confirmed".
    pub fn is_to_be_confirmed(&self) -> bool {
        self.scheduled_at.is_none()
    }

    pub fn is_hosted_by(&self, user: &UserId) -> bool {
        self.host.as_ref() == Some(user)
    }

    /// Both coordinates, when the event has been geocoded.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl FromDocument for Event {
    fn from_document(doc: &Document) -> Result<Self, DecodeError> {
        let mut event: Event = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|e| DecodeError::malformed(&doc.id, e))?;
        event.id = Some(EventId::new(doc.id.clone()));
        Ok(event)
    }
}

impl IntoFields for Event {
    fn into_fields(&self) -> Result<Fields, EncodeError> {
        to_fields(self)
    }
}

/// Caller-supplied attributes for hosting a new event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub scheduled_at: Option<i64>,
    pub address: String,
    pub art_type: ArtType,
    pub skill_level: SkillLevel,
    pub capacity: u32,
    pub image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(fields) => Document::new(id, fields),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_decode_full_document() {
        let d = doc(
            "e1",
            json!({
                "name": "Sunday Stitch",
                "about": "Bring a project",
                "datetime": 1_700_000_000_000i64,
                "address": "12 Wool St",
                "artType": 2,
                "skillLevel": 1,
                "capacity": 12,
                "host": "u1",
                "latitude": -37.8,
                "longitude": 144.9
            }),
        );

        let event = Event::from_document(&d).unwrap();
        assert_eq!(event.id, Some(EventId::new("e1")));
        assert_eq!(event.description, "Bring a project");
        assert_eq!(event.art_type, ArtType::Crochet);
        assert_eq!(event.skill_level, SkillLevel::Beginner);
        assert_eq!(event.capacity, 12);
        assert!(event.is_hosted_by(&UserId::new("u1")));
        assert_eq!(event.coordinates(), Some((-37.8, 144.9)));
        assert!(!event.is_to_be_confirmed());
    }

    #[test]
    fn test_decode_sparse_document_uses_defaults() {
        let event = Event::from_document(&doc("e2", json!({"name": "Drop-in"}))).unwrap();
        assert_eq!(event.art_type, ArtType::All);
        assert_eq!(event.skill_level, SkillLevel::All);
        assert!(event.is_to_be_confirmed());
        assert_eq!(event.host, None);
    }

    #[test]
    fn test_decode_rejects_unknown_category() {
        let err = Event::from_document(&doc("e3", json!({"artType": 7}))).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { ref id, .. } if id == "e3"));
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        assert!(Event::from_document(&doc("e4", json!({"capacity": "lots"}))).is_err());
    }

    #[test]
    fn test_fields_use_remote_names() {
        let event = Event::from_draft(
            EventDraft {
                name: "Hook Club".into(),
                art_type: ArtType::Knitting,
                capacity: 4,
                ..EventDraft::default()
            },
            UserId::new("host"),
        );
        let fields = event.into_fields().unwrap();
        assert_eq!(fields.get("artType"), Some(&json!(1)));
        assert_eq!(fields.get("skillLevel"), Some(&json!(0)));
        assert_eq!(fields.get("host"), Some(&json!("host")));
        assert!(fields.get("datetime").is_none());
        assert!(fields.get("id").is_none());
    }

    #[test]
    fn test_category_codes_exhaustive() {
        for code in 0..4 {
            assert_eq!(ArtType::try_from(code).unwrap().code(), code);
            assert_eq!(SkillLevel::try_from(code).unwrap().code(), code);
        }
        assert!(ArtType::try_from(-1).is_err());
        assert!(SkillLevel::try_from(4).is_err());
    }

    #[test]
    fn test_category_labels() {
        let short: Vec<_> = (0..4)
            .map(|c| ArtType::try_from(c).unwrap().short_label())
            .collect();
        assert_eq!(short, ["All", "Knit", "Crochet", "Embroidery"]);
        assert_eq!(ArtType::All.label(), "All Art Types");
        assert_eq!(ArtType::Knitting.label(), "Knitting");

        assert_eq!(SkillLevel::All.short_label(), "All");
        assert_eq!(SkillLevel::All.label(), "All Skill Levels");
        assert_eq!(SkillLevel::Advanced.label(), "Advanced");
    }
}
