//! Wire event taxonomy.
//!
//! Every payload exchanged over a group socket is a JSON object whose
//! `message_type` field names one [`MessageType`]. [`Event`] carries the
//! fields shared by every variant (group, author, timestamp) and flattens the
//! variant-specific [`EventBody`] next to them, so the serialized form is a
//! single flat object:
//!
//! ```json
//! {"message_type":"DestinyAddMessage","point_id":1,"is_light":true,
//!  "group_name":"rebels","author":"luke","created_at":"2026-01-01T00:00:00.000Z"}
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::character::{CharacterTraits, TraitValue};
use crate::dice::{DicePool, RollOutcome};
use crate::errors::{MessageError, Result};

/// Name of the JSON field holding the variant tag.
pub const DISCRIMINATOR_FIELD: &str = "message_type";

/// Group-local destiny point id.
pub type PointId = i64;

/// Current time as an RFC 3339 UTC timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// MessageType
// ─────────────────────────────────────────────────────────────────────────────

/// Every known event discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A destiny point was added.
    #[serde(rename = "DestinyAddMessage")]
    PointAdd,
    /// A destiny point flipped sides.
    #[serde(rename = "DestinySwitchMessage")]
    PointSwitch,
    /// A destiny point was removed.
    #[serde(rename = "DestinyRemoveMessage")]
    PointRemove,
    /// A character was created or overwritten.
    #[serde(rename = "CharacterCreateMessage")]
    CharacterCreate,
    /// One character trait changed.
    #[serde(rename = "CharacterUpdateMessage")]
    CharacterUpdate,
    /// A character was deleted.
    #[serde(rename = "CharacterDeleteMessage")]
    CharacterDelete,
    /// A client asked for a dice roll.
    #[serde(rename = "RollRequestMessage", alias = "RollReqestMessage")]
    RollRequest,
    /// The server resolved a dice roll.
    #[serde(rename = "RollResultMessage")]
    RollResult,
}

/// Every message type, in wire-table order.
pub const ALL_MESSAGE_TYPES: [MessageType; 8] = [
    MessageType::PointAdd,
    MessageType::PointSwitch,
    MessageType::PointRemove,
    MessageType::CharacterCreate,
    MessageType::CharacterUpdate,
    MessageType::CharacterDelete,
    MessageType::RollRequest,
    MessageType::RollResult,
];

const LEGACY_ROLL_REQUEST: &str = "RollReqestMessage";

impl MessageType {
    /// Wire discriminator string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointAdd => "DestinyAddMessage",
            Self::PointSwitch => "DestinySwitchMessage",
            Self::PointRemove => "DestinyRemoveMessage",
            Self::CharacterCreate => "CharacterCreateMessage",
            Self::CharacterUpdate => "CharacterUpdateMessage",
            Self::CharacterDelete => "CharacterDeleteMessage",
            Self::RollRequest => "RollRequestMessage",
            Self::RollResult => "RollResultMessage",
        }
    }

    /// Read the discriminator of a raw payload without decoding the rest.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or(MessageError::NotAnObject)?;
        let tag = object
            .get(DISCRIMINATOR_FIELD)
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingDiscriminator)?;
        tag.parse()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self> {
        if s == LEGACY_ROLL_REQUEST {
            return Ok(Self::RollRequest);
        }
        ALL_MESSAGE_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MessageError::UnknownMessageType(s.to_owned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// `DestinyAddMessage` payload. `point_id` is assigned server-side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointAdd {
    /// Allocated id; whatever the client sends is overwritten.
    #[serde(default)]
    pub point_id: PointId,
    /// Initial side.
    #[serde(default = "default_true")]
    pub is_light: bool,
}

/// `DestinySwitchMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSwitch {
    /// Point being flipped.
    pub point_id: PointId,
    /// Side the client saw before flipping. The new side is its negation.
    pub was_light: bool,
}

impl PointSwitch {
    /// Side the point ends up on.
    pub const fn is_light(&self) -> bool {
        !self.was_light
    }
}

/// `DestinyRemoveMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRemove {
    /// Point being removed.
    pub point_id: PointId,
}

/// `CharacterCreateMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCreate {
    /// Character name, unique within the group.
    pub char_name: String,
    /// Trait fields, flattened into the payload.
    #[serde(flatten)]
    pub traits: CharacterTraits,
}

/// `CharacterUpdateMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterUpdate {
    /// Character being changed.
    pub char_name: String,
    /// Trait column name.
    pub trait_name: String,
    /// New value.
    pub trait_value: TraitValue,
}

/// `CharacterDeleteMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDelete {
    /// Character being deleted.
    pub char_name: String,
}

/// `RollRequestMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    /// Rolling character; defaults to the author.
    #[serde(default)]
    pub char_name: String,
    /// Dice to roll.
    #[serde(deserialize_with = "dice_pool_from_map_or_string")]
    pub dice_pool: DicePool,
    /// Free-text note shown with the result.
    #[serde(default)]
    pub comment: String,
}

/// `RollResultMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Rolling character.
    #[serde(default)]
    pub char_name: String,
    /// Dice that were rolled.
    #[serde(deserialize_with = "dice_pool_from_map_or_string")]
    pub dice_pool: DicePool,
    /// Faces rolled per die kind.
    pub result: RollOutcome,
    /// Free-text note carried over from the request.
    #[serde(default)]
    pub comment: String,
}

/// Browser clients post the pool as a JSON-encoded string; accept both forms.
fn dice_pool_from_map_or_string<'de, D>(deserializer: D) -> std::result::Result<DicePool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(DicePool),
        Encoded(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Map(pool) => Ok(pool),
        Raw::Encoded(text) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// Variant-specific part of an event, tagged by `message_type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum EventBody {
    /// `DestinyAddMessage`
    #[serde(rename = "DestinyAddMessage")]
    PointAdd(PointAdd),
    /// `DestinySwitchMessage`
    #[serde(rename = "DestinySwitchMessage")]
    PointSwitch(PointSwitch),
    /// `DestinyRemoveMessage`
    #[serde(rename = "DestinyRemoveMessage")]
    PointRemove(PointRemove),
    /// `CharacterCreateMessage`
    #[serde(rename = "CharacterCreateMessage")]
    CharacterCreate(CharacterCreate),
    /// `CharacterUpdateMessage`
    #[serde(rename = "CharacterUpdateMessage")]
    CharacterUpdate(CharacterUpdate),
    /// `CharacterDeleteMessage`
    #[serde(rename = "CharacterDeleteMessage")]
    CharacterDelete(CharacterDelete),
    /// `RollRequestMessage`
    #[serde(rename = "RollRequestMessage", alias = "RollReqestMessage")]
    RollRequest(RollRequest),
    /// `RollResultMessage`
    #[serde(rename = "RollResultMessage")]
    RollResult(RollResult),
}

impl EventBody {
    /// Discriminator of this body.
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::PointAdd(_) => MessageType::PointAdd,
            Self::PointSwitch(_) => MessageType::PointSwitch,
            Self::PointRemove(_) => MessageType::PointRemove,
            Self::CharacterCreate(_) => MessageType::CharacterCreate,
            Self::CharacterUpdate(_) => MessageType::CharacterUpdate,
            Self::CharacterDelete(_) => MessageType::CharacterDelete,
            Self::RollRequest(_) => MessageType::RollRequest,
            Self::RollResult(_) => MessageType::RollResult,
        }
    }
}

/// A session event: shared envelope plus variant body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Group the event belongs to.
    #[serde(default)]
    pub group_name: String,
    /// Client that produced the event.
    #[serde(default)]
    pub author: String,
    /// Server-stamped RFC 3339 timestamp.
    #[serde(default = "now_timestamp")]
    pub created_at: String,
    /// Variant fields.
    #[serde(flatten)]
    pub body: EventBody,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn new(group_name: impl Into<String>, author: impl Into<String>, body: EventBody) -> Self {
        Self {
            group_name: group_name.into(),
            author: author.into(),
            created_at: now_timestamp(),
            body,
        }
    }

    /// Discriminator of the body.
    pub const fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Decode a raw wire payload.
    ///
    /// The discriminator is checked first so an unknown tag and a malformed
    /// body of a known tag are reported as different errors.
    pub fn from_value(payload: Value) -> Result<Self> {
        let message_type = MessageType::from_payload(&payload)?;
        serde_json::from_value(payload)
            .map_err(|source| MessageError::Malformed { message_type, source })
    }

    /// Decode a raw wire string.
    pub fn from_json(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text)?;
        Self::from_value(payload)
    }

    /// Serialize to the flat JSON wire form.
    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// One-line human-readable summary for history views.
    pub fn describe(&self) -> String {
        let what = match &self.body {
            EventBody::PointAdd(p) => format!(
                "New Destiny Point({}) is {}",
                p.point_id,
                side(p.is_light)
            ),
            EventBody::PointSwitch(p) => format!(
                "Destiny Point({}) switched to {}",
                p.point_id,
                side(p.is_light())
            ),
            EventBody::PointRemove(p) => format!("Removed Destiny Point({})", p.point_id),
            EventBody::CharacterCreate(c) => format!("New Character({}) created", c.char_name),
            EventBody::CharacterUpdate(c) => format!(
                "{} updated {} to {}",
                c.char_name, c.trait_name, c.trait_value
            ),
            EventBody::CharacterDelete(c) => format!("Deleted Character({})", c.char_name),
            EventBody::RollRequest(r) => format!("{} requested a roll", r.char_name),
            EventBody::RollResult(r) => {
                let faces: Vec<&str> = r.result.values().flatten().map(String::as_str).collect();
                format!("{} rolled [{}]", r.char_name, faces.join(", "))
            }
        };
        format!("{}: {} - {what}", self.created_at, self.author)
    }
}

const fn side(is_light: bool) -> &'static str {
    if is_light { "Light" } else { "Dark" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn message_type_names_roundtrip() {
        for t in ALL_MESSAGE_TYPES {
            assert_eq!(t.as_str().parse::<MessageType>().unwrap(), t);
            let encoded = serde_json::to_string(&t).unwrap();
            assert_eq!(encoded, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn legacy_roll_request_spelling_accepted() {
        assert_eq!(
            "RollReqestMessage".parse::<MessageType>().unwrap(),
            MessageType::RollRequest
        );
        let t: MessageType = serde_json::from_str("\"RollReqestMessage\"").unwrap();
        assert_eq!(t, MessageType::RollRequest);
    }

    #[test]
    fn from_payload_classifies_failures() {
        assert_matches!(
            MessageType::from_payload(&json!([1, 2])),
            Err(MessageError::NotAnObject)
        );
        assert_matches!(
            MessageType::from_payload(&json!({"point_id": 1})),
            Err(MessageError::MissingDiscriminator)
        );
        assert_matches!(
            MessageType::from_payload(&json!({"message_type": 5})),
            Err(MessageError::MissingDiscriminator)
        );
        assert_matches!(
            MessageType::from_payload(&json!({"message_type": "PingMessage"})),
            Err(MessageError::UnknownMessageType(t)) if t == "PingMessage"
        );
    }

    #[test]
    fn point_add_defaults() {
        let event = Event::from_value(json!({
            "message_type": "DestinyAddMessage",
            "group_name": "rebels",
            "author": "luke"
        }))
        .unwrap();
        assert_matches!(
            event.body,
            EventBody::PointAdd(PointAdd { point_id: 0, is_light: true })
        );
        assert!(!event.created_at.is_empty());
    }

    #[test]
    fn point_add_wire_shape() {
        let event = Event {
            group_name: "rebels".into(),
            author: "luke".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            body: EventBody::PointAdd(PointAdd { point_id: 1, is_light: true }),
        };
        let value: Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "message_type": "DestinyAddMessage",
                "point_id": 1,
                "is_light": true,
                "group_name": "rebels",
                "author": "luke",
                "created_at": "2026-01-01T00:00:00.000Z"
            })
        );
    }

    #[test]
    fn malformed_payload_names_its_type() {
        let err = Event::from_value(json!({
            "message_type": "DestinySwitchMessage",
            "point_id": "one",
            "was_light": true
        }))
        .unwrap_err();
        assert_matches!(
            err,
            MessageError::Malformed { message_type: MessageType::PointSwitch, .. }
        );
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let err = Event::from_value(json!({"message_type": "CharacterDeleteMessage"})).unwrap_err();
        assert_matches!(
            err,
            MessageError::Malformed { message_type: MessageType::CharacterDelete, .. }
        );
    }

    #[test]
    fn unknown_client_fields_are_ignored() {
        let event = Event::from_value(json!({
            "message_type": "DestinyRemoveMessage",
            "point_id": 3,
            "colour": "blue"
        }))
        .unwrap();
        assert_eq!(event.body, EventBody::PointRemove(PointRemove { point_id: 3 }));
    }

    #[test]
    fn character_create_flattens_traits() {
        let event = Event::from_value(json!({
            "message_type": "CharacterCreateMessage",
            "char_name": "Kira",
            "wound_limit": 14,
            "status_flags": "prone"
        }))
        .unwrap();
        let EventBody::CharacterCreate(create) = &event.body else {
            panic!("expected CharacterCreate, got {:?}", event.body);
        };
        assert_eq!(create.char_name, "Kira");
        assert_eq!(create.traits.wound_limit, 14);
        assert_eq!(create.traits.soak, 0);

        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["wound_limit"], 14);
        assert_eq!(value["soak"], 0);
        assert_eq!(value["char_name"], "Kira");
    }

    #[test]
    fn character_update_accepts_number_or_text() {
        let event = Event::from_value(json!({
            "message_type": "CharacterUpdateMessage",
            "char_name": "Kira",
            "trait_name": "wound_current",
            "trait_value": "3"
        }))
        .unwrap();
        assert_matches!(
            &event.body,
            EventBody::CharacterUpdate(u) if u.trait_value == TraitValue::Text("3".into())
        );
    }

    #[test]
    fn roll_request_accepts_encoded_pool() {
        let event = Event::from_value(json!({
            "message_type": "RollReqestMessage",
            "dice_pool": "{\"boost\": 2, \"force\": 1}",
            "comment": "piloting"
        }))
        .unwrap();
        let EventBody::RollRequest(req) = &event.body else {
            panic!("expected RollRequest, got {:?}", event.body);
        };
        assert_eq!(req.dice_pool["boost"], 2);
        assert_eq!(req.dice_pool["force"], 1);
        assert!(req.char_name.is_empty());
    }

    #[test]
    fn roll_request_accepts_object_pool() {
        let event = Event::from_value(json!({
            "message_type": "RollRequestMessage",
            "dice_pool": {"ability": 3}
        }))
        .unwrap();
        assert_matches!(&event.body, EventBody::RollRequest(r) if r.dice_pool["ability"] == 3);
    }

    #[test]
    fn roll_request_rejects_garbage_pool() {
        let err = Event::from_value(json!({
            "message_type": "RollRequestMessage",
            "dice_pool": "three boost"
        }))
        .unwrap_err();
        assert_matches!(err, MessageError::Malformed { message_type: MessageType::RollRequest, .. });
    }

    #[test]
    fn roll_request_serializes_canonical_tag() {
        let event = Event::new(
            "rebels",
            "luke",
            EventBody::RollRequest(RollRequest {
                char_name: "Luke".into(),
                dice_pool: DicePool::from([("boost".to_owned(), 1)]),
                comment: String::new(),
            }),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["message_type"], "RollRequestMessage");
        assert_eq!(value["dice_pool"], json!({"boost": 1}));
    }

    #[test]
    fn wire_roundtrip_preserves_event() {
        let event = Event::new(
            "rebels",
            "leia",
            EventBody::PointSwitch(PointSwitch { point_id: 2, was_light: false }),
        );
        let decoded = Event::from_json(&event.to_wire().unwrap()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.message_type(), MessageType::PointSwitch);
    }

    #[test]
    fn from_json_rejects_invalid_text() {
        assert_matches!(Event::from_json("not json"), Err(MessageError::Serde(_)));
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn describe_lines() {
        let mut event = Event::new(
            "rebels",
            "luke",
            EventBody::PointAdd(PointAdd { point_id: 1, is_light: true }),
        );
        event.created_at = "T".into();
        assert_eq!(event.describe(), "T: luke - New Destiny Point(1) is Light");

        event.body = EventBody::PointSwitch(PointSwitch { point_id: 1, was_light: true });
        assert_eq!(event.describe(), "T: luke - Destiny Point(1) switched to Dark");

        event.body = EventBody::CharacterUpdate(CharacterUpdate {
            char_name: "Kira".into(),
            trait_name: "soak".into(),
            trait_value: TraitValue::Integer(4),
        });
        assert_eq!(event.describe(), "T: luke - Kira updated soak to 4");
    }
}
