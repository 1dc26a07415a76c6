//! Typed view of a Contact Lens conversation analysis output file.
//!
//! Only the fields used to build events are modelled. Deserializing into these
//! types is the shape check: a missing or mistyped field is reported here
//! instead of surfacing halfway through flattening.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ConversationAnalysisDocument {
    pub account_id: String,
    pub channel: String,
    pub customer_metadata: CustomerMetadata,
    pub language_code: String,
    pub participants: Vec<Value>,
    pub categories: Categories,
    pub conversation_characteristics: ConversationCharacteristics,
    pub transcript: Vec<Map<String, Value>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerMetadata {
    pub contact_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Categories {
    pub matched_categories: Vec<String>,
    pub matched_details: Map<String, Value>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ConversationCharacteristics {
    pub total_conversation_duration_millis: Number,
    pub interruptions: Interruptions,
    pub non_talk_time: NonTalkTime,
    pub talk_speed: TalkSpeed,
    pub talk_time: TalkTime,
    pub sentiment: Sentiment,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Interruptions {
    pub total_count: Number,
    pub total_time_millis: Number,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NonTalkTime {
    pub total_time_millis: Number,
    pub instances: Vec<Value>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TalkSpeed {
    pub details_by_participant: ByParticipant<TalkSpeedDetails>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TalkSpeedDetails {
    pub average_words_per_minute: Number,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TalkTime {
    pub total_time_millis: Number,
    pub details_by_participant: ByParticipant<TalkTimeDetails>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TalkTimeDetails {
    pub total_time_millis: Number,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Sentiment {
    pub overall_sentiment: ByParticipant<Number>,
    pub sentiment_by_period: SentimentByPeriod,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SentimentByPeriod {
    #[serde(rename = "QUARTER")]
    pub quarter: ByParticipant<Vec<PeriodSentiment>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PeriodSentiment {
    pub begin_offset_millis: Number,
    pub end_offset_millis: Number,
    pub score: Number,
}

/// Per-participant values (`AGENT`, `CUSTOMER`, ...) in the order they appear
/// in the source document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ByParticipant<T>(pub Vec<(String, T)>);

impl<T> ByParticipant<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, T> Deserialize<'de> for ByParticipant<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ByParticipantVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for ByParticipantVisitor<T>
        where
            T: Deserialize<'de>,
        {
            type Value = ByParticipant<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map keyed by participant")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(2));
                while let Some((name, value)) = access.next_entry::<String, T>()? {
                    entries.push((name, value));
                }
                Ok(ByParticipant(entries))
            }
        }

        deserializer.deserialize_map(ByParticipantVisitor(PhantomData))
    }
}
