use std::time::Instant;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use futures::stream::{StreamExt, TryStreamExt};
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::conversation::config::Config;
use crate::conversation::document::ConversationAnalysisDocument;
use crate::error::ProcessError;

pub const EVENT_TYPE: &str = "ConversationAnalysisSample";
pub const TRANSCRIPTION_EVENT_TYPE: &str = "ConversationTranscriptSample";

/// Decoded location of a stored analysis document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLocation {
    pub bucket: String,
    pub key: String,
}

/// One flat event per analysed conversation, keyed by dotted metric name.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct MetricsEvent(pub Map<String, Value>);

impl MetricsEvent {
    fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A raw transcript turn tagged with the event type and its contact id.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct TranscriptTurn(pub Map<String, Value>);

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CollectorEvent {
    Metrics(MetricsEvent),
    Transcript(TranscriptTurn),
}

pub fn build_metrics_event(document: &ConversationAnalysisDocument) -> MetricsEvent {
    let characteristics = &document.conversation_characteristics;
    let sentiment = &characteristics.sentiment;

    let mut event = MetricsEvent::default();
    event.insert("eventType", EVENT_TYPE);
    event.insert("AwsAccountId", document.account_id.as_str());
    event.insert("Channel", document.channel.as_str());
    event.insert("ContactId", document.customer_metadata.contact_id.as_str());
    event.insert("LanguageCode", document.language_code.as_str());
    event.insert(
        "Conversation.NumberOfParticipants",
        document.participants.len(),
    );
    event.insert(
        "Categories.MatchedCategories",
        document.categories.matched_categories.clone(),
    );
    event.insert(
        "Categories.MatchedDetails",
        document.categories.matched_details.clone(),
    );
    event.insert(
        "Conversation.TotalDuration",
        characteristics.total_conversation_duration_millis.clone(),
    );
    event.insert(
        "Conversation.Interruptions.TotalCount",
        characteristics.interruptions.total_count.clone(),
    );
    event.insert(
        "Conversation.Interruptions.TotalTimeMillis",
        characteristics.interruptions.total_time_millis.clone(),
    );
    event.insert(
        "Conversation.NonTalkTime.TotalTimeMillis",
        characteristics.non_talk_time.total_time_millis.clone(),
    );
    event.insert(
        "Conversation.NonTalkTime.NumberOfInstances",
        characteristics.non_talk_time.instances.len(),
    );
    event.insert(
        "Conversation.TalkTime.TotalTimeMillis",
        characteristics.talk_time.total_time_millis.clone(),
    );

    for (participant, score) in sentiment.overall_sentiment.iter() {
        event.insert(format!("Conversation.Sentiment.{participant}"), score.clone());
    }

    for (participant, periods) in sentiment.sentiment_by_period.quarter.iter() {
        for (i, period) in periods.iter().enumerate() {
            let prefix = format!("Conversation.Sentiment.{participant}.Q{}", i + 1);
            event.insert(
                format!("{prefix}.BeginOffsetMillis"),
                period.begin_offset_millis.clone(),
            );
            event.insert(
                format!("{prefix}.EndOffsetMillis"),
                period.end_offset_millis.clone(),
            );
            event.insert(prefix, period.score.clone());
        }
    }

    for (participant, details) in characteristics.talk_speed.details_by_participant.iter() {
        event.insert(
            format!("Conversation.TalkSpeed.{participant}"),
            details.average_words_per_minute.clone(),
        );
    }

    for (participant, details) in characteristics.talk_time.details_by_participant.iter() {
        event.insert(
            format!("Conversation.TalkTime.{participant}"),
            details.total_time_millis.clone(),
        );
    }

    event
}

pub fn build_transcript_events(document: &ConversationAnalysisDocument) -> Vec<TranscriptTurn> {
    document
        .transcript
        .iter()
        .map(|turn| {
            let mut turn = turn.clone();
            turn.insert("eventType".to_string(), TRANSCRIPTION_EVENT_TYPE.into());
            turn.insert(
                "ContactId".to_string(),
                document.customer_metadata.contact_id.clone().into(),
            );
            TranscriptTurn(turn)
        })
        .collect_vec()
}

pub async fn get_bytes_from_s3(
    s3_client: &Client,
    location: &DocumentLocation,
) -> Result<Vec<u8>, ProcessError> {
    let retrieval_error = |reason: String| ProcessError::Retrieval {
        bucket: location.bucket.clone(),
        key: location.key.clone(),
        reason,
    };

    let start_time = Instant::now();
    let response = s3_client
        .get_object()
        .bucket(location.bucket.clone())
        .key(location.key.clone())
        .response_content_type("application/json")
        .send()
        .await
        .map_err(|e| retrieval_error(DisplayErrorContext(&e).to_string()))?;
    debug!(
        "Received response from S3 in {}ms",
        start_time.elapsed().as_millis()
    );

    let mut data = Vec::with_capacity(response.content_length.unwrap_or(64 * 1024).max(0) as usize);
    let mut body = response.body;
    while let Some(result) = body.next().await {
        let bytes = result.map_err(|e| retrieval_error(e.to_string()))?;
        data.extend_from_slice(&bytes[..])
    }

    info!(
        "Downloaded s3://{}/{} in {}ms. Actual size: {} bytes",
        location.bucket,
        location.key,
        start_time.elapsed().as_millis(),
        data.len()
    );

    Ok(data)
}

/// Reads a stored analysis document and checks it against the expected shape.
pub async fn fetch_document(
    s3_client: &Client,
    location: &DocumentLocation,
) -> Result<ConversationAnalysisDocument, ProcessError> {
    let raw_data = get_bytes_from_s3(s3_client, location).await?;

    let value: Value = serde_json::from_slice(&raw_data).map_err(|e| ProcessError::Retrieval {
        bucket: location.bucket.clone(),
        key: location.key.clone(),
        reason: format!("object is not valid json - {}", e),
    })?;

    serde_json::from_value(value).map_err(|source| ProcessError::Shape {
        bucket: location.bucket.clone(),
        key: location.key.clone(),
        source,
    })
}

async fn extract_record_events(
    s3_client: &Client,
    location: DocumentLocation,
) -> Result<Vec<CollectorEvent>, ProcessError> {
    let document = fetch_document(s3_client, &location).await?;
    let metrics = build_metrics_event(&document);
    let transcript = build_transcript_events(&document);

    debug!(
        contact_id = %document.customer_metadata.contact_id,
        metrics = metrics.len(),
        transcript_turns = transcript.len(),
        "conversation analysis document flattened"
    );

    let mut events = Vec::with_capacity(transcript.len() + 1);
    events.push(CollectorEvent::Metrics(metrics));
    events.extend(transcript.into_iter().map(CollectorEvent::Transcript));
    Ok(events)
}

/// Fetches and flattens every document, at most `records_max_concurrency` at a
/// time. Output follows input order; the first failure aborts the batch.
pub async fn collect_events(
    s3_client: &Client,
    config: &Config,
    locations: Vec<DocumentLocation>,
) -> Result<Vec<CollectorEvent>, ProcessError> {
    let per_record = futures::stream::iter(locations)
        .map(|location| extract_record_events(s3_client, location))
        .buffered(config.records_max_concurrency.max(1))
        .inspect_err(|error| error!(?error, "Failed to extract conversation analysis events"))
        .try_collect::<Vec<_>>()
        .await?;

    Ok(per_record.into_iter().flatten().collect_vec())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions_sorted::assert_eq_sorted;
    use serde_json::json;

    fn document(value: Value) -> ConversationAnalysisDocument {
        serde_json::from_value(value).unwrap()
    }

    fn two_party_document() -> Value {
        json!({
            "AccountId": "123456789012",
            "Channel": "VOICE",
            "ContentMetadata": {"Output": "Raw"},
            "CustomerMetadata": {
                "ContactId": "c0ffee00-0000-4000-8000-000000000001",
                "InstanceId": "instance-1"
            },
            "LanguageCode": "en-US",
            "Participants": [
                {"ParticipantId": "AGENT", "ParticipantRole": "AGENT"},
                {"ParticipantId": "CUSTOMER", "ParticipantRole": "CUSTOMER"}
            ],
            "Categories": {
                "MatchedCategories": ["greeting"],
                "MatchedDetails": {"greeting": {"PointsOfInterest": []}}
            },
            "ConversationCharacteristics": {
                "TotalConversationDurationMillis": 32110,
                "Interruptions": {"TotalCount": 2, "TotalTimeMillis": 1500},
                "NonTalkTime": {
                    "TotalTimeMillis": 4000,
                    "Instances": [
                        {"BeginOffsetMillis": 0, "EndOffsetMillis": 2000},
                        {"BeginOffsetMillis": 9000, "EndOffsetMillis": 11000}
                    ]
                },
                "TalkSpeed": {
                    "DetailsByParticipant": {
                        "AGENT": {"AverageWordsPerMinute": 151},
                        "CUSTOMER": {"AverageWordsPerMinute": 164}
                    }
                },
                "TalkTime": {
                    "TotalTimeMillis": 28110,
                    "DetailsByParticipant": {
                        "AGENT": {"TotalTimeMillis": 15000},
                        "CUSTOMER": {"TotalTimeMillis": 13110}
                    }
                },
                "Sentiment": {
                    "OverallSentiment": {"AGENT": 3.1, "CUSTOMER": -1.5},
                    "SentimentByPeriod": {
                        "QUARTER": {
                            "AGENT": [
                                {"BeginOffsetMillis": 0, "EndOffsetMillis": 8000, "Score": 2.5},
                                {"BeginOffsetMillis": 8000, "EndOffsetMillis": 16000, "Score": 5}
                            ],
                            "CUSTOMER": [
                                {"BeginOffsetMillis": 0, "EndOffsetMillis": 8000, "Score": -2.5},
                                {"BeginOffsetMillis": 8000, "EndOffsetMillis": 16000, "Score": 0}
                            ]
                        }
                    }
                }
            },
            "Transcript": [
                {
                    "BeginOffsetMillis": 0,
                    "EndOffsetMillis": 2000,
                    "Id": "turn-1",
                    "ParticipantId": "AGENT",
                    "Content": "Thank you for calling.",
                    "Sentiment": "POSITIVE"
                },
                {
                    "BeginOffsetMillis": 2100,
                    "EndOffsetMillis": 4000,
                    "Id": "turn-2",
                    "ParticipantId": "CUSTOMER",
                    "Content": "Hi, my order is late.",
                    "Sentiment": "NEGATIVE"
                }
            ]
        })
    }

    #[test]
    fn test_build_metrics_event() {
        let event = build_metrics_event(&document(two_party_document()));

        let expected = json!({
            "eventType": "ConversationAnalysisSample",
            "AwsAccountId": "123456789012",
            "Channel": "VOICE",
            "ContactId": "c0ffee00-0000-4000-8000-000000000001",
            "LanguageCode": "en-US",
            "Conversation.NumberOfParticipants": 2,
            "Categories.MatchedCategories": ["greeting"],
            "Categories.MatchedDetails": {"greeting": {"PointsOfInterest": []}},
            "Conversation.TotalDuration": 32110,
            "Conversation.Interruptions.TotalCount": 2,
            "Conversation.Interruptions.TotalTimeMillis": 1500,
            "Conversation.NonTalkTime.TotalTimeMillis": 4000,
            "Conversation.NonTalkTime.NumberOfInstances": 2,
            "Conversation.TalkTime.TotalTimeMillis": 28110,
            "Conversation.Sentiment.AGENT": 3.1,
            "Conversation.Sentiment.CUSTOMER": -1.5,
            "Conversation.Sentiment.AGENT.Q1.BeginOffsetMillis": 0,
            "Conversation.Sentiment.AGENT.Q1.EndOffsetMillis": 8000,
            "Conversation.Sentiment.AGENT.Q1": 2.5,
            "Conversation.Sentiment.AGENT.Q2.BeginOffsetMillis": 8000,
            "Conversation.Sentiment.AGENT.Q2.EndOffsetMillis": 16000,
            "Conversation.Sentiment.AGENT.Q2": 5,
            "Conversation.Sentiment.CUSTOMER.Q1.BeginOffsetMillis": 0,
            "Conversation.Sentiment.CUSTOMER.Q1.EndOffsetMillis": 8000,
            "Conversation.Sentiment.CUSTOMER.Q1": -2.5,
            "Conversation.Sentiment.CUSTOMER.Q2.BeginOffsetMillis": 8000,
            "Conversation.Sentiment.CUSTOMER.Q2.EndOffsetMillis": 16000,
            "Conversation.Sentiment.CUSTOMER.Q2": 0,
            "Conversation.TalkSpeed.AGENT": 151,
            "Conversation.TalkSpeed.CUSTOMER": 164,
            "Conversation.TalkTime.AGENT": 15000,
            "Conversation.TalkTime.CUSTOMER": 13110
        });

        assert_eq_sorted!(serde_json::to_value(&event).unwrap(), expected);
    }

    #[test]
    fn test_metrics_event_key_order_follows_source() {
        let event = build_metrics_event(&document(two_party_document()));
        let keys: Vec<&str> = event.0.keys().map(String::as_str).collect();

        assert_eq!(keys[0], "eventType");
        assert_eq!(keys[13], "Conversation.TalkTime.TotalTimeMillis");
        assert_eq!(
            &keys[14..18],
            &[
                "Conversation.Sentiment.AGENT",
                "Conversation.Sentiment.CUSTOMER",
                "Conversation.Sentiment.AGENT.Q1.BeginOffsetMillis",
                "Conversation.Sentiment.AGENT.Q1.EndOffsetMillis",
            ]
        );
        assert_eq!(keys.last(), Some(&"Conversation.TalkTime.CUSTOMER"));
    }

    #[test]
    fn test_metrics_event_key_counts_scale_with_participants() {
        let mut raw = two_party_document();
        let characteristics = &mut raw["ConversationCharacteristics"];
        characteristics["Sentiment"]["OverallSentiment"]["SUPERVISOR"] = json!(1.0);
        characteristics["Sentiment"]["SentimentByPeriod"]["QUARTER"]["SUPERVISOR"] = json!([
            {"BeginOffsetMillis": 0, "EndOffsetMillis": 8000, "Score": 1.0},
            {"BeginOffsetMillis": 8000, "EndOffsetMillis": 16000, "Score": 1.0}
        ]);
        characteristics["TalkSpeed"]["DetailsByParticipant"]["SUPERVISOR"] =
            json!({"AverageWordsPerMinute": 120});
        characteristics["TalkTime"]["DetailsByParticipant"]["SUPERVISOR"] =
            json!({"TotalTimeMillis": 10});

        let event = build_metrics_event(&document(raw));
        let count = |prefix: &str, suffix_filter: fn(&str) -> bool| {
            event
                .0
                .keys()
                .filter(|k| k.starts_with(prefix) && suffix_filter(&k[prefix.len()..]))
                .count()
        };

        // participant name only
        let overall = count("Conversation.Sentiment.", |rest| !rest.contains('.'));
        let quarters = count("Conversation.Sentiment.", |rest| rest.contains(".Q"));
        assert_eq!(overall, 3);
        assert_eq!(quarters, 3 * 2 * 3);
        assert_eq!(count("Conversation.TalkSpeed.", |_| true), 3);
        // excludes Conversation.TalkTime.TotalTimeMillis
        assert_eq!(
            count("Conversation.TalkTime.", |rest| rest != "TotalTimeMillis"),
            3
        );
    }

    #[test]
    fn test_metrics_event_without_quarters() {
        let mut raw = two_party_document();
        raw["ConversationCharacteristics"]["Sentiment"]["SentimentByPeriod"]["QUARTER"] = json!({
            "AGENT": [],
            "CUSTOMER": []
        });
        let event = build_metrics_event(&document(raw));
        assert!(event.0.keys().all(|k| !k.contains(".Q")));
        assert_eq!(event.get("Conversation.Sentiment.AGENT"), Some(&json!(3.1)));
    }

    #[test]
    fn test_build_transcript_events() {
        let turns = build_transcript_events(&document(two_party_document()));
        assert_eq!(turns.len(), 2);
        for turn in &turns {
            assert_eq!(
                turn.0.get("eventType"),
                Some(&json!("ConversationTranscriptSample"))
            );
            assert_eq!(
                turn.0.get("ContactId"),
                Some(&json!("c0ffee00-0000-4000-8000-000000000001"))
            );
        }
        assert_eq!(turns[0].0.get("Content"), Some(&json!("Thank you for calling.")));
        assert_eq!(turns[1].0.get("ParticipantId"), Some(&json!("CUSTOMER")));
    }

    #[test]
    fn test_transcript_contact_id_overrides_turn_value() {
        let mut raw = two_party_document();
        raw["Transcript"] = json!([{"ContactId": "stale", "Content": "hello"}]);
        let turns = build_transcript_events(&document(raw));
        let keys: Vec<&str> = turns[0].0.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ContactId", "Content", "eventType"]);
        assert_eq!(
            turns[0].0.get("ContactId"),
            Some(&json!("c0ffee00-0000-4000-8000-000000000001"))
        );
    }

    #[test]
    fn test_empty_transcript() {
        let mut raw = two_party_document();
        raw["Transcript"] = json!([]);
        assert!(build_transcript_events(&document(raw)).is_empty());
    }

    #[test]
    fn test_collector_events_serialize_flat() {
        let doc = document(two_party_document());
        let events = vec![
            CollectorEvent::Metrics(build_metrics_event(&doc)),
            CollectorEvent::Transcript(build_transcript_events(&doc).remove(0)),
        ];
        let value = serde_json::to_value(&events).unwrap();
        assert_eq!(value[0]["eventType"], json!("ConversationAnalysisSample"));
        assert_eq!(value[1]["eventType"], json!("ConversationTranscriptSample"));
    }
}
