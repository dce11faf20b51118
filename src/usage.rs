//! Observational usage events
//!
//! The orchestrator reports one [`UsageEvent`] per stage of a turn. Sinks
//! must not block and can never influence the turn.

use crate::providers::TokenUsage;
use serde::Serialize;

/// Turn stage an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStage {
    Route,
    Retrieve,
    Compose,
}

impl std::fmt::Display for UsageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageStage::Route => write!(f, "route"),
            UsageStage::Retrieve => write!(f, "retrieve"),
            UsageStage::Compose => write!(f, "compose"),
        }
    }
}

/// One stage of one turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub session_id: String,
    pub turn_id: String,
    pub stage: UsageStage,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    pub ok: bool,
}

/// Receives usage events
pub trait UsageSink: Send + Sync {
    fn record(&self, event: UsageEvent);
}

/// Logs events through `tracing`
#[derive(Debug, Default)]
pub struct TracingUsageSink;

impl UsageSink for TracingUsageSink {
    fn record(&self, event: UsageEvent) {
        let tokens = event.tokens.unwrap_or_default();
        tracing::info!(
            target: "resume_chat::usage",
            session = %event.session_id,
            turn = %event.turn_id,
            stage = %event.stage,
            latency_ms = event.latency_ms,
            input_tokens = tokens.input_tokens,
            output_tokens = tokens.output_tokens,
            ok = event.ok,
            "usage"
        );
    }
}

/// Drops every event
#[derive(Debug, Default)]
pub struct NullUsageSink;

impl UsageSink for NullUsageSink {
    fn record(&self, _event: UsageEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = UsageEvent {
            session_id: "s1".to_string(),
            turn_id: "t1".to_string(),
            stage: UsageStage::Compose,
            latency_ms: 42,
            tokens: None,
            ok: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "compose");
        assert_eq!(json["latencyMs"], 42);
        assert!(json.get("tokens").is_none());

        TracingUsageSink.record(event.clone());
        NullUsageSink.record(event);
    }
}
