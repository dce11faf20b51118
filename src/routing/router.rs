//! Intent router: one routing decision per turn

use super::classifier::IntentClassifier;
use super::reference::ReferenceResolver;
use crate::config::RouterConfig;
use crate::error::Result;
use crate::memory::EntityMemory;
use crate::providers::{ChatTurn, TokenUsage};
use crate::retrieval::{CandidateId, RetrievalMode};
use serde::Serialize;
use std::sync::Arc;

/// What the turn should do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Answer without retrieval
    GeneralChat { query: String },
    /// Retrieve, then answer from the retrieved chunks
    Retrieve {
        mode: RetrievalMode,
        identifiers: Vec<CandidateId>,
        query: String,
    },
}

impl RoutingDecision {
    pub fn semantic(query: &str) -> Self {
        RoutingDecision::Retrieve {
            mode: RetrievalMode::Semantic,
            identifiers: Vec::new(),
            query: query.to_string(),
        }
    }

    /// ExactId for one identifier, Comparison for more
    pub fn for_identifiers(identifiers: Vec<CandidateId>, query: &str) -> Self {
        let mode = if identifiers.len() >= 2 {
            RetrievalMode::Comparison
        } else {
            RetrievalMode::ExactId
        };
        RoutingDecision::Retrieve {
            mode,
            identifiers,
            query: query.to_string(),
        }
    }

    pub fn query(&self) -> &str {
        match self {
            RoutingDecision::GeneralChat { query } => query,
            RoutingDecision::Retrieve { query, .. } => query,
        }
    }

    /// Retrieval mode, `None` for general chat
    pub fn mode(&self) -> Option<RetrievalMode> {
        match self {
            RoutingDecision::GeneralChat { .. } => None,
            RoutingDecision::Retrieve { mode, .. } => Some(*mode),
        }
    }

    pub fn identifiers(&self) -> &[CandidateId] {
        match self {
            RoutingDecision::GeneralChat { .. } => &[],
            RoutingDecision::Retrieve { identifiers, .. } => identifiers,
        }
    }
}

/// Routing outcome plus the tokens the classifier spent
#[derive(Debug, Clone)]
pub struct Routed {
    pub decision: RoutingDecision,
    pub usage: Option<TokenUsage>,
}

/// Chooses between general chat and the three retrieval modes
pub struct IntentRouter {
    resolver: ReferenceResolver,
    classifier: Arc<dyn IntentClassifier>,
    min_chat_confidence: f64,
}

impl IntentRouter {
    pub fn new(config: &RouterConfig, classifier: Arc<dyn IntentClassifier>) -> Result<Self> {
        Ok(Self {
            resolver: ReferenceResolver::new(&config.identifier_pattern)?,
            classifier,
            min_chat_confidence: config.min_chat_confidence,
        })
    }

    /// Route one turn. Never fails: unresolvable cues and classifier errors
    /// fall back to semantic retrieval. `history` only reaches the classifier.
    pub async fn route(&self, text: &str, memory: &EntityMemory, history: &[ChatTurn]) -> Routed {
        let resolution = self.resolver.resolve(text, memory);

        for unresolved in &resolution.unresolved {
            tracing::warn!("{}", unresolved);
        }

        if !resolution.identifiers.is_empty() {
            let decision = RoutingDecision::for_identifiers(resolution.identifiers, text);
            return Routed {
                decision,
                usage: None,
            };
        }

        if resolution.mentions_candidates() {
            tracing::debug!("No reference resolved, falling back to semantic search");
            return Routed {
                decision: RoutingDecision::semantic(text),
                usage: None,
            };
        }

        match self.classifier.classify(text, history).await {
            Ok(verdict) => {
                tracing::debug!(
                    classifier = self.classifier.name(),
                    related = verdict.is_resume_related,
                    confidence = verdict.confidence,
                    "Intent classified"
                );
                let decision = if !verdict.is_resume_related
                    && verdict.confidence >= self.min_chat_confidence
                {
                    RoutingDecision::GeneralChat {
                        query: text.to_string(),
                    }
                } else {
                    RoutingDecision::semantic(text)
                };
                Routed {
                    decision,
                    usage: verdict.usage,
                }
            }
            Err(e) => {
                tracing::warn!("Intent classification failed, using semantic search: {}", e);
                Routed {
                    decision: RoutingDecision::semantic(text),
                    usage: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::routing::{IntentClassification, KeywordClassifier};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed verdict, counts calls and the history length seen
    struct Fixed {
        verdict: Option<IntentClassification>,
        calls: AtomicUsize,
        history_seen: AtomicUsize,
    }

    impl Fixed {
        fn new(verdict: Option<IntentClassification>) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                calls: AtomicUsize::new(0),
                history_seen: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl IntentClassifier for Fixed {
        async fn classify(
            &self,
            _text: &str,
            history: &[ChatTurn],
        ) -> Result<IntentClassification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history_seen.store(history.len(), Ordering::SeqCst);
            self.verdict
                .ok_or_else(|| Error::ClassificationFailure("timeout".to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn router(classifier: Arc<dyn IntentClassifier>) -> IntentRouter {
        IntentRouter::new(&RouterConfig::default(), classifier).unwrap()
    }

    fn memory_with(ids: &[&str]) -> EntityMemory {
        let mut memory = EntityMemory::new(10, 50);
        let ids: Vec<CandidateId> = ids.iter().map(|s| CandidateId::from(*s)).collect();
        memory.record(&ids);
        memory
    }

    #[tokio::test]
    async fn test_single_identifier_is_exact_id() {
        let classifier = Fixed::new(Some(IntentClassification::unrelated(1.0)));
        let routed = router(classifier.clone())
            .route("tell me more about Resume ID 57667857", &EntityMemory::new(10, 50), &[])
            .await;

        assert_eq!(routed.decision.mode(), Some(RetrievalMode::ExactId));
        assert_eq!(routed.decision.identifiers(), &[CandidateId::from("57667857")]);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_two_identifiers_is_comparison_in_order() {
        let classifier = Fixed::new(None);
        let routed = router(classifier)
            .route("compare 11847784 and 57667857", &EntityMemory::new(10, 50), &[])
            .await;

        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Comparison));
        let ids: Vec<&str> = routed
            .decision
            .identifiers()
            .iter()
            .map(|i| i.as_str())
            .collect();
        assert_eq!(ids, vec!["11847784", "57667857"]);
    }

    #[tokio::test]
    async fn test_repeated_identifier_is_exact_id() {
        let routed = router(Fixed::new(None))
            .route("is 57667857 the same as 57667857?", &EntityMemory::new(10, 50), &[])
            .await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::ExactId));
    }

    #[tokio::test]
    async fn test_ordinal_follow_up() {
        let memory = memory_with(&["10101", "20505", "30909"]);
        let routed = router(Fixed::new(None))
            .route("tell me more about the first one", &memory, &[])
            .await;
        assert_eq!(
            routed.decision,
            RoutingDecision::Retrieve {
                mode: RetrievalMode::ExactId,
                identifiers: vec![CandidateId::from("10101")],
                query: "tell me more about the first one".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unresolved_cue_falls_back_to_semantic() {
        let classifier = Fixed::new(Some(IntentClassification::unrelated(1.0)));
        let routed = router(classifier.clone())
            .route("tell me more about the first one", &EntityMemory::new(10, 50), &[])
            .await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Semantic));
        assert_eq!(routed.decision.query(), "tell me more about the first one");
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_classifier_thresholds() {
        let memory = EntityMemory::new(10, 50);

        let confident = router(Fixed::new(Some(IntentClassification::unrelated(0.9))));
        let routed = confident.route("what's the weather?", &memory, &[]).await;
        assert!(matches!(routed.decision, RoutingDecision::GeneralChat { .. }));

        let unsure = router(Fixed::new(Some(IntentClassification::unrelated(0.2))));
        let routed = unsure.route("what's the weather?", &memory, &[]).await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Semantic));

        let related = router(Fixed::new(Some(IntentClassification::related(0.6))));
        let routed = related.route("who knows kubernetes", &memory, &[]).await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Semantic));
    }

    #[tokio::test]
    async fn test_classifier_error_is_semantic() {
        let routed = router(Fixed::new(None))
            .route("anything at all", &EntityMemory::new(10, 50), &[])
            .await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Semantic));
    }

    #[tokio::test]
    async fn test_keyword_classifier_routes_small_talk_to_chat() {
        let classifier = Arc::new(KeywordClassifier::with_default_rules().unwrap());
        let routed = router(classifier)
            .route("hello there!", &EntityMemory::new(10, 50), &[])
            .await;
        assert!(matches!(routed.decision, RoutingDecision::GeneralChat { .. }));
    }

    #[tokio::test]
    async fn test_new_search_after_results_is_semantic() {
        let classifier = Fixed::new(Some(IntentClassification::related(0.9)));
        let memory = memory_with(&["10101", "20505", "30909"]);
        let routed = router(classifier.clone())
            .route("Find candidates who know both Python and Java", &memory, &[])
            .await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Semantic));
        assert!(routed.decision.identifiers().is_empty());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        let classifier = Fixed::new(Some(IntentClassification::related(0.9)));
        let memory = memory_with(&["44444"]);
        let routed = router(classifier.clone())
            .route("Find Python developers who mentored his team", &memory, &[])
            .await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Semantic));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_referential_phrases_follow_anchor() {
        let memory = memory_with(&["10101", "20505", "30909"]);
        let routed = router(Fixed::new(None))
            .route("compare the first two", &memory, &[])
            .await;
        assert_eq!(routed.decision.mode(), Some(RetrievalMode::Comparison));
        assert_eq!(
            routed.decision.identifiers(),
            &[CandidateId::from("10101"), CandidateId::from("20505")]
        );

        let routed = router(Fixed::new(None))
            .route("tell me more about them", &memory, &[])
            .await;
        assert_eq!(routed.decision.identifiers().len(), 3);
    }

    #[tokio::test]
    async fn test_history_reaches_classifier() {
        let classifier = Fixed::new(Some(IntentClassification::unrelated(0.9)));
        let history = vec![
            ChatTurn::user("what's the weather?"),
            ChatTurn::assistant("I can't check the weather."),
        ];
        router(classifier.clone())
            .route("and tomorrow?", &EntityMemory::new(10, 50), &history)
            .await;
        assert_eq!(classifier.history_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_decision_serializes_with_route_tag() {
        let json = serde_json::to_value(RoutingDecision::for_identifiers(
            vec![CandidateId::from("11111"), CandidateId::from("22222")],
            "compare",
        ))
        .unwrap();
        assert_eq!(json["route"], "retrieve");
        assert_eq!(json["mode"], "comparison");
        assert_eq!(json["identifiers"][1], "22222");
    }
}
