//! Intent classifiers deciding whether a turn needs the resume corpus

use crate::error::{Error, Result};
use crate::providers::{ChatTurn, GenerationRequest, LanguageModel, ModelProfile, TokenUsage};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Supervisor prompt for the model-backed classifier
pub const SUPERVISOR_SYSTEM_PROMPT: &str = "\
You are the supervisor of a multi-agent system.

Your task:
- If the user asks about resume content, work experience, skills, job categories, candidate recommendations, or anything that requires information from the resume dataset, choose: RAG_AGENT
- If the user only asks general questions, small talk, or topics unrelated to the resume dataset (such as weather, motivation, general theory, etc.), choose: CHAT_AGENT

Return ONLY one of the following:
- RAG_AGENT
- CHAT_AGENT";

/// Classifier verdict for one turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentClassification {
    pub is_resume_related: bool,
    /// Confidence in the verdict, 0.0..=1.0
    pub confidence: f64,
    /// Tokens spent, when the classifier called a model
    pub usage: Option<TokenUsage>,
}

impl IntentClassification {
    pub fn related(confidence: f64) -> Self {
        Self {
            is_resume_related: true,
            confidence,
            usage: None,
        }
    }

    pub fn unrelated(confidence: f64) -> Self {
        Self {
            is_resume_related: false,
            confidence,
            usage: None,
        }
    }
}

/// Decides whether a turn without identifiers or cues needs retrieval
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// `history` holds the conversation's recent messages, oldest first
    async fn classify(&self, text: &str, history: &[ChatTurn]) -> Result<IntentClassification>;

    fn name(&self) -> &str;
}

/// A weighted vocabulary rule
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub name: String,
    pub pattern: String,
    /// Positive weights point at the resume corpus, negative at small talk
    pub weight: f64,
}

impl KeywordRule {
    pub fn new(name: &str, pattern: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            weight,
        }
    }
}

/// Default rule table for resume-domain vocabulary
pub fn default_keyword_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(
            "candidate",
            r"(?i)\b(candidates?|applicants?|resumes?|cvs?|profiles?|hire|hiring|recruit\w*)\b",
            0.6,
        ),
        KeywordRule::new(
            "experience",
            r"(?i)\b(experience[ds]?|worked|work history|years? of|background|career|employment)\b",
            0.4,
        ),
        KeywordRule::new(
            "skills",
            r"(?i)\b(skills?|skilled|proficient|expertise|certifi\w+|degree|education|qualifi\w+)\b",
            0.4,
        ),
        KeywordRule::new(
            "roles",
            r"(?i)\b(developers?|engineers?|designers?|managers?|analysts?|accountants?|teachers?|consultants?|nurses?|chefs?|advocates?|specialists?)\b",
            0.5,
        ),
        KeywordRule::new(
            "search_verbs",
            r"(?i)\b(find|search|look(ing)? for|who (has|knows|can)|anyone with|list|recommend|shortlist|best fit)\b",
            0.3,
        ),
        KeywordRule::new(
            "categories",
            r"(?i)\b(information[- ]technology|hr|finance|banking|healthcare|aviation|agriculture|automobile|bpo|construction|sales|arts|fitness|apparel|digital[- ]media|public[- ]relations)\b",
            0.3,
        ),
        KeywordRule::new(
            "small_talk",
            r"(?i)^\s*(hi|hello|hey|thanks|thank you|good (morning|afternoon|evening)|how are you)\b",
            -0.8,
        ),
        KeywordRule::new(
            "general_topics",
            r"(?i)\b(weather|joke|motivat\w*|recipe|news|movie|song|poem|meaning of life)\b",
            -0.5,
        ),
    ]
}

struct CompiledRule {
    name: String,
    pattern: Regex,
    weight: f64,
}

/// Rule-based classifier, no network
pub struct KeywordClassifier {
    rules: Vec<CompiledRule>,
}

impl KeywordClassifier {
    pub fn new(rules: Vec<KeywordRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|e| {
                    Error::Config(format!(
                        "Invalid regex pattern for rule '{}': {}",
                        rule.name, e
                    ))
                })?;
                Ok(CompiledRule {
                    name: rule.name,
                    pattern,
                    weight: rule.weight,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn with_default_rules() -> Result<Self> {
        Self::new(default_keyword_rules())
    }

    /// Sum of matched rule weights and the names of the rules that fired
    fn score(&self, text: &str) -> (f64, Vec<&str>) {
        let mut total = 0.0;
        let mut matched = Vec::new();
        for rule in &self.rules {
            if rule.pattern.is_match(text) {
                total += rule.weight;
                matched.push(rule.name.as_str());
            }
        }
        (total, matched)
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str, _history: &[ChatTurn]) -> Result<IntentClassification> {
        let (score, matched) = self.score(text);
        tracing::debug!(score, ?matched, "Keyword classification");

        // Nothing matched: unrelated, but not confidently so
        if matched.is_empty() {
            return Ok(IntentClassification::unrelated(0.3));
        }

        let confidence = (0.5 + score.abs() / 2.0).min(1.0);
        if score > 0.0 {
            Ok(IntentClassification::related(confidence))
        } else {
            Ok(IntentClassification::unrelated(confidence))
        }
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Asks the supervisor model to pick `RAG_AGENT` or `CHAT_AGENT`
pub struct LlmIntentClassifier {
    model: Arc<dyn LanguageModel>,
}

impl LlmIntentClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, text: &str, history: &[ChatTurn]) -> Result<IntentClassification> {
        let request =
            GenerationRequest::new(ModelProfile::Supervisor, SUPERVISOR_SYSTEM_PROMPT, text)
                .with_history(history);
        let generation = self
            .model
            .generate(&request)
            .await
            .map_err(|e| Error::ClassificationFailure(e.to_string()))?;

        let decision = generation.text.trim().to_uppercase();
        let mut verdict = if decision.contains("RAG") {
            IntentClassification::related(1.0)
        } else if decision.contains("CHAT") {
            IntentClassification::unrelated(1.0)
        } else {
            tracing::warn!("Unexpected supervisor reply: {}", generation.text);
            IntentClassification::unrelated(0.0)
        };
        verdict.usage = generation.usage;
        Ok(verdict)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Generation;

    struct Scripted(&'static str);

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            assert_eq!(request.profile, ModelProfile::Supervisor);
            if self.0.is_empty() {
                return Err(Error::GenerationFailure("offline".to_string()));
            }
            Ok(Generation::new(self.0))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn keyword() -> KeywordClassifier {
        KeywordClassifier::with_default_rules().unwrap()
    }

    #[tokio::test]
    async fn test_keyword_resume_query() {
        let verdict = keyword()
            .classify("Find Python developers with 5 years of experience", &[])
            .await
            .unwrap();
        assert!(verdict.is_resume_related);
        assert!(verdict.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_keyword_small_talk() {
        let verdict = keyword().classify("hello, how are you?", &[]).await.unwrap();
        assert!(!verdict.is_resume_related);
        assert!(verdict.confidence >= 0.5);
    }

    #[tokio::test]
    async fn test_keyword_no_match_is_low_confidence() {
        let verdict = keyword().classify("what is 2 + 2", &[]).await.unwrap();
        assert!(!verdict.is_resume_related);
        assert!(verdict.confidence < 0.5);
    }

    #[test]
    fn test_invalid_rule_is_config_error() {
        let result = KeywordClassifier::new(vec![KeywordRule::new("bad", "(", 1.0)]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_llm_classifier_reads_supervisor_reply() {
        let rag = LlmIntentClassifier::new(Arc::new(Scripted("RAG_AGENT")));
        let verdict = tokio_test::block_on(rag.classify("who knows rust", &[])).unwrap();
        assert!(verdict.is_resume_related);

        let chat = LlmIntentClassifier::new(Arc::new(Scripted(" chat_agent\n")));
        let verdict = tokio_test::block_on(chat.classify("tell me a joke", &[])).unwrap();
        assert!(!verdict.is_resume_related);
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_llm_classifier_sends_history() {
        struct Inspect(std::sync::Mutex<Vec<ChatTurn>>);

        #[async_trait]
        impl LanguageModel for Inspect {
            async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
                *self.0.lock().unwrap() = request.history.clone();
                Ok(Generation::new("RAG_AGENT"))
            }

            fn name(&self) -> &str {
                "inspect"
            }
        }

        let model = Arc::new(Inspect(std::sync::Mutex::new(Vec::new())));
        let classifier = LlmIntentClassifier::new(model.clone());
        let history = vec![
            ChatTurn::user("Find Python developers"),
            ChatTurn::assistant("Here are three candidates."),
        ];
        let verdict =
            tokio_test::block_on(classifier.classify("any with Django?", &history)).unwrap();

        assert!(verdict.is_resume_related);
        assert_eq!(*model.0.lock().unwrap(), history);
    }

    #[test]
    fn test_llm_classifier_failure() {
        let failing = LlmIntentClassifier::new(Arc::new(Scripted("")));
        let err = tokio_test::block_on(failing.classify("anything", &[])).unwrap_err();
        assert!(matches!(err, Error::ClassificationFailure(_)));
    }
}
