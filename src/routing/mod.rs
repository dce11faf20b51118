//! Intent routing
//!
//! Every turn gets exactly one [`RoutingDecision`]. Explicit identifiers and
//! resolved references select ExactId or Comparison; otherwise the injected
//! [`IntentClassifier`] chooses between semantic retrieval and general chat.

mod classifier;
mod reference;
mod router;

pub use classifier::{
    default_keyword_rules, IntentClassification, IntentClassifier, KeywordClassifier,
    KeywordRule, LlmIntentClassifier, SUPERVISOR_SYSTEM_PROMPT,
};
pub use reference::{ReferenceResolver, Resolution};
pub use router::{IntentRouter, Routed, RoutingDecision};
