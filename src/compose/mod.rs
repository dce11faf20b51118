//! Answer composition and the memory commit of a turn

mod composer;
pub mod prompt;

pub use composer::{AnswerSource, CandidateSection, ResponseComposer, TurnResult};
