//! Dialogue layer: the conversation state machine and its helpers.
//!
//! - `orchestrator`: [`DialogueOrchestrator`], one reply per input.
//! - `confirmation`: yes/no word lists and reply classification.
//! - `extract`: the pluggable [`FactExtractor`].
//! - `history`: the bounded exchange history and context assembly.

pub mod confirmation;
pub mod extract;
pub mod history;
pub mod orchestrator;

pub use confirmation::ReplyIntent;
pub use extract::{ExtractedFact, FactExtractor, PatternFactExtractor};
pub use history::{ConversationHistory, Exchange};
pub use orchestrator::{
    DialogueOrchestrator, DialogueServices, DialogueState, FAREWELL, PendingConfirmation,
};
