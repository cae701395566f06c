//! The conversation state machine.
//!
//! [`DialogueOrchestrator::process`] turns one user input into one reply.
//! Checks run in a fixed order: shutdown phrase, reminder acknowledgement,
//! pending fact confirmation, memory recall, fact capture, staged tool
//! confirmation and finally the text generator (with at most one safe tool
//! call fed back into a second generation). Only generated replies enter
//! the history and the conversation log; confirmations, recall listings and
//! staged tool questions do not.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use super::confirmation::{
    FACT_AFFIRMATIVE, FACT_NEGATIVE, REMINDER_ACK_WORDS, ReplyIntent, TOOL_AFFIRMATIVE, classify,
    contains_any,
};
use super::extract::{ExtractedFact, FactExtractor, PatternFactExtractor};
use super::history::ConversationHistory;
use crate::config::PersonaConfig;
use crate::llm::prompt::system_prompt;
use crate::llm::{GeneratorOutput, TextGenerator, ToolCallRequest};
use crate::memory::{ConversationLog, Fact, FactStore};
use crate::scheduler::ReminderScheduler;
use crate::tools::ToolRegistry;
use crate::tools::types::{DEFAULT_MAX_BYTES, truncate_output};

/// Reply to the shutdown phrase.
pub const FAREWELL: &str = "Shutting down. Goodbye, sir.";

const REMINDER_CONFIRMED: &str = "Reminder confirmed.";
const ACTION_CANCELLED: &str = "Action cancelled.";
const NO_FACTS: &str = "I don't have any stored information about you yet.";

const RECALL_PATTERNS: &[&str] = &[
    r"what do you (know|remember) about me",
    r"list (my )?memory",
    r"what have you remembered",
    r"show (my )?facts",
];

static RECALL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    RECALL_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
});

/// Whether the input asks what the assistant knows about the user.
pub fn is_recall_request(text: &str) -> bool {
    RECALL.iter().any(|re| re.is_match(text))
}

/// What the orchestrator is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    Idle,
    /// A proposed fact awaits yes/no.
    AwaitingConfirmation,
    /// A destructive tool call awaits yes/no.
    AwaitingToolConfirmation,
    /// The shutdown phrase was heard.
    Terminated,
}

/// The one outstanding yes/no question.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingConfirmation {
    Fact(ExtractedFact),
    Tool(ToolCallRequest),
}

/// Collaborators injected at startup.
#[derive(Clone)]
pub struct DialogueServices {
    pub generator: Arc<dyn TextGenerator>,
    pub registry: Arc<ToolRegistry>,
    pub facts: Arc<dyn FactStore>,
    /// Persistent log every recorded exchange is appended to.
    pub conversation_log: Option<Arc<dyn ConversationLog>>,
    /// Active reminder alerts, acknowledged by "done", "ok" and friends.
    pub alerts: Option<Arc<ReminderScheduler>>,
}

/// Conversation state machine shared by voice and text modes.
pub struct DialogueOrchestrator {
    services: DialogueServices,
    extractor: Box<dyn FactExtractor>,
    history: ConversationHistory,
    pending: Option<PendingConfirmation>,
    terminated: bool,
    name: String,
    shutdown_phrase: String,
    max_facts_in_prompt: usize,
}

impl DialogueOrchestrator {
    pub fn new(services: DialogueServices, persona: &PersonaConfig) -> Self {
        Self {
            services,
            extractor: Box::new(PatternFactExtractor),
            history: ConversationHistory::new(persona.history_exchanges),
            pending: None,
            terminated: false,
            name: persona.name.clone(),
            shutdown_phrase: persona.shutdown_phrase.trim().to_lowercase(),
            max_facts_in_prompt: persona.max_facts_in_prompt,
        }
    }

    /// Replace the fact extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn FactExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn state(&self) -> DialogueState {
        if self.terminated {
            return DialogueState::Terminated;
        }
        match self.pending {
            None => DialogueState::Idle,
            Some(PendingConfirmation::Fact(_)) => DialogueState::AwaitingConfirmation,
            Some(PendingConfirmation::Tool(_)) => DialogueState::AwaitingToolConfirmation,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one user input and return the reply.
    pub fn process(&mut self, input: &str) -> String {
        let input = input.trim();

        if self.is_shutdown(input) {
            info!("shutdown phrase received");
            self.terminated = true;
            self.pending = None;
            return FAREWELL.to_owned();
        }

        if contains_any(input, REMINDER_ACK_WORDS)
            && self.services.alerts.as_ref().is_some_and(|a| a.confirm_all())
        {
            return REMINDER_CONFIRMED.to_owned();
        }

        match self.pending.take() {
            Some(PendingConfirmation::Fact(fact)) => return self.resolve_fact(fact, input),
            Some(PendingConfirmation::Tool(request)) => return self.resolve_tool(request, input),
            None => {}
        }

        if is_recall_request(input) {
            return self.recall();
        }

        if self.extractor.is_trigger(input)
            && let Some(fact) = self.extractor.extract(input)
        {
            let reply = format!(
                "Should I remember that your {} is \"{}\"?",
                fact.key, fact.value
            );
            debug!(key = %fact.key, "fact proposed");
            self.pending = Some(PendingConfirmation::Fact(fact));
            return reply;
        }

        let reply = self.generate_reply(input);
        // A staged tool question is not an exchange.
        if self.pending.is_none() {
            self.record(input, &reply);
        }
        reply
    }

    fn is_shutdown(&self, input: &str) -> bool {
        !self.shutdown_phrase.is_empty() && input.to_lowercase().contains(&self.shutdown_phrase)
    }

    fn resolve_fact(&mut self, fact: ExtractedFact, input: &str) -> String {
        match classify(input, FACT_AFFIRMATIVE, FACT_NEGATIVE) {
            ReplyIntent::Affirmative => {
                match self.services.facts.store_fact(
                    &fact.key,
                    &fact.value,
                    fact.category.as_deref(),
                ) {
                    Ok(()) => {
                        info!(key = %fact.key, "fact stored");
                        format!("Noted. I'll remember that your {} is {}.", fact.key, fact.value)
                    }
                    Err(e) => {
                        warn!("cannot store fact: {e}");
                        format!("[Error] Could not store that: {e}")
                    }
                }
            }
            ReplyIntent::Negative => "Understood. I won't store that.".to_owned(),
            ReplyIntent::Unclear => {
                "I didn't get a clear confirmation, so I won't store that.".to_owned()
            }
        }
    }

    fn resolve_tool(&mut self, request: ToolCallRequest, input: &str) -> String {
        if contains_any(input, TOOL_AFFIRMATIVE) {
            info!(tool = %request.tool_name, "staged tool confirmed");
            let result = self
                .services
                .registry
                .dispatch(&request.tool_name, &request.args);
            format!("Executed '{}'. Result: {result}", request.tool_name)
        } else {
            info!(tool = %request.tool_name, "staged tool cancelled");
            ACTION_CANCELLED.to_owned()
        }
    }

    fn recall(&self) -> String {
        match self.services.facts.list_facts() {
            Ok(facts) => format_facts(&facts),
            Err(e) => {
                warn!("cannot list facts: {e}");
                format!("[Error] {e}")
            }
        }
    }

    fn generate_reply(&mut self, input: &str) -> String {
        let facts = self.services.facts.list_facts().unwrap_or_else(|e| {
            warn!("cannot load facts for the prompt: {e}");
            Vec::new()
        });
        let prompt = system_prompt(
            &self.name,
            &facts,
            self.max_facts_in_prompt,
            &self.services.registry.describe(),
        );
        let mut context = self.history.build_context(&prompt, input, &self.name);

        let raw = match self.services.generator.generate(&context) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("generation failed: {e}");
                return format!("[Error] {e}");
            }
        };

        let request = match GeneratorOutput::parse(&raw) {
            GeneratorOutput::PlainText(text) => return text,
            GeneratorOutput::ToolRequest(request) => request,
        };

        if self.services.registry.is_destructive(&request.tool_name) {
            info!(tool = %request.tool_name, "destructive tool staged");
            let reply = format!(
                "I need to execute '{}' with arguments {}. Should I proceed?",
                request.tool_name,
                request.args_display()
            );
            self.pending = Some(PendingConfirmation::Tool(request));
            return reply;
        }

        info!(tool = %request.tool_name, "executing tool");
        let result = self
            .services
            .registry
            .dispatch(&request.tool_name, &request.args);
        let (result, truncated) = truncate_output(&result, DEFAULT_MAX_BYTES);
        if truncated {
            debug!(tool = %request.tool_name, "tool output truncated");
        }
        context.push_str(&format!(
            "\nSystem: Tool '{}' returned: {result}",
            request.tool_name
        ));

        match self.services.generator.generate(&context) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("follow-up generation failed: {e}");
                format!("[Error] {e}")
            }
        }
    }

    fn record(&mut self, input: &str, reply: &str) {
        self.history.push(input, reply);
        if let Some(log) = &self.services.conversation_log
            && let Err(e) = log.record_exchange(input, reply)
        {
            warn!("cannot persist exchange: {e}");
        }
    }
}

/// Facts as a bulleted list for display.
pub fn format_facts(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return NO_FACTS.to_owned();
    }
    let mut lines = vec!["Here's what I remember about you:".to_owned(), String::new()];
    lines.extend(facts.iter().map(|fact| match &fact.category {
        Some(category) => format!("  • {}: {} [{category}]", fact.key, fact.value),
        None => format!("  • {}: {}", fact.key, fact.value),
    }));
    lines.join("\n")
}
