//! Card generation: prompt construction and the model client seam.

mod openai;

pub use openai::{ApiKey, OpenAiClient, API_KEY_ENV};

use crate::domain::{GenerationRequest, GenerationResponse};
use crate::error::{Error, Result};
use crate::parse::{PAIR_DELIMITER, QA_DELIMITER};
use serde::Serialize;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that creates flashcards from given content.";

const MANPAGE_SYSTEM_PROMPT: &str =
    "You are a helpful Linux (LPIC) tutor that creates flashcards from given content.";

/// Anything that can turn a [`GenerationRequest`] into raw model output.
pub trait CompletionClient {
    fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}

/// One chat message as sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl GenerationRequest {
    pub fn new(
        text: impl Into<String>,
        count: usize,
        model: impl Into<String>,
        from_manpage: bool,
    ) -> Result<Self> {
        let model = model.into();
        if count == 0 {
            return Err(Error::Config("number of cards must be at least 1".to_string()));
        }
        if model.trim().is_empty() {
            return Err(Error::Config("model identifier must not be empty".to_string()));
        }
        Ok(Self { text: text.into(), count, model, from_manpage })
    }
}

/// Send one request through `client`. No batching, no retries.
pub fn generate(
    client: &dyn CompletionClient,
    request: &GenerationRequest,
) -> Result<GenerationResponse> {
    client.complete(request)
}

/// System and user messages for `request`.
pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let system = if request.from_manpage { MANPAGE_SYSTEM_PROMPT } else { SYSTEM_PROMPT };
    vec![
        ChatMessage { role: "system", content: system.to_string() },
        ChatMessage { role: "user", content: build_prompt(request) },
    ]
}

/// The user prompt: output contract, a short example, then the source text.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let label = if request.from_manpage { "man page content" } else { "content" };
    let noun = if request.count == 1 { "flashcard" } else { "flashcards" };
    format!(
        "Create exactly {count} {noun} from the following {label}.\n\
Write each flashcard as question{qa}answer on a single line and separate flashcards with {pair}.\n\
Do not number the flashcards, do not add labels such as \"Question:\" or \"Answer:\", \
and do not write anything before or after the flashcards.\n\
Never use {qa} or {pair} inside a question or an answer.\n\
\n\
Example with 2 flashcards:\n\
What does ls do?{qa}It lists directory contents{pair}Which ls option shows hidden files?{qa}-a\n\
\n\
Content:\n\
{text}",
        count = request.count,
        qa = QA_DELIMITER,
        pair = PAIR_DELIMITER,
        text = request.text,
    )
}
