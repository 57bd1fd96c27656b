// Prompt assembly for the answer pipeline. The system instruction is a
// versioned template resource so it can be reviewed and tested on its own.

use crate::api::ChatMessage;

/// The fixed system instruction: TA role plus strict answering rules.
pub const SYSTEM_PROMPT: &str = include_str!("system_prompt.txt");

const CONTEXT_HEADER: &str = "Course Context Chunks:";
const IMAGE_TEXT_LABEL: &str = "[Text extracted from image]: ";
const QUESTION_LABEL: &str = "Student Question: ";

/// Assemble the prompt turns: the system instruction, the context header,
/// one turn per retrieved source text, the labeled OCR text when present,
/// and the student question last.
#[inline]
pub fn build_messages(
    question: &str,
    source_texts: &[String],
    image_text: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(source_texts.len() + 3);

    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.push(ChatMessage::user(CONTEXT_HEADER));

    for text in source_texts {
        messages.push(ChatMessage::user(text.clone()));
    }

    if let Some(image_text) = image_text {
        if !image_text.trim().is_empty() {
            messages.push(ChatMessage::user(format!(
                "{}{}",
                IMAGE_TEXT_LABEL, image_text
            )));
        }
    }

    messages.push(ChatMessage::user(format!("{}{}", QUESTION_LABEL, question)));

    messages
}
