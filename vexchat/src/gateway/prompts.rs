//! Fixed prompt templates.

use vexchat_proto::assist::AiAction;

/// System instruction for the assistant persona in streaming chats.
pub const SYSTEM_INSTRUCTION: &str = "You are an intelligent assistant integrated into VexChat, \
a modern messaging app. Your goal is to be helpful, concise, and friendly. When asked to perform \
tasks, do so efficiently. If the user is chatting casually, engage them naturally.";

/// Speaker label used for the local user in smart-reply context.
pub const SELF_LABEL: &str = "Me";

/// Instruction preceding the quoted source text for each action.
#[must_use]
pub const fn instruction(action: AiAction) -> &'static str {
    match action {
        AiAction::RewriteProfessional => {
            "Rewrite the following text to be more professional, polite, and concise:"
        }
        AiAction::RewriteFriendly => {
            "Rewrite the following text to be more friendly, casual, and warm:"
        }
        AiAction::FixGrammar => {
            "Fix any grammar or spelling errors in the following text. Do not change the tone or \
             meaning. Return only the corrected text:"
        }
        AiAction::TranslateEn => {
            "Translate the following text to English. If it is already English, just return it as is:"
        }
        AiAction::Summarize => "Summarize the following content briefly:",
        AiAction::Explain => "Explain the meaning or context of the following text simply:",
    }
}

/// Full single-turn prompt for `action` applied to `text`.
#[must_use]
pub fn action_prompt(action: AiAction, text: &str) -> String {
    format!("{}\n\n\"{text}\"", instruction(action))
}

/// Prompt asking for `count` quick replies to a rendered context.
///
/// `context` is one `Speaker: text` line per message, with the local user
/// labelled [`SELF_LABEL`].
#[must_use]
pub fn smart_reply_prompt(count: usize, context: &str) -> String {
    format!(
        "Based on the following conversation, suggest {count} short, natural, and contextually \
         relevant quick replies that \"{SELF_LABEL}\" could send next.\n\nConversation:\n{context}"
    )
}

/// Prompt summarizing a rendered conversation transcript.
#[must_use]
pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "Summarize the following conversation history. Capture the key points, decisions made, \
         and pending items if any. Keep it concise:\n\n{transcript}"
    )
}
