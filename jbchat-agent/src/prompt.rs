//! Default prompts and prompt formatting.

use jbchat_model::ChatMessage;
use jbchat_rag::ScoredChunk;

use crate::session::{Role, Turn};

/// Instruction used to turn a follow-up into a standalone question.
pub const CONTEXTUALIZE_PROMPT: &str = "\
Given a chat history and the latest user question \
which might reference context in the chat history, \
formulate a standalone question which can be understood without the chat history. \
Do NOT answer the question, just reformulate it if needed and otherwise return it as is.";

/// Default answer instruction.
pub const SYSTEM_PROMPT: &str = "\
You are an expert in biological processes and an assistant for questions about JBrowse 2 \
and about the user's JBrowse 2 configuration file. \
Always give a clear, accurate and complete answer.

First decide whether the user asks (A) about their configuration file \
or the biology it relates to, \
or (B) a general question about using JBrowse 2.

A. Configuration questions:
  1. Answer from the track records in the context. Explain how you reached your conclusions. \
Do not make claims about the biological significance of the user's data.
  2. Only when the question references TRACKS and you can answer confidently, call the \
`session_link` tool to build a link to a JBrowse 2 session showing them. Pass the trackIds, \
the assembly name of those tracks and a location. If the user named a location or gene use it; \
otherwise pick a gene commonly studied on that assembly (for example TP53 in cancer research) \
and tell the user why. Use LinearSyntenyView with two assemblies when the user asks for synteny, \
otherwise LinearGenomeView unless another view (CircularView, DotplotView, SpreadsheetView, \
SvInspectorView) is requested.
  3. Print the returned URL plainly and also as a hyperlink.

B. General questions:
  1. Find the answer in the JBrowse documentation in the context, or call `search_knowledge` \
to look for more.
  2. Quote the documentation in your answer.
  3. Give the documentation URL plainly so the user can see where it links to.

Only answer from the provided context and tool results.";

/// The variables line appended to the system instruction.
pub fn format_variables(host: &str, config_name: &str) -> String {
    format!("\nUse these as variables: \nHOST={host}\nCONFIG={config_name}")
}

/// Render retrieved chunks as the `<doc>` context block, numbered from 0.
pub fn format_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let chunk = &result.chunk;
            format!(
                "<doc id='{i}' kind='{}' source='{}'>{}</doc>",
                chunk.source_kind,
                chunk.source(),
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The final user message of an answer request.
pub fn question_message(context: &str, question: &str) -> ChatMessage {
    ChatMessage::user(format!("Context: {context}\nQuestion: {question}"))
}

/// Map history turns onto chat messages.
pub fn history_messages(history: &[Turn]) -> impl Iterator<Item = ChatMessage> + '_ {
    history.iter().map(|turn| match turn.role {
        Role::Human => ChatMessage::user(turn.content.as_str()),
        Role::Ai => ChatMessage::assistant(turn.content.as_str()),
    })
}
