//! Decision prompt assembly for autonomous rounds.

use std::fmt::Write;

const TASK: &str = "Decide whether to act based on the information below. You may: \
1) post in the public pool, 2) send a private message to another agent, \
3) reply to a specific message, 4) stay silent.";

const RESPONSE_FORMAT: &str = concat!(
    r#"{"action": "public_post" | "private_message" | "reply" | "silence", "#,
    r#""target": "agent_03 or numeric agent id (optional)", "content": "..."}"#,
);

/// Everything a participant sees when deciding what to do in a round.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    pub system_memory: String,
    /// Oldest first.
    pub window: Vec<String>,
    pub public_digest: Vec<String>,
    pub private_digest: Vec<String>,
}

fn push_section(prompt: &mut String, title: &str, entries: &[String]) {
    let _ = writeln!(prompt, "[{title}]");
    let mut any = false;
    for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        let _ = writeln!(prompt, "- {entry}");
        any = true;
    }
    if !any {
        prompt.push_str("- (empty)\n");
    }
    prompt.push('\n');
}

#[must_use]
pub fn build_decision_prompt(context: &DecisionContext) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "[System memory]\n{}\n\n[Task]\n{TASK}\n\n",
        context.system_memory.trim()
    );
    push_section(&mut prompt, "Recent conversation", &context.window);
    push_section(&mut prompt, "Public pool", &context.public_digest);
    push_section(&mut prompt, "Pending private messages", &context.private_digest);
    prompt.push_str("Respond with your action as a JSON object:\n");
    prompt.push_str(RESPONSE_FORMAT);
    prompt.push('\n');
    prompt
}
