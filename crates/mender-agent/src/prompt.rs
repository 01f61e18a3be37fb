//! Prompts sent to the chat model

/// System turn opening every transcript
pub const SYSTEM_PROMPT: &str = "You are a self-healing agent.";

/// Tool result attached to calls that were withheld because they were unpaired
pub const UNPAIRED_RESULT: &str =
    "Not executed: log_uncertainty and update_kb must be called together";

/// Draft-state user turn
pub fn draft_prompt(context: &str, question: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nProduce a draft answer.",
        context, question
    )
}

/// Self-check user turn
pub fn self_check_prompt(draft: &str) -> String {
    format!(
        "Self-check: Is this answer fully supported by KB with no missing facts?\n\
         Answer: {}\n\n\
         If NO, call log_uncertainty and update_kb together in the same turn. \
         If YES, respond YES.",
        draft
    )
}

/// Corrective user turn after an unpaired self-check reply
pub fn pairing_correction(called: &[&str]) -> String {
    let called = if called.is_empty() {
        "no tools".to_string()
    } else {
        called.join(", ")
    };
    format!(
        "Self-check: your reply called {}. If facts are missing, call \
         log_uncertainty and update_kb together in the same turn. If the answer \
         is fully supported, respond YES.",
        called
    )
}
