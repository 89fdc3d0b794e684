//! Prompt templates sent to the generative backend.
//!
//! Every classification prompt carries the same three-tier taxonomy so the short
//! and the detailed answers tag ingredients consistently. User text is fenced in
//! `<ingredients>` tags to keep it apart from the instructions.

pub const SYSTEM_PROMPT: &str = "You are a food-safety assistant. You classify food ingredients \
and additives for consumers reading product labels. Be factual and concise, never invent \
ingredients that are not in the input, and reply in plain text suitable for WhatsApp.";

pub const SHORT_HEADER: &str = "Classify the following ingredients";
pub const DETAILED_HEADER: &str = "Explain the following ingredients in detail";
pub const COMBINED_HEADER: &str = "Classify and then explain the following ingredients";
pub const INTENT_HEADER: &str = "Decide whether the user is asking for more detail";

/// Line separating the short and the detailed halves of a combined answer.
pub const DETAILS_MARKER: &str = "---DETAILS---";

const TAXONOMY: &str = "Use exactly one of these tiers for every ingredient:
✅ Safe
⚠️ Caution
❌ Avoid";

const EXAMPLES: &str = "Examples:
- INS 211 – ❌ Avoid – Linked to hyperactivity
- Maltodextrin – ⚠️ Caution – High glycemic index
- Turmeric – ✅ Safe – Natural anti-inflammatory";

const SHORT_RULES: &str = "Reply with one line per ingredient in the form \
`Ingredient – Tier – short reason` (at most 12 words of reason). No introduction, no conclusion.";

const DETAILED_RULES: &str = "For every ingredient give its tier, then a short paragraph covering:
- whether it is natural or artificial (and what it is made from)
- the health risk rationale, including who should limit or avoid it
- common alternative names or E/INS numbers, when relevant
Keep the same tier you would give in a one-line summary.";

const IMAGE_SUBJECT: &str = "Read the ingredient list printed on the food label in this photo. \
If no ingredient list is visible, say so in one line instead of guessing.";

/// Renders the part of a prompt that names what is being analysed.
fn subject(text: Option<&str>) -> String {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => format!("<ingredients>\n{}\n</ingredients>", text),
        None => IMAGE_SUBJECT.to_string(),
    }
}

/// Caption handling: an image caption is context, the label is the subject.
fn image_note(caption: Option<&str>) -> String {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => format!("\n\nThe user added this note: \"{}\"", caption),
        None => String::new(),
    }
}

/// One-line-per-ingredient summary prompt. `text` is `None` for image input.
pub fn short_prompt(text: Option<&str>, caption: Option<&str>) -> String {
    format!(
        "{}:\n{}{}\n\n{}\n\n{}\n\n{}",
        SHORT_HEADER,
        subject(text),
        image_note(caption),
        TAXONOMY,
        SHORT_RULES,
        EXAMPLES
    )
}

/// Full per-ingredient explanation prompt. `text` is `None` for image input.
pub fn detailed_prompt(text: Option<&str>, caption: Option<&str>) -> String {
    format!(
        "{}:\n{}{}\n\n{}\n\n{}\n\n{}",
        DETAILED_HEADER,
        subject(text),
        image_note(caption),
        TAXONOMY,
        DETAILED_RULES,
        EXAMPLES
    )
}

/// Single-call prompt producing both halves, separated by [`DETAILS_MARKER`].
pub fn combined_prompt(text: Option<&str>, caption: Option<&str>) -> String {
    format!(
        "{}:\n{}{}\n\n{}\n\nFirst part: {}\n\nThen write a line containing only {} and, after it, \
the second part: {}\n\n{}",
        COMBINED_HEADER,
        subject(text),
        image_note(caption),
        TAXONOMY,
        SHORT_RULES,
        DETAILS_MARKER,
        DETAILED_RULES,
        EXAMPLES
    )
}

/// Closed yes/no question used by the delegated intent policy.
pub fn detail_intent_prompt(message: &str) -> String {
    format!(
        "{}. The user previously received a short safety classification of some food \
ingredients. Their new message is:\n\"{}\"\n\nIs the user asking for more detail or a fuller \
explanation of that previous answer (rather than sending new ingredients)? Answer with only \
\"yes\" or \"no\".",
        INTENT_HEADER,
        message.trim()
    )
}
