use rand::seq::SliceRandom;

use crate::journal::EntryCategory;

/// Shown when the freeform mode is asked for a prompt without any context.
pub const AI_NEEDS_CONTEXT: &str = "Please type a little context first so I can help.";

/// Starter text for the freeform mode when the assistant is unreachable.
pub const AI_STARTER: &str = "Start by describing your situation first...";

/// Sentiment labels an entry analysis is asked to choose from.
pub const ANALYSIS_CATEGORIES: [&str; 6] = [
    "Gratitude",
    "Anxiety",
    "Work Focus",
    "Health",
    "Creativity",
    "Family",
];

const DAILY_FALLBACKS: [&str; 3] = [
    "What is one thing I have the power to control today?",
    "What would make today feel like a success?",
    "Who can I support or encourage today?",
];

const WEEKLY_FALLBACKS: [&str; 3] = [
    "What was my biggest win this week?",
    "Where did I waste the most time this week?",
    "Did I live by my core values this week?",
];

const MONTHLY_FALLBACKS: [&str; 3] = [
    "How have I changed in the last 30 days?",
    "What goals are no longer relevant?",
    "What was the dominant emotion of this month?",
];

const STUMPED_FALLBACKS: [&str; 3] = [
    "Describe the room you are in right now in extreme detail.",
    "List 10 things that are blue.",
    "What is a problem you solved recently?",
];

/// A curated prompt for when the assistant is unreachable.
pub fn curated_prompt(category: EntryCategory) -> &'static str {
    let pool: &[&str] = match category {
        EntryCategory::Daily => &DAILY_FALLBACKS,
        EntryCategory::Weekly => &WEEKLY_FALLBACKS,
        EntryCategory::Monthly => &MONTHLY_FALLBACKS,
        EntryCategory::Stumped => &STUMPED_FALLBACKS,
        EntryCategory::Ai => return AI_STARTER,
    };

    pool.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(AI_STARTER)
}

/// Guidance text the prompt generator never speaks aloud or digs into.
pub fn is_placeholder(text: &str) -> bool {
    text.contains("Start by describing") || text.contains("Please type")
}

pub fn category_instruction(category: EntryCategory) -> Option<&'static str> {
    match category {
        EntryCategory::Daily => Some(
            "Generate a single, deep, introspective journaling prompt for a Daily Log. \
             Focus on gratitude, stoicism, intention setting, or immediate reflection. \
             Keep it under 20 words. Do not give advice, just the question.",
        ),
        EntryCategory::Weekly => Some(
            "Generate a single, tactical journaling prompt for a Weekly Review. \
             Focus on analyzing the past week's performance, habits, wins, or preparing \
             for the next week. Keep it under 25 words. Do not give advice, just the question.",
        ),
        EntryCategory::Monthly => Some(
            "Generate a single, strategic journaling prompt for a Monthly Reset. \
             Focus on long-term goals, life trajectory, emotional patterns, or big-picture \
             alignment. Keep it under 25 words. Do not give advice, just the question.",
        ),
        EntryCategory::Stumped => Some(
            "Generate a single, creative lateral-thinking journaling prompt to cure \
             writer's block. Focus on sensory details, simple lists, childhood memories, \
             or hypothetical scenarios. Keep it fun and low-pressure. Keep it under 20 words.",
        ),
        EntryCategory::Ai => None,
    }
}

pub fn freeform_instruction(user_context: &str) -> String {
    format!(
        "You are a stoic, mindful journaling assistant. The user provides this context: \
         \"{user_context}\". Ask ONE deep, introspective question that helps them explore \
         this feeling or situation. Do not give advice. Do not be preachy. Keep it under \
         2 sentences. The output should be just the question."
    )
}

pub fn dig_deeper_instruction(current_prompt: &str) -> String {
    format!(
        "The current journaling prompt is: {current_prompt}. The user is stumped or wants \
         to go deeper. Provide a single follow-up question that asks \"Why\" or probes the \
         underlying root cause of this topic. Keep it short, kind, but piercing. \
         Output ONLY the question."
    )
}

pub fn analysis_instruction(entry_text: &str) -> String {
    format!(
        "Analyze this journal entry: \"{entry_text}\".\n\
         1. Classify it into exactly one of these categories: {}.\n\
         2. Provide a one-sentence stoic or mindful insight about this entry.\n\
         Return strictly JSON: {{ \"category\": \"CategoryName\", \"insight\": \"Your insight here\" }}",
        ANALYSIS_CATEGORIES.join(", ")
    )
}
