//! Builds what the remote model receives: role-tagged turns for text advice
//! and a single prompt plus image for vision analysis.
//!
//! The model has no separate system channel here, so the persona travels as
//! the first user turn.

use super::gateway::{Turn, VisionImage};
use super::prompts::{VISION_INSTRUCTION, VISION_QUESTION_LABEL};
use crate::session::ReplayTurn;

pub const USER_LINE_PREFIX: &str = "Usuario:";
pub const ASSISTANT_LINE_PREFIX: &str = "Asistente:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionPrompt {
    pub text: String,
    pub image: VisionImage,
}

pub fn build_text_turns(persona: &str, history: &[ReplayTurn], new_user_text: &str) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(Turn::user(persona));
    turns.extend(history.iter().map(ReplayTurn::to_turn));
    turns.push(Turn::user(new_user_text));
    turns
}

/// Same as [`build_text_turns`] for history kept in the prefixed line format,
/// the shape transcripts export and `Session::resume_from_lines` reads back.
/// Lines matching neither prefix are dropped from the composed turns.
pub fn build_text_turns_from_lines<S: AsRef<str>>(
    persona: &str,
    history_lines: &[S],
    new_user_text: &str,
) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history_lines.len() + 2);
    turns.push(Turn::user(persona));
    turns.extend(
        history_lines
            .iter()
            .filter_map(|line| parse_history_line(line.as_ref())),
    );
    turns.push(Turn::user(new_user_text));
    turns
}

pub fn parse_history_line(line: &str) -> Option<Turn> {
    if let Some(rest) = line.strip_prefix(USER_LINE_PREFIX) {
        return Some(Turn::user(strip_separator(rest)));
    }
    if let Some(rest) = line.strip_prefix(ASSISTANT_LINE_PREFIX) {
        return Some(Turn::model(strip_separator(rest)));
    }
    None
}

pub fn build_vision_prompt(persona: &str, question: Option<&str>) -> String {
    match question.map(str::trim).filter(|question| !question.is_empty()) {
        Some(question) => {
            format!("{persona}\n\n{VISION_QUESTION_LABEL}{question}\n\n{VISION_INSTRUCTION}")
        }
        None => format!("{persona}\n\n{VISION_INSTRUCTION}"),
    }
}

pub fn compose_vision_prompt(
    persona: &str,
    question: Option<&str>,
    image: VisionImage,
) -> VisionPrompt {
    VisionPrompt {
        text: build_vision_prompt(persona, question),
        image,
    }
}

fn strip_separator(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}
