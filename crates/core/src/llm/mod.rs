pub mod composer;
pub mod gateway;
pub mod gemini;
pub mod prompts;

pub use composer::{
    VisionPrompt, build_text_turns, build_text_turns_from_lines, build_vision_prompt,
    compose_vision_prompt, parse_history_line,
};
pub use gateway::{
    GatewayFuture, GenerationError, GenerationGateway, GenerationOptions, Turn, TurnRole,
    VisionImage,
};
pub use gemini::{GeminiConnectionError, GeminiGateway, GeminiGatewayConfig};
pub use prompts::{EXAMPLE_PROMPTS, GREETING, Persona, persona_prompt};
