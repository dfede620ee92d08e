//! Telegram-facing pieces that do not need a live bot: callback payloads and
//! message rendering.

pub mod callback;
pub mod render;
