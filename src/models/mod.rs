pub mod chat;
pub mod prediction;
