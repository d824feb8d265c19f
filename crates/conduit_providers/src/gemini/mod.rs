mod client;
mod conversions;
mod types;

pub use client::GeminiClient;
