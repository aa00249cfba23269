mod error;
mod gemini;

pub use error::BackendError;
pub use gemini::GeminiBackend;
