pub mod cv; // Roboflow-style CV inference client
pub mod openai; // OpenAI vision service
pub mod parser; // Tolerant parsing of LLM replies

pub use cv::{FruitDetector, RoboflowClient};
pub use openai::{OpenAiVisionService, VisionAnalyzer};
