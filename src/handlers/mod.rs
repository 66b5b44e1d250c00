pub mod analyzer;

pub use analyzer::FruitAnalyzer;
