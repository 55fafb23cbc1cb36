pub mod openai;

pub use openai::OpenAiComputerUseOracle;
