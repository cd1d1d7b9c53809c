pub mod cli;
pub mod config;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod selector;
