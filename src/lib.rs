//! HSR Scanner
//!
//! Reads light cones, relics and characters out of a running Honkai: Star
//! Rail client by driving its UI with synthetic input, capturing screen
//! regions and OCR'ing them into typed records.

pub mod capture;
pub mod catalog;
pub mod error;
pub mod export;
pub mod input;
pub mod layout;
pub mod logging;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod paths;
pub mod scanner;
pub mod vision;
