//! Document OCR gateway.
//!
//! Routes an uploaded document image to one of two OCR providers by category,
//! normalizes their responses into one canonical result, and persists the
//! user-confirmed record.

pub mod chat;
pub mod config;
pub mod error;
pub mod ocr;
pub mod records;
pub mod server;
pub mod storage;

#[cfg(test)]
mod test_support;
