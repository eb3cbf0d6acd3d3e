//! ClipNote - Offline note capture with asynchronous OCR
//!
//! Captured text and screen regions land in a local note store; post-save
//! work (OCR on screenshots) runs through a single-consumer processing queue
//! with bounded retry. Front ends talk to the core through the typed message
//! router.

pub mod commands;
pub mod crop;
pub mod note;
pub mod notify;
pub mod ocr;
pub mod queue;
pub mod router;
pub mod store;
