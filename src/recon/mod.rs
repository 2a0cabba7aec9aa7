pub mod compare;
pub mod encoding;
pub mod input;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod report;
pub mod verify;

pub use encoding::TextEncoding;
pub use models::RunSummary;
pub use pipeline::Reconciler;
