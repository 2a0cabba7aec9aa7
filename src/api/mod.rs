pub mod admin;
pub mod recon;

pub use admin::admin_router;
pub use recon::{recon_router, ReconState};
