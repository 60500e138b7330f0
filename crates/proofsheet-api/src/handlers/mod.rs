pub mod health;
pub mod process_image;
pub mod upload_grants;
pub mod webhooks;
