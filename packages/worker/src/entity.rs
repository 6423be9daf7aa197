pub mod model_photo;
pub mod photo_embedding;
pub mod photo_projection;
pub mod projection_basis;
pub mod user_photo;
