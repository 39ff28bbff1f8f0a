pub mod email;
pub mod tokens;

pub use email::{EmailPolicy, hash_email, is_valid_for_school, normalize_email};
pub use tokens::make_token;
