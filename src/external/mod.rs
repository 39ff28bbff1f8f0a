pub mod agcod;
pub mod mailer;
pub mod sigv4;

pub use agcod::*;
pub use mailer::*;
pub use sigv4::SigV4Signer;
