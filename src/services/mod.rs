pub mod contest_service;
pub mod entry_service;
pub mod school_service;
pub mod student_service;
pub mod validation_service;

pub use contest_service::*;
pub use entry_service::*;
pub use school_service::*;
pub use student_service::*;
pub use validation_service::*;
