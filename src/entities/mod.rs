pub mod contest_entries;
pub mod contests;
pub mod email_validation_links;
pub mod schools;
pub mod students;

pub use contest_entries as contest_entry_entity;
pub use contests as contest_entity;
pub use email_validation_links as email_validation_link_entity;
pub use schools as school_entity;
pub use students as student_entity;

pub use contests::ContestKind;
