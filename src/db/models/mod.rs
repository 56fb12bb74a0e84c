//! Database models split into domain-specific modules.

pub mod appointment;
pub mod clinical_note;
pub mod department;
pub mod patient;
pub mod user;

pub use appointment::*;
pub use clinical_note::*;
pub use department::*;
pub use patient::*;
pub use user::*;
