pub mod auth;
pub mod completion;
pub mod doctor;
pub mod queue;
pub mod search;
pub mod ticket;
