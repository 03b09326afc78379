pub mod chat;
pub mod classify;
pub mod doctor;
pub mod lexicon;
pub mod schema;
