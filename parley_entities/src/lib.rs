//! sea-orm entities backing the relational store.

pub mod agents;
pub mod chat_messages;
pub mod messages;
pub mod roles;
