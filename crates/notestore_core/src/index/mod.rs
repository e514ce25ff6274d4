//! Path ↔ id index covering every durable note.

pub mod path_index;
