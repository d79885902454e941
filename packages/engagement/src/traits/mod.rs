//! Trait seams between the engine and its document store.

pub mod store;
