pub mod chain;
pub mod chain_sync_storage;
pub mod context;
pub mod entry;
pub mod error;
pub mod forked_chain_id;
pub mod one_shot;
pub mod root_interaction;
pub mod sync_data;
pub mod sync_record;
