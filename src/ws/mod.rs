pub mod chat_handler;
pub mod handler;
pub mod join_handler;
pub mod presence;
pub mod reconcile;
pub mod registry;
pub mod rooms;
pub mod scheduler;
pub mod update_handler;
