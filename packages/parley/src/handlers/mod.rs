pub mod accounts;
pub mod groups;
pub mod health;
pub mod history;
pub mod users;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use accounts::{login_handler, signup_handler};
pub use groups::{add_member, create_group, get_group, list_groups, remove_member};
pub use health::{health_handler, health_live_handler, health_ready_handler, metrics_handler};
pub use history::get_history;
pub use users::{list_users, update_avatar};
pub use websocket::chat_websocket_handler;
