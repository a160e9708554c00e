pub mod conversations;
pub mod friends;
pub mod health;
pub mod messages;
pub mod suggestions;
pub mod users;
pub mod websocket;
