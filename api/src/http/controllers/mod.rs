pub mod chat;
pub mod home;

pub use chat as ChatController;
pub use home as HomeController;
