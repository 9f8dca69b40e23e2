mod server;
pub use server::InteractionServer;

mod server_config;
pub use server_config::ServerConfig;
