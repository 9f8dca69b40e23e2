pub mod operations;
pub mod test_roots;
pub mod test_server;

pub use packet_exchange::{exchange_records, tick_and_exchange, tick_and_exchange_n_times};
pub use test_client::TestClient;
pub use test_roots::{test_roots, TARGET};
pub use test_server::TestServer;
