mod http_server;

pub use http_server::run_http_server;
