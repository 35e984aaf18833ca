//! Standalone echo server for poking at a client by hand.
//!
//! Binds `$MOCK_HOST:$PORT` (default `127.0.0.1:3000`). `PORT=0` picks a free
//! port; the chosen address is printed either way.

use std::net::SocketAddr;

use tokio::net::TcpListener;

fn bind_addr(host: Option<String>, port: Option<String>) -> Result<SocketAddr, std::io::Error> {
    let host = host.unwrap_or_else(|| "127.0.0.1".to_string());
    let port = port.unwrap_or_else(|| "3000".to_string());
    format!("{host}:{port}")
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let addr = bind_addr(std::env::var("MOCK_HOST").ok(), std::env::var("PORT").ok())?;
    let listener = TcpListener::bind(addr).await?;
    println!("echo server listening on http://{}", listener.local_addr()?);
    mock_server::run(listener).await
}
