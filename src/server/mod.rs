use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use tracing::{info, warn};

use crate::commission::OfferTable;
use crate::config::SimulatorConfig;

pub mod api;
pub mod routes;

/// Everything a request handler needs: the active offer table and the simulator settings.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub offers: OfferTable,
    pub config: SimulatorConfig,
}

impl AppContext {
    pub fn new(offers: OfferTable, config: SimulatorConfig) -> Self {
        Self { offers, config }
    }

    /// Reference offers with default settings.
    pub fn reference() -> Self {
        Self::new(OfferTable::reference(), SimulatorConfig::default())
    }
}

pub fn run_server(ctx: &AppContext) -> std::io::Result<()> {
    let listener = TcpListener::bind(&ctx.config.bind_addr)?;
    info!("tiermix server listening on http://{}", ctx.config.bind_addr);

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, ctx) {
                    warn!(error = %err, "request error");
                }
            }
            Err(err) => warn!(error = %err, "connection failed"),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream, ctx: &AppContext) -> std::io::Result<()> {
    let mut buffer = [0_u8; 16_384];
    let bytes_read = stream.read(&mut buffer)?;
    if bytes_read == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let mut lines = request.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");

    let body = request
        .split("\r\n\r\n")
        .nth(1)
        .or_else(|| request.split("\n\n").nth(1))
        .unwrap_or("");

    let response = routes::route_request(ctx, method, path, body);
    info!(method, path, status = response.status_code, "handled request");
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()?;
    Ok(())
}
