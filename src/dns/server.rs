//! UDP front end feeding the handler chain

use crate::dns::handler::{Handler, ResponseWriter};
use crate::Result;
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_UDP_QUERY: usize = 4096;

/// Writes a response back to the peer a datagram came from
pub struct UdpResponseWriter {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpResponseWriter {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait]
impl ResponseWriter for UdpResponseWriter {
    async fn write_msg(&mut self, msg: &Message) -> Result<()> {
        let bytes = msg.to_vec()?;
        self.socket.send_to(&bytes, self.peer).await?;
        Ok(())
    }
}

pub struct DnsServer {
    socket: Arc<UdpSocket>,
    handler: Arc<dyn Handler>,
    shutdown: CancellationToken,
}

impl DnsServer {
    pub async fn bind(addr: SocketAddr, handler: Arc<dyn Handler>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(bind_address = %socket.local_addr()?, protocol = "UDP", "DNS server listening");

        Ok(Self {
            socket: Arc::new(socket),
            handler,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until cancelled. Every query runs on its own task.
    pub async fn run(self) -> Result<()> {
        let mut buf = vec![0u8; MAX_UDP_QUERY];

        loop {
            let (len, peer) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received?,
            };

            let request = match Message::from_vec(&buf[..len]) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "Dropping undecodable datagram");
                    continue;
                }
            };

            let handler = self.handler.clone();
            let writer = UdpResponseWriter::new(self.socket.clone(), peer);
            tokio::spawn(serve_one(handler, request, writer));
        }

        info!("DNS server stopped");
        Ok(())
    }
}

async fn serve_one(handler: Arc<dyn Handler>, request: Message, mut writer: UdpResponseWriter) {
    match handler.serve_dns(&request, &mut writer).await {
        Ok(code) => debug!(id = request.id(), rcode = %code, "Query served"),
        Err(e) => {
            warn!(id = request.id(), handler = handler.name(), error = %e, "Query failed");
            let failure =
                Message::error_msg(request.id(), request.op_code(), ResponseCode::ServFail);
            if let Err(e) = writer.write_msg(&failure).await {
                debug!(error = %e, "Failed to write SERVFAIL");
            }
        }
    }
}
