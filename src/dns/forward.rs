use crate::dns::handler::{Handler, ResponseWriter};
use crate::{PodnsError, Result};
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

const MAX_UDP_RESPONSE: usize = 4096;

/// Relays queries to an upstream resolver over UDP
pub struct Forwarder {
    upstream: SocketAddr,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: SocketAddr, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    async fn exchange(&self, request: &Message) -> Result<Message> {
        let local = if self.upstream.is_ipv4() {
            SocketAddr::from(([0u8; 4], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.upstream).await?;
        socket.send(&request.to_vec()?).await?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE];
        let wait_for_reply = async {
            loop {
                let len = socket.recv(&mut buf).await?;
                match Message::from_vec(&buf[..len]) {
                    Ok(reply) if reply.id() == request.id() => return Ok::<_, PodnsError>(reply),
                    Ok(reply) => debug!(
                        expected = request.id(),
                        got = reply.id(),
                        "Dropping stray upstream reply"
                    ),
                    Err(e) => debug!(error = %e, len, "Dropping undecodable upstream datagram"),
                }
            }
        };

        // One deadline for the whole exchange, however many datagrams arrive
        tokio::time::timeout(self.timeout, wait_for_reply)
            .await
            .map_err(|_| PodnsError::UpstreamTimeout {
                upstream: self.upstream.to_string(),
            })?
    }
}

#[async_trait]
impl Handler for Forwarder {
    fn name(&self) -> &str {
        "forward"
    }

    async fn serve_dns(
        &self,
        request: &Message,
        writer: &mut dyn ResponseWriter,
    ) -> Result<ResponseCode> {
        let reply = self.exchange(request).await?;
        debug!(
            upstream = %self.upstream,
            rcode = %reply.response_code(),
            answers = reply.answers().len(),
            "Forwarded query"
        );
        writer.write_msg(&reply).await?;
        Ok(reply.response_code())
    }
}
