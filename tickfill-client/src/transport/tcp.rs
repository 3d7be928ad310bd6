use super::{RequestError, Transport};
use async_trait::async_trait;
use log::*;
use std::io;
use std::time::Duration;
use tickfill_shared::{FrameDecoder, Packet, Request, FRAME_SIZE};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

const READ_BUFFER_SIZE: usize = 1024;

/// Opens a fresh TCP connection to the server for every request.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
        }
    }

    async fn connect(&self, request: Request) -> io::Result<TcpStream> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;

        debug!("connected to {}:{}, sending {:?}", self.host, self.port, request);

        stream.write_all(&request.to_bytes()).await?;
        stream.flush().await?;

        Ok(stream)
    }

    async fn exchange_one(&self, request: Request) -> Result<Packet, RequestError> {
        let mut stream = self.connect(request).await?;

        let mut frame = [0u8; FRAME_SIZE];
        stream.read_exact(&mut frame).await?;

        Ok(Packet::parse(&frame)?)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_and_await_one(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Packet, RequestError> {
        // The connection lives inside the timed future, so it is dropped
        // and closed whichever way the exchange ends.
        match tokio::time::timeout(timeout, self.exchange_one(request)).await {
            Ok(result) => result,
            Err(_) => Err(RequestError::timeout(timeout)),
        }
    }

    async fn send_and_await_all(&self, request: Request) -> Result<Vec<Packet>, RequestError> {
        let mut stream = self.connect(request).await?;
        info!("Connected to server");

        let mut decoder = FrameDecoder::new();
        let mut packets = vec![];
        let mut received = 0usize;
        let mut buff = [0u8; READ_BUFFER_SIZE];

        loop {
            let read = match stream.read(&mut buff).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if received == 0 => return Err(err.into()),
                Err(err) => {
                    warn!("connection failed after {} bytes: {}", received, err);
                    break;
                }
            };

            received += read;

            for packet in decoder.push(&buff[..read]) {
                info!("Received sequence: {}", packet.sequence);
                packets.push(packet);
            }
        }

        info!("Connection closed");

        if let Err(err) = decoder.finish() {
            warn!("discarding incomplete bulk response data: {}", err);
        }

        Ok(packets)
    }
}
