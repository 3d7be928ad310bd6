use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tickfill_shared::{Packet, Request, REQUEST_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn packet_for(sequence: i32) -> Packet {
    let symbol = ["MSFT", "AAPL", "AMZN", "META"][sequence as usize % 4];
    let side = if sequence % 2 == 0 { 'B' } else { 'S' };

    Packet::new(symbol, side, 10 * sequence, 100 + sequence, sequence)
}

/// Behaviour of the in-process exchange server used by the tests.
pub struct MockExchange {
    packets: HashMap<i32, Packet>,
    bulk: Vec<i32>,
    bulk_chunk_size: usize,
    bulk_trailing_bytes: usize,
    stalled: HashSet<u8>,
    dropped: Mutex<HashMap<u8, u32>>,
    open_connections: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

impl MockExchange {
    pub fn new(sequences: impl Iterator<Item = i32>, bulk: &[i32]) -> Self {
        Self {
            packets: sequences.map(|seq| (seq, packet_for(seq))).collect(),
            bulk: bulk.to_vec(),
            bulk_chunk_size: 5,
            bulk_trailing_bytes: 0,
            stalled: HashSet::new(),
            dropped: Mutex::new(HashMap::new()),
            open_connections: AtomicUsize::new(0),
            requests: Mutex::new(vec![]),
        }
    }

    /// Never answer resend requests for `sequence`, keeping the connection open.
    pub fn stall(mut self, sequence: u8) -> Self {
        self.stalled.insert(sequence);
        self
    }

    /// Close the connection without answering the first `times` resend requests.
    pub fn drop_first(self, sequence: u8, times: u32) -> Self {
        self.dropped.lock().unwrap().insert(sequence, times);
        self
    }

    pub fn with_trailing_bytes(mut self, count: usize) -> Self {
        self.bulk_trailing_bytes = count;
        self
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, sequence: u8) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| **r == Request::SendOne(sequence))
            .count()
    }

    async fn handle(&self, mut socket: TcpStream) -> std::io::Result<()> {
        let mut buff = [0u8; REQUEST_SIZE];
        socket.read_exact(&mut buff).await?;

        let request = match Request::parse(&buff) {
            Some(request) => request,
            None => return Ok(()),
        };

        self.requests.lock().unwrap().push(request);

        match request {
            Request::SendAll => {
                let mut data = vec![];
                for seq in self.bulk.iter() {
                    data.extend_from_slice(&self.packets[seq].to_bytes());
                }
                data.extend(std::iter::repeat(0u8).take(self.bulk_trailing_bytes));

                for chunk in data.chunks(self.bulk_chunk_size) {
                    socket.write_all(chunk).await?;
                    socket.flush().await?;
                    tokio::task::yield_now().await;
                }

                Ok(())
            }
            Request::SendOne(sequence) => {
                if let Some(times) = self.dropped.lock().unwrap().get_mut(&sequence) {
                    if *times > 0 {
                        *times -= 1;
                        return Ok(());
                    }
                }

                if !self.stalled.contains(&sequence) {
                    match self.packets.get(&(sequence as i32)) {
                        Some(packet) => socket.write_all(&packet.to_bytes()).await?,
                        None => return Ok(()),
                    }
                }

                // Hold the connection until the client releases it
                let mut rest = [0u8; 16];
                while socket.read(&mut rest).await? > 0 {}

                Ok(())
            }
        }
    }
}

pub struct MockServer {
    pub port: u16,
    pub exchange: Arc<MockExchange>,
}

impl MockServer {
    pub async fn start(exchange: MockExchange) -> Self {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("failed to bind mock server");
        let port = listener.local_addr().unwrap().port();
        let exchange = Arc::new(exchange);

        let accepting = Arc::clone(&exchange);
        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => break,
                };

                let exchange = Arc::clone(&accepting);
                exchange.open_connections.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    let _ = exchange.handle(socket).await;
                    exchange.open_connections.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self { port, exchange }
    }

    /// Waits for every server side connection handler to finish.
    pub async fn wait_for_idle(&self) {
        for _ in 0..100 {
            if self.exchange.open_connections() == 0 {
                return;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// A port on which nothing is listening.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();

    listener.local_addr().unwrap().port()
}
