//! Accept loop (C5): binds the listening socket, accepts connections, spawns one session per
//! connection, and supports graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};

use crate::observer::{LoggingObserver, ServerObserver};
use crate::session::Session;

/// The reference server drives shutdown by calling each thread's `to_final()` directly;
/// a spawned tokio task can't be reached into that way, so shutdown aborts the task instead.
/// The effect is the same a client sees: the socket closes and the session is gone.
struct LiveSession {
    peer: SocketAddr,
    abort: tokio::task::AbortHandle,
}

/// Binds a listening socket and accepts connections, one spawned session per connection.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    observers: Vec<Box<dyn ServerObserver>>,
    sessions: Arc<Mutex<Vec<LiveSession>>>,
}

impl Server {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            observers: Vec::new(),
            sessions: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn add_observer(&mut self, observer: Box<dyn ServerObserver>) {
        self.observers.push(observer);
    }

    /// Accepts connections in a cancellable ~1 s poll until `shutdown` resolves, then drives
    /// every still-open session to its terminal phase before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        log::info!("started server on {}", self.addr);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("shutdown requested, closing {} in-flight session(s)", self.sessions.lock().await.len());
                    self.terminate_all().await;
                    return;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => self.spawn(socket, peer).await,
                        Err(err) => log::warn!("accept failed: {err}"),
                    }
                }
            }
        }
    }

    async fn spawn(&mut self, socket: tokio::net::TcpStream, peer: SocketAddr) {
        log::info!("(+) accepted connection from {peer}");
        for observer in &mut self.observers {
            observer.on_new_connection(peer);
        }

        let mut session = Session::new(socket, peer);
        session.add_observer(Box::new(LoggingObserver::new(peer)));

        let cleanup = Arc::clone(&self.sessions);
        let handle = tokio::spawn(async move {
            session.run().await;
            cleanup.lock().await.retain(|entry| entry.peer != peer);
        });

        let abort = handle.abort_handle();
        self.sessions.lock().await.push(LiveSession { peer, abort });
    }

    async fn terminate_all(&self) {
        let sessions = self.sessions.lock().await;
        for session in sessions.iter() {
            log::info!("aborting session for {}", session.peer);
            session.abort.abort();
        }
    }
}
