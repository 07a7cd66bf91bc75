//! UDP ingress adapter

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::UdpConfig;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::adapter::IngressAdapter;
use crate::collector::FragmentCollector;
use crate::error::{IngestionError, Result};
use crate::pipeline::NotificationEmitter;
use crate::scheduler::TokioScheduler;

const PROTOCOL: &str = "udp";

/// Datagram listener feeding a `FragmentCollector`
pub struct UdpAdapter {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    recv_buffer_size: usize,
    quiescence: Duration,
    listening: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl UdpAdapter {
    /// Bind the datagram socket
    ///
    /// # Errors
    /// `IngestionError::Bind` if the address is unavailable
    pub async fn bind(config: &UdpConfig, quiescence: Duration) -> Result<Self> {
        let addr = config.listen_addr();
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|e| IngestionError::bind(PROTOCOL, addr.clone(), e))?;
        let local_addr = socket.local_addr()?;

        info!(addr = %local_addr, "udp listener bound");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            recv_buffer_size: config.recv_buffer_size,
            quiescence,
            listening: Arc::new(AtomicBool::new(false)),
            shutdown,
        })
    }
}

impl IngressAdapter for UdpAdapter {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn start(&self, emitter: NotificationEmitter) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyListening {
                protocol: PROTOCOL,
                addr: self.local_addr,
            });
        }

        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let socket = self.socket.clone();
        let listening = self.listening.clone();
        let collector = FragmentCollector::new(self.quiescence, TokioScheduler, emitter);
        let mut buf = vec![0u8; self.recv_buffer_size];

        debug!(addr = %self.local_addr, "starting udp receive loop");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    received = socket.recv_from(&mut buf) => match received {
                        Ok((len, peer)) => {
                            trace!(peer = %peer, len, "datagram received");
                            collector.on_datagram(peer, Bytes::copy_from_slice(&buf[..len]));
                        }
                        Err(e) => {
                            warn!(error = %e, "udp receive failed");
                        }
                    },
                }
            }
            listening.store(false, Ordering::SeqCst);
            debug!(in_flight = collector.in_flight(), "udp receive loop stopped");
        });

        Ok(())
    }

    fn stop(&self) {
        if self.listening.load(Ordering::SeqCst) {
            debug!(addr = %self.local_addr, "stopping udp adapter");
            self.shutdown.send_replace(true);
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::IngestionMetrics;
    use contracts::FRAME_SIZE;

    fn local_config() -> UdpConfig {
        UdpConfig {
            bind: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let adapter = UdpAdapter::bind(&local_config(), Duration::from_millis(50))
            .await
            .unwrap();
        assert_ne!(adapter.local_addr().port(), 0);
        assert!(!adapter.is_listening());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let first = UdpAdapter::bind(&local_config(), Duration::from_millis(50))
            .await
            .unwrap();
        let config = UdpConfig {
            port: first.local_addr().port(),
            ..local_config()
        };
        let err = UdpAdapter::bind(&config, Duration::from_millis(50))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IngestionError::Bind { protocol: "udp", .. }));
    }

    #[tokio::test]
    async fn test_receives_fragments_into_frame() {
        let adapter = UdpAdapter::bind(&local_config(), Duration::from_millis(100))
            .await
            .unwrap();
        let metrics = Arc::new(IngestionMetrics::new());
        let (emitter, rx) = NotificationEmitter::channel(4, metrics.clone());
        adapter.start(emitter.clone()).unwrap();
        assert!(adapter.is_listening());
        assert!(adapter.start(emitter).is_err());

        let frame = crate::decoder::encode(&contracts::AccelerometerFrame {
            mac: "AA:BB:CC:DD:EE:FF".into(),
            x: vec![1; 330],
            y: vec![2; 330],
            z: vec![3; 330],
        });
        assert_eq!(frame.len(), FRAME_SIZE);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&frame[..1470], adapter.local_addr()).await.unwrap();
        client.send_to(&frame[1470..], adapter.local_addr()).await.unwrap();

        let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.device_id, "AABBCCDDEEFF");
        assert_eq!(metrics.snapshot().datagrams_received, 2);

        adapter.stop();
    }
}
