//! MQTT ingress: accepts client connections and turns PUBLISH packets into
//! routed notifications. Nothing is ever delivered to subscribers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use contracts::MqttConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use super::codec::{
    self, Connect, MqttError, Packet, Publish, QoS, CONNACK_ACCEPTED,
    CONNACK_UNACCEPTABLE_PROTOCOL, PROTOCOL_LEVEL_V311, SUBACK_FAILURE,
};
use crate::adapter::IngressAdapter;
use crate::error::{IngestionError, Result};
use crate::normalizer::normalize;
use crate::pipeline::NotificationEmitter;
use crate::router::{handle_publish, PublishEvent};

const PROTOCOL: &str = "mqtt";

/// Keep-alive grace, in thousandths of the negotiated interval
const KEEP_ALIVE_GRACE_PERMILLE: u64 = 1500;

/// MQTT listener
pub struct MqttAdapter {
    listener: Arc<TcpListener>,
    local_addr: SocketAddr,
    max_packet_size: usize,
    connect_timeout: Option<Duration>,
    listening: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    connections: Arc<AtomicU64>,
}

impl MqttAdapter {
    /// Bind the TCP listener
    ///
    /// # Errors
    /// `IngestionError::Bind` if the address is unavailable
    pub async fn bind(config: &MqttConfig) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| IngestionError::bind(PROTOCOL, addr.clone(), e))?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "mqtt listener bound");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            listener: Arc::new(listener),
            local_addr,
            max_packet_size: config.max_packet_size,
            connect_timeout: config.connect_timeout(),
            listening: Arc::new(AtomicBool::new(false)),
            shutdown,
            connections: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Connections accepted since bind
    pub fn connections_accepted(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}

impl IngressAdapter for MqttAdapter {
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
        let listener = self.listener.clone();
        let listening = self.listening.clone();
        let connections = self.connections.clone();
        let shutdown_tx = self.shutdown.clone();
        let max_packet_size = self.max_packet_size;
        let connect_timeout = self.connect_timeout;

        debug!(addr = %self.local_addr, "starting mqtt accept loop");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            connections.fetch_add(1, Ordering::Relaxed);
                            let session = Session::new(peer, emitter.clone(), max_packet_size, connect_timeout);
                            let conn_shutdown = shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                match session.run(stream, conn_shutdown).await {
                                    Ok(()) => debug!(peer = %peer, "mqtt connection closed"),
                                    Err(e) => warn!(peer = %peer, error = %e, "mqtt connection dropped"),
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "mqtt accept failed"),
                    },
                }
            }
            listening.store(false, Ordering::SeqCst);
            debug!("mqtt accept loop stopped");
        });

        Ok(())
    }

    fn stop(&self) {
        if self.listening.load(Ordering::SeqCst) {
            debug!(addr = %self.local_addr, "stopping mqtt adapter");
            self.shutdown.send_replace(true);
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// State of one client connection
struct Session {
    peer: SocketAddr,
    emitter: NotificationEmitter,
    max_packet_size: usize,
    connect_timeout: Option<Duration>,
    keep_alive: Option<Duration>,
    client_id: Option<String>,
}

impl Session {
    fn new(
        peer: SocketAddr,
        emitter: NotificationEmitter,
        max_packet_size: usize,
        connect_timeout: Option<Duration>,
    ) -> Self {
        Self {
            peer,
            emitter,
            max_packet_size,
            connect_timeout,
            keep_alive: None,
            client_id: None,
        }
    }

    /// How long the next read may wait before the connection is dropped
    fn read_limit(&self) -> Option<(&'static str, Duration)> {
        if self.client_id.is_none() {
            self.connect_timeout.map(|limit| ("CONNECT", limit))
        } else {
            self.keep_alive.map(|limit| ("packet", limit))
        }
    }

    #[instrument(name = "mqtt_session", skip_all, fields(peer = %self.peer))]
    async fn run(mut self, mut stream: TcpStream, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut read_buf = BytesMut::with_capacity(4096);
        let mut write_buf = BytesMut::new();

        loop {
            while let Some(packet) = codec::decode(&mut read_buf, self.max_packet_size)? {
                let keep_open = self.handle(packet, &mut write_buf)?;
                if !write_buf.is_empty() {
                    stream.write_all(&write_buf).await?;
                    write_buf.clear();
                }
                if !keep_open {
                    return Ok(());
                }
            }

            let limit = self.read_limit();
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                read = read_within(&mut stream, &mut read_buf, limit) => {
                    if read? == 0 {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Apply one packet; returns whether the connection stays open
    fn handle(&mut self, packet: Packet, out: &mut BytesMut) -> Result<bool> {
        if self.client_id.is_none() && !matches!(packet, Packet::Connect(_)) {
            return Err(MqttError::Protocol("first packet is not CONNECT".into()).into());
        }

        match packet {
            Packet::Connect(connect) => return self.on_connect(connect, out),
            Packet::Publish(publish) => self.on_publish(publish, out)?,
            Packet::PubRel(packet_id) => codec::encode(&Packet::PubComp(packet_id), out)?,
            Packet::PubAck(_) | Packet::PubRec(_) | Packet::PubComp(_) => {}
            Packet::Subscribe { packet_id, filters } => {
                debug!(filters = filters.len(), "subscribe refused");
                codec::encode(
                    &Packet::SubAck {
                        packet_id,
                        return_codes: vec![SUBACK_FAILURE; filters.len()],
                    },
                    out,
                )?;
            }
            Packet::Unsubscribe { packet_id, .. } => {
                codec::encode(&Packet::UnsubAck(packet_id), out)?
            }
            Packet::PingReq => codec::encode(&Packet::PingResp, out)?,
            Packet::Disconnect => return Ok(false),
            other @ (Packet::ConnAck { .. }
            | Packet::SubAck { .. }
            | Packet::UnsubAck(_)
            | Packet::PingResp) => {
                return Err(MqttError::Protocol(format!("unexpected server-bound packet {other:?}")).into());
            }
        }
        Ok(true)
    }

    fn on_connect(&mut self, connect: Connect, out: &mut BytesMut) -> Result<bool> {
        if self.client_id.is_some() {
            return Err(MqttError::Protocol("second CONNECT".into()).into());
        }

        if connect.protocol_level != PROTOCOL_LEVEL_V311 {
            warn!(
                protocol_name = %connect.protocol_name,
                protocol_level = connect.protocol_level,
                "unsupported protocol level"
            );
            codec::encode(
                &Packet::ConnAck {
                    session_present: false,
                    return_code: CONNACK_UNACCEPTABLE_PROTOCOL,
                },
                out,
            )?;
            return Ok(false);
        }

        let client_id = if connect.client_id.is_empty() {
            format!("anon-{}", self.peer)
        } else {
            connect.client_id
        };
        info!(client_id = %client_id, keep_alive = connect.keep_alive, "client connected");
        self.client_id = Some(client_id);
        self.keep_alive = (connect.keep_alive > 0).then(|| {
            Duration::from_millis(u64::from(connect.keep_alive) * KEEP_ALIVE_GRACE_PERMILLE)
        });

        codec::encode(
            &Packet::ConnAck {
                session_present: false,
                return_code: CONNACK_ACCEPTED,
            },
            out,
        )?;
        Ok(true)
    }

    fn on_publish(&mut self, publish: Publish, out: &mut BytesMut) -> Result<()> {
        match (publish.qos, publish.packet_id) {
            (QoS::AtLeastOnce, Some(id)) => codec::encode(&Packet::PubAck(id), out)?,
            (QoS::ExactlyOnce, Some(id)) => codec::encode(&Packet::PubRec(id), out)?,
            _ => {}
        }

        trace!(topic = %publish.topic, qos = ?publish.qos, len = publish.payload.len(), "publish");

        let event = PublishEvent {
            client_id: self.client_id.clone(),
            topic: publish.topic,
            payload: publish.payload,
        };
        let metrics = self.emitter.metrics();
        match handle_publish(&event) {
            Some(routed) => {
                metrics.record_publish_routed();
                match normalize(routed) {
                    Ok(notification) => {
                        self.emitter.emit(notification);
                    }
                    Err(e) => warn!(error = %e, "publish normalization failed"),
                }
            }
            None => metrics.record_publish_ignored(),
        }
        Ok(())
    }
}

async fn read_within(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    limit: Option<(&'static str, Duration)>,
) -> Result<usize> {
    match limit {
        Some((awaiting, limit)) => Ok(tokio::time::timeout(limit, stream.read_buf(buf))
            .await
            .map_err(|_| IngestionError::Idle { awaiting, limit })??),
        None => Ok(stream.read_buf(buf).await?),
    }
}
