//! # Integration Tests
//!
//! End-to-end flows across crates:
//! - contract and configuration checks
//! - UDP fragments -> collector -> forwarder -> HTTP store
//! - MQTT publish -> router -> forwarder -> HTTP store

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FRAME_LAYOUT_LEN, FRAME_SIZE};

    #[test]
    fn test_frame_size_exceeds_layout_by_one() {
        assert_eq!(FRAME_SIZE, 1470 + 528);
        assert_eq!(FRAME_SIZE, FRAME_LAYOUT_LEN + 1);
    }

    #[test]
    fn test_config_without_url_builds_disabled_forwarder() {
        let config = ConfigLoader::load_from_str("[udp]\nport = 9999\n", ConfigFormat::Toml).unwrap();
        assert!(!config.forwarding.is_enabled());

        let forwarder = dispatcher::create_forwarder(&config.forwarding).unwrap();
        assert!(!forwarder.is_enabled());
    }

    #[test]
    fn test_config_with_url_builds_http_forwarder() {
        let toml = r#"
[forwarding]
url = "https://store.example.com/notifications"
timeout_ms = 2500
"#;
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let forwarder = dispatcher::create_forwarder(&config.forwarding).unwrap();
        assert!(forwarder.is_enabled());
        assert_eq!(forwarder.sink_name(), Some(dispatcher::HTTP_SINK_NAME));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::put;
    use axum::{Json, Router};
    use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
    use bytes::{Bytes, BytesMut};
    use contracts::{AccelerometerFrame, ForwardingConfig, MqttConfig, Notification, FRAME_SIZE};
    use dispatcher::{create_forwarder, Forwarder, HttpSink};
    use ingestion::adapters::mqtt::codec::{self, Connect, Packet, Publish, QoS};
    use ingestion::{
        decoder, FragmentCollector, IngestionMetrics, IngestionPipeline, ManualScheduler,
        MqttAdapter, NotificationEmitter,
    };
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    const WINDOW: Duration = Duration::from_millis(500);
    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    #[derive(Clone)]
    struct Store {
        bodies: mpsc::UnboundedSender<Value>,
        status: StatusCode,
    }

    async fn accept(State(store): State<Store>, Json(body): Json<Value>) -> StatusCode {
        let _ = store.bodies.send(body);
        store.status
    }

    /// Local time-series store stand-in; returns its URL and the received bodies
    async fn spawn_store(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Value>) {
        let (bodies, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route("/notifications", put(accept))
            .with_state(Store { bodies, status });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/notifications"), rx)
    }

    fn http_forwarder(url: String) -> Forwarder<HttpSink> {
        create_forwarder(&ForwardingConfig {
            url: Some(url),
            ..Default::default()
        })
        .unwrap()
    }

    async fn next_body(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    /// Wire frame whose samples count up from `base` on every axis
    fn wire_frame(mac: &str, base: i16) -> Vec<u8> {
        let axis = |offset: i16| (0..330).map(|i| base + offset + i as i16).collect::<Vec<_>>();
        let bytes = decoder::encode(&AccelerometerFrame {
            mac: mac.to_string(),
            x: axis(0),
            y: axis(1000),
            z: axis(-1000),
        });
        assert_eq!(bytes.len(), FRAME_SIZE);
        bytes
    }

    fn collector() -> (
        FragmentCollector<ManualScheduler>,
        async_channel::Receiver<Notification>,
        Arc<IngestionMetrics>,
    ) {
        let metrics = Arc::new(IngestionMetrics::new());
        let (emitter, rx) = NotificationEmitter::channel(16, metrics.clone());
        let collector = FragmentCollector::new(WINDOW, ManualScheduler::new(), emitter);
        (collector, rx, metrics)
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 7], port))
    }

    #[tokio::test]
    async fn test_udp_frame_forwarded_as_put() {
        let (url, mut bodies) = spawn_store(StatusCode::OK).await;
        let forwarder = http_forwarder(url);
        let (collector, rx, metrics) = collector();

        let frame = wire_frame(MAC, 0);
        collector.on_datagram(peer(4000), Bytes::copy_from_slice(&frame[..1470]));
        collector.on_datagram(peer(4000), Bytes::copy_from_slice(&frame[1470..]));
        assert_eq!(collector.buffered_len(&peer(4000)), Some(FRAME_SIZE));

        assert_eq!(collector.scheduler().advance(WINDOW), 1);
        let notification = rx.try_recv().unwrap();
        forwarder.forward(notification).unwrap().await.unwrap();

        let body = next_body(&mut bodies).await;
        let entries = body["notifications"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry["ct"], "application/json");
        assert_eq!(entry["max-age"], 0);
        assert_eq!(entry["ep"], "AABBCCDDEEFF");
        assert_eq!(entry["path"], "/accelerometer");

        let payload = B64.decode(entry["payload"].as_str().unwrap()).unwrap();
        let axes: Value = serde_json::from_slice(&payload).unwrap();
        for (axis, first) in [("x", 1), ("y", 1001), ("z", -999)] {
            let samples = axes[axis].as_array().unwrap();
            assert_eq!(samples.len(), 329, "axis {axis}");
            assert_eq!(samples[0], first, "axis {axis}");
        }
        assert_eq!(axes["x"][328], 329);

        assert_eq!(metrics.snapshot().frames_completed, 1);
        assert_eq!(forwarder.snapshot().write_count, 1);
        assert_eq!(collector.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_interleaved_senders_complete_independently() {
        let (collector, rx, metrics) = collector();
        let first = wire_frame("11:11:11:11:11:11", 0);
        let second = wire_frame("22:22:22:22:22:22", 50);

        collector.on_datagram(peer(1), Bytes::copy_from_slice(&first[..1470]));
        collector.on_datagram(peer(2), Bytes::copy_from_slice(&second[..1470]));
        collector.on_datagram(peer(1), Bytes::copy_from_slice(&first[1470..]));
        collector.on_datagram(peer(2), Bytes::copy_from_slice(&second[1470..]));
        assert_eq!(collector.in_flight(), 2);

        assert_eq!(collector.scheduler().advance(WINDOW), 2);

        let mut devices: Vec<String> = (0..2)
            .map(|_| rx.try_recv().unwrap().device_id.to_string())
            .collect();
        devices.sort();
        assert_eq!(devices, ["111111111111", "222222222222"]);
        assert_eq!(metrics.snapshot().frames_completed, 2);
    }

    #[tokio::test]
    async fn test_lone_fragment_discarded_and_sender_reusable() {
        let (collector, rx, metrics) = collector();
        let frame = wire_frame(MAC, 0);

        collector.on_datagram(peer(9), Bytes::copy_from_slice(&frame[..1470]));
        collector.scheduler().advance(WINDOW);

        assert!(rx.try_recv().is_err());
        assert_eq!(collector.in_flight(), 0);
        assert_eq!(metrics.snapshot().frames_incomplete, 1);

        // the next frame from the same sender starts from an empty buffer
        collector.on_datagram(peer(9), Bytes::copy_from_slice(&frame[..1470]));
        collector.on_datagram(peer(9), Bytes::copy_from_slice(&frame[1470..]));
        collector.scheduler().advance(WINDOW);
        assert_eq!(rx.try_recv().unwrap().device_id, "AABBCCDDEEFF");
    }

    #[tokio::test]
    async fn test_fragment_after_window_starts_new_buffer() {
        let (collector, rx, metrics) = collector();
        let frame = wire_frame(MAC, 0);

        collector.on_datagram(peer(5), Bytes::copy_from_slice(&frame[..1470]));
        collector.scheduler().advance(WINDOW + Duration::from_millis(1));
        collector.on_datagram(peer(5), Bytes::copy_from_slice(&frame[1470..]));
        assert_eq!(collector.buffered_len(&peer(5)), Some(528));

        collector.scheduler().advance(WINDOW);
        assert!(rx.try_recv().is_err());
        assert_eq!(metrics.snapshot().frames_incomplete, 2);
    }

    #[tokio::test]
    async fn test_disabled_forwarder_still_ingests() {
        let forwarder = create_forwarder(&ForwardingConfig::default()).unwrap();
        let (collector, rx, metrics) = collector();
        let frame = wire_frame(MAC, 0);

        collector.on_datagram(peer(7), Bytes::copy_from_slice(&frame[..1470]));
        collector.on_datagram(peer(7), Bytes::copy_from_slice(&frame[1470..]));
        collector.scheduler().advance(WINDOW);

        assert!(forwarder.forward(rx.try_recv().unwrap()).is_none());
        assert_eq!(forwarder.snapshot().skipped_count, 1);
        assert_eq!(metrics.snapshot().notifications_emitted, 1);
    }

    #[tokio::test]
    async fn test_store_rejection_is_counted_not_retried() {
        let (url, mut bodies) = spawn_store(StatusCode::INTERNAL_SERVER_ERROR).await;
        let forwarder = http_forwarder(url);
        let (collector, rx, _metrics) = collector();
        let frame = wire_frame(MAC, 0);

        collector.on_datagram(peer(3), Bytes::copy_from_slice(&frame[..1470]));
        collector.on_datagram(peer(3), Bytes::copy_from_slice(&frame[1470..]));
        collector.scheduler().advance(WINDOW);
        forwarder.forward(rx.try_recv().unwrap()).unwrap().await.unwrap();

        next_body(&mut bodies).await;
        assert!(bodies.try_recv().is_err());
        let snapshot = forwarder.snapshot();
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.write_count, 0);
        assert_eq!(snapshot.in_flight, 0);
    }

    async fn mqtt_send(stream: &mut TcpStream, packet: &Packet) {
        let mut buf = BytesMut::new();
        codec::encode(packet, &mut buf).unwrap();
        stream.write_all(&buf).await.unwrap();
    }

    async fn mqtt_recv(stream: &mut TcpStream, buf: &mut BytesMut) -> Packet {
        loop {
            if let Some(packet) = codec::decode(buf, 1024 * 1024).unwrap() {
                return packet;
            }
            let read = tokio::time::timeout(Duration::from_secs(2), stream.read_buf(buf))
                .await
                .unwrap()
                .unwrap();
            assert_ne!(read, 0, "connection closed");
        }
    }

    fn publish(topic: &str, payload: &'static [u8]) -> Packet {
        Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: topic.into(),
            packet_id: None,
            payload: Bytes::from_static(payload),
        })
    }

    #[tokio::test]
    async fn test_mqtt_publish_forwarded_as_put() {
        let (url, mut bodies) = spawn_store(StatusCode::OK).await;
        let forwarder = http_forwarder(url);

        let adapter = MqttAdapter::bind(&MqttConfig {
            bind: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        })
        .await
        .unwrap();
        let addr = ingestion::IngressAdapter::local_addr(&adapter);

        let mut pipeline = IngestionPipeline::new(16);
        pipeline.register_adapter(Box::new(adapter));
        pipeline.start_all().unwrap();
        let rx = pipeline.take_receiver().unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();
        mqtt_send(
            &mut stream,
            &Packet::Connect(Connect {
                protocol_name: "MQTT".into(),
                protocol_level: 4,
                clean_session: true,
                keep_alive: 30,
                client_id: "sensor-7".into(),
            }),
        )
        .await;
        assert!(matches!(
            mqtt_recv(&mut stream, &mut buf).await,
            Packet::ConnAck { return_code: 0, .. }
        ));

        mqtt_send(&mut stream, &publish("$SYS/broker/uptime", b"12\0")).await;
        mqtt_send(&mut stream, &publish("AA:BB:CC:DD:EE:FF/env/temperature", b"21.5\0")).await;

        let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.path, "/env/temperature");
        forwarder.forward(notification).unwrap().await.unwrap();

        let body = next_body(&mut bodies).await;
        let entry = &body["notifications"][0];
        assert_eq!(entry["ct"], "text/plain");
        assert_eq!(entry["ep"], "AABBCCDDEEFF");
        assert_eq!(entry["path"], "/env/temperature");
        assert_eq!(B64.decode(entry["payload"].as_str().unwrap()).unwrap(), b"21.5");

        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.publishes_ignored, 1);
        assert_eq!(snapshot.publishes_routed, 1);

        pipeline.stop_all();
    }
}
