//! MQTT 3.1.1 packet codec
//!
//! Only the control packets the ingress needs are modelled. Decoding works on
//! a `BytesMut` read buffer and returns `Ok(None)` until a whole packet is
//! buffered.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Protocol level for MQTT 3.1.1
pub const PROTOCOL_LEVEL_V311: u8 = 4;

/// Largest value the remaining-length field can carry
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// CONNACK return code: accepted
pub const CONNACK_ACCEPTED: u8 = 0x00;

/// CONNACK return code: unacceptable protocol version
pub const CONNACK_UNACCEPTABLE_PROTOCOL: u8 = 0x01;

/// SUBACK return code: failure
pub const SUBACK_FAILURE: u8 = 0x80;

/// MQTT codec errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MqttError {
    #[error("malformed remaining length")]
    MalformedRemainingLength,

    #[error("packet of {size} bytes exceeds limit of {max}")]
    PacketTooLarge { size: usize, max: usize },

    #[error("unknown packet type {0}")]
    InvalidPacketType(u8),

    #[error("invalid fixed header flags {flags:#06b} for packet type {packet_type}")]
    InvalidFlags { packet_type: u8, flags: u8 },

    #[error("invalid qos {0}")]
    InvalidQos(u8),

    #[error("packet truncated while reading {0}")]
    Truncated(&'static str),

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("string field of {0} bytes exceeds 65535")]
    StringTooLong(usize),

    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(MqttError::InvalidQos(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub protocol_name: String,
    pub protocol_level: u8,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present for QoS 1 and 2
    pub packet_id: Option<u16>,
    pub payload: Bytes,
}

/// Control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck { session_present: bool, return_code: u8 },
    Publish(Publish),
    PubAck(u16),
    PubRec(u16),
    PubRel(u16),
    PubComp(u16),
    Subscribe { packet_id: u16, filters: Vec<(String, QoS)> },
    SubAck { packet_id: u16, return_codes: Vec<u8> },
    Unsubscribe { packet_id: u16, filters: Vec<String> },
    UnsubAck(u16),
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    fn type_code(&self) -> u8 {
        match self {
            Self::Connect(_) => 1,
            Self::ConnAck { .. } => 2,
            Self::Publish(_) => 3,
            Self::PubAck(_) => 4,
            Self::PubRec(_) => 5,
            Self::PubRel(_) => 6,
            Self::PubComp(_) => 7,
            Self::Subscribe { .. } => 8,
            Self::SubAck { .. } => 9,
            Self::Unsubscribe { .. } => 10,
            Self::UnsubAck(_) => 11,
            Self::PingReq => 12,
            Self::PingResp => 13,
            Self::Disconnect => 14,
        }
    }
}

/// Decode the remaining-length varint at the start of `buf`.
///
/// Returns `(value, encoded_len)`, or `None` if more bytes are needed.
pub fn decode_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, MqttError> {
    let mut value = 0usize;
    for (idx, byte) in buf.iter().take(4).enumerate() {
        value |= ((byte & 0x7F) as usize) << (7 * idx);
        if byte & 0x80 == 0 {
            return Ok(Some((value, idx + 1)));
        }
    }
    if buf.len() >= 4 {
        return Err(MqttError::MalformedRemainingLength);
    }
    Ok(None)
}

/// Append the remaining-length varint for `len`
pub fn encode_remaining_length(mut len: usize, dst: &mut BytesMut) -> Result<(), MqttError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(MqttError::PacketTooLarge {
            size: len,
            max: MAX_REMAINING_LENGTH,
        });
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

/// Decode one packet from the front of `src`.
///
/// Consumes the packet's bytes only when a complete packet is available.
/// `max_packet_size` bounds the whole packet, fixed header included.
pub fn decode(src: &mut BytesMut, max_packet_size: usize) -> Result<Option<Packet>, MqttError> {
    if src.len() < 2 {
        return Ok(None);
    }

    let Some((remaining, len_bytes)) = decode_remaining_length(&src[1..])? else {
        return Ok(None);
    };

    let total = 1 + len_bytes + remaining;
    if total > max_packet_size {
        return Err(MqttError::PacketTooLarge {
            size: total,
            max: max_packet_size,
        });
    }
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let header = src.get_u8();
    src.advance(len_bytes);
    let body = src.split_to(remaining).freeze();

    decode_body(header >> 4, header & 0x0F, body).map(Some)
}

fn decode_body(packet_type: u8, flags: u8, mut body: Bytes) -> Result<Packet, MqttError> {
    let expect_flags = |expected: u8| {
        if flags == expected {
            Ok(())
        } else {
            Err(MqttError::InvalidFlags { packet_type, flags })
        }
    };

    let packet = match packet_type {
        1 => {
            expect_flags(0)?;
            Packet::Connect(decode_connect(&mut body)?)
        }
        2 => {
            expect_flags(0)?;
            let ack_flags = read_u8(&mut body, "connack flags")?;
            let return_code = read_u8(&mut body, "connack return code")?;
            Packet::ConnAck {
                session_present: ack_flags & 0x01 != 0,
                return_code,
            }
        }
        3 => Packet::Publish(decode_publish(flags, &mut body)?),
        4 => {
            expect_flags(0)?;
            Packet::PubAck(read_u16(&mut body, "packet id")?)
        }
        5 => {
            expect_flags(0)?;
            Packet::PubRec(read_u16(&mut body, "packet id")?)
        }
        6 => {
            expect_flags(0b0010)?;
            Packet::PubRel(read_u16(&mut body, "packet id")?)
        }
        7 => {
            expect_flags(0)?;
            Packet::PubComp(read_u16(&mut body, "packet id")?)
        }
        8 => {
            expect_flags(0b0010)?;
            let packet_id = read_u16(&mut body, "packet id")?;
            let mut filters = Vec::new();
            while body.has_remaining() {
                let filter = read_string(&mut body, "topic filter")?;
                let qos = QoS::try_from(read_u8(&mut body, "requested qos")? & 0x03)?;
                filters.push((filter, qos));
            }
            if filters.is_empty() {
                return Err(MqttError::Protocol("subscribe without topic filters".into()));
            }
            Packet::Subscribe { packet_id, filters }
        }
        9 => {
            expect_flags(0)?;
            let packet_id = read_u16(&mut body, "packet id")?;
            Packet::SubAck {
                packet_id,
                return_codes: body.to_vec(),
            }
        }
        10 => {
            expect_flags(0b0010)?;
            let packet_id = read_u16(&mut body, "packet id")?;
            let mut filters = Vec::new();
            while body.has_remaining() {
                filters.push(read_string(&mut body, "topic filter")?);
            }
            Packet::Unsubscribe { packet_id, filters }
        }
        11 => {
            expect_flags(0)?;
            Packet::UnsubAck(read_u16(&mut body, "packet id")?)
        }
        12 => {
            expect_flags(0)?;
            Packet::PingReq
        }
        13 => {
            expect_flags(0)?;
            Packet::PingResp
        }
        14 => {
            expect_flags(0)?;
            Packet::Disconnect
        }
        other => return Err(MqttError::InvalidPacketType(other)),
    };

    Ok(packet)
}

fn decode_connect(body: &mut Bytes) -> Result<Connect, MqttError> {
    let protocol_name = read_string(body, "protocol name")?;
    let protocol_level = read_u8(body, "protocol level")?;
    let connect_flags = read_u8(body, "connect flags")?;
    if connect_flags & 0x01 != 0 {
        return Err(MqttError::Protocol("reserved connect flag set".into()));
    }
    let keep_alive = read_u16(body, "keep alive")?;
    let client_id = read_string(body, "client id")?;

    // will, username and password are parsed and discarded
    if connect_flags & 0x04 != 0 {
        read_string(body, "will topic")?;
        read_binary(body, "will message")?;
    }
    if connect_flags & 0x80 != 0 {
        read_string(body, "username")?;
    }
    if connect_flags & 0x40 != 0 {
        read_binary(body, "password")?;
    }

    Ok(Connect {
        protocol_name,
        protocol_level,
        clean_session: connect_flags & 0x02 != 0,
        keep_alive,
        client_id,
    })
}

fn decode_publish(flags: u8, body: &mut Bytes) -> Result<Publish, MqttError> {
    let qos = QoS::try_from((flags >> 1) & 0x03)?;
    let topic = read_string(body, "topic name")?;
    let packet_id = match qos {
        QoS::AtMostOnce => None,
        _ => Some(read_u16(body, "packet id")?),
    };

    Ok(Publish {
        dup: flags & 0x08 != 0,
        qos,
        retain: flags & 0x01 != 0,
        topic,
        packet_id,
        payload: body.split_to(body.len()),
    })
}

/// Encode `packet` onto `dst`
pub fn encode(packet: &Packet, dst: &mut BytesMut) -> Result<(), MqttError> {
    let mut body = BytesMut::new();
    let mut flags = 0u8;

    match packet {
        Packet::Connect(connect) => {
            put_string(&mut body, &connect.protocol_name)?;
            body.put_u8(connect.protocol_level);
            body.put_u8(if connect.clean_session { 0x02 } else { 0 });
            body.put_u16(connect.keep_alive);
            put_string(&mut body, &connect.client_id)?;
        }
        Packet::ConnAck {
            session_present,
            return_code,
        } => {
            body.put_u8(u8::from(*session_present));
            body.put_u8(*return_code);
        }
        Packet::Publish(publish) => {
            flags = (u8::from(publish.dup) << 3) | ((publish.qos as u8) << 1) | u8::from(publish.retain);
            put_string(&mut body, &publish.topic)?;
            if publish.qos != QoS::AtMostOnce {
                let packet_id = publish
                    .packet_id
                    .ok_or_else(|| MqttError::Protocol("qos > 0 publish without packet id".into()))?;
                body.put_u16(packet_id);
            }
            body.put_slice(&publish.payload);
        }
        Packet::PubAck(id) | Packet::PubRec(id) | Packet::PubComp(id) | Packet::UnsubAck(id) => {
            body.put_u16(*id);
        }
        Packet::PubRel(id) => {
            flags = 0b0010;
            body.put_u16(*id);
        }
        Packet::Subscribe { packet_id, filters } => {
            flags = 0b0010;
            body.put_u16(*packet_id);
            for (filter, qos) in filters {
                put_string(&mut body, filter)?;
                body.put_u8(*qos as u8);
            }
        }
        Packet::SubAck {
            packet_id,
            return_codes,
        } => {
            body.put_u16(*packet_id);
            body.put_slice(return_codes);
        }
        Packet::Unsubscribe { packet_id, filters } => {
            flags = 0b0010;
            body.put_u16(*packet_id);
            for filter in filters {
                put_string(&mut body, filter)?;
            }
        }
        Packet::PingReq | Packet::PingResp | Packet::Disconnect => {}
    }

    dst.put_u8((packet.type_code() << 4) | flags);
    encode_remaining_length(body.len(), dst)?;
    dst.put_slice(&body);
    Ok(())
}

fn read_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, MqttError> {
    if buf.remaining() < 1 {
        return Err(MqttError::Truncated(field));
    }
    Ok(buf.get_u8())
}

fn read_u16(buf: &mut Bytes, field: &'static str) -> Result<u16, MqttError> {
    if buf.remaining() < 2 {
        return Err(MqttError::Truncated(field));
    }
    Ok(buf.get_u16())
}

fn read_binary(buf: &mut Bytes, field: &'static str) -> Result<Bytes, MqttError> {
    let len = read_u16(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(MqttError::Truncated(field));
    }
    Ok(buf.split_to(len))
}

fn read_string(buf: &mut Bytes, field: &'static str) -> Result<String, MqttError> {
    let raw = read_binary(buf, field)?;
    String::from_utf8(raw.to_vec()).map_err(|_| MqttError::InvalidUtf8)
}

fn put_string(dst: &mut BytesMut, value: &str) -> Result<(), MqttError> {
    let len = u16::try_from(value.len()).map_err(|_| MqttError::StringTooLong(value.len()))?;
    dst.put_u16(len);
    dst.put_slice(value.as_bytes());
    Ok(())
}
