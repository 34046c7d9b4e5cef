//! Local network discovery of chargers
//!
//! The charger's Wi-Fi module answers the `HF-A11ASSISTHREAD` request, sent as
//! a UDP broadcast to port 48899, with a comma separated `ip,mac,module`
//! line. Some firmware appends the device id and firmware version.

use crate::error::{ChargerError, Result};
use crate::logging::get_logger;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};

/// Port the Wi-Fi module listens on for discovery requests
pub const DISCOVERY_PORT: u16 = 48899;

/// Request understood by the Wi-Fi module
pub const DISCOVERY_REQUEST: &[u8] = b"HF-A11ASSISTHREAD";

const MAX_REPLY_SIZE: usize = 1024;

/// Upper bound on the listen time
const MAX_LISTEN: Duration = Duration::from_secs(3600);

/// A charger that answered the discovery request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredCharger {
    pub ip: String,
    pub mac: String,
    pub device_id: String,
    /// Module type reported by the Wi-Fi module
    #[serde(rename = "type")]
    pub kind: String,
    pub firmware: String,
}

/// Parse one discovery reply; `None` for anything that is not an answer
pub fn parse_discovery_reply(reply: &[u8]) -> Option<DiscoveredCharger> {
    if reply == DISCOVERY_REQUEST {
        return None;
    }
    let text = std::str::from_utf8(reply).ok()?.trim();
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }
    let ip: Ipv4Addr = parts[0].parse().ok()?;
    let field = |i: usize| parts.get(i).copied().unwrap_or_default().to_string();

    Some(DiscoveredCharger {
        ip: ip.to_string(),
        mac: field(1),
        kind: field(2),
        device_id: field(3),
        firmware: field(4),
    })
}

/// Broadcast the request and collect replies until `timeout` expires.
///
/// Replies are de-duplicated by IP and returned in address order.
pub async fn discover_chargers(timeout: Duration) -> Result<Vec<DiscoveredCharger>> {
    let logger = get_logger("discovery");
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| ChargerError::connection(format!("Failed to bind discovery socket: {}", e)))?;
    socket
        .set_broadcast(true)
        .map_err(|e| ChargerError::connection(format!("Failed to enable broadcast: {}", e)))?;

    let target = SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT));
    socket
        .send_to(DISCOVERY_REQUEST, target)
        .await
        .map_err(|e| ChargerError::connection(format!("Failed to send discovery request: {}", e)))?;
    logger.info(&format!("Discovery request sent, listening for {:?}", timeout));

    let deadline = Instant::now() + timeout.min(MAX_LISTEN);
    let mut replies = Vec::new();
    let mut buf = [0u8; MAX_REPLY_SIZE];

    loop {
        match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => break,
            Ok(Err(e)) => {
                logger.warn(&format!("Discovery receive failed: {}", e));
                break;
            }
            Ok(Ok((len, from))) => match parse_discovery_reply(&buf[..len]) {
                Some(charger) => {
                    logger.debug(&format!("Reply from {}: {} ({})", from, charger.ip, charger.mac));
                    replies.push(charger);
                }
                None => logger.trace(&format!("Ignoring datagram from {}", from)),
            },
        }
    }

    let chargers = merge_replies(replies);
    logger.info(&format!("Discovery finished, {} charger(s) found", chargers.len()));
    Ok(chargers)
}

/// One entry per IP, the first reply winning, in address order
pub fn merge_replies(replies: impl IntoIterator<Item = DiscoveredCharger>) -> Vec<DiscoveredCharger> {
    let mut by_ip: BTreeMap<Ipv4Addr, DiscoveredCharger> = BTreeMap::new();
    for charger in replies {
        if let Ok(ip) = charger.ip.parse() {
            by_ip.entry(ip).or_insert(charger);
        }
    }
    by_ip.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_reply() {
        let charger = parse_discovery_reply(b"192.168.1.50,ACCF23A1B2C3,HF-LPT230").unwrap();
        assert_eq!(charger.ip, "192.168.1.50");
        assert_eq!(charger.mac, "ACCF23A1B2C3");
        assert_eq!(charger.kind, "HF-LPT230");
        assert!(charger.device_id.is_empty());
        assert!(charger.firmware.is_empty());
    }

    #[test]
    fn test_parse_extended_reply() {
        let charger =
            parse_discovery_reply(b"10.0.0.7,ACCF23A1B2C3,HF-LPT230,0310107112122360374,1.2.3\r\n")
                .unwrap();
        assert_eq!(charger.device_id, "0310107112122360374");
        assert_eq!(charger.firmware, "1.2.3");
    }

    #[test]
    fn test_rejects_noise() {
        assert!(parse_discovery_reply(DISCOVERY_REQUEST).is_none());
        assert!(parse_discovery_reply(b"+ok").is_none());
        assert!(parse_discovery_reply(b"not-an-ip,aa,bb").is_none());
        assert!(parse_discovery_reply(&[0xff, 0xfe, 0x2c]).is_none());
    }

    #[test]
    fn test_merge_replies_dedups_by_ip() {
        let replies = [
            b"192.168.1.60,AA0000000002,HF-LPT230".as_slice(),
            b"192.168.1.9,AA0000000001,HF-LPT230".as_slice(),
            b"192.168.1.60,FFFFFFFFFFFF,HF-LPT230".as_slice(),
        ]
        .into_iter()
        .filter_map(parse_discovery_reply);

        let merged = merge_replies(replies);
        assert_eq!(merged.len(), 2);
        // numeric address order, not string order
        assert_eq!(merged[0].ip, "192.168.1.9");
        assert_eq!(merged[1].ip, "192.168.1.60");
        assert_eq!(merged[1].mac, "AA0000000002");
    }

    #[test]
    fn test_serializes_kind_as_type() {
        let charger = parse_discovery_reply(b"192.168.1.50,AA,HF").unwrap();
        let json = serde_json::to_value(&charger).unwrap();
        assert_eq!(json["type"], "HF");
    }
}
