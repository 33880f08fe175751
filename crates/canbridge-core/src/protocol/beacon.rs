//! Discovery beacon payload construction.
//!
//! The daemon advertises itself by broadcasting one UDP datagram every few
//! seconds.  The payload is an XML-like snippet naming the host, the fixed
//! service type, a URL for the TCP endpoint, and one `<Bus .../>` element
//! per configured bus, e.g.:
//!
//! ```text
//! <CANBeacon name="myhost" type="SocketCAN" description="socketcand">
//! <URL>can://0.0.0.0:28600</URL><Bus name="can0"/><Bus name="can1"/></CANBeacon>
//! ```
//!
//! Only the payload is built here; the transport loop lives in the daemon.

/// Fixed byte budget for one beacon datagram.
pub const BEACON_CAPACITY: usize = 2048;

/// Fixed service-type string advertised in the beacon.
pub const BEACON_SERVICE_TYPE: &str = "SocketCAN";

/// Fixed description string advertised in the beacon.
pub const BEACON_DESCRIPTION: &str = "socketcand";

/// Builds one beacon payload for the given host, TCP service port, and
/// configured bus names.
///
/// Bus entries are appended in order until the next whole entry (plus the
/// closing tag) would exceed [`BEACON_CAPACITY`]; remaining entries are
/// silently skipped, so the output never contains a partial tag.
pub fn build_beacon(hostname: &str, port: u16, buses: &[String]) -> String {
    const FOOTER: &str = "</CANBeacon>";

    let mut beacon = format!(
        "<CANBeacon name=\"{hostname}\" type=\"{BEACON_SERVICE_TYPE}\" \
         description=\"{BEACON_DESCRIPTION}\">\n<URL>can://0.0.0.0:{port}</URL>"
    );

    for bus in buses {
        let entry = format!("<Bus name=\"{bus}\"/>");
        if beacon.len() + entry.len() + FOOTER.len() > BEACON_CAPACITY {
            break;
        }
        beacon.push_str(&entry);
    }

    beacon.push_str(FOOTER);
    beacon
}

// ── Tests ─────────────────────────────────────────────────────────────────────
