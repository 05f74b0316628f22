use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use lwp_transport::{Connection, ConnectionState, TransportConfig};

/// Nothing is listening on this address, so every connect attempt fails
/// immediately (spec §4.3 Reconnecting -> Connecting, scenario 5). With
/// `auto_reconnect` left at its default of `true`, the connection must keep
/// cycling Reconnecting -> Connecting rather than ever giving up.
#[test]
fn repeated_refused_connects_keep_reconnecting_and_never_close() {
    let addr: SocketAddr = "127.0.0.1:24799".parse().unwrap();
    let config = TransportConfig::new(addr.ip().to_string()).with_port(addr.port());
    let mut conn = Connection::new(config).unwrap();

    let mut saw_reconnecting = false;
    let deadline = Instant::now() + Duration::from_millis(800);
    while Instant::now() < deadline {
        conn.poll(Duration::from_millis(5));
        if conn.state() == ConnectionState::Reconnecting {
            saw_reconnecting = true;
        }
        assert!(!conn.state().is_terminal(), "auto_reconnect defaults to true; must not reach Closed");
    }

    assert!(saw_reconnecting, "expected at least one Reconnecting transition");
}

#[test]
fn auto_reconnect_disabled_closes_after_the_first_failure() {
    let addr: SocketAddr = "127.0.0.1:24798".parse().unwrap();
    let config = TransportConfig::new(addr.ip().to_string()).with_port(addr.port()).with_auto_reconnect(false);
    let mut conn = Connection::new(config).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while !conn.state().is_terminal() {
        assert!(Instant::now() < deadline, "connection never reached Closed");
        conn.poll(Duration::from_millis(5));
    }

    assert_eq!(conn.state(), ConnectionState::Closed);
}
