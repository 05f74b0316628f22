use std::{
    io::{Read, Write},
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    thread,
    time::Duration,
};

use lwp_producer::{Producer, ProducerConfig};
use lwp_protocol::{Frame, Header, LwpError, Opcode, Record, HEADER_LEN};

fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut header_bytes = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_bytes).unwrap();
    let header = Header::decode(&header_bytes, lwp_protocol::DEFAULT_MAX_PAYLOAD_LEN).unwrap();
    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).unwrap();
    Frame::from_header_and_payload(header, payload).unwrap()
}

fn write_frame(stream: &mut TcpStream, frame: &Frame) {
    stream.write_all(&frame.encode()).unwrap();
}

/// Replies HELLO_ACK, immediately signals BACKPRESSURE, waits a bit, then
/// signals RESUME, and finally ACKs whatever PRODUCE eventually arrives.
fn spawn_pausing_broker(addr: SocketAddr) -> thread::JoinHandle<()> {
    let listener = TcpListener::bind(addr).unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let hello = read_frame(&mut stream);
        write_frame(&mut stream, &Frame::new(Opcode::HelloAck, hello.correlation_id, 0, 0, Vec::new()));

        write_frame(&mut stream, &Frame::new(Opcode::Backpressure, 0, 0, 0, Vec::new()));
        thread::sleep(Duration::from_millis(100));
        write_frame(&mut stream, &Frame::new(Opcode::Resume, 0, 0, 0, Vec::new()));

        let produce = read_frame(&mut stream);
        write_frame(&mut stream, &Frame::new(Opcode::ProduceAck, produce.correlation_id, produce.topic_id, 0, Vec::new()));
    })
}

#[test]
fn paused_producer_refuses_sends_until_resume_arrives() {
    let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 24723));
    let broker = spawn_pausing_broker(addr);
    thread::sleep(Duration::from_millis(20));

    let config = ProducerConfig::new("127.0.0.1")
        .with_port(addr.port())
        .with_batch_size(1)
        .with_linger_ms(1_000)
        .with_request_timeout(Duration::from_secs(5));
    let mut producer = Producer::connect(config).unwrap();

    // Wait for the BACKPRESSURE event to land, then confirm sends are refused.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !producer.is_paused() {
        assert!(std::time::Instant::now() < deadline, "never observed the BACKPRESSURE event");
        producer.poll(Duration::from_millis(5));
    }
    assert!(matches!(
        producer.send_async(1, Record::RawData(b"a".to_vec())),
        Err(LwpError::Backpressure)
    ));

    // After RESUME, the same record is accepted and makes it onto the wire.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        producer.poll(Duration::from_millis(5));
        if producer.send_async(1, Record::RawData(b"a".to_vec())).is_ok() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "producer never resumed after RESUME");
    }

    broker.join().unwrap();
}
