use std::{
    io::{Read, Write},
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use lwp_consumer::{Consumer, ConsumerConfig, InMemoryOffsetStore, StartPosition};
use lwp_protocol::{encode_tlv_stream, Frame, Header, Opcode, Record, HEADER_LEN};

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

/// Accepts one connection, replies HELLO_ACK, answers SEEK_END with a fixed
/// tail offset, and answers every FETCH with an empty payload until
/// `has_data` flips, at which point it delivers one 50-byte record and the
/// advanced tail.
fn spawn_broker(addr: SocketAddr, has_data: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    let listener = TcpListener::bind(addr).unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let hello = read_frame(&mut stream);
        write_frame(&mut stream, &Frame::new(Opcode::HelloAck, hello.correlation_id, 0, 0, Vec::new()));

        loop {
            let request = read_frame(&mut stream);
            match request.opcode {
                Opcode::SeekEnd => {
                    write_frame(&mut stream, &Frame::new(Opcode::SeekEnd, request.correlation_id, request.topic_id, 1024, Vec::new()));
                }
                Opcode::Fetch => {
                    if has_data.load(Ordering::SeqCst) {
                        let payload = encode_tlv_stream(&[Record::RawData(vec![7u8; 50])]);
                        write_frame(
                            &mut stream,
                            &Frame::new(Opcode::FetchResp, request.correlation_id, request.topic_id, 1074, payload),
                        );
                        return;
                    }
                    write_frame(
                        &mut stream,
                        &Frame::new(Opcode::FetchResp, request.correlation_id, request.topic_id, 1024, Vec::new()),
                    );
                }
                other => panic!("unexpected opcode {other:?} from consumer"),
            }
        }
    })
}

#[test]
fn seek_to_end_then_poll_empty_then_one_record_arrives() {
    let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 24731));
    let has_data = Arc::new(AtomicBool::new(false));
    let broker = spawn_broker(addr, has_data.clone());
    thread::sleep(Duration::from_millis(20));

    let config = ConsumerConfig::new("127.0.0.1", "c1", 1)
        .with_port(addr.port())
        .with_start_position(StartPosition::End)
        .with_poll_timeout(Duration::from_millis(150))
        .with_request_timeout(Duration::from_secs(5));
    let mut consumer = Consumer::connect_with_store(config, Box::new(InMemoryOffsetStore::new())).unwrap();
    assert_eq!(consumer.next_offset(), 1024);

    assert!(consumer.poll().unwrap().is_none());

    has_data.store(true, Ordering::SeqCst);
    let result = consumer.poll().unwrap().expect("a record should have arrived");
    assert_eq!(result.records, vec![Record::RawData(vec![7u8; 50])]);
    assert_eq!(result.end_offset, 1074);
    assert_eq!(result.lag, 0);
    assert_eq!(consumer.next_offset(), 1074);

    broker.join().unwrap();
}

#[test]
fn seek_resets_next_offset_without_touching_the_server() {
    let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 24732));
    let listener = TcpListener::bind(addr).unwrap();
    let broker = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let hello = read_frame(&mut stream);
        write_frame(&mut stream, &Frame::new(Opcode::HelloAck, hello.correlation_id, 0, 0, Vec::new()));
        thread::sleep(Duration::from_millis(100));
    });

    thread::sleep(Duration::from_millis(20));
    let config = ConsumerConfig::new("127.0.0.1", "c1", 1).with_port(addr.port()).with_start_position(StartPosition::Offset(500));
    let mut consumer = Consumer::connect_with_store(config, Box::new(InMemoryOffsetStore::new())).unwrap();
    assert_eq!(consumer.next_offset(), 500);

    consumer.seek(200);
    assert_eq!(consumer.next_offset(), 200);

    consumer.rewind();
    assert_eq!(consumer.next_offset(), 0);

    broker.join().unwrap();
}
