use std::{
    io::{Read, Write},
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    thread,
    time::Duration,
};

use lwp_client::{Client, ClientConfig, Frame, Header, Opcode, Record, HEADER_LEN};

fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut header_bytes = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_bytes).unwrap();
    let header = Header::decode(&header_bytes, lwp_client::DEFAULT_MAX_PAYLOAD_LEN).unwrap();
    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).unwrap();
    Frame::from_header_and_payload(header, payload).unwrap()
}

fn write_frame(stream: &mut TcpStream, frame: &Frame) {
    stream.write_all(&frame.encode()).unwrap();
}

fn topic_payload(id: u64, name: &str) -> Vec<u8> {
    lwp_client::encode_tlv_stream(&[
        Record::KeyValue { key: b"id".to_vec(), value: id.to_le_bytes().to_vec() },
        Record::KeyValue { key: b"name".to_vec(), value: name.as_bytes().to_vec() },
        Record::KeyValue { key: b"created_at_ns".to_vec(), value: 1_000u64.to_le_bytes().to_vec() },
    ])
}

#[test]
fn create_then_get_then_delete_a_topic() {
    let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 24740));
    let listener = TcpListener::bind(addr).unwrap();

    let broker = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let hello = read_frame(&mut stream);
        write_frame(&mut stream, &Frame::new(Opcode::HelloAck, hello.correlation_id, 0, 0, Vec::new()));

        let create = read_frame(&mut stream);
        assert_eq!(create.opcode, Opcode::CreateTopic);
        let records = lwp_client::decode_tlv_stream(&create.payload).unwrap();
        assert!(records.contains(&Record::KeyValue { key: b"name".to_vec(), value: b"events".to_vec() }));
        write_frame(
            &mut stream,
            &Frame::new(Opcode::CreateTopic, create.correlation_id, 0, 0, topic_payload(7, "events")),
        );

        let get = read_frame(&mut stream);
        assert_eq!(get.opcode, Opcode::GetTopic);
        assert_eq!(get.topic_id, 7);
        write_frame(&mut stream, &Frame::new(Opcode::GetTopic, get.correlation_id, 7, 0, topic_payload(7, "events")));

        let delete = read_frame(&mut stream);
        assert_eq!(delete.opcode, Opcode::DeleteTopic);
        assert_eq!(delete.topic_id, 7);
        write_frame(&mut stream, &Frame::new(Opcode::DeleteTopic, delete.correlation_id, 7, 0, Vec::new()));
    });

    thread::sleep(Duration::from_millis(20));
    let config = ClientConfig::new("127.0.0.1").with_port(addr.port()).with_request_timeout(Duration::from_secs(5));
    let mut client = Client::connect(config).unwrap();

    let created = client.create_topic("events", None, None).unwrap();
    assert_eq!(created.id, 7);
    assert_eq!(created.name, "events");

    let fetched = client.get_topic(7).unwrap();
    assert_eq!(fetched, created);

    client.delete_topic(7).unwrap();

    broker.join().unwrap();
}
