use std::{
    io,
    time::{Duration, Instant},
};

use lwp_protocol::{Flags, LwpError, Opcode};
use lwp_transport::Connection;

use crate::{
    config::ClientConfig,
    topic::{self, TopicInfo},
};

/// Low-level request/response client (spec §1): topic management plus the
/// raw request escape hatch everything else in this crate is built from.
/// Owns one `Connection`; like `Producer`/`Consumer`, nothing here runs on a
/// background thread — callers drive it by calling any of its methods, which
/// call `Connection::poll` internally while waiting on a reply.
pub struct Client {
    config: ClientConfig,
    connection: Connection,
}

impl Client {
    pub fn connect(config: ClientConfig) -> Result<Self, LwpError> {
        let connection = Connection::new(config.transport.clone()).map_err(LwpError::Connection)?;
        let mut client = Self { config, connection };
        client.await_ready()?;
        Ok(client)
    }

    pub fn create_topic(
        &mut self,
        name: &str,
        max_age_secs: Option<u64>,
        max_bytes: Option<u64>,
    ) -> Result<TopicInfo, LwpError> {
        let payload = topic::create_topic_request(name, max_age_secs, max_bytes);
        let frame = self.connection.request(Opcode::CreateTopic, 0, 0, payload, Flags::empty())?;
        topic::decode_topic_info(&frame.payload)
    }

    pub fn delete_topic(&mut self, topic_id: u32) -> Result<(), LwpError> {
        self.connection.request(Opcode::DeleteTopic, topic_id, 0, Vec::new(), Flags::empty())?;
        Ok(())
    }

    pub fn list_topics(&mut self) -> Result<Vec<TopicInfo>, LwpError> {
        let frame = self.connection.request(Opcode::ListTopics, 0, 0, Vec::new(), Flags::empty())?;
        topic::decode_topic_list(&frame.payload)
    }

    pub fn get_topic(&mut self, topic_id: u32) -> Result<TopicInfo, LwpError> {
        let frame = self.connection.request(Opcode::GetTopic, topic_id, 0, Vec::new(), Flags::empty())?;
        topic::decode_topic_info(&frame.payload)
    }

    pub fn set_retention(&mut self, topic_id: u32, max_age_secs: Option<u64>, max_bytes: Option<u64>) -> Result<(), LwpError> {
        let payload = topic::set_retention_request(max_age_secs, max_bytes);
        self.connection.request(Opcode::SetRetention, topic_id, 0, payload, Flags::empty())?;
        Ok(())
    }

    /// Escape hatch for request opcodes this facade doesn't name a method
    /// for; callers supply the opcode, topic id, offset, and raw payload
    /// themselves and get the raw response frame back.
    pub fn request(
        &mut self,
        opcode: Opcode,
        topic_id: u32,
        offset: u64,
        payload: Vec<u8>,
    ) -> Result<lwp_protocol::Frame, LwpError> {
        self.connection.request(opcode, topic_id, offset, payload, Flags::empty())
    }

    pub fn close(mut self) -> Result<(), LwpError> {
        self.connection.close();
        let deadline = Instant::now() + self.config.transport.request_timeout;
        while !self.connection.state().is_terminal() && Instant::now() < deadline {
            self.connection.poll(Duration::from_millis(20));
        }
        Ok(())
    }

    fn await_ready(&mut self) -> Result<(), LwpError> {
        let deadline = Instant::now() + self.config.transport.connect_timeout;
        while !self.connection.state().is_ready() {
            if Instant::now() >= deadline {
                return Err(LwpError::Connection(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")));
            }
            self.connection.poll(Duration::from_millis(20));
        }
        Ok(())
    }
}
