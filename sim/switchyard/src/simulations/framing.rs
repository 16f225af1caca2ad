use super::{SimulationError, Summary};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::time::Duration;
use switchyard_core::{
    message::{FrameError, MessageHeader, MessageKind},
    Config, Message, MessageParser, RpcCode,
};

const MESSAGES: usize = 100;
const MAX_CHUNK: usize = 512;
const RPC_STREAM: RpcCode = RpcCode::from_name("RPC_STREAM");

/// Runs a framing simulation.
///
/// A stream of messages is cut into randomly sized chunks and fed to a
/// parser, which must reproduce every message in order. The stream then
/// ends with a header declaring an oversized body, which the parser must
/// refuse.
pub async fn framing(config: Config) -> Result<Summary, SimulationError> {
    let mut rng = SmallRng::seed_from_u64(config.tools.simulator.seed);
    let sent: Vec<_> = (0..MESSAGES)
        .map(|i| {
            let body: Vec<u8> = (0..rng.gen_range(0..2048)).map(|_| rng.gen()).collect();
            Message::request(RPC_STREAM, body).with_id(i as u64)
        })
        .collect();
    let stream: Vec<u8> = sent
        .iter()
        .flat_map(|message| message.copy_to_wire().data().to_vec())
        .collect();

    let mut parser = MessageParser::new(config.network);
    let mut received = vec![];
    let mut rest = stream.as_slice();
    while !rest.is_empty() {
        let len = rng.gen_range(1..=MAX_CHUNK.min(rest.len()));
        let (chunk, tail) = rest.split_at(len);
        received.extend(parser.feed(chunk)?);
        rest = tail;
    }

    if received.len() != sent.len() {
        Err(SimulationError::Incomplete {
            expected: sent.len(),
            actual: received.len(),
        })?
    }
    if let Some((message, _)) = sent.iter().zip(received.iter()).find(|(a, b)| a != b) {
        Err(SimulationError::Corrupted { id: message.id() })?
    }

    let oversized = MessageHeader {
        id: MESSAGES as u64,
        rpc_code: RPC_STREAM,
        body_length: config.network.max_body_length.saturating_add(1),
        kind: MessageKind::Request,
    };
    match parser.feed(&oversized.to_bytes()) {
        Err(FrameError::BodyTooLarge { .. }) => {}
        Err(e) => Err(e)?,
        Ok(_) => Err(SimulationError::OversizedAccepted)?,
    }

    Ok(Summary {
        name: "framing",
        deliveries: received.len(),
        virtual_time: Duration::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use switchyard_core::{Config, ParserConfig};

    #[tokio::test]
    async fn framing() {
        let summary = super::framing(Default::default()).await.unwrap();
        assert_eq!(summary.deliveries, 100);
    }

    #[tokio::test]
    async fn small_blocks() {
        let config = Config {
            network: ParserConfig {
                buffer_block_size: 8,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(super::framing(config).await.is_ok());
    }
}
