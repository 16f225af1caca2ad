use super::{SimulationError, Summary};
use crate::applications::PingPong;
use std::sync::Arc;
use switchyard_core::{Address, Channel, Config, Fabric, SimNetwork};

const PING_PORT: u16 = 0xbeef;
const PONG_PORT: u16 = 0xface;
const TTL: u8 = 255;

/// Runs a basic PingPong simulation.
///
/// In this simulation, two nodes send a Time To Live (TTL) back and forth
/// until the TTL reaches 0. The TTL is decremented every time a node
/// receives it.
pub async fn ping_pong(config: Config) -> Result<Summary, SimulationError> {
    let fabric = Fabric::new(config)?;
    let ping_app = PingPong::new_shared(Address::new("pong", PONG_PORT));
    let pong_app = PingPong::new_shared(Address::new("ping", PING_PORT));

    let ping = SimNetwork::new(&fabric, "ping", Some(ping_app.clone()));
    ping.start(Channel::Tcp, PING_PORT, false)?;
    let pong = SimNetwork::new(&fabric, "pong", Some(pong_app.clone()));
    pong.start(Channel::Tcp, PONG_PORT, false)?;

    ping.send(pong.address(), Arc::new(PingPong::message(TTL)));
    let deliveries = fabric.run_until_idle();

    let expected = TTL as usize + 1;
    // An odd TTL means the final, even one lands on the side that started.
    let finisher = if TTL % 2 == 0 { &pong_app } else { &ping_app };
    if deliveries != expected || finisher.finished().is_none() {
        Err(SimulationError::Incomplete {
            expected,
            actual: deliveries,
        })?
    }
    Ok(Summary {
        name: "ping-pong",
        deliveries,
        virtual_time: fabric.timeline().now(),
    })
}
