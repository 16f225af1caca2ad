use super::{SimulationError, Summary};
use crate::applications::Echo;
use futures::future::join_all;
use std::sync::Arc;
use switchyard_core::{Address, Channel, Config, Fabric, Message, RpcCode, SimNetwork};

const CLIENTS: u16 = 16;
const CALLS_PER_CLIENT: usize = 4;
const SERVER_PORT: u16 = 80;
const RPC_ECHO: RpcCode = RpcCode::from_name("RPC_ECHO");

/// Runs a fan-in simulation.
///
/// Many client nodes call one echo server at once. Every call must get back
/// its own reply, matched by id, and the server must see one session per
/// client.
pub async fn fan_in(config: Config) -> Result<Summary, SimulationError> {
    let fabric = Fabric::new(config)?;
    let echo = Echo::new_shared();
    let server = SimNetwork::new(&fabric, "server", Some(echo.clone()));
    server.start(Channel::Tcp, SERVER_PORT, false)?;
    let server_address = Address::new("server", SERVER_PORT);

    let mut clients = vec![];
    let mut calls = vec![];
    for i in 0..CLIENTS {
        let client = SimNetwork::new(&fabric, format!("client{i}"), None);
        client.start(Channel::Tcp, 1000 + i, true)?;
        for j in 0..CALLS_PER_CLIENT {
            let request = Arc::new(Message::request(RPC_ECHO, format!("{i}/{j}").as_str()));
            let reply = client.call(server_address.clone(), request.clone());
            calls.push((request, reply));
        }
        clients.push(client);
    }

    let deliveries = fabric.run_until_idle();
    let (requests, replies): (Vec<_>, Vec<_>) = calls.into_iter().unzip();
    for (request, reply) in requests.iter().zip(join_all(replies).await) {
        let reply = reply?;
        if reply.id() != request.id() || reply.body_to_vec() != request.body_to_vec() {
            Err(SimulationError::Corrupted { id: request.id() })?
        }
    }

    let expected = 2 * requests.len();
    if deliveries != expected || echo.served() != requests.len() {
        Err(SimulationError::Incomplete {
            expected,
            actual: deliveries,
        })?
    }
    debug_assert_eq!(server.server_session_count(), clients.len());
    Ok(Summary {
        name: "fan-in",
        deliveries,
        virtual_time: fabric.timeline().now(),
    })
}
