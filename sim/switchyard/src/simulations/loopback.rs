use super::{SimulationError, Summary};
use crate::applications::Echo;
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use switchyard_core::{Channel, Config, Fabric, Message, RpcCode, SimNetwork};

const CALLS: usize = 10;
const RPC_SELF: RpcCode = RpcCode::from_name("RPC_SELF");

/// Runs a loopback simulation.
///
/// A single node calls its own address. Such traffic skips the simulated
/// delay entirely, so every call completes without virtual time passing.
pub async fn loopback(config: Config) -> Result<Summary, SimulationError> {
    let fabric = Fabric::new(config)?;
    let node = SimNetwork::new(&fabric, "solo", Some(Echo::new_shared()));
    node.start(Channel::Tcp, 7, false)?;

    let replies: Vec<_> = (0..CALLS)
        .map(|i| node.call(node.address(), Arc::new(Message::request(RPC_SELF, [i as u8]))))
        .collect();
    let deliveries = fabric.run_until_idle();
    for reply in join_all(replies).await {
        reply?;
    }

    let virtual_time = fabric.timeline().now();
    if virtual_time != Duration::ZERO {
        Err(SimulationError::Delayed(virtual_time))?
    }
    if deliveries != 2 * CALLS {
        Err(SimulationError::Incomplete {
            expected: 2 * CALLS,
            actual: deliveries,
        })?
    }
    Ok(Summary {
        name: "loopback",
        deliveries,
        virtual_time,
    })
}
