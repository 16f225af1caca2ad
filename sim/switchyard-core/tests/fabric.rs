use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use switchyard_core::{
    admission::BoundedQueue,
    network::StartError,
    timeline::{Task, TaskKind},
    Address, Channel, ClientSession, Config, Fabric, Message, MessagePtr, NodeContext, ParserConfig,
    RpcCode, RpcHandler, ServerSession, SimNetwork, SimulatorConfig,
};

const PING: RpcCode = RpcCode::from_name("RPC_PING");
const GOSSIP: RpcCode = RpcCode::from_name("RPC_GOSSIP");

/// Records everything that happens on a node, optionally answering each
/// request with an echo.
#[derive(Default)]
struct Recorder {
    echo: bool,
    requests: Mutex<Vec<(NodeContext, MessagePtr)>>,
    replies: Mutex<Vec<(NodeContext, MessagePtr)>>,
    completed: AtomicUsize,
}

impl Recorder {
    fn echo() -> Arc<Self> {
        Arc::new(Self {
            echo: true,
            ..Default::default()
        })
    }

    fn requests(&self) -> Vec<(NodeContext, MessagePtr)> {
        self.requests.lock().clone()
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl RpcHandler for Recorder {
    fn on_recv_request(&self, context: &NodeContext, session: &Arc<ServerSession>, request: MessagePtr) {
        self.requests.lock().push((*context, request.clone()));
        if self.echo {
            let mut body = b"echo: ".to_vec();
            body.extend(request.body_bytes());
            session.send(Arc::new(Message::reply_to(&request, body)));
        }
    }

    fn on_recv_reply(&self, context: &NodeContext, _session: &Arc<ClientSession>, reply: MessagePtr) {
        self.replies.lock().push((*context, reply));
    }

    fn on_send_completed(&self, _context: &NodeContext, _message: &MessagePtr) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

fn fabric(min: u32, max: u32) -> Arc<Fabric> {
    Fabric::new(SimulatorConfig::default().delays(min, max)).unwrap()
}

fn ping(body: &str) -> MessagePtr {
    Arc::new(Message::request(PING, body))
}

#[test]
fn request_reaches_registered_server() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let server = Arc::new(Recorder::default());
    let client = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));
    e2.start(Channel::Tcp, 2000, true)?;

    let message = Message::request(PING, "ping").with_id(7);
    e2.send(Address::new("host1", 1000), Arc::new(message));
    assert_eq!(client.completed(), 1);
    assert!(server.requests().is_empty());

    assert_eq!(fabric.run_until_idle(), 1);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let (context, received) = &requests[0];
    assert_eq!(received.id(), 7);
    assert_eq!(received.body_to_vec(), b"ping");
    assert_eq!(received.from, Some(Address::new("host2", 2000)));
    assert_eq!(received.to, Some(Address::new("host1", 1000)));
    assert_eq!(context.node, e1.node());
    assert!(context.now >= Duration::from_micros(10));
    assert!(context.now <= Duration::from_micros(20));
    assert_eq!(client.completed(), 1);

    let session = e1.server_session(&e2.address()).unwrap();
    assert_eq!(session.received(), 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_destination_is_dropped() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let server = Arc::new(Recorder::default());
    let client = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));
    e2.start(Channel::Tcp, 2000, true)?;

    let reply = e2.call(Address::new("host1", 9999), ping("lost"));
    assert_eq!(fabric.timeline().pending(), 0);
    assert_eq!(fabric.run_until_idle(), 0);
    assert!(server.requests().is_empty());
    assert_eq!(e1.server_session_count(), 0);
    assert_eq!(e2.server_session_count(), 0);
    assert_eq!(client.completed(), 0);
    assert!(reply.await.is_err());
    Ok(())
}

#[test]
fn client_only_network_is_unreachable() -> anyhow::Result<()> {
    let fabric = fabric(1, 1);
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, true)?;
    assert!(fabric.switch().table(Channel::Tcp).is_empty());
    assert_eq!(e1.address(), Address::new("host1", 1000));
    Ok(())
}

#[test]
fn delays_stay_within_bounds() -> anyhow::Result<()> {
    let fabric = fabric(100, 200);
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);

    for i in 0..200 {
        e2.send(e1.address(), ping(&i.to_string()));
    }
    assert_eq!(fabric.run_until_idle(), 200);

    let requests = server.requests();
    assert_eq!(requests.len(), 200);
    for (context, _) in requests.iter() {
        assert!(context.now >= Duration::from_micros(100));
        assert!(context.now <= Duration::from_micros(200));
    }
    // Deliveries run in order of due time.
    assert!(requests.windows(2).all(|pair| pair[0].0.now <= pair[1].0.now));
    Ok(())
}

#[test]
fn same_seed_same_delays() -> anyhow::Result<()> {
    let run = |seed: u64| -> anyhow::Result<Vec<Duration>> {
        let fabric = Fabric::new(SimulatorConfig::default().seed(seed))?;
        let server = Arc::new(Recorder::default());
        let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
        e1.start(Channel::Tcp, 1000, false)?;
        let e2 = SimNetwork::new(&fabric, "host2", None);
        for _ in 0..20 {
            e2.send(e1.address(), ping("tick"));
        }
        fabric.run_until_idle();
        Ok(server.requests().iter().map(|(context, _)| context.now).collect())
    };
    assert_eq!(run(42)?, run(42)?);
    Ok(())
}

#[test]
fn loopback_has_no_delay() -> anyhow::Result<()> {
    let fabric = fabric(500, 1000);
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;

    e1.send(e1.address(), ping("self"));
    fabric.run_until_idle();
    assert_eq!(server.requests()[0].0.now, Duration::ZERO);

    // The localhost alias reaches the same node but is not the node's own
    // address, so the message is delayed.
    e1.send(Address::localhost(1000), ping("alias"));
    fabric.run_until_idle();
    let requests = server.requests();
    assert_eq!(requests[1].1.body_to_vec(), b"alias");
    assert!(requests[1].0.now >= Duration::from_micros(500));
    Ok(())
}

#[test]
fn addresses_are_exclusive() -> anyhow::Result<()> {
    let fabric = fabric(1, 10);
    let e1 = SimNetwork::new(&fabric, "host1", None);
    let e3 = SimNetwork::new(&fabric, "host1", None);
    e1.start(Channel::Tcp, 1000, false)?;

    assert!(matches!(
        e3.start(Channel::Tcp, 1000, false),
        Err(StartError::AddressInUse(_))
    ));
    e3.start(Channel::Udp, 1000, false)?;

    let tcp = fabric.switch().table(Channel::Tcp);
    assert!(Arc::ptr_eq(&tcp.lookup(&Address::new("host1", 1000)).unwrap(), &e1));
    let udp = fabric.switch().table(Channel::Udp);
    assert!(Arc::ptr_eq(&udp.lookup(&Address::new("host1", 1000)).unwrap(), &e3));
    Ok(())
}

#[test]
fn first_network_keeps_the_localhost_alias() -> anyhow::Result<()> {
    let fabric = fabric(1, 10);
    let a = SimNetwork::new(&fabric, "a", None);
    let b = SimNetwork::new(&fabric, "b", None);
    a.start(Channel::Tcp, 1000, false)?;
    b.start(Channel::Tcp, 1000, false)?;

    let table = fabric.switch().table(Channel::Tcp);
    assert!(Arc::ptr_eq(&table.lookup(&Address::localhost(1000)).unwrap(), &a));
    assert!(Arc::ptr_eq(&table.lookup(&Address::new("b", 1000)).unwrap(), &b));
    assert_eq!(table.len(), 3);
    Ok(())
}

#[test]
fn server_session_is_reused() -> anyhow::Result<()> {
    let fabric = fabric(1, 10);
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);
    e2.start(Channel::Tcp, 2000, false)?;
    let e3 = SimNetwork::new(&fabric, "host3", None);
    e3.start(Channel::Tcp, 3000, false)?;

    for _ in 0..3 {
        e2.send(e1.address(), ping("from e2"));
    }
    e3.send(e1.address(), ping("from e3"));
    fabric.run_until_idle();

    assert_eq!(e1.server_session_count(), 2);
    assert_eq!(e1.server_session(&e2.address()).unwrap().received(), 3);
    assert_eq!(e1.server_session(&e3.address()).unwrap().received(), 1);
    Ok(())
}

#[tokio::test]
async fn call_receives_matching_reply() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, false)?;
    let client = Arc::new(Recorder::default());
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));
    e2.start(Channel::Tcp, 2000, true)?;

    let first = ping("one");
    let second = ping("two");
    let first_reply = e2.call(e1.address(), first.clone());
    let second_reply = e2.call(e1.address(), second.clone());
    assert_eq!(e2.client_session(e1.address()).matcher().outstanding(), 2);

    assert_eq!(fabric.run_until_idle(), 4);
    let first_reply = first_reply.await?;
    let second_reply = second_reply.await?;
    assert_eq!(first_reply.id(), first.id());
    assert_eq!(first_reply.body_to_vec(), b"echo: one");
    assert_eq!(second_reply.id(), second.id());
    assert_eq!(second_reply.body_to_vec(), b"echo: two");
    assert!(fabric.timeline().now() <= Duration::from_micros(40));

    // Matched replies never reach the handler.
    assert!(client.replies.lock().is_empty());
    Ok(())
}

#[test]
fn unmatched_reply_reaches_handler() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, false)?;
    let client = Arc::new(Recorder::default());
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));

    let request = ping("fire and forget");
    e2.send(e1.address(), request.clone());
    fabric.run_until_idle();

    let replies = client.replies.lock();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0.node, e2.node());
    assert_eq!(replies[0].1.id(), request.id());
    Ok(())
}

#[test]
fn codes_choose_the_channel() -> anyhow::Result<()> {
    let fabric = fabric(1, 10);
    fabric.codes().bind(GOSSIP, Channel::Udp);
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);

    e2.send(e1.address(), Arc::new(Message::request(GOSSIP, "udp")));
    e2.send(e1.address(), ping("tcp"));
    fabric.run_until_idle();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.body_to_vec(), b"tcp");
    Ok(())
}

#[test]
fn admission_bounds_each_node_queue() -> anyhow::Result<()> {
    let fabric = Fabric::with_admission(SimulatorConfig::default(), Box::new(BoundedQueue::new(2)))?;
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);

    for _ in 0..5 {
        e2.send(e1.address(), ping("burst"));
    }
    assert_eq!(fabric.timeline().pending(), 2);
    assert_eq!(fabric.run_until_idle(), 2);
    assert_eq!(server.requests().len(), 2);

    e2.send(e1.address(), ping("later"));
    assert_eq!(fabric.run_until_idle(), 1);
    Ok(())
}

#[tokio::test]
async fn rejected_request_closes_the_call() -> anyhow::Result<()> {
    let fabric = Fabric::with_admission(SimulatorConfig::default(), Box::new(BoundedQueue::new(0)))?;
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, false)?;
    let client = Arc::new(Recorder::default());
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));

    let reply = e2.call(e1.address(), ping("refused"));
    assert_eq!(fabric.timeline().pending(), 0);
    assert_eq!(e2.client_session(e1.address()).matcher().outstanding(), 0);
    assert_eq!(client.completed(), 0);
    assert!(reply.await.is_err());
    Ok(())
}

#[tokio::test]
async fn rejected_reply_closes_the_call() -> anyhow::Result<()> {
    let requests_only = |task: &Task| matches!(task.kind, TaskKind::Request { .. });
    let fabric = Fabric::with_admission(SimulatorConfig::default(), Box::new(requests_only))?;
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);

    let reply = e2.call(e1.address(), ping("answer lost"));
    assert_eq!(fabric.run_until_idle(), 1);
    assert_eq!(e2.client_session(e1.address()).matcher().outstanding(), 0);
    assert!(reply.await.is_err());
    Ok(())
}

#[tokio::test]
async fn oversized_request_leaves_no_session() -> anyhow::Result<()> {
    let config = Config {
        network: ParserConfig {
            max_body_length: 4,
            ..Default::default()
        },
        ..Default::default()
    };
    let fabric = Fabric::new(config)?;
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);
    e2.start(Channel::Tcp, 2000, true)?;

    let reply = e2.call(e1.address(), ping("longer than four bytes"));
    assert_eq!(e1.server_session_count(), 0);
    assert_eq!(fabric.timeline().pending(), 0);
    assert_eq!(e2.client_session(e1.address()).matcher().outstanding(), 0);
    assert!(reply.await.is_err());

    e2.send(e1.address(), ping("fits"));
    assert_eq!(e1.server_session_count(), 1);
    assert_eq!(fabric.run_until_idle(), 1);
    assert_eq!(server.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn replies_follow_the_address_that_was_called() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, false)?;
    let client = Arc::new(Recorder::default());
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));
    e2.start(Channel::Tcp, 2000, true)?;

    // Both addresses reach e1, which sees one peer behind two client
    // sessions.
    let by_name = e2.call(e1.address(), ping("by name"));
    let by_alias = e2.call(Address::localhost(1000), ping("by alias"));
    fabric.run_until_idle();
    assert_eq!(e1.server_session_count(), 1);

    assert_eq!(by_name.await?.body_to_vec(), b"echo: by name");
    assert_eq!(by_alias.await?.body_to_vec(), b"echo: by alias");
    assert!(client.replies.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn restarted_client_receives_replies() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let e1 = SimNetwork::new(&fabric, "host1", Some(Recorder::echo()));
    e1.start(Channel::Tcp, 1000, false)?;
    let client = Arc::new(Recorder::default());
    let e2 = SimNetwork::new(&fabric, "host2", Some(client.clone()));
    e2.start(Channel::Tcp, 2000, true)?;

    let before = e2.call(e1.address(), ping("before"));
    fabric.run_until_idle();
    assert_eq!(before.await?.body_to_vec(), b"echo: before");

    e2.stop();
    e2.start(Channel::Tcp, 2000, true)?;
    let after = e2.call(e1.address(), ping("after"));
    fabric.run_until_idle();
    assert_eq!(after.await?.body_to_vec(), b"echo: after");
    assert!(client.replies.lock().is_empty());

    let session = e1.server_session(&e2.address()).unwrap();
    assert!(Arc::ptr_eq(&session.client(), &e2.client_session(e1.address())));
    Ok(())
}

#[tokio::test]
async fn stop_releases_addresses_and_calls() -> anyhow::Result<()> {
    let fabric = fabric(10, 20);
    let server = Arc::new(Recorder::default());
    let e1 = SimNetwork::new(&fabric, "host1", Some(server.clone()));
    e1.start(Channel::Tcp, 1000, false)?;
    let e2 = SimNetwork::new(&fabric, "host2", None);
    let pending = e2.call(e1.address(), ping("never answered"));

    e2.stop();
    assert!(pending.await.is_err());

    e1.stop();
    let table = fabric.switch().table(Channel::Tcp);
    assert!(table.lookup(&Address::new("host1", 1000)).is_none());
    assert!(table.is_empty());

    // The address is free again.
    let e3 = SimNetwork::new(&fabric, "host1", None);
    e3.start(Channel::Tcp, 1000, false)?;
    Ok(())
}

#[test]
fn dropped_network_is_unreachable() -> anyhow::Result<()> {
    let fabric = fabric(1, 10);
    let e1 = SimNetwork::new(&fabric, "host1", None);
    e1.start(Channel::Tcp, 1000, false)?;
    drop(e1);

    let e2 = SimNetwork::new(&fabric, "host2", None);
    e2.send(Address::new("host1", 1000), ping("gone"));
    assert_eq!(fabric.timeline().pending(), 0);

    let e3 = SimNetwork::new(&fabric, "host1", None);
    e3.start(Channel::Tcp, 1000, false)?;
    Ok(())
}
