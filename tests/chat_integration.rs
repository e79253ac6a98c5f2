//! End-to-end tests against a real server on a loopback port.

use std::time::Duration;

use tokio::time::timeout;

use line_chat::{ChatClient, ChatServer, DirectoryHandle, ServerConfig};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind on an ephemeral port, start accepting, return the address
async fn start_server(config: ServerConfig) -> (String, DirectoryHandle) {
    let server = ChatServer::bind(config.with_addr("127.0.0.1:0"))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let directory = server.directory();
    tokio::spawn(server.run());
    (addr, directory)
}

async fn recv(client: &mut ChatClient) -> String {
    timeout(RECV_TIMEOUT, client.read_line())
        .await
        .expect("timed out waiting for line")
        .unwrap()
        .expect("connection closed")
}

async fn recv_eof(client: &mut ChatClient) {
    let line = timeout(RECV_TIMEOUT, client.read_line())
        .await
        .expect("timed out waiting for close")
        .unwrap();
    assert_eq!(line, None);
}

/// Connect and consume the client's own arrival notice
async fn join(addr: &str) -> ChatClient {
    let mut client = ChatClient::connect(addr).await.unwrap();
    let me = client.local_addr().to_string();
    assert_eq!(recv(&mut client).await, format!("[{me}]{me}: has come online"));
    client
}

async fn rename(client: &mut ChatClient, name: &str) {
    client.rename(name).await.unwrap();
    assert_eq!(recv(client).await, format!("You are now known as {name}"));
}

/// Connect `n` clients, each having seen every arrival after its own
async fn join_all(addr: &str, n: usize) -> Vec<ChatClient> {
    let mut clients: Vec<ChatClient> = Vec::new();
    for _ in 0..n {
        let client = join(addr).await;
        let arrival = {
            let me = client.local_addr().to_string();
            format!("[{me}]{me}: has come online")
        };
        for other in clients.iter_mut() {
            assert_eq!(recv(other).await, arrival);
        }
        clients.push(client);
    }
    clients
}

#[tokio::test]
async fn test_direct_message_between_named_users() {
    let (addr, _directory) = start_server(ServerConfig::default()).await;
    let mut clients = join_all(&addr, 2).await;
    let mut bob = clients.pop().unwrap();
    let mut alice = clients.pop().unwrap();
    rename(&mut alice, "alice").await;
    rename(&mut bob, "bob").await;

    alice.direct("bob", "hello").await.unwrap();
    assert_eq!(recv(&mut bob).await, "alice says to you: hello");

    // Nothing was queued for alice ahead of her listing
    let alice_addr = alice.local_addr().to_string();
    let bob_addr = bob.local_addr().to_string();
    alice.who().await.unwrap();
    assert_eq!(recv(&mut alice).await, format!("[{alice_addr}]alice: online"));
    assert_eq!(recv(&mut alice).await, format!("[{bob_addr}]bob: online"));
}

#[tokio::test]
async fn test_direct_message_unknown_user() {
    let (addr, _directory) = start_server(ServerConfig::default()).await;
    let mut alice = join(&addr).await;

    alice.direct("nobody", "hello").await.unwrap();
    assert_eq!(recv(&mut alice).await, "User 'nobody' not found");
}

#[tokio::test]
async fn test_rename_conflict_keeps_address_name() {
    let (addr, directory) = start_server(ServerConfig::default()).await;
    let mut clients = join_all(&addr, 2).await;
    let mut other = clients.pop().unwrap();
    let mut me = clients.pop().unwrap();
    rename(&mut other, "carol").await;

    me.rename("carol").await.unwrap();
    assert_eq!(recv(&mut me).await, "Name 'carol' is already in use");

    let my_addr = me.local_addr().to_string();
    let names: Vec<String> = directory
        .snapshot()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert!(names.contains(&my_addr));
    assert!(names.contains(&"carol".to_string()));
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_once() {
    let (addr, _directory) = start_server(ServerConfig::default()).await;
    let mut clients = join_all(&addr, 3).await;
    let sender = clients[0].local_addr().to_string();

    clients[0].send_line("hi").await.unwrap();

    for client in clients.iter_mut() {
        assert_eq!(recv(client).await, format!("[{sender}]{sender}: hi"));
        // Next line is the listing, not a duplicate
        client.who().await.unwrap();
        assert!(recv(client).await.ends_with(": online"));
    }
}

#[tokio::test]
async fn test_peer_close_announces_departure() {
    let (addr, directory) = start_server(ServerConfig::default()).await;
    let mut clients = join_all(&addr, 3).await;
    let leaver = clients.pop().unwrap();
    let gone = leaver.local_addr().to_string();

    drop(leaver);

    for client in clients.iter_mut() {
        assert_eq!(recv(client).await, format!("[{gone}]{gone}: has gone offline"));
    }

    clients[0].who().await.unwrap();
    let first = recv(&mut clients[0]).await;
    let second = recv(&mut clients[0]).await;
    assert!(!first.contains(&gone));
    assert!(!second.contains(&gone));
    assert_eq!(directory.snapshot().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_idle_timeout_disconnects() {
    let config = ServerConfig::default().with_idle_timeout(Duration::from_millis(300));
    let (addr, directory) = start_server(config).await;
    let mut client = join(&addr).await;

    assert_eq!(recv(&mut client).await, "Idle timeout, connection closed");
    recv_eof(&mut client).await;
    assert!(directory.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_broadcasts_keep_per_sender_order() {
    const CLIENTS: usize = 4;
    const MESSAGES: usize = 10;

    let (addr, _directory) = start_server(ServerConfig::default()).await;
    let clients = join_all(&addr, CLIENTS).await;
    let senders: Vec<String> = clients.iter().map(|c| c.local_addr().to_string()).collect();

    let mut tasks = Vec::new();
    for mut client in clients {
        tasks.push(tokio::spawn(async move {
            let mut received = Vec::new();
            for i in 0..MESSAGES {
                client.send_line(&format!("msg {i}")).await.unwrap();
            }
            while received.len() < CLIENTS * MESSAGES {
                received.push(recv(&mut client).await);
            }
            received
        }));
    }

    for task in tasks {
        let received = task.await.unwrap();
        for sender in &senders {
            let prefix = format!("[{sender}]{sender}: ");
            let from_sender: Vec<&str> = received
                .iter()
                .filter_map(|line| line.strip_prefix(prefix.as_str()))
                .collect();
            let expected: Vec<String> = (0..MESSAGES).map(|i| format!("msg {i}")).collect();
            assert_eq!(from_sender, expected);
        }
    }
}
