//! Two nodes exchanging chains over real WebSocket connections

use linkchain::network::NetworkNode;
use linkchain::Ledger;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_node(ledger: Ledger) -> (Arc<NetworkNode>, String) {
    let node = Arc::new(NetworkNode::new(ledger));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let _broadcaster = node.clone().spawn_tail_broadcaster();
    tokio::spawn(node.clone().serve(listener));
    (node, addr)
}

async fn wait_for_len(ledger: &Ledger, len: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while ledger.len() != len {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("chains did not converge");
}

#[tokio::test]
async fn test_new_peer_adopts_longer_chain() {
    let ahead = Ledger::new();
    for i in 0..3 {
        ahead.append_data(&format!("block {}", i)).unwrap();
    }
    let (_server, addr) = spawn_node(ahead.clone()).await;

    let behind = Ledger::new();
    let (client, _) = spawn_node(behind.clone()).await;
    client.clone().connect_peer(&addr).await.unwrap();

    wait_for_len(&behind, 4).await;
    assert_eq!(behind.chain(), ahead.chain());
}

#[tokio::test]
async fn test_new_blocks_propagate_to_peers() {
    let a = Ledger::new();
    let (node_a, addr_a) = spawn_node(a.clone()).await;
    let b = Ledger::new();
    let (node_b, _) = spawn_node(b.clone()).await;
    node_b.clone().connect_peer(&addr_a).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while node_a.peer_count().await == 0 || node_b.peer_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("peers never registered");

    a.append_data("from a").unwrap();
    wait_for_len(&b, 2).await;

    b.append_data("from b").unwrap();
    wait_for_len(&a, 3).await;
    assert_eq!(a.chain(), b.chain());
}
