//! Integration test: daemons exchanging gossip and frames over their link
//! channels, pumped by hand instead of a transport.

use meshd_integration_tests::id;
use meshd_node::{MeshConfig, MeshFrame, MeshNode, PeerMessage, SessionEvent};
use tokio::sync::mpsc;

fn daemon(name: &str) -> MeshNode {
    let mut config = MeshConfig::default();
    config.node.name = name.into();
    MeshNode::new(config).expect("valid config")
}

/// Connect `a` and `b`, returning (a's queue towards b, b's queue towards a).
async fn tunnel(
    a: &MeshNode,
    b: &MeshNode,
) -> (mpsc::Receiver<PeerMessage>, mpsc::Receiver<PeerMessage>) {
    let (to_b, from_a) = mpsc::channel(64);
    let (to_a, from_b) = mpsc::channel(64);
    a.handle_session_event(SessionEvent::EdgeEstablished {
        peer: b.self_id().clone(),
        weight: 1,
        link: to_b,
    })
    .await
    .unwrap();
    b.handle_session_event(SessionEvent::EdgeEstablished {
        peer: a.self_id().clone(),
        weight: 1,
        link: to_a,
    })
    .await
    .unwrap();
    (from_a, from_b)
}

/// Hand everything queued on `rx` (sent by `from`) to `to`. Returns how many
/// messages moved.
async fn pump(from: &MeshNode, rx: &mut mpsc::Receiver<PeerMessage>, to: &MeshNode) -> usize {
    from.flush_outbox().unwrap();
    let mut moved = 0;
    while let Ok(message) = rx.try_recv() {
        let event = match message {
            PeerMessage::Gossip(announcement) => SessionEvent::Gossip {
                from: from.self_id().clone(),
                announcement,
            },
            PeerMessage::Frame(frame) => SessionEvent::FrameReceived {
                from: from.self_id().clone(),
                frame,
            },
        };
        to.handle_session_event(event).await.unwrap();
        moved += 1;
    }
    moved
}

#[tokio::test]
async fn test_three_daemons_learn_the_line() {
    let one = daemon("1");
    let two = daemon("2");
    let three = daemon("3");

    let (mut one_to_two, mut two_to_one) = tunnel(&one, &two).await;
    let (mut two_to_three, mut three_to_two) = tunnel(&two, &three).await;

    // Keep pumping until all queues are quiet.
    loop {
        let moved = pump(&one, &mut one_to_two, &two).await
            + pump(&two, &mut two_to_one, &one).await
            + pump(&two, &mut two_to_three, &three).await
            + pump(&three, &mut three_to_two, &two).await;
        if moved == 0 {
            break;
        }
    }

    assert_eq!(one.graph().next_hop(&id("3")).unwrap(), Some(id("2")));
    assert_eq!(three.graph().next_hop(&id("1")).unwrap(), Some(id("2")));
    // 2 is the only node with something to relay: 2-3 to 1 and 1-2 to 3.
    assert_eq!(two.state().snapshot().gossip_sent, 2);
    assert_eq!(one.state().snapshot().gossip_sent, 0);

    // A frame from 1 to 3 is relayed by 2.
    let frame = MeshFrame {
        source: id("1"),
        destination: Some(id("3")),
        payload: b"hello".to_vec(),
    };
    two.handle_session_event(SessionEvent::FrameReceived {
        from: id("1"),
        frame: frame.clone(),
    })
    .await
    .unwrap();
    assert_eq!(two_to_three.try_recv().unwrap(), PeerMessage::Frame(frame));
}
