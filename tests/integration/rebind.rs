use mocopi_core::compose::{definition_datagram, BoneDefinition, StreamHeader};
use mocopi_receiver::{Receiver, TransportError, UdpTransport};

use crate::*;

/// Rebinding drops the old stream and listens wherever the new binding
/// landed. The OS may hand back the same ephemeral port.
#[test]
fn test_rebind_to_ephemeral_port() {
    let mut lb = Loopback::new().expect("loopback");
    let def = definition_datagram(&StreamHeader::default(), &[BoneDefinition { id: 1, parent: 0 }]).unwrap();
    lb.send(&def).unwrap();
    lb.drain(1, TIMEOUT).unwrap();
    assert_eq!(lb.receiver.bones()[1].parent(), Some(0));

    lb.receiver.setup(0).expect("rebind");
    assert!(lb.receiver.is_bound());
    assert_eq!(lb.receiver.bones()[1].parent(), None);

    lb.port = lb.receiver.port().expect("bound");
    lb.send(&def).unwrap();
    assert_eq!(lb.drain(1, TIMEOUT).unwrap().accepted, 1);
    assert_eq!(lb.receiver.bones()[1].parent(), Some(0));
}

/// Rebinding to the same port closes the old socket first, so it succeeds.
#[test]
fn test_rebind_same_port() {
    let mut lb = Loopback::new().expect("loopback");
    let port = lb.port;
    lb.receiver.setup(port).expect("rebind to the same port");
    assert_eq!(lb.receiver.port(), Some(port));

    let def = definition_datagram(&StreamHeader::default(), &[BoneDefinition { id: 6, parent: 5 }]).unwrap();
    lb.send(&def).unwrap();
    lb.drain(1, TIMEOUT).unwrap();
    assert_eq!(lb.receiver.bones()[6].parent(), Some(5));
}

/// A failed bind leaves the receiver unbound and reports the port.
#[test]
fn test_bind_conflict_leaves_unbound() {
    let lb = Loopback::new().expect("loopback");
    let mut other = Receiver::<UdpTransport>::new(SCENE_SCALE).unwrap();
    match other.setup(lb.port) {
        Err(TransportError::Bind { port, .. }) => assert_eq!(port, lb.port),
        other => panic!("expected bind failure, got {other:?}"),
    }
    assert!(!other.is_bound());
    assert_eq!(other.port(), None);
    assert_eq!(other.update().accepted, 0);
}

#[test]
fn test_close_releases_port() {
    let mut lb = Loopback::new().expect("loopback");
    let port = lb.port;
    assert!(lb.receiver.close());
    assert!(!lb.receiver.is_bound());

    let mut other = Receiver::<UdpTransport>::new(SCENE_SCALE).unwrap();
    other.setup(port).expect("port is free after close");
    assert_eq!(other.port(), Some(port));
}
