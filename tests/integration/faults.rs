use mocopi_core::compose::{definition_datagram, frame_datagram, BoneDefinition, BoneTransform, StreamHeader};

use mocopi_receiver::StreamMetadata;

use crate::*;

fn good_frame(frame: u32) -> Vec<u8> {
    frame_datagram(
        &StreamHeader::default(),
        frame,
        frame * 10,
        &[BoneTransform::new(2, [0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0])],
    )
    .unwrap()
}

/// A corrupt datagram between two good ones is dropped; both good ones land.
#[test]
fn test_corrupt_datagram_between_good_ones() {
    let mut lb = Loopback::new().expect("loopback");

    let mut corrupt = good_frame(99);
    corrupt.truncate(corrupt.len() - 5);

    lb.send(&good_frame(1)).unwrap();
    lb.send(&corrupt).unwrap();
    lb.send(&good_frame(2)).unwrap();

    let tick = lb.drain(3, TIMEOUT).unwrap();
    assert_eq!(tick.accepted, 2);
    assert_eq!(tick.rejected, 1);
    assert_eq!(lb.receiver.metadata().frame_number, Some(2));
    assert_eq!(lb.receiver.stats().rejected, 1);
}

/// Garbage never reaches the skeleton.
#[test]
fn test_garbage_leaves_state_untouched() {
    let mut lb = Loopback::new().expect("loopback");
    lb.send(&[0xde, 0xad, 0xbe, 0xef, 0x01]).unwrap();
    lb.send(&[0xff; 64]).unwrap();

    let tick = lb.drain(2, TIMEOUT).unwrap();
    assert_eq!(tick.rejected, 2);
    assert!(lb
        .receiver
        .bones()
        .iter()
        .all(|b| b.parent().is_none() && b.position() == glam::Vec3::ZERO));
    assert_eq!(lb.receiver.metadata(), StreamMetadata::default());
}

/// An empty datagram is discarded by the transport and does not stall the
/// queue behind it.
#[test]
fn test_empty_datagram_does_not_block_queue() {
    let mut lb = Loopback::new().expect("loopback");
    lb.send(&[]).unwrap();
    lb.send(&good_frame(5)).unwrap();

    let tick = lb.drain(1, TIMEOUT).unwrap();
    assert_eq!(tick.accepted, 1);
    assert_eq!(lb.receiver.metadata().frame_number, Some(5));
}

/// Out-of-range and self-referencing links are skipped; the rest of the
/// definition applies.
#[test]
fn test_bad_links_skipped() {
    let mut lb = Loopback::new().expect("loopback");
    let def = definition_datagram(
        &StreamHeader::default(),
        &[
            BoneDefinition { id: 1, parent: 0 },
            BoneDefinition { id: 5, parent: 200 },
            BoneDefinition { id: 300, parent: 0 },
            BoneDefinition { id: 7, parent: 7 },
            BoneDefinition { id: 2, parent: 1 },
        ],
    )
    .unwrap();
    lb.send(&def).unwrap();
    lb.drain(1, TIMEOUT).unwrap();

    let bones = lb.receiver.bones();
    assert_eq!(bones[1].parent(), Some(0));
    assert_eq!(bones[2].parent(), Some(1));
    assert_eq!(bones[5].parent(), None);
    assert_eq!(bones[7].parent(), None);
}

/// A second definition replaces the first topology completely.
#[test]
fn test_new_definition_resets_topology() {
    let mut lb = Loopback::new().expect("loopback");
    let header = StreamHeader::default();
    lb.send(&definition_datagram(&header, &[BoneDefinition { id: 3, parent: 0 }]).unwrap())
        .unwrap();
    lb.drain(1, TIMEOUT).unwrap();
    assert_eq!(lb.receiver.bones()[3].parent(), Some(0));

    lb.send(&definition_datagram(&header, &[BoneDefinition { id: 4, parent: 0 }]).unwrap())
        .unwrap();
    lb.drain(1, TIMEOUT).unwrap();
    assert_eq!(lb.receiver.bones()[3].parent(), None);
    assert_eq!(lb.receiver.bones()[4].parent(), Some(0));

    lb.send(&definition_datagram(&header, &[]).unwrap()).unwrap();
    lb.drain(1, TIMEOUT).unwrap();
    assert!(lb.receiver.bones().iter().all(|b| b.parent().is_none()));
}

/// A frame whose outer lengths are right but whose last bone entry is
/// corrupt is dropped whole; none of its bones are posed.
#[test]
fn test_corrupt_bone_entry_rejects_frame() {
    let mut lb = Loopback::new().expect("loopback");
    let mut frame = frame_datagram(
        &StreamHeader::default(),
        3,
        30,
        &[
            BoneTransform::new(1, [0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            BoneTransform::new(2, [0.0, 0.0, 0.0, 1.0], [2.0, 0.0, 0.0]),
            BoneTransform::new(3, [0.0, 0.0, 0.0, 1.0], [3.0, 0.0, 0.0]),
        ],
    )
    .unwrap();
    // last tran header: claim 12 bytes more than the entry holds
    let tran = frame.len() - 36;
    frame[tran..tran + 4].copy_from_slice(&40u32.to_le_bytes());

    lb.send(&frame).unwrap();
    lb.send(&good_frame(4)).unwrap();
    let tick = lb.drain(2, TIMEOUT).unwrap();
    assert_eq!(tick.rejected, 1);
    assert_eq!(tick.accepted, 1);
    assert_eq!(lb.receiver.bones()[1].position(), glam::Vec3::ZERO);
    assert_eq!(lb.receiver.metadata().frame_number, Some(4));
}
