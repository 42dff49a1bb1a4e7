use glam::Vec3;

use mocopi_core::compose::{
    definition_datagram, frame_datagram, standard_topology, BoneTransform, StreamHeader,
};
use mocopi_core::wire::{BoneIdWire, BTDT, FRAM, NUM_BONES};
use mocopi_receiver::Phase;
use std::sync::{Arc, Mutex};

use crate::*;

fn close(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1e-2
}

/// Definition then frames over real UDP: hierarchy, poses and metadata all
/// arrive.
#[test]
fn test_definition_then_frames() {
    let mut lb = Loopback::new().expect("loopback");
    let header = StreamHeader {
        sender_ip: [192, 168, 1, 20],
        sender_port: 40000,
        ..StreamHeader::default()
    };

    lb.send(&definition_datagram(&header, &standard_topology()).unwrap())
        .unwrap();
    let tick = lb.drain(1, TIMEOUT).unwrap();
    assert_eq!(tick.accepted, 1);

    let skeleton = lb.receiver.skeleton();
    assert_eq!(skeleton.bone(0).unwrap().parent(), None);
    for id in 1..NUM_BONES {
        assert!(skeleton.bone(id).unwrap().parent().is_some(), "bone {id} unlinked");
    }

    // hips up 1 m, spine bone 1 up another 0.1 m
    let mut bones: Vec<BoneTransform> = (0..NUM_BONES as u16)
        .map(|id| BoneTransform::new(id, [0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0]))
        .collect();
    bones[0] = BoneTransform::new(0, [0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0]);
    bones[1] = BoneTransform::new(1, [0.0, 0.0, 0.0, 1.0], [0.0, 0.1, 0.0]);
    for frame in 0..3u32 {
        lb.send(&frame_datagram(&header, frame, frame * 20, &bones).unwrap())
            .unwrap();
    }
    let tick = lb.drain(3, TIMEOUT).unwrap();
    assert_eq!(tick.accepted, 3);
    assert_eq!(tick.rejected, 0);

    let skeleton = lb.receiver.skeleton();
    assert!(close(skeleton.global_position(0).unwrap(), Vec3::new(0.0, 1000.0, 0.0)));
    assert!(close(skeleton.global_position(1).unwrap(), Vec3::new(0.0, 1100.0, 0.0)));
    // everything above bone 1 has zero offset
    assert!(close(skeleton.global_position(10).unwrap(), Vec3::new(0.0, 1100.0, 0.0)));

    let meta = lb.receiver.metadata();
    assert_eq!(meta.frame_number, Some(2));
    assert_eq!(meta.timestamp, Some(40));
    assert_eq!(meta.sender_ip, Some("192.168.1.20".parse().unwrap()));
    assert_eq!(meta.sender_port, Some(40000));
    assert_eq!(meta.version, Some(1));
}

/// Frames before any definition still pose bones, they just have no parents.
#[test]
fn test_frames_without_definition() {
    let mut lb = Loopback::new().expect("loopback");
    let frame = frame_datagram(
        &StreamHeader::default(),
        1,
        0,
        &[BoneTransform::new(4, [0.0, 0.0, 0.0, 1.0], [0.5, 0.0, 0.0])],
    )
    .unwrap();
    lb.send(&frame).unwrap();
    lb.drain(1, TIMEOUT).unwrap();

    let bone = lb.receiver.bones()[4];
    assert_eq!(bone.parent(), None);
    assert!(close(bone.position(), Vec3::new(500.0, 0.0, 0.0)));
    assert!(close(
        lb.receiver.skeleton().global_position(4).unwrap(),
        Vec3::new(500.0, 0.0, 0.0)
    ));
}

/// A burst sent between two ticks is drained by a single update.
#[test]
fn test_backlog_drained_in_one_tick() {
    let mut lb = Loopback::new().expect("loopback");
    let header = StreamHeader::default();
    for frame in 0..10u32 {
        lb.send(&frame_datagram(&header, frame, frame, &[]).unwrap())
            .unwrap();
    }
    // give the kernel time to queue all of them
    std::thread::sleep(std::time::Duration::from_millis(100));

    let tick = lb.receiver.update();
    assert_eq!(tick.accepted, 10);
    assert_eq!(lb.receiver.metadata().frame_number, Some(9));
    assert_eq!(lb.receiver.update().accepted, 0);
}

#[test]
fn test_snapshot_reflects_stream() {
    let mut lb = Loopback::new().expect("loopback");
    lb.send(&definition_datagram(&StreamHeader::default(), &standard_topology()).unwrap())
        .unwrap();
    lb.drain(1, TIMEOUT).unwrap();

    let json = serde_json::to_value(lb.receiver.snapshot()).unwrap();
    assert_eq!(json["port"], lb.port);
    assert_eq!(json["stats"]["accepted"], 1);
    assert_eq!(json["skeleton"]["bones"].as_array().unwrap().len(), NUM_BONES);
    assert_eq!(json["skeleton"]["bones"][7]["parent"], 6);
    assert_eq!(json["metadata"]["format"], "sony motion format");
}

/// Host observers see every bone entry of every frame, in wire order.
#[test]
fn test_observers_follow_stream() {
    let mut lb = Loopback::new().expect("loopback");
    let bone_id = lb.receiver.nodes().bones.bone_id;
    let entries = Arc::new(Mutex::new(Vec::new()));
    let frames = Arc::new(Mutex::new(0usize));

    let log = Arc::clone(&entries);
    lb.receiver
        .on_event(Phase::After, BTDT, move |tree, _| {
            let id = tree.capture(bone_id).unwrap().read::<BoneIdWire>().unwrap().get();
            log.lock().unwrap().push(id);
        })
        .unwrap();
    let count = Arc::clone(&frames);
    lb.receiver
        .on_event(Phase::After, FRAM, move |_, _| *count.lock().unwrap() += 1)
        .unwrap();

    let bones: Vec<BoneTransform> = [4u16, 0, 9]
        .iter()
        .map(|&id| BoneTransform::new(id, [0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0]))
        .collect();
    let header = StreamHeader::default();
    for frame in 0..2u32 {
        lb.send(&frame_datagram(&header, frame, frame, &bones).unwrap())
            .unwrap();
    }
    lb.drain(2, TIMEOUT).unwrap();

    assert_eq!(*entries.lock().unwrap(), vec![4, 0, 9, 4, 0, 9]);
    assert_eq!(*frames.lock().unwrap(), 2);
}
