//! The receive thread running over a loopback transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use canschema::can::{BusConfig, BusStats, CanBus, SignalValue, SimpleFdFrame};
use canschema::{Bus, Error};
use embedded_can::{Frame, StandardId};

use super::{BATTERY_DBC, FakeBatteryPack, LoopbackTransport, MockCanFrame, to_simple};

const TIMEOUT: Duration = Duration::from_secs(2);

fn battery_bus() -> Arc<Bus> {
    Arc::new(Bus::parse("CANBus1", BATTERY_DBC).unwrap())
}

fn fast_config() -> BusConfig {
    BusConfig::default().poll_interval(Duration::from_millis(5))
}

fn wait_for_stats<T, F>(bus: &CanBus<T>, done: F) -> BusStats
where
    T: canschema::can::Transport,
    F: Fn(&BusStats) -> bool,
{
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let stats = bus.stats();
        if done(&stats) || Instant::now() > deadline {
            return stats;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_packs_are_delivered_with_their_node_offset() {
    let (transport, inject) = LoopbackTransport::new();
    let bus = CanBus::open(battery_bus(), transport, fast_config()).unwrap();

    let mut packs: Vec<FakeBatteryPack> = (0..4).map(FakeBatteryPack::new).collect();
    packs[1].close_contactor(40.0);
    for pack in &mut packs {
        pack.update(1.0);
        inject.send(to_simple(&pack.generate_status_frame())).unwrap();
    }

    let mut offsets = Vec::new();
    for _ in 0..4 {
        let msg = bus.recv(TIMEOUT).unwrap().expect("message should arrive");
        assert_eq!(msg.message, "BmsStatus");
        assert_eq!(msg.message_id, 0x100);
        assert_eq!(msg.arbitration_id, 0x100 + msg.node_offset as u32);
        assert_eq!(msg.signals.len(), 5);

        let pack = &packs[msg.node_offset as usize];
        let contactor = msg.signal("Contactor").unwrap().value;
        assert_eq!(contactor, if pack.contactor { 1.0 } else { 0.0 });
        offsets.push(msg.node_offset);
    }
    assert_eq!(offsets, [0, 1, 2, 3]);

    let stats = wait_for_stats(&bus, |s| s.delivered == 4);
    assert_eq!(stats.received, 4);
    assert_eq!(stats.delivered, 4);
    assert_eq!(stats.unrecognized, 0);
    assert_eq!(stats.dropped, 0);

    bus.shutdown().unwrap();
}

#[test]
fn test_bad_frames_are_counted_and_skipped() {
    let (transport, inject) = LoopbackTransport::new();
    let bus = CanBus::open(battery_bus(), transport, fast_config()).unwrap();

    // Nothing within 15 ids below 0x7F0.
    inject
        .send(to_simple(&MockCanFrame::new_standard(0x7F0, &[0; 8])))
        .unwrap();
    // BmsStatus needs 6 bytes.
    inject
        .send(to_simple(&MockCanFrame::new_standard(0x102, &[0; 2])))
        .unwrap();
    inject
        .send(SimpleFdFrame::new_remote(StandardId::new(0x100).unwrap(), 8).unwrap())
        .unwrap();
    inject
        .send(to_simple(&FakeBatteryPack::new(7).generate_status_frame()))
        .unwrap();

    let msg = bus.recv(TIMEOUT).unwrap().expect("good frame should arrive");
    assert_eq!(msg.node_offset, 7);
    assert!(bus.try_recv().unwrap().is_none());

    let stats = wait_for_stats(&bus, |s| s.delivered == 1);
    assert_eq!(stats.received, 4);
    assert_eq!(stats.unrecognized, 1);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.delivered, 1);
}

#[test]
fn test_full_queue_drops_new_messages() {
    let (transport, inject) = LoopbackTransport::new();
    let config = fast_config().queue_capacity(1);
    let bus = CanBus::open(battery_bus(), transport, config).unwrap();

    for index in 0..3 {
        inject
            .send(to_simple(&FakeBatteryPack::new(index).generate_status_frame()))
            .unwrap();
    }

    let stats = wait_for_stats(&bus, |s| s.delivered + s.dropped == 3);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.dropped, 2);

    // The oldest message is kept.
    let msg = bus.try_recv().unwrap().unwrap();
    assert_eq!(msg.node_offset, 0);
    assert!(bus.try_recv().unwrap().is_none());
}

#[test]
fn test_send_is_received_back_on_echo() {
    let bus = CanBus::open(battery_bus(), LoopbackTransport::echoing(), fast_config()).unwrap();

    bus.send(
        "BmsStatus",
        &[
            ("PackVoltage", SignalValue::Float(401.5)),
            ("StateOfCharge", 64.into()),
            ("Contactor", true.into()),
        ],
        3,
    )
    .unwrap();

    let msg = bus.recv(TIMEOUT).unwrap().expect("echo should arrive");
    assert_eq!(msg.arbitration_id, 0x103);
    assert_eq!(msg.node_offset, 3);
    assert!((msg.signal("PackVoltage").unwrap().value - 401.5).abs() < 1e-9);
    assert_eq!(msg.signal("StateOfCharge").unwrap().value, 64.0);
    assert_eq!(msg.signal("Contactor").unwrap().value, 1.0);
    assert_eq!(msg.signal("PackCurrent").unwrap().raw, 0);

    let transport = bus.shutdown().unwrap();
    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dlc(), 8);
    assert!(!sent[0].is_extended());
}

#[test]
fn test_send_errors_leave_the_bus_running() {
    let bus = CanBus::open(battery_bus(), LoopbackTransport::echoing(), fast_config()).unwrap();

    assert!(matches!(
        bus.send("Missing", &[], 0),
        Err(Error::UnknownMessage(name)) if name == "Missing"
    ));
    assert!(matches!(
        bus.send("BmsStatus", &[], 16),
        Err(Error::NodeOffsetOutOfRange(16))
    ));
    assert!(matches!(
        bus.send("BmsStatus", &[("StateOfCharge", 200.into())], 0),
        Err(Error::ValueOutOfRange { .. })
    ));

    assert!(bus.is_running());
    let transport = bus.shutdown().unwrap();
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[test]
fn test_callback_sees_every_decoded_message() {
    let (transport, inject) = LoopbackTransport::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let names = Arc::new(Mutex::new(Vec::new()));

    let bus = {
        let seen = Arc::clone(&seen);
        let names = Arc::clone(&names);
        CanBus::builder(battery_bus(), transport)
            .poll_interval(Duration::from_millis(5))
            .queue_capacity(1)
            .on_message(move |msg| {
                seen.fetch_add(1, Ordering::SeqCst);
                names.lock().unwrap().push(msg.message.clone());
            })
            .open()
            .unwrap()
    };

    inject
        .send(to_simple(&FakeBatteryPack::new(0).generate_status_frame()))
        .unwrap();
    inject
        .send(to_simple(&MockCanFrame::new_standard(0x305, &[0; 8])))
        .unwrap();
    inject
        .send(to_simple(&FakeBatteryPack::new(1).generate_status_frame()))
        .unwrap();

    // The callback runs even for messages the full queue drops.
    let stats = wait_for_stats(&bus, |s| s.delivered + s.dropped == 3);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert_eq!(stats.dropped, 2);
    assert_eq!(
        *names.lock().unwrap(),
        ["BmsStatus", "PdmTelemetry", "BmsStatus"]
    );
}

#[test]
fn test_transport_errors_do_not_stop_the_loop() {
    let (transport, inject) = LoopbackTransport::new();
    let bus = CanBus::open(battery_bus(), transport, fast_config()).unwrap();

    drop(inject);
    let stats = wait_for_stats(&bus, |s| s.transport_errors >= 2);
    assert!(stats.transport_errors >= 2);
    assert!(bus.is_running());
    assert_eq!(bus.try_recv().unwrap(), None);
}

#[test]
fn test_shutdown_stops_receiving() {
    let (transport, inject) = LoopbackTransport::new();
    let bus = CanBus::open(battery_bus(), transport, fast_config()).unwrap();
    assert!(bus.is_running());
    assert_eq!(bus.config().queue_capacity, 256);
    assert_eq!(bus.schema().name(), "CANBus1");

    let transport = bus.shutdown().unwrap();
    assert!(transport.sent.lock().unwrap().is_empty());

    // The transport, and with it the receiving end, is now ours.
    drop(transport);
    assert!(
        inject
            .send(to_simple(&FakeBatteryPack::new(0).generate_status_frame()))
            .is_err()
    );
}

#[test]
fn test_drop_stops_the_receive_thread() {
    let (transport, inject) = LoopbackTransport::new();
    let bus = CanBus::open(battery_bus(), transport, fast_config()).unwrap();
    drop(bus);

    assert!(
        inject
            .send(to_simple(&FakeBatteryPack::new(0).generate_status_frame()))
            .is_err()
    );
}
