//! CAN FD payloads and extended identifiers, from encoding to the live bus.

use std::sync::Arc;
use std::time::Duration;

use canschema::can::{
    BusConfig, CanBus, FdFrame, FrameCodec, SignalValue, SimpleFdFrame, dlc_to_len, len_to_dlc,
};
use canschema::{Bus, Result, StorageType};
use embedded_can::{ExtendedId, Frame, Id};

use super::{BATTERY_DBC, LoopbackTransport};

/// Cell voltages in an 18-byte message, and a charger on an extended id.
const FD_DBC: &str = r#"VERSION "1.0"

BU_: BMS CHG DASH

BO_ 1024 CellVoltages: 18 BMS
 SG_ Cell0 : 0|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell1 : 16|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell2 : 32|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell3 : 48|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell4 : 64|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell5 : 80|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell6 : 96|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell7 : 112|16@1+ (0.001,0) [0|65.535] "V" DASH
 SG_ Cell8 : 128|16@1+ (0.001,0) [0|65.535] "V" DASH

BO_ 2566868992 ChargerFd: 12 CHG
 SG_ Setpoint : 0|32@1+ (1,0) [0|1000] "V" BMS
 SG_ Limit : 32|16@1+ (0.1,0) [0|6553.5] "A" BMS
 SG_ Mode : 88|8@1+ (1,0) [0|255] "" BMS

SIG_VALTYPE_ 2566868992 Setpoint : 1;
"#;

const CHARGER_ID: u32 = 0x18FF_5000;

fn cell_values(voltages: &[f64]) -> Vec<(String, SignalValue)> {
    voltages
        .iter()
        .enumerate()
        .map(|(i, &v)| (format!("Cell{i}"), SignalValue::Float(v)))
        .collect()
}

fn fast_config() -> BusConfig {
    BusConfig::default().poll_interval(Duration::from_millis(5))
}

#[test]
fn test_fd_message_layout() -> Result<()> {
    let bus = Bus::parse("CANBus3", FD_DBC)?;

    let cells = bus.message(0x400).unwrap();
    assert_eq!(cells.byte_length(), 18);
    assert_eq!(cells.frame_length(), 18);

    let charger = bus.message(CHARGER_ID).unwrap();
    assert!(charger.is_extended());
    // 32 + 16 + 8 bits, though Mode sits in byte 11.
    assert_eq!(charger.byte_length(), 7);
    assert_eq!(charger.frame_length(), 12);
    assert_eq!(charger.signal("Setpoint").unwrap().storage(), StorageType::Float);
    assert_eq!(charger.signal("Mode").unwrap().storage(), StorageType::U8);
    Ok(())
}

#[test]
fn test_fd_payload_is_padded_to_a_valid_length() -> Result<()> {
    let bus = Bus::parse("CANBus3", FD_DBC)?;
    let codec = FrameCodec::new(&bus);

    let voltages = [3.301, 3.302, 3.299, 3.310, 3.287, 3.305, 3.300, 3.298, 3.312];
    let owned = cell_values(&voltages);
    let values: Vec<(&str, SignalValue)> = owned.iter().map(|(n, v)| (n.as_str(), *v)).collect();

    let frame = codec.encode("CellVoltages", &values, 2)?;
    assert_eq!(frame.arbitration_id, 0x402);
    assert!(frame.is_fd());
    // 18 bytes need DLC 11, which carries 20.
    assert_eq!(frame.data.len(), 20);
    assert_eq!(len_to_dlc(18), 11);
    assert_eq!(dlc_to_len(11), 20);
    assert_eq!(&frame.data[18..], &[0, 0]);

    let resolved = codec.resolve(frame.arbitration_id, &frame.data)?;
    assert_eq!(resolved.node_offset, 2);
    for (signal, expected) in resolved.signals.iter().zip(voltages) {
        assert!(
            (signal.value - expected).abs() < 1e-9,
            "{}: {} != {}",
            signal.name,
            signal.value,
            expected
        );
    }
    Ok(())
}

#[test]
fn test_extended_fd_frame() -> Result<()> {
    let bus = Bus::parse("CANBus3", FD_DBC)?;
    let codec = FrameCodec::new(&bus);

    let frame = codec.encode(
        "ChargerFd",
        &[
            ("Setpoint", SignalValue::Float(403.5)),
            ("Limit", SignalValue::Float(32.0)),
            ("Mode", 2.into()),
        ],
        1,
    )?;
    assert!(frame.is_extended);
    assert_eq!(frame.arbitration_id, CHARGER_ID + 1);
    assert_eq!(frame.data.len(), 12);
    assert_eq!(&frame.data[..4], &403.5f32.to_le_bytes());
    assert_eq!(frame.data[11], 2);
    assert_eq!(frame.id()?, Id::Extended(ExtendedId::new(CHARGER_ID + 1).unwrap()));

    let fd_frame = SimpleFdFrame::new_fd(frame.id()?, &frame.data, Default::default()).unwrap();
    let resolved = codec.resolve_frame(&fd_frame)?;
    assert_eq!(resolved.message.name(), "ChargerFd");
    assert_eq!(resolved.node_offset, 1);
    assert_eq!(resolved.signal("Setpoint").unwrap().value, 403.5);
    assert!((resolved.signal("Limit").unwrap().value - 32.0).abs() < 1e-9);
    assert_eq!(resolved.signal("Mode").unwrap().value, 2.0);
    Ok(())
}

#[test]
fn test_live_bus_sends_fd_frames() {
    let schema = Arc::new(Bus::parse("CANBus3", FD_DBC).unwrap());
    let config = fast_config().bit_rate_switch(true);
    let bus = CanBus::open(schema, LoopbackTransport::echoing(), config).unwrap();

    let owned = cell_values(&[3.3; 9]);
    let values: Vec<(&str, SignalValue)> = owned.iter().map(|(n, v)| (n.as_str(), *v)).collect();
    bus.send("CellVoltages", &values, 0).unwrap();
    bus.send("ChargerFd", &[("Mode", 1.into())], 4).unwrap();

    let cells = bus.recv(Duration::from_secs(2)).unwrap().expect("echo should arrive");
    assert_eq!(cells.message, "CellVoltages");
    assert_eq!(cells.signals.len(), 9);
    assert!(cells.signals.iter().all(|s| (s.value - 3.3).abs() < 1e-9));

    let charger = bus.recv(Duration::from_secs(2)).unwrap().expect("echo should arrive");
    assert_eq!(charger.arbitration_id, CHARGER_ID + 4);
    assert_eq!(charger.node_offset, 4);

    let transport = bus.shutdown().unwrap();
    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);

    assert!(sent[0].is_fd());
    assert!(sent[0].fd_flags().brs());
    assert_eq!(sent[0].dlc(), 11);
    assert_eq!(sent[0].data().len(), 20);

    assert!(sent[1].is_fd());
    assert!(sent[1].is_extended());
    assert_eq!(sent[1].data().len(), 12);
}

#[test]
fn test_classic_frames_stay_classic_unless_configured() {
    let schema = Arc::new(Bus::parse("CANBus1", BATTERY_DBC).unwrap());

    let bus = CanBus::open(Arc::clone(&schema), LoopbackTransport::echoing(), fast_config()).unwrap();
    bus.send("BmsStatus", &[("Fault", true.into())], 0).unwrap();
    let transport = bus.shutdown().unwrap();
    assert!(!transport.sent.lock().unwrap()[0].is_fd());

    let config = fast_config().fd(true);
    let bus = CanBus::open(schema, LoopbackTransport::echoing(), config).unwrap();
    bus.send("BmsStatus", &[("Fault", true.into())], 0).unwrap();
    let msg = bus.recv(Duration::from_secs(2)).unwrap().expect("echo should arrive");
    assert_eq!(msg.signal("Fault").unwrap().value, 1.0);

    let transport = bus.shutdown().unwrap();
    let sent = transport.sent.lock().unwrap();
    assert!(sent[0].is_fd());
    assert!(!sent[0].fd_flags().brs());
    assert_eq!(sent[0].dlc(), 8);
}
