//! Resolution of simulated multi-node traffic against a parsed bus.

use canschema::can::{FrameCodec, SignalValue};
use canschema::{Bus, ByteOrder, Error, Result, StorageType};

use super::{BATTERY_DBC, BMS_STATUS_ID, FakeBatteryPack, MockCanFrame};

/// The part of the battery bus that the reference parser understands.
const CROSS_CHECK_DBC: &str = r#"VERSION "1.0"

NS_ :

BS_:

BU_: BMS PDM DASH

BO_ 256 BmsStatus: 8 BMS
 SG_ PackVoltage : 0|16@1+ (0.01,0) [0|655.35] "V" PDM,DASH
 SG_ PackCurrent : 16|16@1- (0.1,0) [-3276.8|3276.7] "A" PDM,DASH
 SG_ StateOfCharge : 32|8@1+ (0.5,0) [0|100] "%" DASH
 SG_ Contactor : 40|1@1+ (1,0) [0|1] "" PDM
 SG_ Fault : 41|1@1+ (1,0) [0|1] "" PDM,DASH

BO_ 512 CellTemps: 8 BMS
 SG_ MaxTemp : 7|12@0- (0.1,-40) [-40|125] "degC" DASH
 SG_ MinTemp : 27|12@0- (0.1,-40) [-40|125] "degC" DASH

VAL_ 256 Contactor 0 "Open" 1 "Closed" ;
"#;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_battery_packs_resolve_to_their_node() -> Result<()> {
    let bus = Bus::parse("CANBus1", BATTERY_DBC)?;
    let codec = FrameCodec::new(&bus);

    let mut packs: Vec<FakeBatteryPack> = (0..4).map(FakeBatteryPack::new).collect();
    packs[2].close_contactor(125.0);
    for _ in 0..50 {
        for pack in &mut packs {
            pack.update(0.1);
        }
    }

    for pack in &packs {
        let frame = pack.generate_status_frame();
        let resolved = codec.resolve_frame(&frame)?;

        assert_eq!(resolved.message.name(), "BmsStatus");
        assert_eq!(resolved.node_offset, pack.index);
        assert_close(resolved.signal("PackVoltage").unwrap().value, (pack.voltage * 100.0).round() / 100.0);
        assert_close(resolved.signal("PackCurrent").unwrap().value, pack.current);
        assert_close(resolved.signal("StateOfCharge").unwrap().value, (pack.soc * 2.0).round() / 2.0);
        assert_eq!(
            resolved.signal("Contactor").unwrap().value,
            if pack.contactor { 1.0 } else { 0.0 }
        );
        assert_eq!(resolved.signal("Fault").unwrap().raw, 0);
    }
    Ok(())
}

#[test]
fn test_offset_window_edges() -> Result<()> {
    let bus = Bus::parse(
        "CANBus1",
        "BO_ 16 Heartbeat: 1 ECU\n SG_ counter 0|8@1+ (1,0) [0|255] \"\" RX\n",
    )?;
    let codec = FrameCodec::new(&bus);

    let base = codec.resolve(0x10, &[1])?;
    assert_eq!((base.message.id(), base.node_offset), (0x10, 0));

    let node = codec.resolve(0x15, &[1])?;
    assert_eq!((node.message.id(), node.node_offset), (0x10, 5));

    let last = codec.resolve(0x1F, &[1])?;
    assert_eq!(last.node_offset, 15);

    match codec.resolve(0x30, &[1]) {
        Err(Error::UnrecognizedFrame { arbitration_id: 0x30 }) => {}
        other => panic!("Expected UnrecognizedFrame, got {other:?}"),
    }
    assert!(codec.resolve_id(0x20).is_none());
    Ok(())
}

#[test]
fn test_decoding_matches_reference_parser() -> Result<()> {
    let bus = Bus::parse("CANBus1", CROSS_CHECK_DBC)?;
    let codec = FrameCodec::new(&bus);
    let dbc = dbc_rs::Dbc::parse(CROSS_CHECK_DBC).expect("Failed to parse DBC");

    // The reference parser numbers Motorola bits differently, so only the
    // little-endian signals are compared against it.
    let payloads: [(u32, [u8; 8]); 2] = [
        (0x100, [0x40, 0x9C, 0x18, 0xFC, 0xA0, 0x01, 0x00, 0x00]),
        (0x100, [0xFF, 0xFF, 0xFF, 0x7F, 0xC8, 0x03, 0x00, 0x00]),
    ];

    for (id, data) in payloads {
        let ours = codec.resolve(id, &data)?;
        let reference = dbc.decode(id, &data, false).expect("Reference decode failed");

        for signal in &ours.signals {
            let definition = ours.message.signal(&signal.name).unwrap();
            if definition.byte_order() != ByteOrder::LittleEndian {
                continue;
            }
            let expected = reference
                .iter()
                .find(|d| d.name == signal.name.as_str())
                .unwrap_or_else(|| panic!("Reference has no {}", signal.name))
                .value;
            assert!(
                (signal.value - expected).abs() < 1e-6,
                "{} of 0x{:X}: {} != {}",
                signal.name,
                id,
                signal.value,
                expected
            );
        }
    }
    Ok(())
}

#[test]
fn test_big_endian_temperatures() -> Result<()> {
    let bus = Bus::parse("CANBus1", CROSS_CHECK_DBC)?;
    let codec = FrameCodec::new(&bus);

    // MaxTemp is byte 0 then the high nibble of byte 1. MinTemp is the low
    // nibble of byte 3 then byte 4.
    let resolved = codec.resolve(0x200, &[0x12, 0x34, 0x00, 0x0A, 0xBC, 0x00, 0x00, 0x00])?;
    let max_temp = resolved.signal("MaxTemp").unwrap();
    assert_eq!(max_temp.raw, 0x123);
    assert_close(max_temp.value, -10.9);
    let min_temp = resolved.signal("MinTemp").unwrap();
    assert_eq!(min_temp.raw, 0xABC);
    assert_close(min_temp.value, -174.8);

    let resolved = codec.resolve(0x200, &[0xFF, 0xF0, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00])?;
    assert_close(resolved.signal("MaxTemp").unwrap().value, -40.1);
    assert_close(resolved.signal("MinTemp").unwrap().value, -244.8);
    Ok(())
}

#[test]
fn test_encoded_frames_decode_in_reference_parser() -> Result<()> {
    let bus = Bus::parse("CANBus1", CROSS_CHECK_DBC)?;
    let codec = FrameCodec::new(&bus);
    let dbc = dbc_rs::Dbc::parse(CROSS_CHECK_DBC).expect("Failed to parse DBC");

    let frame = codec.encode(
        "BmsStatus",
        &[
            ("PackVoltage", SignalValue::Float(398.25)),
            ("PackCurrent", SignalValue::Float(-12.5)),
            ("StateOfCharge", 73.into()),
            ("Contactor", true.into()),
        ],
        0,
    )?;
    assert_eq!(frame.arbitration_id, BMS_STATUS_ID as u32);
    assert_eq!(frame.data.len(), 8);

    let decoded = dbc
        .decode(frame.arbitration_id, &frame.data, false)
        .expect("Reference decode failed");
    let value = |name: &str| decoded.iter().find(|d| d.name == name).unwrap().value;
    assert!((value("PackVoltage") - 398.25).abs() < 1e-6);
    assert!((value("PackCurrent") + 12.5).abs() < 1e-6);
    assert!((value("StateOfCharge") - 73.0).abs() < 1e-6);
    assert_eq!(value("Contactor"), 1.0);
    assert_eq!(value("Fault"), 0.0);

    // 717 and 280 as raw values, packed Motorola style.
    let frame = codec.encode(
        "CellTemps",
        &[("MaxTemp", SignalValue::Float(31.7)), ("MinTemp", SignalValue::Float(-12.0))],
        0,
    )?;
    assert_eq!(frame.data, [0x2C, 0xD0, 0x00, 0x01, 0x18, 0x00, 0x00, 0x00]);
    let resolved = codec.resolve(frame.arbitration_id, &frame.data)?;
    assert_close(resolved.signal("MaxTemp").unwrap().value, 31.7);
    assert_close(resolved.signal("MinTemp").unwrap().value, -12.0);
    Ok(())
}

#[test]
fn test_float_and_double_signals() -> Result<()> {
    let bus = Bus::parse("CANBus1", BATTERY_DBC)?;
    let codec = FrameCodec::new(&bus);

    let telemetry = bus.message(0x300).unwrap();
    assert_eq!(telemetry.signal("BoardTemp").unwrap().storage(), StorageType::Float);
    assert_eq!(telemetry.signal("Uptime").unwrap().storage(), StorageType::U32);

    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&36.625f32.to_le_bytes());
    data[4..].copy_from_slice(&86_400u32.to_le_bytes());
    let resolved = codec.resolve_frame(&MockCanFrame::new_standard(0x301, &data))?;
    assert_eq!(resolved.node_offset, 1);
    assert_eq!(resolved.signal("BoardTemp").unwrap().value, 36.625);
    assert_eq!(resolved.signal("Uptime").unwrap().value, 86_400.0);

    let odometer = bus.message(0x1000).unwrap();
    assert!(odometer.is_extended());
    assert_eq!(odometer.signal("Distance").unwrap().storage(), StorageType::Double);

    let frame = codec.encode("Odometer", &[("Distance", SignalValue::Float(12_345.678))], 2)?;
    assert!(frame.is_extended);
    assert_eq!(frame.arbitration_id, 0x1002);
    assert_eq!(frame.data, 12_345.678f64.to_le_bytes());

    let resolved = codec.resolve_frame(&MockCanFrame::new_extended(0x1002, &frame.data))?;
    assert_eq!(resolved.node_offset, 2);
    assert_eq!(resolved.signal("Distance").unwrap().value, 12_345.678);
    Ok(())
}

#[test]
fn test_undecodable_frames() {
    let bus = Bus::parse("CANBus1", BATTERY_DBC).unwrap();
    let codec = FrameCodec::new(&bus);

    // BmsStatus needs 6 bytes.
    let err = codec
        .resolve_frame(&MockCanFrame::new_standard(0x100, &[0; 4]))
        .unwrap_err();
    assert!(err.is_frame_error());
    assert!(matches!(
        err,
        Error::PayloadTooShort {
            actual: 4,
            expected: 6,
            ..
        }
    ));

    // CellTemps needs 3 bytes by bit count, but MinTemp reaches into byte 4.
    let err = codec
        .resolve_frame(&MockCanFrame::new_standard(0x200, &[0; 4]))
        .unwrap_err();
    match err {
        Error::SignalOutOfRange { signal, .. } => assert_eq!(signal, "MinTemp"),
        other => panic!("Expected SignalOutOfRange, got {other:?}"),
    }
}
