use spacepacket::{
    BitStream, BitString, DecodeEnd, DecodeError, DecodeOptions, PacketCatalog, PacketFramer,
    SequenceFlags, StreamTable, TelemetryDump, Value, decode_dump, decode_telemetry,
};

const UNSEGMENTED: u8 = 3;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn catalog() -> PacketCatalog {
    PacketCatalog::open(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/catalog.yaml"))
        .expect("fixture catalog should load")
}

/// Encode one packet as hex; the data length is derived from the body size.
///
/// Written out field by field rather than through the crate's own fixtures so the
/// framer is checked against an independent encoding.
fn packet_hex(apid: u16, flags: u8, count: u16, gps: Option<(u32, u32)>, payload: &[u8]) -> String {
    let secondary_bytes = if gps.is_some() { 8 } else { 0 };
    let data_length = (secondary_bytes + payload.len() + 2 - 1) as u64;

    let mut bits = BitString::from_u64(0, 4);
    bits.append(&BitString::from_u64(gps.is_some() as u64, 1));
    bits.append(&BitString::from_u64(apid as u64, 11));
    bits.append(&BitString::from_u64(flags as u64, 2));
    bits.append(&BitString::from_u64(count as u64, 14));
    bits.append(&BitString::from_u64(data_length, 16));
    if let Some((week, ms)) = gps {
        bits.append(&BitString::from_u64(week as u64, 32));
        bits.append(&BitString::from_u64(ms as u64, 32));
    }
    bits.append(&BitString::from_bytes(payload));
    bits.append(&BitString::from_u64(0xBEEF, 16));
    bits.to_hex().expect("packets are byte aligned")
}

fn eps_packet(count: u16, ms: u32, voltage: u16, current: i16) -> String {
    let mut payload = vec![0x03];
    payload.extend_from_slice(&voltage.to_be_bytes());
    payload.extend_from_slice(&current.to_be_bytes());
    payload.push(0x81);
    packet_hex(0x1A3, UNSEGMENTED, count, Some((2000, ms)), &payload)
}

fn adcs_packet() -> String {
    let mut payload = Vec::new();
    for component in [1.0f32, 0.0, -0.5, 0.25] {
        payload.extend_from_slice(&component.to_bits().to_be_bytes());
    }
    payload.push(0xA5);
    packet_hex(0x0C8, UNSEGMENTED, 1, None, &payload)
}

#[test]
fn payload_width_follows_data_length() {
    // data length 2 without secondary header leaves one payload byte
    let hex = packet_hex(0x1A3, UNSEGMENTED, 0, None, &[0x7E]);
    assert_eq!(&hex[8..12], "0002");

    let packet = PacketFramer::new(BitStream::from_hex(&hex).unwrap()).next_packet().unwrap().unwrap();
    assert_eq!(packet.data_length_field, 2);
    assert_eq!(packet.payload.len(), 8);
    assert_eq!(packet.checksum.len(), 16);
}

#[test]
fn segmented_memory_dump_reassembles() {
    init_tracing();
    let hex = [
        packet_hex(0x010, 1, 10, None, &[0xAA]),
        packet_hex(0x010, 0, 11, None, &[0xBB]),
        packet_hex(0x010, 2, 12, None, &[0xCC]),
    ]
    .concat();

    let report = decode_dump(BitStream::from_hex(&hex).unwrap(), &catalog(), &DecodeOptions::default()).unwrap();
    assert_eq!(report.framed_packets, 3);
    assert_eq!(report.packets.len(), 1);

    let packet = &report.packets[0];
    assert_eq!(packet.sequence_count, 10);
    assert_eq!(packet.value("Header"), Some(&Value::UInt(0xAA)));
    assert_eq!(packet.value("Block"), Some(&Value::UInt(0xBBCC)));
    assert_eq!(packet.end, DecodeEnd::Terminal);
    assert_eq!(report.reassembly.unwrap().reassembled, 1);

    // The merged length field is the sum of the encoded values
    let framed: Vec<_> = PacketFramer::new(BitStream::from_hex(&hex).unwrap()).collect::<Result<_, _>>().unwrap();
    let merged = spacepacket::SegmentReassembler::reassemble(framed).0;
    assert_eq!(merged[0].data_length_field, 2 + 2 + 2);
    assert_eq!(merged[0].sequence_flags, SequenceFlags::Unsegmented);
    assert_eq!(merged[0].payload.to_hex().as_deref(), Some("AABBCC"));
}

#[test]
fn decodes_mixed_streams_end_to_end() {
    init_tracing();
    let hex = [eps_packet(1, 86_401_500, 0xF1F4, -100), adcs_packet(), eps_packet(2, 86_402_500, 0x0320, 250)].concat();
    let report = decode_telemetry(&TelemetryDump::from_hex_str(&hex), &catalog(), &DecodeOptions::default()).unwrap();

    assert!(report.is_clean(), "unexpected report: {:?}", report);
    assert_eq!(report.counts().into_iter().collect::<Vec<_>>(), vec![(0x0C8, 1), (0x1A3, 2)]);

    let eps: Vec<_> = report.packets_for(0x1A3).collect();
    let first = eps[0];
    assert_eq!(first.timestamp.unwrap().to_rfc3339(), "2018-05-07T00:00:01.500+00:00");
    assert_eq!(first.value("Mode"), Some(&Value::UInt(3)));
    assert_eq!(first.field("Battery").unwrap().value, None);
    let volts = first.value("Voltage").and_then(Value::as_f64).unwrap();
    assert!((volts - 5.0).abs() < 1e-9);
    assert_eq!(first.value("Current"), Some(&Value::Int(-100)));
    assert_eq!(first.value("Heater"), Some(&Value::Bit(true)));
    assert_eq!(first.value("Spare"), Some(&Value::UInt(1)));

    let adcs = report.packets_for(0x0C8).next().unwrap();
    assert_eq!(adcs.timestamp, None);
    assert_eq!(adcs.value("Quaternion"), Some(&Value::Vector(vec![1.0, 0.0, -0.5, 0.25])));
    assert_eq!(adcs.value("Sun sensors"), Some(&Value::Bits(BitString::from_binary_str("10100101").unwrap())));

    let table = StreamTable::from_packets(0x1A3, &report.packets);
    assert_eq!(
        table.column_names().collect::<Vec<_>>(),
        vec![
            "Mode (N/A)",
            "Battery Voltage (V)",
            "Battery Current (mA)",
            "Battery Heater (N/A)",
            "Battery Spare (N/A)"
        ]
    );
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column("Battery Current (mA)").unwrap().values[1], Some(Value::Int(250)));
}

#[test]
fn short_payload_stops_before_overreading() {
    // Mode and voltage only: current would need 16 more bits
    let hex = packet_hex(0x1A3, UNSEGMENTED, 3, None, &[0x01, 0x00, 0x64]);
    let report = decode_telemetry(&TelemetryDump::from_hex_str(&hex), &catalog(), &DecodeOptions::default()).unwrap();

    let packet = &report.packets[0];
    assert_eq!(packet.end, DecodeEnd::PayloadExhausted);
    assert_eq!(packet.fields.len(), 3);
    assert!(packet.field("Current").is_none());
}

#[test]
fn text_and_binary_dumps_decode_identically() {
    let hex = [eps_packet(1, 0, 0x0100, 1), adcs_packet()].concat();
    let dir = std::env::temp_dir();
    let text_path = dir.join(format!("spacepacket-it-{}.hex", std::process::id()));
    let binary_path = dir.join(format!("spacepacket-it-{}.bin", std::process::id()));

    // Split the hex over several lines with stray whitespace
    let wrapped: Vec<String> = hex.as_bytes().chunks(20).map(|c| format!("  {}\n", String::from_utf8_lossy(c))).collect();
    std::fs::write(&text_path, wrapped.concat()).unwrap();
    let bytes = BitString::from_hex(&hex).unwrap().to_bytes().unwrap();
    std::fs::write(&binary_path, &bytes).unwrap();

    let catalog = catalog();
    let options = DecodeOptions::default();
    let from_text = decode_telemetry(&TelemetryDump::open(&text_path).unwrap(), &catalog, &options).unwrap();
    let from_binary = decode_telemetry(&TelemetryDump::open(&binary_path).unwrap(), &catalog, &options).unwrap();

    assert_eq!(from_text.packets, from_binary.packets);
    assert_eq!(from_text.packets.len(), 2);

    std::fs::remove_file(text_path).ok();
    std::fs::remove_file(binary_path).ok();
}

#[test]
fn truncated_dump_keeps_prior_packets() {
    let mut hex = [eps_packet(1, 0, 0x0100, 1), adcs_packet()].concat();
    hex.truncate(hex.len() - 8);

    let report = decode_telemetry(&TelemetryDump::from_hex_str(&hex), &catalog(), &DecodeOptions::default()).unwrap();
    assert_eq!(report.packets.len(), 1);
    match report.framing_error {
        Some(DecodeError::TruncatedPacket { index, apid, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(apid, Some(0x0C8));
        }
        other => panic!("Expected TruncatedPacket, got {:?}", other),
    }
}

#[test]
fn invalid_hex_aborts_decode() {
    let err = decode_telemetry(&TelemetryDump::from_hex_str("01A3C0G5"), &catalog(), &DecodeOptions::default())
        .unwrap_err();
    assert!(matches!(err, DecodeError::MalformedInput { offset: 6, .. }));
    assert!(err.is_fatal());
}
