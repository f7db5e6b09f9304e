use headfix_core::{ArrayKind, IntervalConfig, SessionConfig};
use headfix_session::{generate_session, PlannerOptions, RandomSource};
use headfix_timing::SimulatedTimer;
use headfix_transfer::{
    decode_array, Fault, FramedPacket, LoopbackChannel, Metadata, SerialChannel, TransferError,
    TransferOptions, TransferProtocol, TransferState,
};

fn config(total_trials: u32) -> SessionConfig {
    SessionConfig {
        total_trials,
        percent_punish: 0.5,
        starting_reward: 5,
        max_sequential_punish: 3,
        max_sequential_reward: 3,
        iti: IntervalConfig::jittered(20000, 40000),
        ..SessionConfig::default()
    }
}

#[test]
fn test_scenario_c_metadata_echo() {
    let metadata = Metadata::from_config(&config(20)).unwrap();
    assert_eq!(metadata.total_trials, 20);

    // Simulated echo of the metadata frame decodes to the same struct.
    let mut channel = LoopbackChannel::new();
    let frame = FramedPacket::new(0, metadata.to_bytes().to_vec()).to_bytes();
    channel.send(&frame).unwrap();
    let echo = FramedPacket::from_bytes(&channel.receive(frame.len()).unwrap()).unwrap();
    assert_eq!(Metadata::from_bytes(&echo.payload).unwrap(), metadata);

    // A single flipped bit in the echo aborts the session.
    let channel = LoopbackChannel::new().with_fault(Fault::FlipBit {
        transmission: 0,
        byte: FramedPacket::HEADER_SIZE,
        bit: 2,
    });
    let mut protocol = TransferProtocol::new(channel, SimulatedTimer::new(), TransferOptions::default());
    let err = protocol.run(&metadata, &[]).unwrap_err();
    assert!(matches!(err, TransferError::VerificationMismatch { packet_id: 0, .. }));
    assert_eq!(protocol.state(), TransferState::Aborted);
    assert!(!protocol.channel().is_open());
}

#[test]
fn test_scenario_c_field_mismatch_is_reported() {
    let metadata = Metadata::from_config(&config(20)).unwrap();
    // Checksum repaired, so only the field comparison can catch it.
    let channel = LoopbackChannel::new().with_fault(Fault::CorruptPayload {
        transmission: 0,
        offset: 0,
        bit: 0,
    });
    let mut protocol = TransferProtocol::new(channel, SimulatedTimer::new(), TransferOptions::default());
    match protocol.run(&metadata, &[]).unwrap_err() {
        TransferError::VerificationMismatch { packet_id, detail } => {
            assert_eq!(packet_id, 0);
            assert_eq!(detail, "total_trials: sent 20, echoed 21");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_scenario_d_split_iti_reconstructs() {
    let iti: Vec<i32> = (0..120).map(|i| 20000 + i * 137).collect();
    let metadata = Metadata::from_config(&config(120)).unwrap();
    let mut protocol =
        TransferProtocol::new(LoopbackChannel::new(), SimulatedTimer::new(), TransferOptions::default());
    protocol.run(&metadata, &[(ArrayKind::Iti, iti.clone())]).unwrap();

    let sent = protocol.channel().sent();
    // metadata, two halves, status
    assert_eq!(sent.len(), 4);
    let halves: Vec<Vec<i32>> = sent[1..3]
        .iter()
        .map(|f| decode_array(&FramedPacket::from_bytes(f).unwrap().payload).unwrap())
        .collect();
    assert_eq!(halves[0].len(), 60);
    assert_eq!(halves[1].len(), 60);
    assert_eq!(sent[1][0], sent[2][0]);
    assert_eq!([halves[0].clone(), halves[1].clone()].concat(), iti);
}

#[test]
fn test_generated_session_uploads() {
    let config = config(90);
    let session =
        generate_session(&config, &mut RandomSource::from_seed(12), PlannerOptions::default())
            .unwrap();
    let metadata = Metadata::from_config(&config).unwrap();
    let arrays = session.wire_arrays().unwrap();
    let mut protocol =
        TransferProtocol::new(LoopbackChannel::new(), SimulatedTimer::new(), TransferOptions::default());
    let report = protocol.run(&metadata, &arrays).unwrap();

    // 90 > 60: each of trial/iti/tone goes as two halves.
    assert_eq!(report.packets_sent, 1 + 3 * 2 + 1);
    assert_eq!(report.status_packet_id, 4);
    assert!(protocol.state().is_terminal());
}
