use duosida_direct::status::{ChargerStatus, ConnectionState};

#[test]
fn power_follows_inputs_on_every_snapshot() {
    let charging = ChargerStatus {
        voltage: 230.0,
        current: 16.0,
        conn_status: 2,
        ..Default::default()
    };
    assert_eq!(charging.power(), 3680.0);

    let finished = ChargerStatus {
        current: 0.0,
        conn_status: 5,
        ..charging.clone()
    };
    assert_eq!(finished.power(), 0.0);
    assert_eq!(finished.state(), ConnectionState::Finished);
}

#[test]
fn nominal_cp_voltage_table() {
    let expected = [
        (-1, 0.0),
        (0, 12.0),
        (1, 9.0),
        (2, 6.0),
        (3, 3.0),
        (4, 9.0),
        (5, 9.0),
        (6, 0.0),
        (99, 0.0),
    ];
    for (code, volts) in expected {
        let status = ChargerStatus {
            conn_status: code,
            ..Default::default()
        };
        assert_eq!(status.cp_voltage(), volts, "state {}", code);
    }
}

#[test]
fn status_json_roundtrip_keeps_fields() {
    let status = ChargerStatus {
        voltage: 231.0,
        current: 6.5,
        session_start: 1_700_000_000,
        max_current: Some(16),
        device_id: "0310107112122360374".to_string(),
        ..Default::default()
    };
    let json = serde_json::to_string(&status).unwrap();
    let back: ChargerStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, status);
    assert!(back.session_time().unwrap() > 0);
}
