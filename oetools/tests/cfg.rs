use oetools::cfg::{InterfaceConfig, SyncChannels, SyncMode};
use oetools::ConfigError;
use std::time::Duration;

const LINES: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

fn serialize_config(config: &InterfaceConfig) -> String {
    toml::ser::to_string(config).unwrap()
}

fn deserialize_config(config: &str) -> InterfaceConfig {
    InterfaceConfig::from_toml_str(config).unwrap()
}

#[test]
fn serde_roundtrip() {
    let config = InterfaceConfig {
        hostname: String::from("acq.local"),
        port: 5557,
        sync_channels: vec![1, 2, 5],
        spikes: true,
        sync_mode: SyncMode::External,
        sync_interval: Duration::from_millis(250),
        sync_receipt_check_interval: Duration::from_secs(3),
    };
    let serconfig = serialize_config(&config);
    let deconfig = deserialize_config(&serconfig);
    assert_eq!(config, deconfig);
}

#[test]
fn de_simple() {
    let x = r#"
        hostname = "127.0.0.1"
        port = 5557
        sync_channels = [1, 2]
    "#;

    let de = deserialize_config(x);

    let c = InterfaceConfig {
        sync_channels: vec![1, 2],
        ..Default::default()
    };

    assert_eq!(c, de);
    assert_eq!(de.sync_interval, Duration::from_secs(1));
    assert_eq!(de.sync_receipt_check_interval, Duration::from_secs(5));
    assert_eq!(de.sync_mode, SyncMode::Drive);
    assert!(!de.spikes);
}

#[test]
fn de_complex() {
    let x = r#"
        hostname = "10.0.0.7"
        port = 6000
        sync_channels = [3, 4, 7, 8]
        spikes = true
        sync_mode = "external"
        sync_interval = "500ms"
        sync_receipt_check_interval = "2s 500ms"
    "#;

    let de = deserialize_config(x);

    assert_eq!(de.endpoint(), "tcp://10.0.0.7:6000");
    assert_eq!(de.sync_mode, SyncMode::External);
    assert_eq!(
        de.sync_interval,
        Duration::from("500ms".parse::<humantime::Duration>().unwrap())
    );
    assert_eq!(de.sync_receipt_check_interval, Duration::from_millis(2500));
    let channels = de.validate().unwrap();
    assert_eq!(channels.channels(), &[2, 3, 6, 7]);
}

#[test]
fn missing_channels_is_malformed() {
    let x = r#"
        hostname = "127.0.0.1"
        port = 5557
    "#;
    assert!(matches!(
        InterfaceConfig::from_toml_str(x),
        Err(ConfigError::Malformed(_))
    ));
}

#[test]
fn channel_validation() {
    assert_eq!(
        SyncChannels::from_numbers(&[]),
        Err(ConfigError::NoSyncChannels)
    );
    assert_eq!(
        SyncChannels::from_numbers(&[0, 1]),
        Err(ConfigError::ChannelOutOfRange(0))
    );
    assert_eq!(
        SyncChannels::from_numbers(&[1, 9]),
        Err(ConfigError::ChannelOutOfRange(9))
    );
    assert_eq!(
        SyncChannels::from_numbers(&[2, 1]),
        Err(ConfigError::NotAscending { prev: 2, next: 1 })
    );
    assert_eq!(
        SyncChannels::from_numbers(&[1, 3, 3]),
        Err(ConfigError::NotAscending { prev: 3, next: 3 })
    );
    let all = SyncChannels::from_numbers(&LINES.map(i64::from)).unwrap();
    assert_eq!(all.len(), 8);
    assert_eq!(all.code_space(), 256);
    for ch in LINES {
        let one = SyncChannels::from_numbers(&[ch as i64]).unwrap();
        assert_eq!(one.trigger_channel(), ch - 1);
        assert_eq!(one.high_lines(1), vec![ch]);
    }
}

#[test]
fn empty_hostname_rejected() {
    let c = InterfaceConfig {
        hostname: String::from("  "),
        ..Default::default()
    };
    assert_eq!(c.validate(), Err(ConfigError::EmptyHostname));
}

#[test]
fn load_from_file() {
    let dir = std::env::temp_dir().join(format!("oetools-cfg-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let good = dir.join("good.toml");
    std::fs::write(&good, "hostname = \"h\"\nport = 1\nsync_channels = [4]\n").unwrap();
    let c = InterfaceConfig::load(&good).unwrap();
    assert_eq!(c.sync_channels, vec![4]);

    let bad = dir.join("bad.toml");
    std::fs::write(&bad, "hostname = \"h\"\nport = 1\nsync_channels = [4, 2]\n").unwrap();
    let err = InterfaceConfig::load(&bad).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::NotAscending { prev: 4, next: 2 })
    );

    assert!(InterfaceConfig::load(dir.join("missing.toml")).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}
