use mc_scan_rs::error::ConfigError;
use mc_scan_rs::ports::parse_port_range;
use mc_scan_rs::ScanRequest;

#[test]
fn parse_history_style_ranges() {
    assert_eq!(parse_port_range("25565-25600").unwrap(), (25565, 25600));
    assert_eq!(parse_port_range("36000").unwrap(), (36000, 36000));
}

#[test]
fn invalid_ranges_rejected_before_scanning() {
    assert!(matches!(
        ScanRequest::from_range_str("10.0.0.1", "25567-25565"),
        Err(ConfigError::InvertedRange { .. })
    ));
    assert!(matches!(
        ScanRequest::from_range_str("10.0.0.1", "0-10"),
        Err(ConfigError::PortOutOfRange(0))
    ));
    assert!(matches!(
        ScanRequest::from_range_str("10.0.0.1", "65000-65536"),
        Err(ConfigError::PortOutOfRange(65536))
    ));
}
