use triserve::config::{Config, Mode};

fn args(list: &[&str]) -> impl Iterator<Item = String> {
    list.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .into_iter()
}

#[test]
fn test_mode_and_port_from_args() {
    let cfg = Config::from_args(args(&["fixed", "8085"])).unwrap();
    assert_eq!(cfg.mode, Mode::Fixed);
    assert_eq!(cfg.port, 8085);
}

#[test]
fn test_port_defaults_when_omitted() {
    let cfg = Config::from_args(args(&["reactive"])).unwrap();
    assert_eq!(cfg.mode, Mode::Reactive);
    assert_eq!(cfg.port, 4221);
}

#[test]
fn test_all_modes_parse() {
    for (arg, mode) in [
        ("fixed", Mode::Fixed),
        ("cached", Mode::Cached),
        ("spawn", Mode::Spawn),
        ("reactive", Mode::Reactive),
    ] {
        let cfg = Config::from_args(args(&[arg])).unwrap();
        assert_eq!(cfg.mode, mode);
    }
}

#[test]
fn test_missing_mode_is_an_error() {
    assert!(Config::from_args(args(&[])).is_err());
}

#[test]
fn test_unknown_mode_is_an_error() {
    assert!(Config::from_args(args(&["virtual"])).is_err());
}

#[test]
fn test_invalid_port_is_an_error() {
    assert!(Config::from_args(args(&["cached", "not-a-port"])).is_err());
}

#[test]
fn test_addr_combines_host_and_port() {
    let cfg = Config::from_args(args(&["cached", "9000"])).unwrap();
    assert!(cfg.addr().ends_with(":9000"));
}
