use labby_hardware::drivers::{
    DriverRegistry, TDKLAMBDA_ZUP, VIRTUAL_BROKEN_POWER_SUPPLY, VIRTUAL_POWER_SUPPLY,
};
use labby_hardware::mock::MockPort;
use labby_hardware::{HwError, PortRegistry};
use labby_traits::DeviceType;
use rstest::rstest;

fn table(src: &str) -> toml::Table {
    src.parse::<toml::Table>().unwrap()
}

fn registry(mock: &MockPort) -> DriverRegistry {
    DriverRegistry::with_builtin(PortRegistry::new(mock.opener()))
}

#[test]
fn builtin_drivers_are_power_supplies() {
    let reg = registry(&MockPort::new());
    for driver in [TDKLAMBDA_ZUP, VIRTUAL_POWER_SUPPLY, VIRTUAL_BROKEN_POWER_SUPPLY] {
        assert_eq!(reg.device_type(driver), Some(DeviceType::PowerSupply));
    }
    assert_eq!(reg.driver_names().count(), 3);
}

#[test]
fn creates_virtual_supply_from_integer_load() {
    let reg = registry(&MockPort::new());
    let mut dev = reg
        .create("virtual-power-supply", VIRTUAL_POWER_SUPPLY, &table("load_in_ohms = 5"))
        .unwrap();
    assert_eq!(dev.name(), "virtual-power-supply");
    assert!(dev.as_power_supply().is_some());
    assert!(dev.as_passthrough().is_none());
}

#[test]
fn creates_zup_with_default_address() {
    let mock = MockPort::new();
    let reg = registry(&mock);
    let mut dev = reg
        .create(
            "bench",
            TDKLAMBDA_ZUP,
            &table("port = \"/dev/ttyUSB0\"\nbaudrate = 9600"),
        )
        .unwrap();
    dev.open().unwrap();
    assert_eq!(mock.writes(), vec![b":ADR01;".to_vec()]);
    dev.close().unwrap();
}

#[test]
fn creates_zup_with_custom_address() {
    let mock = MockPort::new();
    let reg = registry(&mock);
    let mut dev = reg
        .create(
            "bench",
            TDKLAMBDA_ZUP,
            &table("port = \"/dev/ttyUSB0\"\nbaudrate = 9600\naddress = 42"),
        )
        .unwrap();
    dev.open().unwrap();
    assert_eq!(mock.writes(), vec![b":ADR42;".to_vec()]);
    dev.close().unwrap();
}

#[test]
fn unknown_driver_is_rejected() {
    let reg = registry(&MockPort::new());
    match reg.create("x", "acme.Thing", &toml::Table::new()) {
        Err(HwError::UnknownDriver(name)) => assert_eq!(name, "acme.Thing"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unknown driver accepted"),
    }
}

#[rstest]
#[case(VIRTUAL_POWER_SUPPLY, "")]
#[case(VIRTUAL_POWER_SUPPLY, "load_in_ohms = -1")]
#[case(VIRTUAL_POWER_SUPPLY, "load_in_ohms = 5\nextra = true")]
#[case(TDKLAMBDA_ZUP, "port = \"/dev/ttyUSB0\"")]
#[case(TDKLAMBDA_ZUP, "port = \"/dev/ttyUSB0\"\nbaudrate = 9600\naddress = 100")]
fn bad_args_are_rejected(#[case] driver: &str, #[case] args: &str) {
    let reg = registry(&MockPort::new());
    match reg.create("x", driver, &table(args)) {
        Err(HwError::InvalidArgs { driver: d, .. }) => assert_eq!(d, driver),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("bad args accepted for {driver}: {args:?}"),
    }
}
