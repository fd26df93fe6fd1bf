use labby_core::{Capability, Command, LabbyError};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case("voltage=4.25", Command::SetVoltage(4.25))]
#[case("current=1.2", Command::SetCurrent(1.2))]
#[case("output=on", Command::SetOutput(true))]
#[case("output=OFF", Command::SetOutput(false))]
#[case("Voltage = 5", Command::SetVoltage(5.0))]
#[case("query=:MDL?;", Command::Query(":MDL?;".into()))]
#[case("write=:RMT1;", Command::Write(":RMT1;".into()))]
fn parses(#[case] text: &str, #[case] expected: Command) {
    assert_eq!(text.parse::<Command>().unwrap(), expected);
}

#[rstest]
#[case("voltage")]
#[case("voltage=abc")]
#[case("voltage=inf")]
#[case("current=-0.5")]
#[case("output=maybe")]
#[case("query=")]
#[case("frequency=50")]
fn rejects(#[case] text: &str) {
    assert!(matches!(
        text.parse::<Command>(),
        Err(LabbyError::InvalidCommand(_))
    ));
}

#[test]
fn query_and_write_need_passthrough() {
    assert_eq!(
        Command::Query(":MDL?;".into()).capability(),
        Capability::Passthrough
    );
    assert_eq!(Command::SetCurrent(1.0).capability(), Capability::PowerSupply);
}

proptest! {
    #[test]
    fn setpoints_survive_display(v in 0.0f64..1000.0) {
        let cmd = Command::SetVoltage(v);
        prop_assert_eq!(cmd.to_string().parse::<Command>().unwrap(), cmd);
    }

    #[test]
    fn parsing_never_panics(s in "\\PC*") {
        let _ = s.parse::<Command>();
    }
}
