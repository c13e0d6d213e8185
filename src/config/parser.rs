//! Character-driven state machine over the `motor.conf` grammar.
//!
//! Operates line-at-a-time (blank/`#`/newline all return to the original's
//! `CLEANUP` state by construction, so nothing meaningful ever spans a line
//! break), with character-level validation of identifiers, pin numbers, and
//! motor-list entries within each line — the states named in the original
//! (`READ_LINE`, `READ_IDENTIFIER`, `CHECK_PARAM`, `READ_MOTOR_LIST`, ...)
//! correspond to the sections below rather than to one literal enum, a
//! deliberate simplification recorded in `DESIGN.md`.

use crate::error::{ConfigError, Error, Result};
use crate::gpio::PinId;
use crate::units::{DirectionAbs, Microstep};

use super::model::{AxisEntry, MotorEntry};

const MAX_ENTRIES: usize = 8;
const MAX_NAME_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Motor,
    Axis,
}

/// Parse `motor.conf` text into validated motor/axis entries, in file order.
pub(crate) fn parse(text: &str) -> Result<(Vec<MotorEntry>, Vec<AxisEntry>)> {
    let mut motors: Vec<MotorEntry> = Vec::new();
    let mut axes: Vec<AxisEntry> = Vec::new();
    let mut section = Section::None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        // CLEANUP: blank lines and comments never leave a partial section open.
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            section = read_section_header(rest, line_no, &mut motors, &mut axes)?;
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::Config(ConfigError::BadValue {
                line: line_no,
                param: line.to_string(),
                value: String::new(),
            }));
        };
        let key = key.trim();
        let value = value.trim();
        validate_key_charset(key, line_no)?;

        match section {
            Section::None => {
                return Err(Error::Config(ConfigError::UnknownParam {
                    line: line_no,
                    section: "none",
                    name: key.to_string(),
                }))
            }
            Section::Motor => {
                let entry = motors.last_mut().expect("Section::Motor implies a pushed entry");
                set_motor_param(entry, key, value, line_no)?;
            }
            Section::Axis => {
                let entry_idx = axes.len() - 1;
                set_axis_param(&mut axes, entry_idx, key, value, line_no, &motors)?;
            }
        }
    }

    for motor in &motors {
        if !motor.is_complete() {
            return Err(Error::Config(ConfigError::IncompleteMotor { name: motor.name.clone() }));
        }
    }
    for axis in &axes {
        if !axis.is_complete() {
            return Err(Error::Config(ConfigError::IncompleteAxis { name: axis.name.clone() }));
        }
    }

    Ok((motors, axes))
}

fn read_section_header(
    rest: &str,
    line_no: usize,
    motors: &mut Vec<MotorEntry>,
    axes: &mut Vec<AxisEntry>,
) -> Result<Section> {
    let Some(name) = rest.strip_suffix(']') else {
        return Err(Error::Config(ConfigError::UnterminatedSection { line: line_no }));
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(Error::Config(ConfigError::BadValue {
            line: line_no,
            param: "section".to_string(),
            value: name.to_string(),
        }));
    }

    match name {
        "motor" => {
            if motors.len() >= MAX_ENTRIES {
                return Err(Error::Config(ConfigError::TooManyEntries { kind: "motor" }));
            }
            motors.push(MotorEntry::default());
            Ok(Section::Motor)
        }
        "axis" => {
            if axes.len() >= MAX_ENTRIES {
                return Err(Error::Config(ConfigError::TooManyEntries { kind: "axis" }));
            }
            axes.push(AxisEntry::default());
            Ok(Section::Axis)
        }
        other => Err(Error::Config(ConfigError::BadValue {
            line: line_no,
            param: "section".to_string(),
            value: other.to_string(),
        })),
    }
}

fn validate_key_charset(key: &str, line_no: usize) -> Result<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        return Err(Error::Config(ConfigError::BadValue {
            line: line_no,
            param: "key".to_string(),
            value: key.to_string(),
        }));
    }
    Ok(())
}

fn validate_name_charset(value: &str, line_no: usize, param: &'static str) -> Result<()> {
    if value.len() > MAX_NAME_LEN {
        return Err(Error::Config(ConfigError::TooLong { line: line_no, field: param }));
    }
    let ok = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        return Err(Error::Config(ConfigError::BadValue {
            line: line_no,
            param: param.to_string(),
            value: value.to_string(),
        }));
    }
    Ok(())
}

fn parse_pin(value: &str, line_no: usize) -> Result<PinId> {
    let n: u32 = value
        .parse()
        .map_err(|_| Error::Config(ConfigError::BadValue { line: line_no, param: "pin".to_string(), value: value.to_string() }))?;
    PinId::from_header_number(n).ok_or_else(|| Error::Config(ConfigError::UnknownPin { line: line_no, value: value.to_string() }))
}

fn set_motor_param(entry: &mut MotorEntry, key: &str, value: &str, line_no: usize) -> Result<()> {
    match key {
        "name" => {
            validate_name_charset(value, line_no, "name")?;
            entry.name = value.to_string();
        }
        "step_pin" => entry.step_pin = Some(parse_pin(value, line_no)?),
        "dir_pin" => entry.dir_pin = Some(parse_pin(value, line_no)?),
        "steps_per_rotation" => {
            let n: u32 = value
                .parse()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| Error::Config(ConfigError::BadValue { line: line_no, param: key.to_string(), value: value.to_string() }))?;
            entry.steps_per_rotation = Some(n);
        }
        "direction" => {
            entry.direction = Some(match value {
                "clockwise" => DirectionAbs::Clockwise,
                "counterclockwise" => DirectionAbs::CounterClockwise,
                _ => return Err(Error::Config(ConfigError::BadValue { line: line_no, param: key.to_string(), value: value.to_string() })),
            });
        }
        "microstep" => {
            let n: u16 = value
                .parse()
                .map_err(|_| Error::Config(ConfigError::BadValue { line: line_no, param: key.to_string(), value: value.to_string() }))?;
            let microstep = Microstep::new(n)
                .ok_or_else(|| Error::Config(ConfigError::BadValue { line: line_no, param: key.to_string(), value: value.to_string() }))?;
            entry.microstep = Some(microstep);
        }
        _ => {
            return Err(Error::Config(ConfigError::UnknownParam { line: line_no, section: "motor", name: key.to_string() }));
        }
    }
    Ok(())
}

fn set_axis_param(
    axes: &mut [AxisEntry],
    entry_idx: usize,
    key: &str,
    value: &str,
    line_no: usize,
    motors: &[MotorEntry],
) -> Result<()> {
    match key {
        "name" => {
            validate_name_charset(value, line_no, "name")?;
            axes[entry_idx].name = value.to_string();
        }
        "motors" => {
            let mut names = Vec::new();
            for part in value.split(',') {
                let name = part.trim();
                validate_name_charset(name, line_no, "motors")?;
                if !motors.iter().any(|m| m.name == name) {
                    return Err(Error::Config(ConfigError::UnknownMotorRef { line: line_no, name: name.to_string() }));
                }
                names.push(name.to_string());
            }
            axes[entry_idx].motor_names = names;
        }
        "mm_per_rotation" => {
            let n: u32 = value
                .parse()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| Error::Config(ConfigError::BadValue { line: line_no, param: key.to_string(), value: value.to_string() }))?;
            axes[entry_idx].mm_per_rotation = Some(n as f64);
        }
        _ => {
            return Err(Error::Config(ConfigError::UnknownParam { line: line_no, section: "axis", name: key.to_string() }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[motor]
name=left
step_pin=23
dir_pin=24
steps_per_rotation=200
direction=counterclockwise
microstep=2

[motor]
name=right
step_pin=21
dir_pin=19
steps_per_rotation=200
direction=clockwise
microstep=2

[axis]
name=x-axis
motors=left,right
mm_per_rotation=40
";

    #[test]
    fn parses_the_documented_example() {
        let (motors, axes) = parse(SAMPLE).unwrap();
        assert_eq!(motors.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(), ["left", "right"]);
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].motor_names, vec!["left".to_string(), "right".to_string()]);
        assert_eq!(axes[0].mm_per_rotation, Some(40.0));
    }

    #[test]
    fn rejects_axis_referencing_undefined_motor() {
        let text = "\
[motor]
name=a
step_pin=23
dir_pin=24
steps_per_rotation=200
direction=clockwise
microstep=1

[axis]
name=x
motors=a,b
mm_per_rotation=10
";
        let err = parse(text).unwrap_err();
        match err {
            Error::Config(ConfigError::UnknownMotorRef { name, .. }) => assert_eq!(name, "b"),
            other => panic!("expected UnknownMotorRef, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_section() {
        let err = parse("[motor\nname=a\n").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnterminatedSection { .. })));
    }

    #[test]
    fn rejects_step_pin_outside_header_table() {
        let text = "[motor]\nname=a\nstep_pin=9\ndir_pin=24\nsteps_per_rotation=200\ndirection=clockwise\nmicrostep=1\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnknownPin { .. })));
    }

    #[test]
    fn rejects_microstep_outside_documented_set() {
        let text = "[motor]\nname=a\nstep_pin=23\ndir_pin=24\nsteps_per_rotation=200\ndirection=clockwise\nmicrostep=32\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::BadValue { .. })));
    }

    #[test]
    fn empty_file_yields_empty_lists() {
        let (motors, axes) = parse("# just a comment\n\n").unwrap();
        assert!(motors.is_empty());
        assert!(axes.is_empty());
    }

    #[test]
    fn unknown_key_is_distinct_from_bad_value() {
        let text = "[motor]\nname=a\nbogus=1\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnknownParam { .. })));
    }
}
