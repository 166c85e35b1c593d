use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    /* A-B:C.D.E(payload), a second value group does not match on purpose */
    static ref DATA_LINE: Regex = Regex::new(r"^([^()\s]+)\(([^()]*)\)$").unwrap();
}

/// Splits `1-0:1.8.0(00006678.394*kWh)` into code and payload.
/// The line terminator must already be stripped.
pub fn parse_data_line(line: &str) -> Option<(&str, &str)> {
    let caps = DATA_LINE.captures(line)?;
    let code = caps.get(1)?.as_str();
    let payload = caps.get(2)?.as_str();
    Some((code, payload))
}

/// Splits a `<numeric>*<unit>` payload. Payloads without `*` carry no
/// measurement (timestamps, status words) and return `None`.
pub fn parse_value_with_unit(payload: &str) -> Option<(f64, String)> {
    let (number, unit) = payload.split_once('*')?;
    match number.trim().parse::<f64>() {
        Ok(value) => Some((value, unit.trim().to_string())),
        Err(e) => {
            debug!("Value '{number}' is not numeric: {e}");
            None
        }
    }
}

/// Human readable names for the codes found on Nordic and Benelux HAN ports
pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    let description = match obis_code {
        "0-0:1.0.0" => "Date and time",
        "0-0:96.1.0" | "0-0:96.1.1" => "Meter serial number",

        "1-0:1.8.0" => "Active energy import (total)",
        "1-0:2.8.0" => "Active energy export (total)",
        "1-0:3.8.0" => "Reactive energy import (total)",
        "1-0:4.8.0" => "Reactive energy export (total)",

        "1-0:1.7.0" => "Active power import",
        "1-0:2.7.0" => "Active power export",
        "1-0:3.7.0" => "Reactive power import",
        "1-0:4.7.0" => "Reactive power export",

        "1-0:21.7.0" => "Active power import (L1)",
        "1-0:41.7.0" => "Active power import (L2)",
        "1-0:61.7.0" => "Active power import (L3)",
        "1-0:22.7.0" => "Active power export (L1)",
        "1-0:42.7.0" => "Active power export (L2)",
        "1-0:62.7.0" => "Active power export (L3)",

        "1-0:23.7.0" => "Reactive power import (L1)",
        "1-0:43.7.0" => "Reactive power import (L2)",
        "1-0:63.7.0" => "Reactive power import (L3)",
        "1-0:24.7.0" => "Reactive power export (L1)",
        "1-0:44.7.0" => "Reactive power export (L2)",
        "1-0:64.7.0" => "Reactive power export (L3)",

        "1-0:32.7.0" => "Voltage (L1)",
        "1-0:52.7.0" => "Voltage (L2)",
        "1-0:72.7.0" => "Voltage (L3)",
        "1-0:31.7.0" => "Current (L1)",
        "1-0:51.7.0" => "Current (L2)",
        "1-0:71.7.0" => "Current (L3)",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_line() {
        assert_eq!(parse_data_line("1-0:1.8.0(00006678.394*kWh)"), Some(("1-0:1.8.0", "00006678.394*kWh")));
        assert_eq!(parse_data_line("0-0:1.0.0(210217184019W)"), Some(("0-0:1.0.0", "210217184019W")));
        assert_eq!(parse_data_line(""), None);
        assert_eq!(parse_data_line("!7945"), None);
        assert_eq!(parse_data_line("1-0:1.8.0(1.0*kWh"), None);
    }

    #[test]
    fn test_multiple_groups_are_not_data_lines() {
        assert_eq!(parse_data_line("0-1:24.2.1(101209112500W)(12785.123*m3)"), None);
    }

    #[test]
    fn test_parse_value_with_unit() {
        assert_eq!(parse_value_with_unit("00006678.394*kWh"), Some((6678.394, "kWh".to_string())));
        assert_eq!(parse_value_with_unit("240.3*V"), Some((240.3, "V".to_string())));
        assert_eq!(parse_value_with_unit("210217184019W"), None);
        assert_eq!(parse_value_with_unit("abc*kWh"), None);
    }

    #[test]
    fn test_get_obis_description() {
        assert_eq!(get_obis_description("1-0:32.7.0"), Some("Voltage (L1)"));
        assert_eq!(get_obis_description("1-0:1.8.0"), Some("Active energy import (total)"));
        assert_eq!(get_obis_description("nonexistent"), None);
    }
}
