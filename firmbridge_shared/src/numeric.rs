//! Numeric transforms behind the data blocks. Pure functions, no state.

use crate::command::{Payload, Rejection, UnknownToken};
use std::str::FromStr;

/// Target of a `convert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Decimal,
    Text,
}

impl FromStr for DataType {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INTEGER" => Ok(DataType::Integer),
            "DECIMAL" => Ok(DataType::Decimal),
            "STRING" => Ok(DataType::Text),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl From<Converted> for Payload {
    fn from(value: Converted) -> Self {
        match value {
            Converted::Integer(i) => Payload::Number(i as f64),
            Converted::Decimal(d) => Payload::Number(d),
            Converted::Text(s) => Payload::Text(s),
        }
    }
}

/// Linear rescale of `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// The result is not clamped: values outside the input range extrapolate.
pub fn map_range(
    value: f64,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
) -> Result<f64, Rejection> {
    if in_max == in_min {
        return Err(Rejection::DivisionByZero);
    }
    Ok(out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min))
}

pub fn constrain(value: f64, low: f64, high: f64) -> Result<f64, Rejection> {
    // also catches NaN bounds
    if !(low <= high) {
        return Err(Rejection::InvalidRange { low, high });
    }
    Ok(if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    })
}

pub fn convert(value: &str, target: DataType) -> Result<Converted, Rejection> {
    let parse = || {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Rejection::ParseError(value.to_string()))
    };
    match target {
        DataType::Integer => {
            let truncated = parse()?.trunc();
            if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
                return Err(Rejection::ParseError(value.to_string()));
            }
            Ok(Converted::Integer(truncated as i64))
        }
        DataType::Decimal => Ok(Converted::Decimal(parse()?)),
        DataType::Text => Ok(Converted::Text(value.to_string())),
    }
}

/// Code of the first character.
pub fn char_to_code(s: &str) -> Result<u32, Rejection> {
    s.chars().next().map(u32::from).ok_or(Rejection::EmptyInput)
}

/// Single-byte character for a code in `0..=255`.
pub fn code_to_char(code: i64) -> Result<char, Rejection> {
    u8::try_from(code)
        .map(char::from)
        .map_err(|_| Rejection::OutOfRange(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_map_range() {
        let mapped = map_range(50.0, 1.0, 100.0, 1.0, 1000.0).unwrap();
        assert!(approx(mapped, (50.0 - 1.0) * (1000.0 - 1.0) / (100.0 - 1.0) + 1.0));
        assert!(approx(mapped, 495.454_545_454_545_4));
        // inverted output range
        assert!(approx(map_range(25.0, 0.0, 100.0, 100.0, 0.0).unwrap(), 75.0));
    }

    #[test]
    fn test_map_range_extrapolates() {
        assert!(approx(map_range(200.0, 0.0, 100.0, 0.0, 10.0).unwrap(), 20.0));
        assert!(approx(map_range(-50.0, 0.0, 100.0, 0.0, 10.0).unwrap(), -5.0));
    }

    #[test]
    fn test_map_range_empty_input_range() {
        for x in [-1.0, 0.0, 3.0, 1e9] {
            assert_eq!(
                map_range(x, 3.0, 3.0, 0.0, 10.0),
                Err(Rejection::DivisionByZero)
            );
        }
    }

    #[test]
    fn test_constrain() {
        assert_eq!(constrain(150.0, 1.0, 100.0).unwrap(), 100.0);
        assert_eq!(constrain(-5.0, 1.0, 100.0).unwrap(), 1.0);
        assert_eq!(constrain(50.0, 1.0, 100.0).unwrap(), 50.0);
        assert_eq!(constrain(7.0, 7.0, 7.0).unwrap(), 7.0);
        assert!(matches!(
            constrain(5.0, 10.0, 1.0),
            Err(Rejection::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_convert() {
        assert_eq!(convert("123", DataType::Integer).unwrap(), Converted::Integer(123));
        assert_eq!(convert("-7.9", DataType::Integer).unwrap(), Converted::Integer(-7));
        assert_eq!(convert("7.9", DataType::Integer).unwrap(), Converted::Integer(7));
        assert_eq!(convert(" 2.5 ", DataType::Decimal).unwrap(), Converted::Decimal(2.5));
        assert_eq!(
            convert("a", DataType::Integer),
            Err(Rejection::ParseError("a".to_string()))
        );
        assert!(convert("", DataType::Decimal).is_err());
        assert!(convert("inf", DataType::Decimal).is_err());
        assert_eq!(
            convert("abc", DataType::Text).unwrap(),
            Converted::Text("abc".to_string())
        );
    }

    #[test]
    fn test_ascii() {
        assert_eq!(char_to_code("a").unwrap(), 97);
        assert_eq!(char_to_code("abc").unwrap(), 97);
        assert_eq!(char_to_code(""), Err(Rejection::EmptyInput));
        assert_eq!(code_to_char(97).unwrap(), 'a');
        assert_eq!(code_to_char(0).unwrap(), '\0');
        assert_eq!(code_to_char(255).unwrap(), 'ÿ');
        assert_eq!(code_to_char(256), Err(Rejection::OutOfRange(256)));
        assert_eq!(code_to_char(-1), Err(Rejection::OutOfRange(-1)));
    }

    #[test]
    fn test_converted_payload() {
        assert_eq!(Payload::from(Converted::Integer(3)), Payload::Number(3.0));
        assert_eq!(
            Payload::from(Converted::Text("x".into())),
            Payload::Text("x".into())
        );
    }
}
