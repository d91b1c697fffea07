use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::ValidationError;

/// How a field's raw payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Floating point reading, e.g. temperature.
    Numeric,
    /// Digital input pin, stored verbatim.
    DigitalInput,
    /// Switch reported by the device, stored verbatim.
    Switch,
    /// Controllable output, stored verbatim.
    Output,
    /// Integer level in `0..=100`.
    Brightness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Field {
    #[serde(rename = "temp")]
    Temperature,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "d0")]
    D0,
    #[serde(rename = "d1")]
    D1,
    #[serde(rename = "d2")]
    D2,
    #[serde(rename = "d3")]
    D3,
    #[serde(rename = "output_d5")]
    OutputD5,
    #[serde(rename = "output_d6")]
    OutputD6,
    #[serde(rename = "output_d7")]
    OutputD7,
    #[serde(rename = "led_d7")]
    LedD7,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Temperature,
        Field::Humidity,
        Field::D0,
        Field::D1,
        Field::D2,
        Field::D3,
        Field::OutputD5,
        Field::OutputD6,
        Field::OutputD7,
        Field::LedD7,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Temperature => "temp",
            Field::Humidity => "humidity",
            Field::D0 => "d0",
            Field::D1 => "d1",
            Field::D2 => "d2",
            Field::D3 => "d3",
            Field::OutputD5 => "output_d5",
            Field::OutputD6 => "output_d6",
            Field::OutputD7 => "output_d7",
            Field::LedD7 => "led_d7",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Temperature | Field::Humidity => FieldKind::Numeric,
            Field::D0 | Field::D2 => FieldKind::DigitalInput,
            Field::D1 | Field::D3 => FieldKind::Switch,
            Field::OutputD5 | Field::OutputD6 | Field::OutputD7 => FieldKind::Output,
            Field::LedD7 => FieldKind::Brightness,
        }
    }

    pub fn default_value(&self) -> FieldValue {
        match self.kind() {
            FieldKind::Numeric => FieldValue::Number(0.0),
            FieldKind::DigitalInput => FieldValue::Text("0".to_string()),
            FieldKind::Switch | FieldKind::Output => FieldValue::Text("OFF".to_string()),
            FieldKind::Brightness => FieldValue::Level(0),
        }
    }

    /// Fields the device reports on `sensor/...` topics: its four input pins and
    /// the climate readings.
    pub fn is_sensor_input(&self) -> bool {
        matches!(
            self,
            Field::D0 | Field::D1 | Field::D2 | Field::D3 | Field::Temperature | Field::Humidity
        )
    }

    /// Name lookup for sensor topics, which also accept `temperature`.
    pub fn from_sensor_name(name: &str) -> Option<Field> {
        match name {
            "temperature" => Some(Field::Temperature),
            other => other.parse().ok(),
        }
    }

    /// Checks `raw` against this field's kind without touching any state.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, ValidationError> {
        let invalid = |reason: &'static str| ValidationError {
            field: *self,
            value: raw.to_string(),
            reason,
        };

        match self.kind() {
            FieldKind::Numeric => {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid("not a number"))?;

                if !value.is_finite() {
                    return Err(invalid("not a finite number"));
                }

                Ok(FieldValue::Number(value))
            }
            FieldKind::Brightness => {
                let level = raw
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| invalid("not an integer level"))?;

                if level > 100 {
                    return Err(invalid("level out of range 0-100"));
                }

                Ok(FieldValue::Level(level))
            }
            FieldKind::DigitalInput | FieldKind::Switch | FieldKind::Output => {
                Ok(FieldValue::Text(raw.to_string()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Level(u8),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Level(level) => write!(f, "{level}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>(), Ok(field));
        }
        assert!("output_d8".parse::<Field>().is_err());
    }

    #[test]
    fn test_sensor_name_alias() {
        assert_eq!(Field::from_sensor_name("temperature"), Some(Field::Temperature));
        assert_eq!(Field::from_sensor_name("temp"), Some(Field::Temperature));
        assert_eq!(Field::from_sensor_name("pressure"), None);
    }

    #[test]
    fn test_numeric_parse() {
        assert_eq!(Field::Temperature.parse(" 21.5 ").unwrap(), FieldValue::Number(21.5));
        assert!(Field::Humidity.parse("wet").is_err());
        assert!(Field::Humidity.parse("NaN").is_err());
        assert!(Field::Humidity.parse("inf").is_err());
    }

    #[test]
    fn test_brightness_parse() {
        assert_eq!(Field::LedD7.parse("40").unwrap(), FieldValue::Level(40));
        assert_eq!(Field::LedD7.parse("100").unwrap(), FieldValue::Level(100));

        let err = Field::LedD7.parse("abc").unwrap_err();
        assert_eq!(err.field, Field::LedD7);
        assert_eq!(err.value, "abc");

        assert!(Field::LedD7.parse("101").is_err());
        assert!(Field::LedD7.parse("-1").is_err());
    }

    #[test]
    fn test_text_fields_store_verbatim() {
        assert_eq!(
            Field::OutputD5.parse("ON").unwrap(),
            FieldValue::Text("ON".to_string())
        );
        assert_eq!(
            Field::D0.parse(" 1").unwrap(),
            FieldValue::Text(" 1".to_string())
        );
    }

    #[test]
    fn test_field_value_json() {
        let json = serde_json::to_value(&FieldValue::Level(7)).unwrap();
        assert_eq!(json, serde_json::json!(7));

        let json = serde_json::to_value(&FieldValue::Text("OFF".to_string())).unwrap();
        assert_eq!(json, serde_json::json!("OFF"));
    }
}
