#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use strum::{Display, EnumIter};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter {0} is read only")]
    ReadOnly(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Where a parameter lives on the device: the XMOS control resource, and the parameter's
/// offset inside that resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterAddress {
    pub resource_id: u16,
    pub offset: u16,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EnumOption {
    pub code: i32,
    pub label: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParameterKind {
    Boolean,
    Integer { min: i32, max: i32 },
    Enum { options: &'static [EnumOption] },
    Float { min: f32, max: f32 },
}

impl ParameterKind {
    /// Integer style parameters are transferred as an i32, everything else as an f32.
    pub fn is_integer(&self) -> bool {
        !matches!(self, ParameterKind::Float { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterKind::Boolean => "boolean",
            ParameterKind::Integer { .. } => "integer",
            ParameterKind::Enum { .. } => "enum",
            ParameterKind::Float { .. } => "float",
        }
    }
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterKind::Boolean => write!(f, "boolean"),
            ParameterKind::Integer { min, max } => write!(f, "integer [{}..{}]", min, max),
            ParameterKind::Float { min, max } => write!(f, "float [{}..{}]", min, max),
            ParameterKind::Enum { options } => {
                let values: Vec<String> = options
                    .iter()
                    .map(|option| format!("{}={}", option.code, option.label))
                    .collect();
                write!(f, "enum {{{}}}", values.join(", "))
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ParameterValue {
    Boolean(bool),
    Integer(i32),
    Float(f32),
}

impl ParameterValue {
    /// The value as it will be sent down the wire for an integer parameter.
    pub fn as_i32(&self) -> i32 {
        match self {
            ParameterValue::Boolean(value) => i32::from(*value),
            ParameterValue::Integer(value) => *value,
            ParameterValue::Float(value) => *value as i32,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match self {
            ParameterValue::Boolean(value) => f32::from(u8::from(*value)),
            ParameterValue::Integer(value) => *value as f32,
            ParameterValue::Float(value) => *value,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Boolean(value) => write!(f, "{}", value),
            ParameterValue::Integer(value) => write!(f, "{}", value),
            ParameterValue::Float(value) => write!(f, "{}", value),
        }
    }
}

/// Static metadata for a single configurable value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub vendor_name: &'static str,
    pub register: RegisterAddress,
    pub kind: ParameterKind,
    pub access: Access,
    pub default: ParameterValue,
    pub description: &'static str,
}

impl ParameterSpec {
    pub const fn flag(
        name: &'static str,
        vendor_name: &'static str,
        resource_id: u16,
        offset: u16,
        access: Access,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            vendor_name,
            register: RegisterAddress {
                resource_id,
                offset,
            },
            kind: ParameterKind::Boolean,
            access,
            default: ParameterValue::Boolean(false),
            description,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub const fn integer(
        name: &'static str,
        vendor_name: &'static str,
        resource_id: u16,
        offset: u16,
        min: i32,
        max: i32,
        default: i32,
        access: Access,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            vendor_name,
            register: RegisterAddress {
                resource_id,
                offset,
            },
            kind: ParameterKind::Integer { min, max },
            access,
            default: ParameterValue::Integer(default),
            description,
        }
    }

    pub const fn choice(
        name: &'static str,
        vendor_name: &'static str,
        resource_id: u16,
        offset: u16,
        options: &'static [EnumOption],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            vendor_name,
            register: RegisterAddress {
                resource_id,
                offset,
            },
            kind: ParameterKind::Enum { options },
            access: Access::ReadWrite,
            default: ParameterValue::Integer(options[0].code),
            description,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub const fn float(
        name: &'static str,
        vendor_name: &'static str,
        resource_id: u16,
        offset: u16,
        min: f32,
        max: f32,
        default: f32,
        access: Access,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            vendor_name,
            register: RegisterAddress {
                resource_id,
                offset,
            },
            kind: ParameterKind::Float { min, max },
            access,
            default: ParameterValue::Float(default),
            description,
        }
    }

    /// Builds a value from what the firmware reported. Integer kinds only look at the integer
    /// half of the response, flags treat anything non-zero as set.
    pub fn value_from_raw(&self, raw_int: i32, raw_float: f32) -> ParameterValue {
        match self.kind {
            ParameterKind::Boolean => ParameterValue::Boolean(raw_int != 0),
            ParameterKind::Integer { .. } | ParameterKind::Enum { .. } => {
                ParameterValue::Integer(raw_int)
            }
            ParameterKind::Float { .. } => ParameterValue::Float(raw_float),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    fn invalid(&self, reason: String) -> ValueError {
        ValueError::InvalidValue {
            name: self.name.to_string(),
            reason,
        }
    }

    /// Checks a value against the type and range of this parameter, returning the value in the
    /// parameter's native representation (integers are widened for float parameters, 0 / 1 are
    /// accepted for flags).
    pub fn validate(&self, value: ParameterValue) -> Result<ParameterValue, ValueError> {
        match (self.kind, value) {
            (ParameterKind::Boolean, ParameterValue::Boolean(_)) => Ok(value),
            (ParameterKind::Boolean, ParameterValue::Integer(raw @ (0 | 1))) => {
                Ok(ParameterValue::Boolean(raw == 1))
            }
            (ParameterKind::Integer { min, max }, ParameterValue::Integer(raw)) => {
                if raw < min || raw > max {
                    return Err(self.invalid(format!("{} outside [{}..{}]", raw, min, max)));
                }
                Ok(value)
            }
            (ParameterKind::Enum { options }, ParameterValue::Integer(raw)) => {
                if !options.iter().any(|option| option.code == raw) {
                    return Err(self.invalid(format!("{} is not one of {}", raw, self.kind)));
                }
                Ok(value)
            }
            (ParameterKind::Float { min, max }, ParameterValue::Float(_))
            | (ParameterKind::Float { min, max }, ParameterValue::Integer(_)) => {
                let raw = value.as_f32();
                if !raw.is_finite() {
                    return Err(self.invalid(format!("{} is not a finite number", raw)));
                }
                if raw < min || raw > max {
                    return Err(self.invalid(format!("{} outside [{}..{}]", raw, min, max)));
                }
                Ok(ParameterValue::Float(raw))
            }
            (kind, value) => Err(self.invalid(format!(
                "expected {}, received {:?}",
                kind.type_name(),
                value
            ))),
        }
    }

    /// Parses user supplied text into a value for this parameter, and validates it.
    pub fn parse_value(&self, text: &str) -> Result<ParameterValue, ValueError> {
        let text = text.trim();
        let value = match self.kind {
            ParameterKind::Boolean => match text.to_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => ParameterValue::Boolean(true),
                "false" | "off" | "no" | "0" => ParameterValue::Boolean(false),
                _ => return Err(self.invalid(format!("'{}' is not a boolean", text))),
            },
            ParameterKind::Integer { .. } => match text.parse::<i32>() {
                Ok(value) => ParameterValue::Integer(value),
                Err(_) => return Err(self.invalid(format!("'{}' is not an integer", text))),
            },
            ParameterKind::Enum { options } => {
                let by_label = options
                    .iter()
                    .find(|option| option.label.eq_ignore_ascii_case(text));

                match (by_label, text.parse::<i32>()) {
                    (Some(option), _) => ParameterValue::Integer(option.code),
                    (None, Ok(code)) => ParameterValue::Integer(code),
                    (None, Err(_)) => {
                        return Err(self.invalid(format!("'{}' is not one of {}", text, self.kind)))
                    }
                }
            }
            ParameterKind::Float { .. } => match text.parse::<f32>() {
                Ok(value) => ParameterValue::Float(value),
                Err(_) => return Err(self.invalid(format!("'{}' is not a number", text))),
            },
        };
        self.validate(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HPF_OPTIONS: &[EnumOption] = &[
        EnumOption { code: 0, label: "off" },
        EnumOption { code: 1, label: "70hz" },
        EnumOption { code: 2, label: "125hz" },
    ];

    const GAIN: ParameterSpec = ParameterSpec::integer(
        "mic_gain",
        "MICGAIN",
        19,
        3,
        0,
        64,
        0,
        Access::ReadWrite,
        "Microphone gain",
    );

    const NORM: ParameterSpec = ParameterSpec::float(
        "aec_norm",
        "AECNORM",
        18,
        19,
        0.25,
        16.0,
        0.25,
        Access::ReadWrite,
        "",
    );

    const HPF: ParameterSpec = ParameterSpec::choice("hpf_mode", "HPFONOFF", 18, 27, HPF_OPTIONS, "");
    const AGC: ParameterSpec = ParameterSpec::flag("agc", "AGCONOFF", 19, 0, Access::ReadWrite, "");

    #[test]
    fn integer_range() {
        assert_eq!(
            GAIN.validate(ParameterValue::Integer(37)),
            Ok(ParameterValue::Integer(37))
        );
        assert!(GAIN.validate(ParameterValue::Integer(64)).is_ok());
        assert!(matches!(
            GAIN.validate(ParameterValue::Integer(200)),
            Err(ValueError::InvalidValue { .. })
        ));
        assert!(GAIN.validate(ParameterValue::Integer(-1)).is_err());
        assert!(GAIN.validate(ParameterValue::Float(3.0)).is_err());
    }

    #[test]
    fn float_widens_integers() {
        assert_eq!(
            NORM.validate(ParameterValue::Integer(2)),
            Ok(ParameterValue::Float(2.0))
        );
        assert!(NORM.validate(ParameterValue::Float(0.1)).is_err());
        assert!(NORM.validate(ParameterValue::Float(f32::NAN)).is_err());
        assert!(NORM.validate(ParameterValue::Boolean(true)).is_err());
    }

    #[test]
    fn flags_accept_zero_and_one() {
        assert_eq!(
            AGC.validate(ParameterValue::Integer(1)),
            Ok(ParameterValue::Boolean(true))
        );
        assert!(AGC.validate(ParameterValue::Integer(2)).is_err());
    }

    #[test]
    fn enum_membership() {
        assert!(HPF.validate(ParameterValue::Integer(2)).is_ok());
        assert!(HPF.validate(ParameterValue::Integer(3)).is_err());
        assert_eq!(HPF.default, ParameterValue::Integer(0));
    }

    #[test]
    fn parse_text() {
        assert_eq!(AGC.parse_value("on"), Ok(ParameterValue::Boolean(true)));
        assert_eq!(AGC.parse_value("0"), Ok(ParameterValue::Boolean(false)));
        assert_eq!(HPF.parse_value("125Hz"), Ok(ParameterValue::Integer(2)));
        assert_eq!(HPF.parse_value("1"), Ok(ParameterValue::Integer(1)));
        assert_eq!(NORM.parse_value(" 4.5 "), Ok(ParameterValue::Float(4.5)));
        assert!(GAIN.parse_value("loud").is_err());
        assert!(GAIN.parse_value("65").is_err());
    }

    #[test]
    fn kind_display() {
        assert_eq!(GAIN.kind.to_string(), "integer [0..64]");
        assert_eq!(HPF.kind.to_string(), "enum {0=off, 1=70hz, 2=125hz}");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn untagged_json_values() {
        let values: Vec<ParameterValue> = serde_json::from_str("[true, 37, 0.5]").unwrap();
        assert_eq!(
            values,
            vec![
                ParameterValue::Boolean(true),
                ParameterValue::Integer(37),
                ParameterValue::Float(0.5)
            ]
        );
    }
}
