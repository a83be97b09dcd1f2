//! Schema validation for per-component TOML configuration tables.

use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// Hex string parsing as a 20-byte address.
	Address,
	/// Hex string parsing as a 32-byte identifier.
	Bytes32,
	/// Decimal or `0x` hex string parsing as an unsigned 256-bit integer.
	Uint,
	Table(Schema),
}

pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table",
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

/// Parses a configured unsigned integer: TOML integer, decimal string or hex string.
pub fn parse_uint(value: &toml::Value) -> Option<U256> {
	match value {
		toml::Value::Integer(i) if *i >= 0 => Some(U256::from(*i as u64)),
		toml::Value::String(s) => match s.strip_prefix("0x") {
			Some(hex) => U256::from_str_radix(hex, 16).ok(),
			None => U256::from_str_radix(s, 10).ok(),
		},
		_ => None,
	}
}

fn lookup<'a>(
	config: &'a toml::Value,
	field: &str,
) -> Result<Option<&'a toml::Value>, ValidationError> {
	match config {
		toml::Value::Table(table) => Ok(table.get(field)),
		other => Err(mismatch("root", "table", other)),
	}
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
	ValidationError::InvalidValue {
		field: field.to_string(),
		message: message.into(),
	}
}

/// Reads a required address field.
pub fn get_address(config: &toml::Value, field: &str) -> Result<Address, ValidationError> {
	let value = lookup(config, field)?.ok_or_else(|| ValidationError::MissingField(field.to_string()))?;
	let s = value
		.as_str()
		.ok_or_else(|| mismatch(field, "address string", value))?;
	s.parse().map_err(|e| invalid(field, format!("not an address: {}", e)))
}

/// Reads a required 32-byte identifier field.
pub fn get_bytes32(config: &toml::Value, field: &str) -> Result<B256, ValidationError> {
	let value = lookup(config, field)?.ok_or_else(|| ValidationError::MissingField(field.to_string()))?;
	let s = value
		.as_str()
		.ok_or_else(|| mismatch(field, "bytes32 string", value))?;
	s.parse().map_err(|e| invalid(field, format!("not a 32-byte hex value: {}", e)))
}

/// Reads an unsigned integer field, falling back to `default` when absent.
pub fn get_uint(
	config: &toml::Value,
	field: &str,
	default: Option<U256>,
) -> Result<U256, ValidationError> {
	match lookup(config, field)? {
		Some(value) => parse_uint(value).ok_or_else(|| invalid(field, "expected an unsigned integer")),
		None => default.ok_or_else(|| ValidationError::MissingField(field.to_string())),
	}
}

/// Reads a non-negative integer field that fits `u64`.
pub fn get_u64(config: &toml::Value, field: &str, default: Option<u64>) -> Result<u64, ValidationError> {
	let value = get_uint(config, field, default.map(U256::from))?;
	u64::try_from(value).map_err(|_| invalid(field, "does not fit 64 bits"))
}

fn mismatch(field: &str, expected: &'static str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected,
		actual: value.type_str().to_string(),
	}
}

fn check_type(
	field: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value.as_str().ok_or_else(|| mismatch(field, "string", value))?;
		}
		FieldType::Boolean => {
			value.as_bool().ok_or_else(|| mismatch(field, "boolean", value))?;
		}
		FieldType::Integer { min, max } => {
			let int = value
				.as_integer()
				.ok_or_else(|| mismatch(field, "integer", value))?;
			if min.is_some_and(|min| int < min) || max.is_some_and(|max| int > max) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("{} is outside [{:?}, {:?}]", int, min, max),
				});
			}
		}
		FieldType::Address => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field, "address string", value))?;
			s.parse::<Address>()
				.map_err(|e| ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("not an address: {}", e),
				})?;
		}
		FieldType::Bytes32 => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field, "bytes32 string", value))?;
			s.parse::<B256>()
				.map_err(|e| ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("not a 32-byte hex value: {}", e),
				})?;
		}
		FieldType::Uint => {
			parse_uint(value).ok_or_else(|| ValidationError::InvalidValue {
				field: field.to_string(),
				message: "expected an unsigned integer".to_string(),
			})?;
		}
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| nest(field, e))?;
		}
	}
	Ok(())
}

fn nest(parent: &str, error: ValidationError) -> ValidationError {
	match error {
		ValidationError::MissingField(f) => ValidationError::MissingField(format!("{}.{}", parent, f)),
		ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
			field: format!("{}.{}", parent, field),
			message,
		},
		ValidationError::TypeMismatch {
			field,
			expected,
			actual,
		} => ValidationError::TypeMismatch {
			field: format!("{}.{}", parent, field),
			expected,
			actual,
		},
	}
}

/// A component's configuration schema.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![
				Field::new("address", FieldType::Address),
				Field::new(
					"dispute_period",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![
				Field::new("multiplier", FieldType::Uint).with_validator(|v| {
					match parse_uint(v) {
						Some(m) if !m.is_zero() => Ok(()),
						_ => Err("must be positive".to_string()),
					}
				}),
				Field::new(
					"nested",
					FieldType::Table(Schema::new(vec![Field::new("id", FieldType::Bytes32)], vec![])),
				),
			],
		)
	}

	fn parse(s: &str) -> toml::Value {
		toml::Value::Table(s.parse::<toml::Table>().unwrap())
	}

	#[test]
	fn test_valid_config_passes() {
		let config = parse(
			r#"
			address = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"
			dispute_period = 3600
			multiplier = "2"
			"#,
		);
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required_field() {
		let config = parse(r#"dispute_period = 10"#);
		assert_eq!(
			schema().validate(&config),
			Err(ValidationError::MissingField("address".to_string()))
		);
	}

	#[test]
	fn test_integer_bounds_and_custom_validator() {
		let config = parse(
			r#"
			address = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"
			dispute_period = 0
			"#,
		);
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::InvalidValue { .. })
		));

		let config = parse(
			r#"
			address = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"
			dispute_period = 5
			multiplier = "0"
			"#,
		);
		assert!(schema().validate(&config).is_err());
	}

	#[test]
	fn test_nested_table_errors_are_prefixed() {
		let config = parse(
			r#"
			address = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"
			dispute_period = 5
			[nested]
			"#,
		);
		assert_eq!(
			schema().validate(&config),
			Err(ValidationError::MissingField("nested.id".to_string()))
		);
	}

	#[test]
	fn test_typed_getters() {
		let config = parse(
			r#"
			address = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"
			period = 30
			big = "0xffffffffffffffffffff"
			"#,
		);

		assert!(get_address(&config, "address").is_ok());
		assert_eq!(get_u64(&config, "period", None).unwrap(), 30);
		assert_eq!(get_u64(&config, "missing", Some(4)).unwrap(), 4);
		assert!(get_u64(&config, "big", None).is_err());
		assert_eq!(
			get_bytes32(&config, "id"),
			Err(ValidationError::MissingField("id".to_string()))
		);
	}

	#[test]
	fn test_parse_uint_formats() {
		assert_eq!(parse_uint(&toml::Value::Integer(7)), Some(U256::from(7)));
		assert_eq!(parse_uint(&toml::Value::String("0x10".into())), Some(U256::from(16)));
		assert_eq!(
			parse_uint(&toml::Value::String("1000000000000000000".into())),
			Some(U256::from(10u64.pow(18)))
		);
		assert_eq!(parse_uint(&toml::Value::Integer(-1)), None);
	}
}
