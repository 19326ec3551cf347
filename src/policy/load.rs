use std::path::{Path, PathBuf};

use tracing::info;

use super::PolicySet;
use super::types::{PodSecurityPolicy, PodSecurityPolicyList};

#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
	#[error("policy file {0} does not exist")]
	FileMissing(PathBuf),
	#[error("unable to read policy file: {0}")]
	Read(#[from] std::io::Error),
	#[error("unsupported policy file extension {0:?}, expected .json, .yml or .yaml")]
	UnsupportedFormat(String),
	#[error("unable to decode policy file: {0}")]
	Decode(String),
	#[error("the policy list has no items")]
	Empty,
	#[error("policy {0} invalid: {1}")]
	Invalid(usize, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
	Json,
	Yaml,
}

impl Format {
	fn from_path(path: &Path) -> Result<Format, PolicyError> {
		let ext = path
			.extension()
			.and_then(|e| e.to_str())
			.unwrap_or_default();
		match ext {
			"json" => Ok(Format::Json),
			"yml" | "yaml" => Ok(Format::Yaml),
			other => Err(PolicyError::UnsupportedFormat(other.to_string())),
		}
	}
}

/// Single-shot load; there is no reload path. The returned set is immutable
/// for the process lifetime.
pub(super) fn load(path: &Path) -> Result<PolicySet, PolicyError> {
	if !path.exists() {
		return Err(PolicyError::FileMissing(path.to_path_buf()));
	}
	let format = Format::from_path(path)?;
	let content = std::fs::read(path)?;
	let list = decode(format, &content)?;
	validate(&list)?;
	info!(path = %path.display(), policies = list.items.len(), "loaded security policies");
	Ok(PolicySet { items: list.items })
}

fn decode(format: Format, content: &[u8]) -> Result<PodSecurityPolicyList, PolicyError> {
	match format {
		Format::Json => serde_json::from_slice(content).map_err(|e| PolicyError::Decode(e.to_string())),
		Format::Yaml => serde_yaml::from_slice(content).map_err(|e| PolicyError::Decode(e.to_string())),
	}
}

pub(super) fn validate(list: &PodSecurityPolicyList) -> Result<(), PolicyError> {
	if list.items.is_empty() {
		return Err(PolicyError::Empty);
	}
	for (i, policy) in list.items.iter().enumerate() {
		validate_policy(policy).map_err(|reason| PolicyError::Invalid(i, reason))?;
	}
	Ok(())
}

fn validate_policy(policy: &PodSecurityPolicy) -> Result<(), String> {
	if policy.namespaces.is_empty() {
		return Err("the policy does not have any namespaces".to_string());
	}
	let Some(spec) = &policy.spec else {
		return Err("the policy does not have a spec".to_string());
	};
	for range in &spec.host_ports {
		if range.start > range.end {
			return Err(format!(
				"host port range start {} is greater than end {}",
				range.start, range.end
			));
		}
		for port in [range.start, range.end] {
			if !(1..=65534).contains(&port) {
				return Err(format!("host port {port} outside the valid range 1-65534"));
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode_json(content: &str) -> Result<PodSecurityPolicyList, PolicyError> {
		decode(Format::Json, content.as_bytes())
	}

	#[test]
	fn format_from_extension() {
		assert_eq!(Format::from_path(Path::new("/etc/policy.json")).unwrap(), Format::Json);
		assert_eq!(Format::from_path(Path::new("policy.yml")).unwrap(), Format::Yaml);
		assert_eq!(Format::from_path(Path::new("policy.yaml")).unwrap(), Format::Yaml);
		assert!(matches!(
			Format::from_path(Path::new("policy.toml")),
			Err(PolicyError::UnsupportedFormat(ext)) if ext == "toml"
		));
		assert!(matches!(
			Format::from_path(Path::new("policy")),
			Err(PolicyError::UnsupportedFormat(ext)) if ext.is_empty()
		));
	}

	#[test]
	fn missing_file() {
		let err = load(Path::new("/nonexistent/policy.json")).unwrap_err();
		assert!(matches!(err, PolicyError::FileMissing(_)));
	}

	#[test]
	fn decodes_json_document() {
		let list = decode_json(
			r#"{"items":[{"namespaces":["*"],"spec":{"privileged":true,"hostPorts":[{"start":80,"end":90}]}}]}"#,
		)
		.expect("decode");
		assert_eq!(list.items.len(), 1);
		let spec = list.items[0].spec.as_ref().unwrap();
		assert!(spec.privileged);
		assert_eq!(spec.host_ports[0].start, 80);
	}

	#[test]
	fn decodes_yaml_document() {
		let content = r#"
items:
  - namespaces: ["dev"]
    users: ["alice"]
    spec:
      hostNetwork: true
      volumes:
        emptyDir: true
"#;
		let list = decode(Format::Yaml, content.as_bytes()).expect("decode");
		let spec = list.items[0].spec.as_ref().unwrap();
		assert!(spec.host_network);
		assert!(spec.volumes.empty_dir);
		assert_eq!(list.items[0].users, vec!["alice"]);
	}

	#[test]
	fn compiles_image_regexes_at_decode() {
		let list = decode_json(
			r#"{"items":[{"namespaces":["*"],"spec":{"images":{"permitted":["^registry\\.internal/.*"],"denied":["^.*:latest$"]}}}]}"#,
		)
		.expect("decode");
		let images = list.items[0].spec.as_ref().unwrap().images.as_ref().unwrap();
		assert!(images.permitted[0].is_match("registry.internal/foo:1.0"));
		assert!(images.denied[0].is_match("foo:latest"));
	}

	#[test]
	fn invalid_regex_fails_decode() {
		let err = decode_json(
			r#"{"items":[{"namespaces":["*"],"spec":{"images":{"permitted":["("],"denied":[]}}}]}"#,
		)
		.unwrap_err();
		assert!(matches!(err, PolicyError::Decode(_)));
	}

	#[test]
	fn empty_list_rejected() {
		let list = decode_json(r#"{"items":[]}"#).unwrap();
		assert!(matches!(validate(&list), Err(PolicyError::Empty)));
	}

	#[test]
	fn policy_without_namespaces_rejected() {
		let list = decode_json(r#"{"items":[{"spec":{}}]}"#).unwrap();
		assert!(matches!(validate(&list), Err(PolicyError::Invalid(0, _))));
	}

	#[test]
	fn policy_without_spec_rejected() {
		let list = decode_json(r#"{"items":[{"namespaces":["*"]}]}"#).unwrap();
		assert!(matches!(validate(&list), Err(PolicyError::Invalid(0, _))));
	}

	#[test]
	fn inverted_port_range_rejected() {
		let list = decode_json(
			r#"{"items":[{"namespaces":["*"],"spec":{"hostPorts":[{"start":9000,"end":8000}]}}]}"#,
		)
		.unwrap();
		assert!(matches!(validate(&list), Err(PolicyError::Invalid(0, _))));
	}

	#[test]
	fn out_of_bounds_port_rejected() {
		for (start, end) in [(0, 80), (1, 65535)] {
			let list = decode_json(&format!(
				r#"{{"items":[{{"namespaces":["*"],"spec":{{"hostPorts":[{{"start":{start},"end":{end}}}]}}}}]}}"#,
			))
			.unwrap();
			assert!(matches!(validate(&list), Err(PolicyError::Invalid(0, _))));
		}
	}
}
