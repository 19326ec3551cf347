//! The admission policy engine: a declarative, allow-list security policy
//! evaluated against decoded pod specifications.

mod load;
mod types;

use std::time::SystemTime;

use tracing::debug;

pub use load::PolicyError;
pub use types::{
	HostPortRange, ImageSecurityPolicy, PodSecurityPolicy, PodSecurityPolicyList,
	PodSecurityPolicySpec, RunAsUserStrategy, RunAsUserStrategyOptions, SELinuxContextStrategy,
	SELinuxContextStrategyOptions, VolumeSecurityPolicy,
};

use crate::kube::PodSpec;

/// Contextual information about the request under evaluation. Built per
/// request and never stored.
#[derive(Debug, Clone)]
pub struct PolicyContext {
	pub namespace: String,
	pub user: Option<String>,
	pub groups: Vec<String>,
	// captured for audit logging only; no predicate reads it
	pub time: SystemTime,
}

impl PolicyContext {
	pub fn new(namespace: impl Into<String>) -> Self {
		PolicyContext {
			namespace: namespace.into(),
			user: None,
			groups: Vec::new(),
			time: SystemTime::now(),
		}
	}
}

/// A single reason a pod specification was rejected. The display string is
/// what clients see in the denial response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
	#[error("host pid")]
	HostPid,
	#[error("host ipc")]
	HostIpc,
	#[error("host network")]
	HostNetwork,
	#[error("privileged mode")]
	Privileged,
	#[error("capability {0}")]
	Capability(String),
	#[error("host port {0}")]
	HostPort(i32),
	#[error("hostpath volume, {0} not permitted")]
	HostPathNotPermitted(String),
	#[error("host path {0}")]
	HostPathDenied(String),
	#[error("{kind} volume: {name}")]
	VolumeNotPermitted { kind: &'static str, name: String },
	#[error("image: {0} explicitly denied by policy")]
	ImageDenied(String),
	#[error("image: {0} denied by policy")]
	ImageNotPermitted(String),
}

/// An immutable, validated set of policies. Loaded once at startup and shared
/// by reference for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct PolicySet {
	items: Vec<PodSecurityPolicy>,
}

impl PolicySet {
	/// Load and validate a policy document from disk. JSON or YAML, selected
	/// by file extension.
	pub fn load(path: impl AsRef<std::path::Path>) -> Result<PolicySet, PolicyError> {
		load::load(path.as_ref())
	}

	/// Build a policy set from an already-decoded document, applying the same
	/// validation as the file loader.
	pub fn new(list: PodSecurityPolicyList) -> Result<PolicySet, PolicyError> {
		load::validate(&list)?;
		Ok(PolicySet { items: list.items })
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Evaluate a pod spec in the given context. The first policy whose
	/// selectors match the context decides; later policies are never
	/// consulted. A context no policy selects is allowed by default.
	pub fn authorize(&self, cx: &PolicyContext, pod: &PodSpec) -> Result<(), Violation> {
		for policy in &self.items {
			if !policy.matches(cx) {
				continue;
			}
			debug!(namespace = %cx.namespace, "evaluating pod spec against matched policy");
			let Some(spec) = &policy.spec else {
				// cannot happen on a validated set
				break;
			};
			return spec.check(pod);
		}
		Ok(())
	}
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
