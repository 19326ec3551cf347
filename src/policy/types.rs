use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{PolicyContext, Violation};
use crate::kube::{PodSpec, SecurityContext, Volume};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSecurityPolicyList {
	pub items: Vec<PodSecurityPolicy>,
}

/// Governs the security context requests a pod may make. Selection is by
/// namespace (`*` is a wildcard), user, or group; any matching selector
/// selects the policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSecurityPolicy {
	pub namespaces: Vec<String>,
	pub users: Vec<String>,
	pub groups: Vec<String>,
	pub spec: Option<PodSecurityPolicySpec>,
}

impl PodSecurityPolicy {
	pub fn matches(&self, cx: &PolicyContext) -> bool {
		if self.namespaces.iter().any(|n| n == "*") {
			return true;
		}
		if self.namespaces.iter().any(|n| *n == cx.namespace) {
			return true;
		}
		if let Some(user) = &cx.user {
			if self.users.iter().any(|u| u == user) {
				return true;
			}
		}
		cx.groups.iter().any(|g| self.groups.contains(g))
	}
}

/// The enforced predicates. Every predicate is an allow-list: the default
/// for each flag is "forbidden" and the spec enumerates what is permitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSecurityPolicySpec {
	pub privileged: bool,
	pub capabilities: Vec<String>,
	pub volumes: VolumeSecurityPolicy,
	pub images: Option<ImageSecurityPolicy>,
	pub host_network: bool,
	pub host_ports: Vec<HostPortRange>,
	#[serde(rename = "hostPID")]
	pub host_pid: bool,
	#[serde(rename = "hostIPC")]
	pub host_ipc: bool,
	pub se_linux_context: SELinuxContextStrategyOptions,
	pub run_as_user: RunAsUserStrategyOptions,
}

impl PodSecurityPolicySpec {
	/// Walk the pod spec against every predicate, stopping at the first
	/// violation. Absent optional fields evaluate as absent, never as
	/// violations.
	pub fn check(&self, pod: &PodSpec) -> Result<(), Violation> {
		if pod.host_pid && !self.host_pid {
			return Err(Violation::HostPid);
		}
		if pod.host_ipc && !self.host_ipc {
			return Err(Violation::HostIpc);
		}
		if pod.host_network && !self.host_network {
			return Err(Violation::HostNetwork);
		}

		self.volumes.check(&pod.volumes)?;

		if let Some(images) = &self.images {
			for c in &pod.containers {
				images.check(&c.image)?;
			}
		}

		for c in &pod.containers {
			if let Some(sc) = &c.security_context {
				if sc.privileged.unwrap_or(false) && !self.privileged {
					return Err(Violation::Privileged);
				}
				if let Some(caps) = &sc.capabilities {
					for cap in &caps.add {
						if !self.capabilities.iter().any(|allowed| allowed == cap) {
							return Err(Violation::Capability(cap.clone()));
						}
					}
				}
				self.run_as_user.check(sc)?;
			}
		}

		// host ports go last; with no ranges configured no container may bind one
		for c in &pod.containers {
			for port in &c.ports {
				if port.host_port <= 0 {
					continue;
				}
				if !self.host_ports.iter().any(|r| r.contains(port.host_port)) {
					return Err(Violation::HostPort(port.host_port));
				}
			}
		}

		Ok(())
	}
}

/// An inclusive range of host ports a policy permits pods to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostPortRange {
	pub start: i32,
	pub end: i32,
}

impl HostPortRange {
	pub fn contains(&self, port: i32) -> bool {
		port >= self.start && port <= self.end
	}
}

/// Volume-kind allow flags, plus the host-path prefix whitelist. A volume of
/// a kind whose flag is false is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeSecurityPolicy {
	pub host_path: bool,
	pub host_path_allowed: Vec<String>,
	pub empty_dir: bool,
	pub gce_persistent_disk: bool,
	pub aws_elastic_block_store: bool,
	pub git_repo: bool,
	pub secret: bool,
	pub nfs: bool,
	pub iscsi: bool,
	pub glusterfs: bool,
	pub persistent_volume_claim: bool,
	pub rbd: bool,
	pub cinder: bool,
	pub cephfs: bool,
	#[serde(rename = "downwardAPI")]
	pub downward_api: bool,
	pub fc: bool,
}

impl VolumeSecurityPolicy {
	pub fn check(&self, volumes: &[Volume]) -> Result<(), Violation> {
		for v in volumes {
			if let Some(host_path) = &v.source.host_path {
				if !self.host_path {
					return Err(Violation::HostPathNotPermitted(v.name.clone()));
				}
				// a relative traversal escapes any prefix whitelist
				if host_path.path.contains("..") {
					return Err(Violation::HostPathDenied(host_path.path.clone()));
				}
				if !self.host_path_allowed.is_empty()
					&& !self
						.host_path_allowed
						.iter()
						.any(|prefix| host_path.path.starts_with(prefix))
				{
					return Err(Violation::HostPathDenied(host_path.path.clone()));
				}
			}

			let kinds = [
				(self.empty_dir, v.source.empty_dir.is_some(), "emptydir"),
				(self.gce_persistent_disk, v.source.gce_persistent_disk.is_some(), "gce"),
				(
					self.aws_elastic_block_store,
					v.source.aws_elastic_block_store.is_some(),
					"aws ebs",
				),
				(self.git_repo, v.source.git_repo.is_some(), "gitrepo"),
				(self.secret, v.source.secret.is_some(), "secret"),
				(self.nfs, v.source.nfs.is_some(), "nfs"),
				(self.iscsi, v.source.iscsi.is_some(), "iscsi"),
				(self.glusterfs, v.source.glusterfs.is_some(), "glusterfs"),
				(
					self.persistent_volume_claim,
					v.source.persistent_volume_claim.is_some(),
					"persistent",
				),
				(self.rbd, v.source.rbd.is_some(), "rbd"),
				(self.cinder, v.source.cinder.is_some(), "cinder"),
				(self.cephfs, v.source.cephfs.is_some(), "cephfs"),
				(self.downward_api, v.source.downward_api.is_some(), "downwardapi"),
				(self.fc, v.source.fc.is_some(), "fc"),
			];
			for (allowed, present, kind) in kinds {
				if present && !allowed {
					return Err(Violation::VolumeNotPermitted {
						kind,
						name: v.name.clone(),
					});
				}
			}
		}
		Ok(())
	}
}

/// Container image constraints as two ordered regex lists, compiled at load.
/// The denied list is consulted before the permitted one, so an image
/// matching both is rejected; with both lists empty the predicate is inert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageSecurityPolicy {
	#[serde(with = "serde_regex")]
	pub permitted: Vec<Regex>,
	#[serde(with = "serde_regex")]
	pub denied: Vec<Regex>,
}

impl ImageSecurityPolicy {
	pub fn check(&self, image: &str) -> Result<(), Violation> {
		for re in &self.denied {
			if re.is_match(image) {
				return Err(Violation::ImageDenied(image.to_string()));
			}
		}
		for re in &self.permitted {
			if re.is_match(image) {
				return Ok(());
			}
		}
		if self.permitted.is_empty() && self.denied.is_empty() {
			return Ok(());
		}
		Err(Violation::ImageNotPermitted(image.to_string()))
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SELinuxContextStrategyOptions {
	#[serde(rename = "type")]
	pub strategy: SELinuxContextStrategy,
	pub se_linux_options: Option<crate::kube::SELinuxOptions>,
}

// Retained from the policy schema for forward compatibility; no predicate is
// evaluated against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SELinuxContextStrategy {
	MustRunAs,
	#[default]
	RunAsAny,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunAsUserStrategyOptions {
	#[serde(rename = "type")]
	pub strategy: RunAsUserStrategy,
	pub uid: Option<i64>,
	pub uid_range_min: Option<i64>,
	pub uid_range_max: Option<i64>,
}

impl RunAsUserStrategyOptions {
	// TODO: enforce MustRunAs/MustRunAsRange/MustRunAsNonRoot against the
	// container uid once range allocation is decided; for now every strategy
	// admits.
	pub fn check(&self, _sc: &SecurityContext) -> Result<(), Violation> {
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunAsUserStrategy {
	MustRunAs,
	MustRunAsRange,
	MustRunAsNonRoot,
	#[default]
	RunAsAny,
}
