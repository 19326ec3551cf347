//! The subset of the orchestrator API schema the proxy decodes. This is an
//! external schema we consume, not define; unknown fields are ignored and
//! absent fields default so a sparse manifest never fails to decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
	pub name: String,
	pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pod {
	pub metadata: ObjectMeta,
	pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplicationController {
	pub metadata: ObjectMeta,
	pub spec: ReplicationControllerSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplicationControllerSpec {
	pub replicas: Option<i32>,
	pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodTemplateSpec {
	pub metadata: ObjectMeta,
	pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
	pub containers: Vec<Container>,
	pub volumes: Vec<Volume>,
	pub host_network: bool,
	#[serde(rename = "hostPID")]
	pub host_pid: bool,
	#[serde(rename = "hostIPC")]
	pub host_ipc: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
	pub name: String,
	pub image: String,
	pub ports: Vec<ContainerPort>,
	pub security_context: Option<SecurityContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerPort {
	pub name: String,
	pub container_port: i32,
	// 0 means unset
	pub host_port: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityContext {
	pub privileged: Option<bool>,
	pub capabilities: Option<Capabilities>,
	pub run_as_user: Option<i64>,
	pub run_as_non_root: Option<bool>,
	pub se_linux_options: Option<SELinuxOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
	pub add: Vec<String>,
	pub drop: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SELinuxOptions {
	pub user: String,
	pub role: String,
	#[serde(rename = "type")]
	pub type_: String,
	pub level: String,
}

/// A named volume. The source is keyed by which per-kind payload is set; only
/// hostPath carries data the policy engine inspects, the rest are retained
/// opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
	pub name: String,
	#[serde(flatten)]
	pub source: VolumeSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeSource {
	pub host_path: Option<HostPathVolumeSource>,
	pub empty_dir: Option<Value>,
	pub gce_persistent_disk: Option<Value>,
	pub aws_elastic_block_store: Option<Value>,
	pub git_repo: Option<Value>,
	pub secret: Option<Value>,
	pub nfs: Option<Value>,
	pub iscsi: Option<Value>,
	pub glusterfs: Option<Value>,
	pub persistent_volume_claim: Option<Value>,
	pub rbd: Option<Value>,
	pub cinder: Option<Value>,
	pub cephfs: Option<Value>,
	#[serde(rename = "downwardAPI")]
	pub downward_api: Option<Value>,
	pub fc: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostPathVolumeSource {
	pub path: String,
}
