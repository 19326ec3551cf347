use serde_json::json;

use super::*;
use crate::kube::PodSpec;

fn pod(value: serde_json::Value) -> PodSpec {
	serde_json::from_value(value).expect("pod spec fixture")
}

fn wildcard_policy(spec: PodSecurityPolicySpec) -> PodSecurityPolicy {
	PodSecurityPolicy {
		namespaces: vec!["*".to_string()],
		spec: Some(spec),
		..Default::default()
	}
}

fn set(items: Vec<PodSecurityPolicy>) -> PolicySet {
	PolicySet::new(PodSecurityPolicyList { items }).expect("valid policy set")
}

fn cx(namespace: &str) -> PolicyContext {
	PolicyContext::new(namespace)
}

#[test]
fn matches_wildcard_namespace() {
	let p = wildcard_policy(PodSecurityPolicySpec::default());
	assert!(p.matches(&cx("anything")));
}

#[test]
fn matches_exact_namespace() {
	let p = PodSecurityPolicy {
		namespaces: vec!["dev".to_string()],
		spec: Some(PodSecurityPolicySpec::default()),
		..Default::default()
	};
	assert!(p.matches(&cx("dev")));
	assert!(!p.matches(&cx("prod")));
}

#[test]
fn matches_user_and_group() {
	let p = PodSecurityPolicy {
		namespaces: vec!["none".to_string()],
		users: vec!["alice".to_string()],
		groups: vec!["admins".to_string()],
		spec: Some(PodSecurityPolicySpec::default()),
	};

	let mut with_user = cx("dev");
	with_user.user = Some("alice".to_string());
	assert!(p.matches(&with_user));

	let mut with_group = cx("dev");
	with_group.groups = vec!["viewers".to_string(), "admins".to_string()];
	assert!(p.matches(&with_group));

	// anonymous context in a foreign namespace selects nothing
	assert!(!p.matches(&cx("dev")));
}

#[test]
fn first_matching_policy_decides() {
	let restrictive = wildcard_policy(PodSecurityPolicySpec::default());
	let permissive = wildcard_policy(PodSecurityPolicySpec {
		host_network: true,
		..Default::default()
	});
	let pods = pod(json!({"hostNetwork": true}));

	// the permissive policy is listed second and must have no effect
	let verdict = set(vec![restrictive, permissive]).authorize(&cx("dev"), &pods);
	assert_eq!(verdict, Err(Violation::HostNetwork));
}

#[test]
fn no_matching_policy_allows() {
	let p = PodSecurityPolicy {
		namespaces: vec!["prod".to_string()],
		spec: Some(PodSecurityPolicySpec::default()),
		..Default::default()
	};
	let pods = pod(json!({"hostNetwork": true, "hostPID": true}));
	assert_eq!(set(vec![p]).authorize(&cx("dev"), &pods), Ok(()));
}

#[test]
fn host_flags_rejected_in_order() {
	let spec = PodSecurityPolicySpec::default();
	assert_eq!(spec.check(&pod(json!({"hostPID": true}))), Err(Violation::HostPid));
	assert_eq!(spec.check(&pod(json!({"hostIPC": true}))), Err(Violation::HostIpc));
	assert_eq!(
		spec.check(&pod(json!({"hostNetwork": true}))),
		Err(Violation::HostNetwork)
	);
	// hostPID outranks the rest when several are set
	assert_eq!(
		spec.check(&pod(json!({"hostPID": true, "hostNetwork": true}))),
		Err(Violation::HostPid)
	);
}

#[test]
fn host_flags_allowed_when_granted() {
	let spec = PodSecurityPolicySpec {
		host_network: true,
		host_pid: true,
		host_ipc: true,
		..Default::default()
	};
	let pods = pod(json!({"hostNetwork": true, "hostPID": true, "hostIPC": true}));
	assert_eq!(spec.check(&pods), Ok(()));
}

#[test]
fn privileged_container_rejected() {
	let spec = PodSecurityPolicySpec::default();
	let pods = pod(json!({
		"containers": [
			{"name": "a", "image": "x", "securityContext": {"privileged": true}}
		]
	}));
	assert_eq!(spec.check(&pods), Err(Violation::Privileged));
	assert_eq!(spec.check(&pods).unwrap_err().to_string(), "privileged mode");
}

#[test]
fn privileged_container_allowed_when_granted() {
	let spec = PodSecurityPolicySpec {
		privileged: true,
		..Default::default()
	};
	let pods = pod(json!({
		"containers": [
			{"name": "a", "image": "x", "securityContext": {"privileged": true}}
		]
	}));
	assert_eq!(spec.check(&pods), Ok(()));
}

#[test]
fn unlisted_capability_rejected() {
	let spec = PodSecurityPolicySpec {
		capabilities: vec!["CAP_NET_ADMIN".to_string()],
		..Default::default()
	};
	let allowed = pod(json!({
		"containers": [
			{"name": "a", "image": "x", "securityContext": {"capabilities": {"add": ["CAP_NET_ADMIN"]}}}
		]
	}));
	assert_eq!(spec.check(&allowed), Ok(()));

	let denied = pod(json!({
		"containers": [
			{"name": "a", "image": "x", "securityContext": {"capabilities": {"add": ["CAP_SYS_ADMIN"]}}}
		]
	}));
	let err = spec.check(&denied).unwrap_err();
	assert_eq!(err, Violation::Capability("CAP_SYS_ADMIN".to_string()));
	assert_eq!(err.to_string(), "capability CAP_SYS_ADMIN");
}

#[test]
fn dropped_capabilities_are_not_checked() {
	let spec = PodSecurityPolicySpec::default();
	let pods = pod(json!({
		"containers": [
			{"name": "a", "image": "x", "securityContext": {"capabilities": {"drop": ["CAP_SYS_ADMIN"]}}}
		]
	}));
	assert_eq!(spec.check(&pods), Ok(()));
}

#[test]
fn host_port_forbidden_without_ranges() {
	let spec = PodSecurityPolicySpec::default();
	let pods = pod(json!({
		"containers": [{"name": "a", "image": "x", "ports": [{"hostPort": 8080}]}]
	}));
	assert_eq!(spec.check(&pods), Err(Violation::HostPort(8080)));
}

#[test]
fn unset_host_port_ignored() {
	let spec = PodSecurityPolicySpec::default();
	let pods = pod(json!({
		"containers": [{"name": "a", "image": "x", "ports": [{"containerPort": 80}]}]
	}));
	assert_eq!(spec.check(&pods), Ok(()));
}

#[test]
fn host_port_within_range_allowed() {
	let spec = PodSecurityPolicySpec {
		host_ports: vec![HostPortRange { start: 8000, end: 9000 }],
		..Default::default()
	};
	let pods = pod(json!({
		"containers": [{"name": "a", "image": "x", "ports": [{"hostPort": 8080}]}]
	}));
	assert_eq!(spec.check(&pods), Ok(()));
}

#[test]
fn host_port_outside_range_rejected() {
	let spec = PodSecurityPolicySpec {
		host_ports: vec![HostPortRange { start: 8000, end: 9000 }],
		..Default::default()
	};
	let pods = pod(json!({
		"containers": [{"name": "a", "image": "x", "ports": [{"hostPort": 7000}]}]
	}));
	let err = spec.check(&pods).unwrap_err();
	assert_eq!(err, Violation::HostPort(7000));
	assert_eq!(err.to_string(), "host port 7000");
}

#[test]
fn host_port_in_any_disjoint_range_allowed() {
	let spec = PodSecurityPolicySpec {
		host_ports: vec![
			HostPortRange { start: 80, end: 80 },
			HostPortRange { start: 8000, end: 9000 },
		],
		..Default::default()
	};
	let pods = pod(json!({
		"containers": [{"name": "a", "image": "x", "ports": [{"hostPort": 80}, {"hostPort": 8443}]}]
	}));
	assert_eq!(spec.check(&pods), Ok(()));
}

#[test]
fn forbidden_volume_kind_rejected() {
	let spec = PodSecurityPolicySpec {
		volumes: VolumeSecurityPolicy {
			empty_dir: true,
			..Default::default()
		},
		..Default::default()
	};
	let allowed = pod(json!({"volumes": [{"name": "scratch", "emptyDir": {}}]}));
	assert_eq!(spec.check(&allowed), Ok(()));

	let denied = pod(json!({"volumes": [{"name": "certs", "secret": {"secretName": "tls"}}]}));
	assert_eq!(
		spec.check(&denied),
		Err(Violation::VolumeNotPermitted {
			kind: "secret",
			name: "certs".to_string()
		})
	);
}

#[test]
fn host_path_volume_requires_flag() {
	let spec = PodSecurityPolicySpec::default();
	let pods = pod(json!({"volumes": [{"name": "logs", "hostPath": {"path": "/var/log"}}]}));
	assert_eq!(
		spec.check(&pods),
		Err(Violation::HostPathNotPermitted("logs".to_string()))
	);
}

#[test]
fn host_path_prefix_whitelist() {
	let spec = PodSecurityPolicySpec {
		volumes: VolumeSecurityPolicy {
			host_path: true,
			host_path_allowed: vec!["/var/log".to_string()],
			..Default::default()
		},
		..Default::default()
	};

	let inside = pod(json!({"volumes": [{"name": "v", "hostPath": {"path": "/var/log/app"}}]}));
	assert_eq!(spec.check(&inside), Ok(()));

	let outside = pod(json!({"volumes": [{"name": "v", "hostPath": {"path": "/etc/passwd"}}]}));
	assert_eq!(
		spec.check(&outside),
		Err(Violation::HostPathDenied("/etc/passwd".to_string()))
	);

	let traversal = pod(json!({"volumes": [{"name": "v", "hostPath": {"path": "/var/log/../etc"}}]}));
	assert_eq!(
		spec.check(&traversal),
		Err(Violation::HostPathDenied("/var/log/../etc".to_string()))
	);
}

#[test]
fn host_path_traversal_rejected_without_whitelist() {
	let spec = PodSecurityPolicySpec {
		volumes: VolumeSecurityPolicy {
			host_path: true,
			..Default::default()
		},
		..Default::default()
	};
	let pods = pod(json!({"volumes": [{"name": "v", "hostPath": {"path": "/data/../etc"}}]}));
	assert_eq!(
		spec.check(&pods),
		Err(Violation::HostPathDenied("/data/../etc".to_string()))
	);
}

fn image_policy() -> PodSecurityPolicySpec {
	serde_json::from_value(json!({
		"images": {
			"permitted": ["^registry\\.internal/.*"],
			"denied": ["^.*:latest$"]
		}
	}))
	.expect("image policy fixture")
}

#[test]
fn image_matching_permit_list_allowed() {
	let pods = pod(json!({"containers": [{"name": "a", "image": "registry.internal/foo:1.0"}]}));
	assert_eq!(image_policy().check(&pods), Ok(()));
}

#[test]
fn image_denied_list_wins_over_permitted() {
	// matches both lists; denied is consulted first
	let pods = pod(json!({"containers": [{"name": "a", "image": "registry.internal/foo:latest"}]}));
	assert_eq!(
		image_policy().check(&pods),
		Err(Violation::ImageDenied("registry.internal/foo:latest".to_string()))
	);
}

#[test]
fn image_matching_no_list_rejected() {
	let pods = pod(json!({"containers": [{"name": "a", "image": "other/foo:1.0"}]}));
	assert_eq!(
		image_policy().check(&pods),
		Err(Violation::ImageNotPermitted("other/foo:1.0".to_string()))
	);
}

#[test]
fn empty_image_policy_is_inert() {
	let images = ImageSecurityPolicy::default();
	assert_eq!(images.check("anything:latest"), Ok(()));
}

#[test]
fn allow_list_default_rejects_any_privilege_request() {
	let spec = PodSecurityPolicySpec::default();
	assert_eq!(spec.check(&PodSpec::default()), Ok(()));

	let plain_container = pod(json!({"containers": [{"name": "a", "image": "x"}]}));
	assert_eq!(spec.check(&plain_container), Ok(()));

	assert!(spec.check(&pod(json!({"hostNetwork": true}))).is_err());
	assert!(
		spec
			.check(&pod(json!({"volumes": [{"name": "v", "emptyDir": {}}]})))
			.is_err()
	);
}

#[test]
fn authorize_is_pure() {
	let policies = set(vec![wildcard_policy(PodSecurityPolicySpec::default())]);
	let pods = pod(json!({"hostNetwork": true}));
	let context = cx("dev");
	for _ in 0..3 {
		assert_eq!(policies.authorize(&context, &pods), Err(Violation::HostNetwork));
	}
}

#[test]
fn run_as_user_strategy_currently_admits() {
	let spec: PodSecurityPolicySpec = serde_json::from_value(json!({
		"runAsUser": {"type": "MustRunAsNonRoot"}
	}))
	.expect("strategy fixture");
	assert_eq!(spec.run_as_user.strategy, RunAsUserStrategy::MustRunAsNonRoot);
	let pods = pod(json!({
		"containers": [{"name": "a", "image": "x", "securityContext": {"runAsUser": 0}}]
	}));
	assert_eq!(spec.check(&pods), Ok(()));
}
