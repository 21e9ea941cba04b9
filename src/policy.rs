use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

pub const NAME_PREFIX: &str = "podlogreader";
pub const LABEL_KEY: &str = "podlogreader-affiliate";
pub const LABEL_VALUE: &str = "enable";

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Admission filter: only pods labelled `podlogreader-affiliate=enable` are handled.
#[derive(Debug, Clone)]
pub struct LabelGate {
    key: &'static str,
    value: &'static str,
}

impl Default for LabelGate {
    fn default() -> Self {
        Self {
            key: LABEL_KEY,
            value: LABEL_VALUE,
        }
    }
}

impl LabelGate {
    pub fn in_scope(&self, pod: &Pod) -> bool {
        pod.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(self.key))
            .is_some_and(|v| v == self.value)
    }

    /// Equality selector matching the pods this gate admits.
    pub fn selector(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// The RBAC objects granting log access to one Deployment's pods.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredPolicy {
    pub role: Role,
    pub service_account: ServiceAccount,
    pub role_binding: RoleBinding,
}

impl DesiredPolicy {
    pub fn name(&self) -> &str {
        self.role.metadata.name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct PolicySynthesizer {
    prefix: &'static str,
}

impl Default for PolicySynthesizer {
    fn default() -> Self {
        Self {
            prefix: NAME_PREFIX,
        }
    }
}

impl PolicySynthesizer {
    /// Name shared by the Role, ServiceAccount and RoleBinding of a Deployment.
    pub fn name_for(&self, deployment: &str) -> String {
        format!("{}-{}", self.prefix, deployment)
    }

    pub fn synthesize(&self, deployment: &str, namespace: &str, pod_names: &[String]) -> DesiredPolicy {
        let name = self.name_for(deployment);
        DesiredPolicy {
            role: self.role(&name, namespace, pod_names),
            service_account: ServiceAccount {
                metadata: self.metadata(&name, namespace),
                ..Default::default()
            },
            role_binding: self.role_binding(&name, namespace),
        }
    }

    fn metadata(&self, name: &str, namespace: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                self.prefix.to_string(),
            )])),
            ..Default::default()
        }
    }

    fn role(&self, name: &str, namespace: &str, pod_names: &[String]) -> Role {
        let mut rules = vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["pods".to_string()]),
            verbs: vec!["list".to_string()],
            ..Default::default()
        }];

        // An empty resourceNames list means "every pod" to the authorizer.
        if !pod_names.is_empty() {
            rules.push(PolicyRule {
                api_groups: Some(vec![String::new()]),
                resources: Some(vec!["pods/log".to_string()]),
                resource_names: Some(pod_names.to_vec()),
                verbs: vec!["get".to_string(), "list".to_string(), "watch".to_string()],
                ..Default::default()
            });
        }

        Role {
            metadata: self.metadata(name, namespace),
            rules: Some(rules),
        }
    }

    fn role_binding(&self, name: &str, namespace: &str) -> RoleBinding {
        RoleBinding {
            metadata: self.metadata(name, namespace),
            role_ref: RoleRef {
                api_group: RBAC_API_GROUP.to_string(),
                kind: "Role".to_string(),
                name: name.to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            }]),
        }
    }
}
