//! Resource kinds the dashboard can address generically.
//!
//! Every kind is reached through `DynamicObject`, so CRDs (ArgoCD, backup,
//! Karmada policies) and built-ins take the same path.
use kube::api::{ApiResource, GroupVersionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    /// Name used in URLs, e.g. `deployment`.
    pub name: &'static str,
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceKind {
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(self.group, self.version, self.kind);
        ApiResource::from_gvk_with_plural(&gvk, self.plural)
    }
}

const fn kind(
    name: &'static str,
    group: &'static str,
    version: &'static str,
    kind: &'static str,
    plural: &'static str,
    namespaced: bool,
) -> ResourceKind {
    ResourceKind {
        name,
        group,
        version,
        kind,
        plural,
        namespaced,
    }
}

/// Karmada's registry of member clusters.
pub const KARMADA_CLUSTER: ResourceKind =
    kind("cluster", "cluster.karmada.io", "v1alpha1", "Cluster", "clusters", false);

pub const KINDS: &[ResourceKind] = &[
    kind("namespace", "", "v1", "Namespace", "namespaces", false),
    kind("secret", "", "v1", "Secret", "secrets", true),
    kind("configmap", "", "v1", "ConfigMap", "configmaps", true),
    kind("node", "", "v1", "Node", "nodes", false),
    kind("pod", "", "v1", "Pod", "pods", true),
    kind("service", "", "v1", "Service", "services", true),
    kind(
        "customresourcedefinition",
        "apiextensions.k8s.io",
        "v1",
        "CustomResourceDefinition",
        "customresourcedefinitions",
        false,
    ),
    kind("deployment", "apps", "v1", "Deployment", "deployments", true),
    kind("statefulset", "apps", "v1", "StatefulSet", "statefulsets", true),
    kind("daemonset", "apps", "v1", "DaemonSet", "daemonsets", true),
    kind("job", "batch", "v1", "Job", "jobs", true),
    kind("cronjob", "batch", "v1", "CronJob", "cronjobs", true),
    kind("ingress", "networking.k8s.io", "v1", "Ingress", "ingresses", true),
    kind("application", "argoproj.io", "v1alpha1", "Application", "applications", true),
    kind("appproject", "argoproj.io", "v1alpha1", "AppProject", "appprojects", true),
    kind(
        "applicationset",
        "argoproj.io",
        "v1alpha1",
        "ApplicationSet",
        "applicationsets",
        true,
    ),
    kind("backup", "velero.io", "v1", "Backup", "backups", true),
    kind("restore", "velero.io", "v1", "Restore", "restores", true),
    KARMADA_CLUSTER,
    kind(
        "propagationpolicy",
        "policy.karmada.io",
        "v1alpha1",
        "PropagationPolicy",
        "propagationpolicies",
        true,
    ),
    kind(
        "clusterpropagationpolicy",
        "policy.karmada.io",
        "v1alpha1",
        "ClusterPropagationPolicy",
        "clusterpropagationpolicies",
        false,
    ),
    kind(
        "overridepolicy",
        "policy.karmada.io",
        "v1alpha1",
        "OverridePolicy",
        "overridepolicies",
        true,
    ),
];

/// Look up a kind by URL name; plurals are accepted too.
pub fn lookup(name: &str) -> Option<&'static ResourceKind> {
    let name = name.to_ascii_lowercase();
    KINDS
        .iter()
        .find(|kind| kind.name == name || kind.plural == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_singular_and_plural() {
        assert_eq!(lookup("deployment").map(|k| k.group), Some("apps"));
        assert_eq!(lookup("Deployments").map(|k| k.kind), Some("Deployment"));
        assert!(lookup("widgets").is_none());
    }

    #[test]
    fn api_resource_carries_group_version() {
        let ar = lookup("application").unwrap().api_resource();
        assert_eq!(ar.api_version, "argoproj.io/v1alpha1");
        assert_eq!(ar.plural, "applications");

        let ar = lookup("secret").unwrap().api_resource();
        assert_eq!(ar.api_version, "v1");
    }

    #[test]
    fn karmada_cluster_entry() {
        assert_eq!(lookup("cluster"), Some(&KARMADA_CLUSTER));
        assert!(!KARMADA_CLUSTER.namespaced);
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in KINDS.iter().enumerate() {
            for b in &KINDS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
