//! Static kind tables: short names, dependency order, immutable fields and
//! the fields the platform manages on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Short name to kind. The first entry for a kind is its display short name.
const SHORT_NAMES: &[(&str, &str)] = &[
    ("svc", "Service"),
    ("route", "Route"),
    ("dc", "DeploymentConfig"),
    ("deployment", "Deployment"),
    ("bc", "BuildConfig"),
    ("is", "ImageStream"),
    ("pvc", "PersistentVolumeClaim"),
    ("template", "Template"),
    ("cm", "ConfigMap"),
    ("secret", "Secret"),
    ("rolebinding", "RoleBinding"),
    ("serviceaccount", "ServiceAccount"),
    ("cronjob", "CronJob"),
    ("cj", "CronJob"),
    ("limitrange", "LimitRange"),
    ("quota", "ResourceQuota"),
    ("hpa", "HorizontalPodAutoscaler"),
];

/// Dependency order used to sort changes. Kinds missing here sort as 0.
const KIND_ORDER: &[&str] = &[
    "Template",
    "ConfigMap",
    "Secret",
    "PersistentVolumeClaim",
    "ImageStream",
    "BuildConfig",
    "DeploymentConfig",
    "Service",
    "Route",
    "ServiceAccount",
    "RoleBinding",
];

const IMMUTABLE_FIELDS: &[(&str, &[&str])] = &[
    (
        "PersistentVolumeClaim",
        &["/spec/accessModes", "/spec/storageClassName", "/spec/resources/requests/storage"],
    ),
    ("Route", &["/spec/host"]),
    ("Secret", &["/type"]),
];

/// Fields set by the platform which never count as drift.
pub const PLATFORM_MANAGED_SIMPLE_FIELDS: &[&str] = &[
    "/metadata/generation",
    "/metadata/creationTimestamp",
    "/spec/tags",
    "/status",
    "/spec/volumeName",
    "/spec/template/metadata/creationTimestamp",
    "/userNames",
    "/groupNames",
];

/// Bookkeeping fields an export carries that templates never do.
pub const EXPORT_NOISE_FIELDS: &[&str] = &[
    "/metadata/uid",
    "/metadata/resourceVersion",
    "/metadata/selfLink",
    "/metadata/namespace",
    "/metadata/managedFields",
];

pub static PLATFORM_MANAGED_REGEX_FIELDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^/spec/triggers/[0-9]+/imageChangeParams/lastTriggeredImage$"]
        .iter()
        .filter_map(|re| Regex::new(re).ok())
        .collect()
});

/// Canonicalize a short name, lowercase kind or kind into the kind, e.g. `dc` -> `DeploymentConfig`.
pub fn canonical_kind(token: &str) -> Option<&'static str> {
    let lower = token.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return None;
    }
    SHORT_NAMES
        .iter()
        .find(|(short, kind)| *short == lower || kind.to_ascii_lowercase() == lower)
        .map(|(_, kind)| *kind)
}

/// Display short name for a kind, e.g. `DeploymentConfig` -> `dc`.
pub fn short_name(kind: &str) -> String {
    SHORT_NAMES
        .iter()
        .find(|(_, k)| *k == kind)
        .map(|(short, _)| (*short).to_string())
        .unwrap_or_else(|| kind.to_ascii_lowercase())
}

/// Position of `kind` in the dependency order (1-based), 0 when unlisted.
pub fn kind_order(kind: &str) -> usize {
    KIND_ORDER.iter().position(|k| *k == kind).map(|i| i + 1).unwrap_or(0)
}

pub fn immutable_fields(kind: &str) -> &'static [&'static str] {
    IMMUTABLE_FIELDS.iter().find(|(k, _)| *k == kind).map(|(_, f)| *f).unwrap_or(&[])
}

/// All kinds that have immutable fields, for `--preserve-immutable-fields`.
pub fn kinds_with_immutable_fields() -> impl Iterator<Item = (&'static str, &'static [&'static str])> {
    IMMUTABLE_FIELDS.iter().copied()
}

/// Whether `pointer` is, or lies below, an immutable field of `kind`.
pub fn is_immutable(kind: &str, pointer: &str) -> bool {
    immutable_fields(kind).iter().any(|f| crate::pointer::is_same_or_descendant(pointer, f))
}

/// Comma-joined short names of every known kind, the default export scope.
pub fn all_short_names() -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut out: Vec<&str> = Vec::new();
    for (short, kind) in SHORT_NAMES {
        if !seen.contains(kind) {
            seen.push(kind);
            out.push(short);
        }
    }
    out.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_short_and_long_names() {
        assert_eq!(canonical_kind("dc"), Some("DeploymentConfig"));
        assert_eq!(canonical_kind("DeploymentConfig"), Some("DeploymentConfig"));
        assert_eq!(canonical_kind("cj"), Some("CronJob"));
        assert_eq!(canonical_kind("quota"), Some("ResourceQuota"));
        assert_eq!(canonical_kind("persistentvolumeclaim"), Some("PersistentVolumeClaim"));
        assert_eq!(canonical_kind("pod"), None);
        assert_eq!(canonical_kind(""), None);
    }

    #[test]
    fn short_names_round_trip() {
        assert_eq!(short_name("BuildConfig"), "bc");
        assert_eq!(short_name("CronJob"), "cronjob");
        assert_eq!(short_name("Pod"), "pod");
    }

    #[test]
    fn kind_order_puts_dependencies_first() {
        assert!(kind_order("Template") < kind_order("ConfigMap"));
        assert!(kind_order("Secret") < kind_order("DeploymentConfig"));
        assert!(kind_order("Route") < kind_order("RoleBinding"));
        assert_eq!(kind_order("CronJob"), 0);
    }

    #[test]
    fn immutable_fields_cover_descendants() {
        assert!(is_immutable("Route", "/spec/host"));
        assert!(is_immutable("PersistentVolumeClaim", "/spec/accessModes/0"));
        assert!(!is_immutable("Route", "/spec/hostname"));
        assert!(!is_immutable("ConfigMap", "/data/x"));
    }

    #[test]
    fn regex_fields_match_trigger_images() {
        let re = &PLATFORM_MANAGED_REGEX_FIELDS[0];
        assert!(re.is_match("/spec/triggers/1/imageChangeParams/lastTriggeredImage"));
        assert!(!re.is_match("/spec/triggers/1/imageChangeParams/from"));
    }

    #[test]
    fn default_export_scope_lists_each_kind_once() {
        let all = all_short_names();
        assert!(all.starts_with("svc,route,dc"));
        assert!(all.contains("cronjob"));
        assert!(!all.contains(",cj"));
    }
}
