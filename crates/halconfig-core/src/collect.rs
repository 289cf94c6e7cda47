//! Discovery of locally staged files referenced by a config tree.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::error::CollectError;
use crate::tree::{display_path, ConfigTree, NodeId, NodeValue};

/// Collect the value of every `local_file` field in the tree.
///
/// Every object node is inspected through its declared shape, at any depth
/// and inside any sequence. Missing and null fields are skipped. A declared
/// field holding anything but a string aborts the whole walk.
pub fn collect_local_files(tree: &ConfigTree) -> Result<BTreeSet<PathBuf>, CollectError> {
    let schema = tree.schema();
    let mut files = BTreeSet::new();

    for id in tree.walk(tree.root()) {
        let node = tree.node(id);
        let (Some(shape), NodeValue::Object(_)) = (node.shape(), node.value()) else {
            continue;
        };

        for field in schema.shape(shape).local_file_fields() {
            let Some(child) = tree.field(id, field) else {
                continue;
            };
            match tree.node(child).value() {
                NodeValue::Scalar(scalar) if scalar.is_null() => {}
                NodeValue::Scalar(scalar) => match scalar.as_str() {
                    Some(path) => {
                        files.insert(PathBuf::from(path));
                    }
                    None => {
                        return Err(introspection_error(tree, id, field, scalar.describe()));
                    }
                },
                other => return Err(introspection_error(tree, id, field, other.describe())),
            }
        }
    }

    debug!("Collected {} referenced local files", files.len());
    Ok(files)
}

fn introspection_error(
    tree: &ConfigTree,
    id: NodeId,
    field: &str,
    found: &'static str,
) -> CollectError {
    CollectError::Introspection {
        node: display_path(&tree.node_path(id)),
        field: field.to_string(),
        found,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::{halconfig_schema, Schema, Shape};

    fn parse(doc: &str) -> ConfigTree {
        ConfigTree::parse(doc.as_bytes(), Arc::new(halconfig_schema()))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_collects_files_at_any_depth() {
        let tree = parse(
            r#"
deploymentConfigurations:
- name: default
  providers:
    kubernetes:
      accounts:
      - name: a
        kubeconfigFile: /staging/a.kubeconfig
      - name: b
        kubeconfigFile: /staging/shared.kubeconfig
    google:
      accounts:
      - name: g
        jsonPath: /staging/g.json
  security:
    uiSecurity:
      ssl:
        sslCertificateFile: /staging/ui.crt
        sslCertificateKeyFile: null
- name: second
  providers:
    kubernetes:
      accounts:
      - name: c
        kubeconfigFile: /staging/shared.kubeconfig
"#,
        );

        let files = collect_local_files(&tree).unwrap();
        let expected: BTreeSet<PathBuf> = [
            "/staging/a.kubeconfig",
            "/staging/shared.kubeconfig",
            "/staging/g.json",
            "/staging/ui.crt",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(files, expected);
    }

    #[test]
    fn test_undeclared_fields_are_ignored() {
        // `jsonPath` is only a file field on shapes that declare it
        let tree = parse(
            r#"
deploymentConfigurations:
- name: default
  jsonPath: /not/a/tracked/file
  features:
    kubeconfigFile: /also/untracked
  providers:
    aws:
      accounts:
      - name: aws
        jsonPath: /aws/does/not/declare/it
"#,
        );

        assert!(collect_local_files(&tree).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let tree = parse("halyardVersion: 1.0.0\n");
        assert!(collect_local_files(&tree).unwrap().is_empty());
    }

    #[test]
    fn test_non_string_field_is_fatal() {
        let tree = parse(
            r#"
deploymentConfigurations:
- name: default
  providers:
    kubernetes:
      accounts:
      - name: a
        kubeconfigFile:
          nested: true
"#,
        );

        let err = collect_local_files(&tree).unwrap_err();
        let CollectError::Introspection { node, field, found } = err;
        assert_eq!(node, "deploymentConfigurations[0].providers.kubernetes.accounts[0]");
        assert_eq!(field, "kubeconfigFile");
        assert_eq!(found, "a mapping");
    }

    #[test]
    fn test_numeric_field_is_fatal() {
        let tree = parse(
            r#"
deploymentConfigurations:
- persistentStorage:
    gcs:
      jsonPath: 42
"#,
        );

        assert!(matches!(
            collect_local_files(&tree),
            Err(CollectError::Introspection { found: "a number", .. })
        ));
    }

    #[test]
    fn test_new_shapes_opt_in_without_collector_changes() {
        let schema = Schema::builder("root")
            .shape(Shape::new("root").child("vault", "vault"))
            .shape(Shape::new("vault").local_file("tokenFile"))
            .build()
            .unwrap();
        let tree = ConfigTree::parse(b"vault:\n  tokenFile: /staging/vault.token\n", Arc::new(schema))
            .unwrap()
            .unwrap();

        let files = collect_local_files(&tree).unwrap();
        assert_eq!(files.into_iter().collect::<Vec<_>>(), vec![PathBuf::from("/staging/vault.token")]);
    }

    #[test]
    fn test_files_added_by_mutation_are_found() {
        let mut tree = parse("deploymentConfigurations:\n- name: default\n  providers: {}\n");
        let providers = tree.resolve("deploymentConfigurations[0].providers").unwrap();
        let value: serde_yaml::Value =
            serde_yaml::from_str("accounts:\n- name: r\n  passwordFile: /staging/registry.pass\n").unwrap();
        tree.set_field(providers, "dockerRegistry", value).unwrap();

        let files = collect_local_files(&tree).unwrap();
        assert!(files.contains(&PathBuf::from("/staging/registry.pass")));
    }
}
