use super::{Schema, Shape};

/// The shapes of the deployment tool's config document.
///
/// Only fields the engine needs to understand are declared. Credential and
/// certificate fields that point at files uploaded into the staging
/// directory are tagged with `local_file`.
pub fn halconfig_schema() -> Schema {
    Schema::builder("halconfig")
        .shape(Shape::new("halconfig").list("deploymentConfigurations", "deploymentConfiguration"))
        .shape(
            Shape::new("deploymentConfiguration")
                .child("providers", "providers")
                .child("persistentStorage", "persistentStorage")
                .child("security", "security")
                .child("artifacts", "artifacts"),
        )
        // Providers
        .shape(
            Shape::new("providers")
                .child("kubernetes", "kubernetesProvider")
                .child("google", "googleProvider")
                .child("appengine", "appengineProvider")
                .child("dockerRegistry", "dockerRegistryProvider")
                .child("aws", "awsProvider"),
        )
        .shape(Shape::new("kubernetesProvider").list("accounts", "kubernetesAccount"))
        .shape(Shape::new("kubernetesAccount").local_file("kubeconfigFile"))
        .shape(Shape::new("googleProvider").list("accounts", "googleAccount"))
        .shape(Shape::new("googleAccount").local_file("jsonPath"))
        .shape(Shape::new("appengineProvider").list("accounts", "appengineAccount"))
        .shape(
            Shape::new("appengineAccount")
                .local_file("jsonPath")
                .local_file("sshPrivateKeyFilePath")
                .local_file("sshKnownHostsFilePath"),
        )
        .shape(Shape::new("dockerRegistryProvider").list("accounts", "dockerRegistryAccount"))
        .shape(Shape::new("dockerRegistryAccount").local_file("passwordFile"))
        .shape(Shape::new("awsProvider").list("accounts", "awsAccount"))
        .shape(Shape::new("awsAccount"))
        // Persistent storage
        .shape(
            Shape::new("persistentStorage")
                .child("gcs", "gcsPersistentStore")
                .child("s3", "s3PersistentStore"),
        )
        .shape(Shape::new("gcsPersistentStore").local_file("jsonPath"))
        .shape(Shape::new("s3PersistentStore"))
        // Security
        .shape(
            Shape::new("security")
                .child("apiSecurity", "apiSecurity")
                .child("uiSecurity", "uiSecurity")
                .child("authn", "authn"),
        )
        .shape(Shape::new("apiSecurity").child("ssl", "apiSsl"))
        .shape(
            Shape::new("apiSsl")
                .local_file("keyStore")
                .local_file("trustStore"),
        )
        .shape(Shape::new("uiSecurity").child("ssl", "uiSsl"))
        .shape(
            Shape::new("uiSsl")
                .local_file("sslCertificateFile")
                .local_file("sslCertificateKeyFile"),
        )
        .shape(Shape::new("authn").child("saml", "saml"))
        .shape(
            Shape::new("saml")
                .local_file("metadataLocal")
                .local_file("keyStore"),
        )
        // Artifacts
        .shape(
            Shape::new("artifacts")
                .child("github", "githubArtifactProvider")
                .child("gcs", "gcsArtifactProvider"),
        )
        .shape(Shape::new("githubArtifactProvider").list("accounts", "githubArtifactAccount"))
        .shape(Shape::new("githubArtifactAccount").local_file("tokenFile"))
        .shape(Shape::new("gcsArtifactProvider").list("accounts", "gcsArtifactAccount"))
        .shape(Shape::new("gcsArtifactAccount").local_file("jsonPath"))
        .build()
        .expect("built-in halconfig schema is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    #[test]
    fn test_halconfig_schema_builds() {
        let schema = halconfig_schema();
        assert_eq!(schema.shape(schema.root()).name(), "halconfig");

        let account = schema.lookup("kubernetesAccount").unwrap();
        let files: Vec<_> = schema.shape(account).local_file_fields().collect();
        assert_eq!(files, vec!["kubeconfigFile"]);

        let aws = schema.lookup("awsAccount").unwrap();
        assert_eq!(schema.shape(aws).local_file_fields().count(), 0);
    }

    #[test]
    fn test_deployments_are_a_list() {
        let schema = halconfig_schema();
        let deployment = schema.lookup("deploymentConfiguration").unwrap();
        assert_eq!(
            schema.shape(schema.root()).field("deploymentConfigurations"),
            Some(FieldKind::List(deployment))
        );
    }
}
