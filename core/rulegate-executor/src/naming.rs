//! Qualified-name templates for decisions and flows.

/// Builds the fully-qualified artifact name a request resolves to.
///
/// With the default templates, prefix `acme`, view `retail`, version `1.0`
/// and conclusion `Eligibility` give
/// `acme.decisions.retail.v1_0.Eligibility`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplates {
    pub decision: String,
    pub flow: String,
    pub view_placeholder: String,
    pub prefix_placeholder: String,
    pub version_placeholder: String,
    pub version_dot_replacement: String,
}

impl NameTemplates {
    pub fn decision_name(&self, prefix: &str, conclusion: &str, view: &str, version: &str) -> String {
        let base = self
            .decision
            .replace(&self.view_placeholder, view)
            .replace(&self.prefix_placeholder, prefix)
            .replace(&self.version_placeholder, &self.normalize_version(version));
        format!("{base}.{conclusion}")
    }

    pub fn flow_name(&self, prefix: &str, name: &str, version: &str) -> String {
        let base = self
            .flow
            .replace(&self.prefix_placeholder, prefix)
            .replace(&self.version_placeholder, &self.normalize_version(version));
        format!("{base}.{name}")
    }

    fn normalize_version(&self, version: &str) -> String {
        version.replace('.', &self.version_dot_replacement)
    }
}
