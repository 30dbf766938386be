//! OpenAPI spec template rendering for tool provisioning.
//!
//! Templates carry `{base_url}` and `{query_language_description}`
//! placeholders, substituted textually before the YAML is parsed — the
//! template is never valid YAML on its own since the placeholder text may
//! itself contain characters that need escaping once filled in.

use inv_domain::{Error, Result};
use serde_yaml::Value;

pub fn render_spec(
    template_yaml: &str,
    base_url: &str,
    query_language_description: &str,
    keep_path_prefix: Option<&str>,
) -> Result<Value> {
    let rendered = template_yaml
        .replace("{base_url}", base_url.trim_end_matches('/'))
        .replace("{query_language_description}", query_language_description);

    let mut spec: Value =
        serde_yaml::from_str(&rendered).map_err(|e| Error::Config(format!("openapi template: {e}")))?;

    if let Some(prefix) = keep_path_prefix {
        if let Some(paths) = spec.get_mut("paths").and_then(|p| p.as_mapping_mut()) {
            paths.retain(|k, _| k.as_str().map(|s| s.starts_with(prefix)).unwrap_or(false));
        }
    }

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
openapi: "3.0.0"
info:
  title: query-api
  version: "1.0"
paths:
  /query/graph:
    post:
      summary: "{query_language_description}"
      servers:
        - url: "{base_url}"
  /query/telemetry:
    post:
      summary: telemetry
"#;

    #[test]
    fn substitutes_placeholders() {
        let spec = render_spec(TEMPLATE, "https://api.example/", "GQL guidance", None).unwrap();
        let summary = spec["paths"]["/query/graph"]["post"]["summary"]
            .as_str()
            .unwrap();
        assert_eq!(summary, "GQL guidance");
    }

    #[test]
    fn filters_paths_by_prefix() {
        let spec = render_spec(TEMPLATE, "https://api.example", "x", Some("/query/graph")).unwrap();
        let paths = spec["paths"].as_mapping().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(spec["paths"]["/query/telemetry"].is_null());
    }
}
