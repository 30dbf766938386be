//! Agent instruction composition: either a single `.md` file or a
//! directory of `.md` files, concatenated in lexical order.

use std::path::Path;

use inv_domain::{Error, Result};

/// Text-level substitutions resolved before the composed prompt is stored.
#[derive(Debug, Clone, Default)]
pub struct PromptSubstitutions {
    pub graph_name: Option<String>,
    pub scenario_prefix: Option<String>,
}

impl PromptSubstitutions {
    fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        if let Some(v) = &self.graph_name {
            out = out.replace("{graph_name}", v);
        }
        if let Some(v) = &self.scenario_prefix {
            out = out.replace("{scenario_prefix}", v);
        }
        out
    }
}

/// Load and compose instructions from `instructions_ref`, which is either a
/// single file or a directory. When a directory, every `.md` file is
/// concatenated in lexical filename order except files named
/// `language_*.md`, of which only the one matching `connector_tag` (the
/// connector id's last `-`-separated segment) is kept.
pub fn compose_instructions(
    instructions_ref: &Path,
    connector_tag: &str,
    substitutions: &PromptSubstitutions,
) -> Result<String> {
    let metadata = std::fs::metadata(instructions_ref)
        .map_err(|e| Error::Config(format!("instructions_ref {}: {e}", instructions_ref.display())))?;

    if metadata.is_file() {
        let text = std::fs::read_to_string(instructions_ref)?;
        return Ok(substitutions.apply(&text));
    }

    let mut entries: Vec<_> = std::fs::read_dir(instructions_ref)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    entries.sort();

    let mut sections = Vec::new();
    for path in entries {
        let file_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(tag) = file_name.strip_prefix("language_") {
            if tag != connector_tag {
                continue;
            }
        }
        sections.push(std::fs::read_to_string(&path)?);
    }

    if sections.is_empty() {
        return Err(Error::Config(format!(
            "no instruction fragments found under {}",
            instructions_ref.display()
        )));
    }

    Ok(substitutions.apply(&sections.join("\n\n---\n\n")))
}

/// Extract the connector tag (its final `-`-separated segment) used to pick
/// the matching `language_<tag>.md` fragment.
pub fn connector_tag(connector: &str) -> &str {
    connector.rsplit('-').next().unwrap_or(connector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn connector_tag_takes_last_segment() {
        assert_eq!(connector_tag("fabric-gql"), "gql");
        assert_eq!(connector_tag("cosmos-gremlin"), "gremlin");
        assert_eq!(connector_tag("mock"), "mock");
    }

    #[test]
    fn composes_directory_selecting_matching_language_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("00_intro.md"), "You are a graph explorer.").unwrap();
        fs::write(dir.path().join("language_gql.md"), "Use GQL syntax.").unwrap();
        fs::write(dir.path().join("language_gremlin.md"), "Use Gremlin syntax.").unwrap();

        let text = compose_instructions(dir.path(), "gql", &PromptSubstitutions::default()).unwrap();
        assert!(text.contains("graph explorer"));
        assert!(text.contains("GQL syntax"));
        assert!(!text.contains("Gremlin syntax"));
        assert!(text.contains("---"));
    }

    #[test]
    fn applies_substitutions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("00.md"), "Query the {graph_name} model.").unwrap();
        let subs = PromptSubstitutions {
            graph_name: Some("incident-ontology".into()),
            scenario_prefix: None,
        };
        let text = compose_instructions(dir.path(), "gql", &subs).unwrap();
        assert_eq!(text, "Query the incident-ontology model.");
    }

    #[test]
    fn single_file_is_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("orchestrator.md");
        fs::write(&file, "You are the orchestrator.").unwrap();
        let text = compose_instructions(&file, "gql", &PromptSubstitutions::default()).unwrap();
        assert_eq!(text, "You are the orchestrator.");
    }
}
