//! definition documents
//!
//! A definition is an HCL document listing the sources of a combined configuration:
//!
//! ```hcl
//! header {
//!   result { force_reload_check = true }
//!   combiner {
//!     override   { list_nodes = ["table"] }
//!     additional { list_nodes = ["server"] }
//!   }
//! }
//!
//! override {
//!   properties {
//!     file        = "app.properties"
//!     config_name = "app"
//!   }
//! }
//!
//! additional {
//!   json {
//!     file     = "extra.json"
//!     optional = true
//!   }
//! }
//!
//! # outside of header/override/additional: same as inside override
//! yaml { file = "defaults.yaml" }
//! ```
//!
//! Every block in a source section is a [SourceDeclaration]: the block identifier is the tag, the
//! evaluated attributes are its parameters. See [crate::provider] for how declarations become
//! sources.
use crate::provider::SourceDeclaration;
use crate::sources::LoadError;
use crate::util::{split_list, LIST_DELIMITER};
use crate::value::Value;
use hcl::eval::Evaluate;
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Definition {
    pub force_reload_check: bool,
    pub override_list_nodes: Vec<String>,
    pub additional_list_nodes: Vec<String>,
    pub overrides: Vec<SourceDeclaration>,
    pub additional: Vec<SourceDeclaration>,
}

impl Definition {
    /// Parse a definition file; relative paths inside resolve against its directory
    pub fn load_file(path: &Path) -> Result<Definition, LoadError> {
        let path = path.canonicalize()?;
        tracing::info!(path = %path.display(), "load definition");

        let text = std::fs::read_to_string(&path)?;
        Definition::parse(&text, path.parent())
    }

    pub fn parse(text: &str, base_dir: Option<&Path>) -> Result<Definition, LoadError> {
        let body = hcl_edit::parser::parse_body(text)?;
        let base_dir = base_dir.map(Path::to_path_buf);
        let mut definition = Definition::default();
        // declarations outside of any section come before the override section
        let mut top_level = vec![];
        let mut override_section = vec![];

        for structure in body.into_iter() {
            match structure {
                Structure::Block(block) => match ident(&block).as_str() {
                    "header" => definition.read_header(block.body)?,
                    "override" => override_section.extend(declarations(block.body, &base_dir)?),
                    "additional" => definition
                        .additional
                        .extend(declarations(block.body, &base_dir)?),
                    _ => top_level.push(declaration(block, &base_dir)?),
                },
                Structure::Attribute(attribute) => {
                    tracing::warn!(
                        key = attribute.key.value().as_str(),
                        "ignore attribute outside of a block"
                    )
                }
            }
        }

        definition.overrides = top_level;
        definition.overrides.extend(override_section);

        tracing::debug!(
            overrides = definition.overrides.len(),
            additional = definition.additional.len(),
            "definition parsed"
        );
        Ok(definition)
    }

    fn read_header(&mut self, header: Body) -> Result<(), LoadError> {
        for block in blocks(header) {
            match ident(&block).as_str() {
                "result" => {
                    for (key, value) in attributes(block.body)? {
                        if key == "force_reload_check" {
                            self.force_reload_check =
                                value.as_bool().ok_or(LoadError::InvalidBoolean(key))?;
                        }
                    }
                }
                "combiner" => {
                    for section in blocks(block.body) {
                        let target = match ident(&section).as_str() {
                            "override" => &mut self.override_list_nodes,
                            "additional" => &mut self.additional_list_nodes,
                            other => {
                                tracing::warn!(section = other, "ignore unknown combiner section");
                                continue;
                            }
                        };
                        if let Some(list_nodes) = attributes(section.body)?.shift_remove("list_nodes")
                        {
                            target.extend(string_list(list_nodes));
                        }
                    }
                }
                other => tracing::warn!(block = other, "ignore unknown header block"),
            }
        }
        Ok(())
    }
}

fn declarations(
    section: Body,
    base_dir: &Option<PathBuf>,
) -> Result<Vec<SourceDeclaration>, LoadError> {
    blocks(section)
        .map(|block| declaration(block, base_dir))
        .collect()
}

fn declaration(block: Block, base_dir: &Option<PathBuf>) -> Result<SourceDeclaration, LoadError> {
    let tag = ident(&block);
    let parameters = attributes(block.body)?;

    let mut declaration = SourceDeclaration::new(tag, parameters);
    declaration.base_dir = base_dir.clone();
    Ok(declaration)
}

fn ident(block: &Block) -> String {
    block.ident.value().as_str().to_string()
}

fn blocks(body: Body) -> impl Iterator<Item = Block> {
    body.into_iter().filter_map(|structure| match structure {
        Structure::Block(block) => Some(block),
        Structure::Attribute(_) => None,
    })
}

/// Evaluated attributes of a body, in document order; `null` attributes are left out
fn attributes(body: Body) -> Result<IndexMap<String, Value>, LoadError> {
    let context = hcl::eval::Context::new();
    let mut attributes = IndexMap::new();

    for structure in body.into_iter() {
        let Structure::Attribute(attribute) = structure else {
            continue;
        };
        let (key, value) = evaluate(attribute, &context)?;
        if let Some(value) = value {
            attributes.insert(key, value);
        }
    }
    Ok(attributes)
}

fn evaluate(
    attribute: Attribute,
    context: &hcl::eval::Context,
) -> Result<(String, Option<Value>), LoadError> {
    let key = attribute.key.value().as_str().to_string();
    let expression: hcl::Expression = attribute.value.into();
    let value = expression.evaluate(context)?;
    Ok((key, Value::from_hcl(value)))
}

/// `["a", "b"]` or `"a, b"`
fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::to_scalar_string)
            .collect(),
        Value::String(s) => split_list(&s, LIST_DELIMITER),
        other => other.to_scalar_string().into_iter().collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections() {
        let definition = Definition::parse(
            r#"
            header {
              result { force_reload_check = true }
              combiner {
                override   { list_nodes = ["table"] }
                additional { list_nodes = "server, host" }
              }
            }
            override {
              properties {
                file        = "app.properties"
                config_name = "app"
              }
            }
            additional {
              json {
                file     = "extra.json"
                optional = true
              }
            }
            yaml { file = "defaults.yaml" }
            "#,
            Some(Path::new("/etc/app")),
        )
        .unwrap();

        assert!(definition.force_reload_check);
        assert_eq!(definition.override_list_nodes, vec!["table"]);
        assert_eq!(definition.additional_list_nodes, vec!["server", "host"]);

        let tags: Vec<_> = definition.overrides.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["yaml", "properties"]);
        assert_eq!(definition.overrides[1].name(), Some("app".to_string()));
        assert_eq!(
            definition.overrides[1].base_dir.as_deref(),
            Some(Path::new("/etc/app"))
        );

        assert_eq!(definition.additional.len(), 1);
        assert!(definition.additional[0].is_optional().unwrap());
    }

    #[test]
    fn invalid_force_reload_check() {
        let result = Definition::parse(
            r#"
            header {
              result {
                force_reload_check = "sometimes"
              }
            }
            "#,
            None,
        );

        assert!(matches!(result, Err(LoadError::InvalidBoolean(_))));
    }

    #[test]
    fn top_level_declarations_come_first() {
        let definition = Definition::parse(
            r#"
            override {
              json {
                file = "a.json"
              }
            }
            yaml {
              file = "b.yaml"
            }
            "#,
            None,
        )
        .unwrap();

        let tags: Vec<_> = definition.overrides.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["yaml", "json"]);
    }

    #[test]
    fn invalid_document() {
        assert!(matches!(
            Definition::parse("header {", None),
            Err(LoadError::DefinitionParseFailed(_))
        ));
    }
}
