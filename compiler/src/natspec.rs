//! NatSpec documentation and interface rendering.
//!
//! Doc comments attach to contracts and functions during parsing; this
//! module parses their tags (`@title`, `@author`, `@notice`, `@dev`,
//! `@param`, `@return`) and renders the four documentation artifacts the
//! driver exposes.

use crate::abi;
use crate::errors::{CompileError, CompileResult};
use pact_analyzer::context::{AnalysisContext, ContractAttributes};
use pact_parser::ast;
use pact_parser::node::Node;
use serde_json::{json, Map, Value};

/// The kinds of per-contract documentation the driver can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentationKind {
    NatspecUser,
    NatspecDev,
    Abi,
    /// The contract re-rendered as a bodyless interface.
    SourceInterface,
}

/// Computes interface and documentation artifacts for resolved contracts.
#[derive(Default)]
pub struct InterfaceHandler;

impl InterfaceHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn documentation(
        &self,
        analysis: &AnalysisContext,
        contract: &Node<ast::Contract>,
        attrs: &ContractAttributes,
        kind: DocumentationKind,
    ) -> CompileResult<String> {
        match kind {
            DocumentationKind::NatspecUser => self.user_documentation(analysis, contract),
            DocumentationKind::NatspecDev => self.dev_documentation(analysis, contract),
            DocumentationKind::Abi => abi::builder::contract_abi(analysis, attrs).json(),
            DocumentationKind::SourceInterface => self.source_interface(attrs),
        }
    }

    /// End-user documentation: the `@notice` text of each public function,
    /// keyed by canonical signature.
    pub fn user_documentation(
        &self,
        analysis: &AnalysisContext,
        contract: &Node<ast::Contract>,
    ) -> CompileResult<String> {
        let mut methods = Map::new();
        for func in contract.kind.functions() {
            let Some(doc) = &func.kind.doc else { continue };
            let Some(sig) = analysis.get_function(func.id) else {
                continue;
            };
            let tags = DocTags::parse(doc);
            if let Some(notice) = tags.notice {
                methods.insert(sig.selector_signature(), json!({ "notice": notice }));
            }
        }
        Ok(serde_json::to_string(&json!({ "methods": methods }))?)
    }

    /// Developer documentation: `@dev` details, parameter descriptions and
    /// return notes, plus contract-level `@title` and `@author`.
    pub fn dev_documentation(
        &self,
        analysis: &AnalysisContext,
        contract: &Node<ast::Contract>,
    ) -> CompileResult<String> {
        let mut root = Map::new();
        if let Some(doc) = &contract.kind.doc {
            let tags = DocTags::parse(doc);
            if let Some(title) = tags.title {
                root.insert("title".to_string(), Value::String(title));
            }
            if let Some(author) = tags.author {
                root.insert("author".to_string(), Value::String(author));
            }
        }

        let mut methods = Map::new();
        for func in contract.kind.functions() {
            let Some(doc) = &func.kind.doc else { continue };
            let Some(sig) = analysis.get_function(func.id) else {
                continue;
            };
            let tags = DocTags::parse(doc);
            let mut method = Map::new();
            if let Some(dev) = tags.dev {
                method.insert("details".to_string(), Value::String(dev));
            }
            if !tags.params.is_empty() {
                let params: Map<String, Value> = tags
                    .params
                    .into_iter()
                    .map(|(name, text)| (name, Value::String(text)))
                    .collect();
                method.insert("params".to_string(), Value::Object(params));
            }
            if let Some(ret) = tags.ret {
                method.insert("return".to_string(), Value::String(ret));
            }
            if !method.is_empty() {
                methods.insert(sig.selector_signature(), Value::Object(method));
            }
        }
        root.insert("methods".to_string(), Value::Object(methods));
        Ok(serde_json::to_string(&Value::Object(root))?)
    }

    /// The contract's public surface rendered back as source with bodies
    /// stripped.
    pub fn source_interface(&self, attrs: &ContractAttributes) -> CompileResult<String> {
        let mut out = format!("contract {} {{", attrs.name);
        for sig in attrs.public_functions() {
            let params = sig
                .params
                .iter()
                .map(|(name, typ)| format!("{} {}", typ, name))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\n    function {}({}) public", sig.name, params));
            if !sig.returns.is_empty() {
                let returns = sig
                    .returns
                    .iter()
                    .map(|typ| typ.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(" returns ({})", returns));
            }
            out.push(';');
        }
        out.push_str("\n}");
        Ok(out)
    }
}

#[derive(Default)]
struct DocTags {
    title: Option<String>,
    author: Option<String>,
    notice: Option<String>,
    dev: Option<String>,
    params: Vec<(String, String)>,
    ret: Option<String>,
}

impl DocTags {
    /// Parse a doc block. Untagged leading text counts as `@notice`;
    /// continuation lines append to the preceding tag.
    fn parse(doc: &str) -> Self {
        let mut tags = DocTags::default();
        let mut current: Option<(&str, String)> = Some(("notice", String::new()));

        let mut flush = |tags: &mut DocTags, entry: Option<(&str, String)>| {
            let Some((tag, text)) = entry else { return };
            let text = text.trim().to_string();
            if text.is_empty() {
                return;
            }
            match tag {
                "title" => tags.title = Some(text),
                "author" => tags.author = Some(text),
                "notice" => tags.notice = Some(text),
                "dev" => tags.dev = Some(text),
                "return" => tags.ret = Some(text),
                "param" => {
                    let mut parts = text.splitn(2, char::is_whitespace);
                    let name = parts.next().unwrap_or_default().to_string();
                    let rest = parts.next().unwrap_or_default().trim().to_string();
                    tags.params.push((name, rest));
                }
                _ => {}
            }
        };

        for line in doc.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix('@') {
                let mut parts = rest.splitn(2, char::is_whitespace);
                let tag = parts.next().unwrap_or_default();
                let text = parts.next().unwrap_or_default().to_string();
                flush(&mut tags, current.take());
                current = Some((
                    match tag {
                        "title" => "title",
                        "author" => "author",
                        "notice" => "notice",
                        "dev" => "dev",
                        "param" => "param",
                        "return" => "return",
                        _ => "notice",
                    },
                    text,
                ));
            } else if let Some((_, text)) = &mut current {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(line);
            }
        }
        flush(&mut tags, current.take());
        tags
    }
}

/// Map a user-facing documentation name to its kind; unknown names are a
/// driver-misuse error.
pub fn documentation_kind(name: &str) -> CompileResult<DocumentationKind> {
    match name {
        "user" => Ok(DocumentationKind::NatspecUser),
        "dev" => Ok(DocumentationKind::NatspecDev),
        "abi" => Ok(DocumentationKind::Abi),
        "interface" => Ok(DocumentationKind::SourceInterface),
        other => Err(CompileError::compiler(format!(
            "unknown documentation type `{}`",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{documentation_kind, DocTags, DocumentationKind};

    #[test]
    fn kind_lookup() {
        assert_eq!(documentation_kind("abi").unwrap(), DocumentationKind::Abi);
        assert_eq!(
            documentation_kind("user").unwrap(),
            DocumentationKind::NatspecUser
        );
        assert!(documentation_kind("bogus").is_err());
    }

    #[test]
    fn parses_tags_and_continuations() {
        let tags = DocTags::parse(
            "@title A registry\n@author The Pact Developers\n@notice Registers a name\nacross lines\n@param name the name\n@return whether it worked",
        );
        assert_eq!(tags.title.as_deref(), Some("A registry"));
        assert_eq!(tags.author.as_deref(), Some("The Pact Developers"));
        assert_eq!(tags.notice.as_deref(), Some("Registers a name across lines"));
        assert_eq!(tags.params, vec![("name".to_string(), "the name".to_string())]);
        assert_eq!(tags.ret.as_deref(), Some("whether it worked"));
    }

    #[test]
    fn untagged_text_is_notice() {
        let tags = DocTags::parse("just a note");
        assert_eq!(tags.notice.as_deref(), Some("just a note"));
    }
}
