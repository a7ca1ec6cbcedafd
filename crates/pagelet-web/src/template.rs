//! Shared page template.
//!
//! The syntax is a small subset of Go's `text/template`:
//!
//! - `{{ .Content }}` inserts the rendered fragment verbatim.
//! - `{{ .Path }}` inserts the request path, HTML-escaped.
//! - `{{ range .Pages }}…{{ end }}` repeats its body for every page, with
//!   `{{ . }}` bound to the (escaped) page name.
//! - `{{/* … */}}` is a comment. Comments may not contain `}}`.
//! - `{{-` and `-}}` trim surrounding whitespace.
//!
//! Templates are parsed once per request and never cached.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: failed to read {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Template error: {0}")]
    Parse(String),
    #[error("Page template error: {0}")]
    Execute(String),
}

/// Values a template can reference.
#[derive(Debug, Clone, Copy)]
pub struct TemplateModel<'a> {
    pub content: &'a str,
    pub pages: &'a [String],
    pub path: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(String),
    Dot,
    Range { field: String, body: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

struct Frame {
    range_field: Option<String>,
    nodes: Vec<Node>,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut stack = vec![Frame {
            range_field: None,
            nodes: Vec::new(),
        }];
        let mut cursor = 0usize;
        let mut trim_next = false;

        while let Some(rel) = source[cursor..].find("{{") {
            let open = cursor + rel;
            let body_start = open + 2;
            let close = source[body_start..]
                .find("}}")
                .map(|i| body_start + i)
                .ok_or_else(|| {
                    TemplateError::Parse(format!("unclosed action starting at byte {open}"))
                })?;

            let mut text = &source[cursor..open];
            if trim_next {
                text = text.trim_start();
            }
            let mut action = &source[body_start..close];
            if has_left_trim(action) {
                text = text.trim_end();
                action = &action[1..];
            }
            trim_next = has_right_trim(action);
            if trim_next {
                action = &action[..action.len() - 1];
            }

            push_text(&mut stack, text);
            apply_action(&mut stack, action.trim())?;
            cursor = close + 2;
        }

        let mut tail = &source[cursor..];
        if trim_next {
            tail = tail.trim_start();
        }
        push_text(&mut stack, tail);

        if stack.len() > 1 {
            let field = stack
                .last()
                .and_then(|f| f.range_field.clone())
                .unwrap_or_default();
            return Err(TemplateError::Parse(format!(
                "unclosed {{{{ range .{field} }}}}: missing {{{{ end }}}}"
            )));
        }
        let nodes = stack.pop().map(|f| f.nodes).unwrap_or_default();
        Ok(Self { nodes })
    }

    pub fn execute(&self, model: &TemplateModel<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(model.content.len() + 256);
        render_nodes(&self.nodes, model, None, &mut out)?;
        Ok(out)
    }
}

/// Loads the template at `path` and executes it against `model`.
pub fn compose(path: &Path, model: &TemplateModel<'_>) -> Result<String, TemplateError> {
    Template::load(path)?.execute(model)
}

fn has_left_trim(action: &str) -> bool {
    action.starts_with('-') && action[1..].starts_with(char::is_whitespace)
}

fn has_right_trim(action: &str) -> bool {
    action.ends_with('-') && action[..action.len() - 1].ends_with(char::is_whitespace)
}

fn push_text(stack: &mut [Frame], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(frame) = stack.last_mut() {
        frame.nodes.push(Node::Text(text.to_string()));
    }
}

fn apply_action(stack: &mut Vec<Frame>, action: &str) -> Result<(), TemplateError> {
    if action.is_empty() {
        return Err(TemplateError::Parse("empty action {{ }}".to_string()));
    }
    if action.starts_with("/*") {
        if !action.ends_with("*/") {
            return Err(TemplateError::Parse(format!(
                "unterminated comment {{{{{action}}}}}"
            )));
        }
        return Ok(());
    }

    let node = if action == "end" {
        if stack.len() == 1 {
            return Err(TemplateError::Parse(
                "unexpected {{ end }} without range".to_string(),
            ));
        }
        let Some(frame) = stack.pop() else {
            return Ok(());
        };
        Node::Range {
            field: frame.range_field.unwrap_or_default(),
            body: frame.nodes,
        }
    } else if let Some(target) = action.strip_prefix("range ") {
        let field = parse_field(target.trim()).ok_or_else(|| {
            TemplateError::Parse(format!("range expects a field, got {:?}", target.trim()))
        })?;
        stack.push(Frame {
            range_field: Some(field),
            nodes: Vec::new(),
        });
        return Ok(());
    } else if action == "." {
        Node::Dot
    } else if let Some(field) = parse_field(action) {
        Node::Field(field)
    } else {
        return Err(TemplateError::Parse(format!(
            "unsupported action {{{{ {action} }}}}"
        )));
    };

    if let Some(frame) = stack.last_mut() {
        frame.nodes.push(node);
    }
    Ok(())
}

fn parse_field(token: &str) -> Option<String> {
    let name = token.strip_prefix('.')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(name.to_string())
}

fn render_nodes(
    nodes: &[Node],
    model: &TemplateModel<'_>,
    dot: Option<&str>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(name) => match name.as_str() {
                "Content" => out.push_str(model.content),
                "Path" => out.push_str(&escape_html(model.path)),
                "Pages" => {
                    let joined = model.pages.join(" ");
                    out.push('[');
                    out.push_str(&escape_html(&joined));
                    out.push(']');
                }
                other => {
                    return Err(TemplateError::Execute(format!(
                        "can't evaluate field {other}"
                    )));
                }
            },
            Node::Dot => {
                let value = dot.ok_or_else(|| {
                    TemplateError::Execute("{{ . }} used outside of range".to_string())
                })?;
                out.push_str(&escape_html(value));
            }
            Node::Range { field, body } => match field.as_str() {
                "Pages" => {
                    for page in model.pages {
                        render_nodes(body, model, Some(page), out)?;
                    }
                }
                "Content" | "Path" => {
                    return Err(TemplateError::Execute(format!(
                        "range can't iterate over .{field}"
                    )));
                }
                other => {
                    return Err(TemplateError::Execute(format!(
                        "can't evaluate field {other}"
                    )));
                }
            },
        }
    }
    Ok(())
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model<'a>(content: &'a str, pages: &'a [String]) -> TemplateModel<'a> {
        TemplateModel {
            content,
            pages,
            path: "/about",
        }
    }

    #[test]
    fn test_content_is_inserted_raw() {
        let tpl = Template::parse("<main>{{ .Content }}</main>").unwrap();
        let html = tpl.execute(&model("<h1>Hi & bye</h1>", &[])).unwrap();
        assert_eq!(html, "<main><h1>Hi & bye</h1></main>");
    }

    #[test]
    fn test_range_over_pages_escapes_names() {
        let pages = vec!["about".to_string(), "a<b".to_string()];
        let tpl =
            Template::parse(r#"<nav>{{range .Pages}}<a href="/{{.}}">{{ . }}</a>{{end}}</nav>"#)
                .unwrap();
        let html = tpl.execute(&model("", &pages)).unwrap();
        assert_eq!(
            html,
            r#"<nav><a href="/about">about</a><a href="/a&lt;b">a&lt;b</a></nav>"#
        );
    }

    #[test]
    fn test_trim_markers_and_comments() {
        let pages = vec!["x".to_string()];
        let tpl = Template::parse(
            "<ul>\n  {{- range .Pages }}\n  <li>{{ . }}</li>\n  {{- end }}\n</ul>{{/* nav */}}",
        )
        .unwrap();
        let html = tpl.execute(&model("", &pages)).unwrap();
        assert_eq!(html, "<ul>\n  <li>x</li>\n</ul>");
    }

    #[test]
    fn test_path_is_escaped() {
        let tpl = Template::parse("{{ .Path }}").unwrap();
        let html = tpl
            .execute(&TemplateModel {
                content: "",
                pages: &[],
                path: "/<x>",
            })
            .unwrap();
        assert_eq!(html, "/&lt;x&gt;");
    }

    #[test]
    fn test_parse_errors() {
        for source in [
            "<p>{{ .Content </p>",
            "{{ range .Pages }}<li>",
            "{{ end }}",
            "{{ }}",
            "{{ if .Content }}",
            "{{ range Pages }}{{ end }}",
        ] {
            let err = Template::parse(source).unwrap_err();
            assert!(matches!(err, TemplateError::Parse(_)), "{source}: {err}");
            assert!(err.to_string().starts_with("Template error: "));
        }
    }

    #[test]
    fn test_execute_errors() {
        for source in ["{{ .Title }}", "{{ . }}", "{{ range .Content }}{{ end }}"] {
            let tpl = Template::parse(source).expect("syntax is valid");
            let err = tpl.execute(&model("", &[])).unwrap_err();
            assert!(matches!(err, TemplateError::Execute(_)), "{source}: {err}");
            assert!(err.to_string().starts_with("Page template error: "));
        }
    }

    #[test]
    fn test_missing_template_file_is_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = compose(&dir.path().join("index.tmpl"), &model("", &[])).unwrap_err();
        assert!(matches!(err, TemplateError::Load { .. }));
        assert!(err.to_string().starts_with("Template error: failed to read"));
    }
}
