//! Value templates for resource attributes.
//!
//! A template is rendered against exactly one string, exposed to the template
//! as `Value`. Both Jinja-style `{{ Value }}` and Go-style `{{.Value}}`
//! references are accepted.
//!
//! Templates are compiled and probe-rendered when they are added, so a
//! malformed template or a reference to an unknown variable is reported at
//! configuration time rather than while handling a request.
//!
//! The engine is Jinja, not Go's `text/template`. Literal text is copied
//! through unchanged, trailing newline included, with one exception: `{%`
//! and `{#` open Jinja blocks and comments, so a literal containing either
//! fails to compile. Write `{{ "{%" }}` to emit them.

use std::collections::HashSet;

use minijinja::{context, Environment, UndefinedBehavior};

/// Sample value used to probe-render templates at compile time.
const PROBE_VALUE: &str = "probe";

/// Errors raised while compiling or rendering a value template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The template source does not parse
    #[error("template {name} does not compile: {source}")]
    Compile {
        /// Template name
        name: String,
        /// Underlying engine error
        #[source]
        source: minijinja::Error,
    },

    /// Rendering the template failed
    #[error("template {name} failed to render: {source}")]
    Render {
        /// Template name
        name: String,
        /// Underlying engine error
        #[source]
        source: minijinja::Error,
    },

    /// No template with this name was added
    #[error("unknown template {0}")]
    Unknown(String),
}

/// A set of named templates, each rendered against a single value.
///
/// # Examples
///
/// ```
/// use access_gate::template::TemplateExpander;
///
/// let mut expander = TemplateExpander::new();
/// expander.add("name", "{{.Value}}").unwrap();
/// expander.add("namespace", "tenant-{{ Value }}").unwrap();
///
/// assert_eq!(expander.render("name", "alice").unwrap(), "alice");
/// assert_eq!(expander.render("namespace", "a").unwrap(), "tenant-a");
/// ```
#[derive(Debug)]
pub struct TemplateExpander {
    env: Environment<'static>,
    empty: HashSet<String>,
}

impl TemplateExpander {
    /// Creates an expander with no templates.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self {
            env,
            empty: HashSet::new(),
        }
    }

    /// Compiles `source` under `name`, replacing any previous template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Compile` if the source does not parse and
    /// `TemplateError::Render` if it references anything besides `Value`.
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        if source.is_empty() {
            self.empty.insert(name.to_string());
            return Ok(());
        }
        self.empty.remove(name);

        self.env
            .add_template_owned(name.to_string(), normalize_go_syntax(source))
            .map_err(|err| TemplateError::Compile {
                name: name.to_string(),
                source: err,
            })?;

        // Strict undefined handling only surfaces unknown variables at render time.
        self.render(name, PROBE_VALUE)?;
        Ok(())
    }

    /// Renders the template `name` against `value`.
    ///
    /// An empty template renders to an empty string.
    pub fn render(&self, name: &str, value: &str) -> Result<String, TemplateError> {
        if self.empty.contains(name) {
            return Ok(String::new());
        }

        let template = self
            .env
            .get_template(name)
            .map_err(|_| TemplateError::Unknown(name.to_string()))?;

        template
            .render(context! { Value => value })
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }
}

impl Default for TemplateExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a one-off template against `value`.
///
/// Prefer [`TemplateExpander`] for templates rendered more than once.
pub fn expand(source: &str, value: &str) -> Result<String, TemplateError> {
    let mut expander = TemplateExpander::new();
    expander.add("inline", source)?;
    expander.render("inline", value)
}

/// Rewrites Go-style field references (`{{.Value}}`) to plain identifiers.
///
/// Only the inside of `{{ ... }}` expressions is touched, and quoted string
/// literals are left alone.
fn normalize_go_syntax(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some(start) = remaining.find("{{") {
        result.push_str(&remaining[..start + 2]);
        remaining = &remaining[start + 2..];

        if let Some(end) = remaining.find("}}") {
            result.push_str(&strip_field_dots(&remaining[..end]));
            result.push_str("}}");
            remaining = &remaining[end + 2..];
        } else {
            // Unterminated expression; let the compiler report it.
            result.push_str(remaining);
            remaining = "";
        }
    }

    result.push_str(remaining);
    result
}

fn strip_field_dots(expression: &str) -> String {
    let mut result = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                result.push(c);
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                result.push(c);
            }
            None => {
                let at_operand_start =
                    prev.map_or(true, |p| p.is_whitespace() || "(|,-+~".contains(p));
                let before_ident = chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_');
                if !(c == '.' && at_operand_start && before_ident) {
                    result.push(c);
                }
            }
        }
        prev = Some(c);
    }

    result
}
