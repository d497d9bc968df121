//! Embedded router templates and the Python import scanner.
//!
//! Router templates carry two marker lines, `{{imports}}` and
//! `{{router_paths}}`, each behind the language's line-comment prefix.
//! [`render_template`] replaces the whole marker line (comment prefix and
//! indentation included) with the generated lines, re-indented to match.

/// Import scanner run by the default Python dependency scanner.
pub const PYTHON_SCANNER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates/scan_imports.py"));

pub const PYTHON_ROUTER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates/router.py"));
pub const NODE_ROUTER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates/router.js"));
pub const RUBY_ROUTER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates/router.rb"));

pub const IMPORTS_MARKER: &str = "{{imports}}";
pub const ROUTER_PATHS_MARKER: &str = "{{router_paths}}";

/// Substitute generated lines for each marker line in `template`.
pub fn render_template(template: &str, replacements: &[(&str, Vec<String>)]) -> String {
  let mut out = String::with_capacity(template.len());

  for line in template.lines() {
    let replacement = replacements.iter().find(|(marker, _)| line.contains(marker));
    match replacement {
      Some((_, lines)) => {
        let indent = &line[..line.len() - line.trim_start().len()];
        for generated in lines.iter() {
          out.push_str(indent);
          out.push_str(generated);
          out.push('\n');
        }
      }
      None => {
        out.push_str(line);
        out.push('\n');
      }
    }
  }

  out
}
