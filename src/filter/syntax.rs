//! Output templates: `${name}` and `%(name)` placeholders.

use crate::context::EvaluationContext;
use crate::registry::AttributeRegistry;

/// Replace each placeholder with `lookup(name)`; unknown names are kept as
/// written.
pub fn render<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(&['$', '%'][..]) {
        let (open, close) = if rest[start..].starts_with("${") {
            ("${", '}')
        } else if rest[start..].starts_with("%(") {
            ("%(", ')')
        } else {
            out.push_str(&rest[..=start]);
            rest = &rest[start + 1..];
            continue;
        };

        let name_start = start + open.len();
        let Some(len) = rest[name_start..].find(close) else {
            break;
        };
        let name = &rest[name_start..name_start + len];
        let end = name_start + len + 1;

        out.push_str(&rest[..start]);
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..end]),
        }
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}

/// Render a per-object template through the registry's human strings.
///
/// `extra` resolves names the registry does not know, such as `status`.
pub fn render_object<T, F>(
    template: &str,
    registry: &AttributeRegistry<T>,
    object: &T,
    ctx: &mut EvaluationContext,
    mut extra: F,
) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    render(template, |name| match registry.render(name, object) {
        Some(Ok(value)) => Some(value),
        Some(Err(err)) => {
            ctx.error(format!("Failed to read {}: {}", name, err));
            Some(String::new())
        }
        None => extra(name),
    })
}
