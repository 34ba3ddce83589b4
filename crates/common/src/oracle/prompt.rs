//! Named-variable prompt templates

use std::borrow::Cow;

/// Prompt text with `{name}` placeholders.
///
/// Placeholders without a supplied value are left untouched, so literal
/// braces in JSON examples survive rendering.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: Cow<'static, str>,
}

impl PromptTemplate {
    pub const fn from_static(template: &'static str) -> Self {
        Self {
            template: Cow::Borrowed(template),
        }
    }

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: Cow::Owned(template.into()),
        }
    }

    /// Substitute every `{name}` with its value in a single pass
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        let mut rendered = String::with_capacity(self.template.len());
        let mut rest: &str = &self.template;

        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let substitution = after.find('}').and_then(|close| {
                let name = &after[..close];
                variables
                    .iter()
                    .find(|(candidate, _)| *candidate == name)
                    .map(|(_, value)| (close, *value))
            });

            match substitution {
                Some((close, value)) => {
                    rendered.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }

        rendered.push_str(rest);
        rendered
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_variables() {
        let template = PromptTemplate::from_static("Query: {user_query}\nHistory: {memory}\n{\"keep\": 1}");
        let rendered = template.render(&[("user_query", "What is Section 15?"), ("memory", "none")]);

        assert_eq!(rendered, "Query: What is Section 15?\nHistory: none\n{\"keep\": 1}");
    }

    #[test]
    fn test_unknown_placeholders_survive() {
        let template = PromptTemplate::new("{a} and {b}");
        assert_eq!(template.render(&[("a", "x")]), "x and {b}");
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let template = PromptTemplate::from_static("{user_query} | {memory}");
        let rendered = template.render(&[("user_query", "quote {memory} literally"), ("memory", "m")]);
        assert_eq!(rendered, "quote {memory} literally | m");
    }
}
