//! Prompt templates for docstring generation.

use crate::config::DocumentationStyle;
use crate::parser::UnitKind;

/// System message sent with every request.
pub const SYSTEM_PROMPT: &str = "You are an experienced Python developer who writes precise, \
idiomatic docstrings. You answer with Python code only.";

/// Function prompt.
pub const FUNCTION_PROMPT: &str = r#"Generate a Python docstring for the function below using the {documentation_style} documentation style.

The docstring must describe what the function does, every parameter, the return value, and any exceptions it raises.
Return the complete function with the docstring added as the first statement of its body.
Do not change the function's name, signature, decorators or body in any way.

Documentation style: {documentation_style}

Function code:
```python
{code}
```
"#;

/// Class prompt. Methods get their own docstrings in the same answer.
pub const CLASS_PROMPT: &str = r#"Generate Python docstrings for the class below using the {documentation_style} documentation style.

Add a class docstring describing the purpose of the class and its attributes, and a docstring for every method defined in the class describing what it does, its parameters, its return value, and any exceptions it raises.
Return the complete class with each docstring added as the first statement of the corresponding body.
Do not rename, add, remove or modify any method, attribute or statement.

Documentation style: {documentation_style}

Class code:
```python
{code}
```
"#;

/// Fill the template for `kind` with the unit source and style name.
pub fn render(kind: UnitKind, code: &str, style: DocumentationStyle) -> String {
    let template = match kind {
        UnitKind::Function => FUNCTION_PROMPT,
        UnitKind::Class => CLASS_PROMPT,
    };
    // Style first so placeholders inside user code are left alone.
    template
        .replace("{documentation_style}", style.as_str())
        .replace("{code}", code)
}
