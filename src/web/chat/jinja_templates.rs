use std::fmt::Write as _;

use lazy_static::lazy_static;
use minijinja::{context, Environment, Error, ErrorKind};
use regex::Regex;

use super::conversation::ChatMessage;
use super::responder::{ChatTemplate, RenderOptions};
use crate::error::{ResponderError, Result};

const TEMPLATE_NAME: &str = "chat_template";

/// ChatML, used when the GGUF file carries no `tokenizer.chat_template`.
pub const CHATML_TEMPLATE: &str = "{% for message in messages %}<|im_start|>{{ message.role }}\n{{ message.content }}<|im_end|>\n{% endfor %}{% if add_generation_prompt %}<|im_start|>assistant\n{% endif %}";

lazy_static! {
    static ref ENDSWITH_RE: Regex = Regex::new(r"\.endswith\(").expect("valid regex");
    static ref STARTSWITH_RE: Regex = Regex::new(r"\.startswith\(").expect("valid regex");
    static ref STRIP_RE: Regex = Regex::new(r"\.[lr]?strip\(\)").expect("valid regex");
}

/// Preprocess a Jinja2 template string for minijinja compatibility.
///
/// Fixes Python-specific syntax that minijinja doesn't support:
/// - `tojson(ensure_ascii=False)` → `tojson`
/// - `.endswith("x")` → ` is endingwith("x")`
/// - `.startswith("x")` → ` is startingwith("x")`
/// - `.strip()` / `.lstrip()` / `.rstrip()` → ` | trim`
/// - `.items()` → ` | items`
fn preprocess_template(template: &str) -> String {
    let result = template
        .replace("tojson(ensure_ascii=False)", "tojson")
        .replace("tojson(ensure_ascii=True)", "tojson");

    let result = ENDSWITH_RE.replace_all(&result, " is endingwith(");
    let result = STARTSWITH_RE.replace_all(&result, " is startingwith(");
    let result = STRIP_RE.replace_all(&result, " | trim");

    result.replace(".items()", " | items")
}

/// A model's native Jinja2 chat template, rendered with minijinja.
///
/// The source is checked when the template is built, so a broken template
/// fails at startup instead of on the first request.
#[derive(Debug, Clone)]
pub struct JinjaChatTemplate {
    source: String,
    bos_token: String,
    eos_token: String,
}

impl JinjaChatTemplate {
    pub fn new(
        template: &str,
        bos_token: impl Into<String>,
        eos_token: impl Into<String>,
    ) -> Result<Self> {
        let chat_template = Self {
            source: preprocess_template(template),
            bos_token: bos_token.into(),
            eos_token: eos_token.into(),
        };
        chat_template.environment()?;
        Ok(chat_template)
    }

    /// Built-in ChatML template.
    pub fn chatml() -> Self {
        Self::chatml_with_tokens("", "<|im_end|>")
    }

    /// Built-in ChatML template exposing the model's own special tokens.
    pub fn chatml_with_tokens(bos_token: impl Into<String>, eos_token: impl Into<String>) -> Self {
        Self {
            source: CHATML_TEMPLATE.to_string(),
            bos_token: bos_token.into(),
            eos_token: eos_token.into(),
        }
    }

    pub fn eos_token(&self) -> &str {
        &self.eos_token
    }

    fn environment(&self) -> Result<Environment<'_>> {
        let mut env = Environment::new();

        // raise_exception(msg): used by templates for input validation
        env.add_function("raise_exception", raise_exception);
        // strftime_now(fmt): used by Mistral/Llama templates for the current date
        env.add_function("strftime_now", strftime_now);

        env.add_template(TEMPLATE_NAME, &self.source)
            .map_err(|e| ResponderError::TemplateAdd(e.to_string()))?;
        Ok(env)
    }
}

impl ChatTemplate for JinjaChatTemplate {
    fn apply(&self, messages: &[ChatMessage], options: RenderOptions) -> Result<String> {
        let env = self.environment()?;
        let template = env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| ResponderError::TemplateRender(e.to_string()))?;

        template
            .render(context! {
                messages => messages,
                add_generation_prompt => options.add_generation_prompt,
                bos_token => &self.bos_token,
                eos_token => &self.eos_token,
            })
            .map_err(|e| ResponderError::TemplateRender(e.to_string()))
    }
}

fn raise_exception(msg: String) -> std::result::Result<String, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, msg))
}

fn strftime_now(fmt: String) -> std::result::Result<String, Error> {
    let mut out = String::new();
    write!(out, "{}", chrono::Local::now().format(&fmt)).map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid strftime format: {fmt}"),
        )
    })?;
    Ok(out)
}
