//! Externally supplied templates.
//!
//! Prompt and query templates live as UTF-8 objects in an S3 bucket owned by
//! the platform. Prompt templates carry `{}` placeholders filled
//! positionally; query templates carry `$1..$n` placeholders bound by the
//! vector store (see [`crate::database`]).

use crate::error::{Error, Result};

/// Downloads a template object.
pub async fn fetch(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<String> {
    let output = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| {
            Error::upstream(format!("cannot fetch template {key}: {e}"))
        })?;
    let bytes = output
        .body
        .collect()
        .await
        .map_err(Error::upstream)?
        .into_bytes();
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        Error::upstream(format!("template {key} is not UTF-8: {e}"))
    })
}

/// Substitutes `{}` placeholders with `args`, in order.
///
/// Surplus arguments are ignored; a template with more placeholders than
/// arguments is rejected.
pub fn render(template: &str, args: &[String]) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    let mut next = 0usize;
    while let Some(pos) = rest.find("{}") {
        let arg = args.get(next).ok_or_else(|| {
            Error::Validation(format!(
                "template expects more than {} parameter(s)",
                args.len(),
            ))
        })?;
        rendered.push_str(&rest[..pos]);
        rendered.push_str(arg);
        rest = &rest[pos + 2..];
        next += 1;
    }
    rendered.push_str(rest);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_should_substitute_placeholders_in_argument_order() {
        let rendered = render(
            "Recommend {} item types for: {}",
            &["2".to_string(), "a sci-fi fan".to_string()],
        )
        .unwrap();
        assert_eq!(rendered, "Recommend 2 item types for: a sci-fi fan");
    }

    #[test]
    fn render_should_ignore_surplus_arguments() {
        let rendered =
            render("just {}", &["one".to_string(), "two".to_string()])
                .unwrap();
        assert_eq!(rendered, "just one");
    }

    #[test]
    fn render_should_fail_when_placeholders_exceed_arguments() {
        assert!(render("{} and {}", &["one".to_string()]).is_err());
    }

    #[test]
    fn render_should_pass_through_template_without_placeholders() {
        let rendered = render("static prompt", &[]).unwrap();
        assert_eq!(rendered, "static prompt");
    }
}
