//! Web page fetching over HTTP with optional tag stripping.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::truncate::truncate;
use super::{Context, ResultTimer, Tool, ToolError, ToolFut, arg_str};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DOWNLOAD_BYTES: usize = 1024 * 1024;

pub struct WebFetchTool;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

fn strip_html(input: &str) -> String {
    let text = HTML_TAG.replace_all(input, " ");
    let text = SPACE_RUN.replace_all(&text, " ");
    let text = NEWLINE_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

impl Tool for WebFetchTool {
    fn name(&self) -> &'static str {
        "web_fetch"
    }

    fn description(&self) -> &'static str {
        "Fetch web page content via HTTP"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "http/https URL to fetch" },
                "format": {
                    "type": "string",
                    "enum": ["text", "html"],
                    "description": "'text' (default, strips HTML) or 'html'"
                }
            },
            "required": ["url"]
        })
    }

    fn validate(&self, args: &openlink_types::ArgMap) -> Result<(), ToolError> {
        let Some(url) = arg_str(args, "url").filter(|u| !u.is_empty()) else {
            return Err(ToolError::bad_args("url is required"));
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::bad_args("only http/https URLs are supported"));
        }
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let url = arg_str(ctx.args, "url").unwrap_or_default();
            let format = arg_str(ctx.args, "format").unwrap_or("text");

            let client = match reqwest::Client::builder().timeout(FETCH_TIMEOUT).build() {
                Ok(client) => client,
                Err(err) => return timer.failure(err.to_string()),
            };

            let mut response = match client.get(url).send().await {
                Ok(response) => response,
                Err(err) => return timer.failure(err.to_string()),
            };

            let mut body: Vec<u8> = Vec::new();
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        body.extend_from_slice(&chunk);
                        if body.len() >= MAX_DOWNLOAD_BYTES {
                            body.truncate(MAX_DOWNLOAD_BYTES);
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => return timer.failure(err.to_string()),
                }
            }

            let content = String::from_utf8_lossy(&body);
            let content = if format == "html" {
                content.into_owned()
            } else {
                strip_html(&content)
            };

            let (output, _) = truncate(&content);
            timer.success(output)
        })
    }
}
