use anyhow::{anyhow, Result};
use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};

/// Pull the DevTools websocket endpoint out of a single stderr line, if present.
fn parse_ws_line(line: &str) -> Option<&str> {
    let (_, tail) = line.rsplit_once("listening on ")?;
    let candidate = tail.trim();
    if candidate.starts_with("ws") && candidate.contains("devtools/browser") {
        Some(candidate)
    } else {
        None
    }
}

/// Watch a freshly launched Chromium's stderr until it announces its DevTools
/// websocket URL, or `wait` elapses.
pub async fn wait_for_ws_url(child: &mut Child, wait: Duration) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process has no stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(ws) = parse_ws_line(&line) {
                return Ok(ws.to_string());
            }
            if preview.len() < 8 {
                preview.push(line);
            }
        }
        Err(anyhow!(
            "chromium exited before announcing a devtools websocket url; stderr began: {}",
            preview.join(" | ")
        ))
    };

    timeout(wait, scan)
        .await
        .map_err(|_| anyhow!("timed out after {wait:?} waiting for chromium devtools websocket url"))?
}

#[cfg(test)]
mod tests {
    use super::parse_ws_line;

    #[test]
    fn parses_devtools_announcement() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-123";
        assert_eq!(
            parse_ws_line(line),
            Some("ws://127.0.0.1:9222/devtools/browser/abc-123")
        );
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert_eq!(parse_ws_line("Fontconfig warning: ignoring UTF-8"), None);
        assert_eq!(parse_ws_line("listening on http://127.0.0.1:8080/"), None);
    }
}
