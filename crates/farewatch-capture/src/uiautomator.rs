//! Snapshots from `uiautomator dump` over adb.
//!
//! The dump is an XML tree of `<node>` elements, one per view, in pre-order.
//! Each node's `text` and `content-desc` attributes become fragments, text
//! first. Only nodes belonging to the target package contribute; when no node
//! does, the target app is not in the foreground and no snapshot is produced.

use std::time::Duration;

use chrono::Utc;
use regex::Regex;

use farewatch_core::config::CaptureConfig;

use crate::error::CaptureError;
use crate::{Snapshot, SnapshotSource};

const DUMP_TIMEOUT_MS: u64 = 10_000;

/// Extracts fragments from uiautomator XML.
#[derive(Debug, Clone)]
pub struct UiDumpParser {
    node: Regex,
    attr: Regex,
}

impl Default for UiDumpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UiDumpParser {
    pub fn new() -> Self {
        Self {
            node: Regex::new(r"<node\b([^>]*)>").expect("Invalid node regex"),
            attr: Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("Invalid attribute regex"),
        }
    }

    /// Fragments of `package` in document order, or `None` if the package has
    /// no nodes in the dump.
    pub fn fragments(&self, xml: &str, package: &str) -> Option<Vec<String>> {
        let mut seen_package = false;
        let mut fragments = Vec::new();

        for node in self.node.captures_iter(xml) {
            let mut node_package = None;
            let mut text = None;
            let mut desc = None;
            for attr in self.attr.captures_iter(&node[1]) {
                match &attr[1] {
                    "package" => node_package = attr.get(2).map(|m| m.as_str()),
                    "text" => text = attr.get(2).map(|m| m.as_str()),
                    "content-desc" => desc = attr.get(2).map(|m| m.as_str()),
                    _ => {}
                }
            }
            if node_package != Some(package) {
                continue;
            }
            seen_package = true;
            for value in [text, desc].into_iter().flatten() {
                if !value.is_empty() {
                    fragments.push(unescape_xml(value));
                }
            }
        }

        seen_package.then_some(fragments)
    }
}

/// Decode the predefined XML entities and numeric character references.
///
/// Unknown or malformed entities are kept verbatim.
pub fn unescape_xml(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Reads the device screen with `adb exec-out uiautomator dump /dev/tty`.
pub struct UiDumpSource {
    capture: CaptureConfig,
    parser: UiDumpParser,
}

impl UiDumpSource {
    pub fn new(capture: CaptureConfig) -> Self {
        Self {
            capture,
            parser: UiDumpParser::new(),
        }
    }

    async fn dump(&self) -> Result<String, CaptureError> {
        let args = self
            .capture
            .adb_args(&["exec-out", "uiautomator", "dump", "/dev/tty"]);

        let child = tokio::process::Command::new(&self.capture.adb_path)
            .args(&args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::CommandFailed(format!("failed to run {}: {}", self.capture.adb_path, e))
            })?;

        let output = tokio::time::timeout(
            Duration::from_millis(DUMP_TIMEOUT_MS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| CaptureError::Timeout(DUMP_TIMEOUT_MS))?
        .map_err(|e| CaptureError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(CaptureError::CommandFailed(format!(
                "adb exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let xml = String::from_utf8_lossy(&output.stdout).into_owned();
        if !xml.contains("<hierarchy") {
            return Err(CaptureError::Malformed(
                xml.lines().next().unwrap_or_default().to_string(),
            ));
        }
        Ok(xml)
    }
}

impl SnapshotSource for UiDumpSource {
    async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError> {
        let xml = self.dump().await?;
        let fragments = self
            .parser
            .fragments(&xml, &self.capture.target_package);

        tracing::trace!(
            package = %self.capture.target_package,
            fragments = fragments.as_ref().map_or(0, Vec::len),
            "UI dump parsed"
        );

        Ok(fragments.map(|fragments| Snapshot {
            package: self.capture.target_package.clone(),
            fragments,
            captured_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.taxis99" content-desc="" bounds="[0,0][1080,2340]"><node index="0" text="R$ 15,00" class="android.widget.TextView" package="com.taxis99" content-desc="" bounds="[40,1500][400,1560]" /><node index="1" text="R$ 3,00/km" class="android.widget.TextView" package="com.taxis99" content-desc="" bounds="[40,1560][400,1620]" /><node index="2" text="" class="android.view.View" package="com.taxis99" content-desc="2,5 km" bounds="[40,1620][400,1680]" /><node index="3" text="5,0 km" class="android.widget.TextView" package="com.taxis99" content-desc="Trip &amp; route" bounds="[40,1680][400,1740]" /></node></hierarchy>UI hierchary dumped to: /dev/tty"#;

    #[test]
    fn test_fragments_in_document_order() {
        let parser = UiDumpParser::new();
        let fragments = parser.fragments(DUMP, "com.taxis99").unwrap();
        assert_eq!(
            fragments,
            vec!["R$ 15,00", "R$ 3,00/km", "2,5 km", "5,0 km", "Trip & route"]
        );
    }

    #[test]
    fn test_other_package_in_foreground() {
        let parser = UiDumpParser::new();
        assert_eq!(parser.fragments(DUMP, "com.example.other"), None);
    }

    #[test]
    fn test_only_target_package_nodes_contribute() {
        let xml = r#"<hierarchy><node text="R$ 9,00" package="com.android.systemui" content-desc="" /><node text="R$ 3,00/km" package="com.taxis99" content-desc="" /></hierarchy>"#;
        let fragments = UiDumpParser::new().fragments(xml, "com.taxis99").unwrap();
        assert_eq!(fragments, vec!["R$ 3,00/km"]);
    }

    #[test]
    fn test_target_package_without_text() {
        let xml = r#"<hierarchy><node text="" package="com.taxis99" content-desc="" /></hierarchy>"#;
        let fragments = UiDumpParser::new().fragments(xml, "com.taxis99").unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("plain"), "plain");
        assert_eq!(unescape_xml("a &amp; b"), "a & b");
        assert_eq!(unescape_xml("&lt;b&gt; &quot;x&quot; &apos;y&apos;"), "<b> \"x\" 'y'");
        assert_eq!(unescape_xml("line&#10;break"), "line\nbreak");
        assert_eq!(unescape_xml("&#x52;$ 5"), "R$ 5");
    }

    #[test]
    fn test_unescape_xml_keeps_unknown_entities() {
        assert_eq!(unescape_xml("&nbsp;"), "&nbsp;");
        assert_eq!(unescape_xml("R$ 5 & up"), "R$ 5 & up");
        assert_eq!(unescape_xml("&#xZZ;"), "&#xZZ;");
    }

    #[tokio::test]
    async fn test_missing_adb_binary() {
        let source = UiDumpSource::new(CaptureConfig {
            adb_path: "/nonexistent/farewatch-adb".to_string(),
            ..CaptureConfig::default()
        });
        let err = source.snapshot().await.unwrap_err();
        assert!(matches!(err, CaptureError::CommandFailed(_)));
    }
}
