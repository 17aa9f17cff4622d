//! Console text encoding detection.
//!
//! On Windows, command output is emitted in the active console codepage
//! (GBK on a Chinese install, windows-1252 on many Western ones), so it has
//! to be decoded with that codepage before the listing can be parsed.
//! Elsewhere the platform default is used directly.

use std::sync::OnceLock;
use std::time::Duration;

use encoding_rs::Encoding;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::commands::SystemCommands;
use crate::ports::CommandRunner;

/// Timeout for the codepage probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Text codec used to decode command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    /// The platform default: UTF-8 everywhere.
    pub fn platform_default() -> Self {
        Self(encoding_rs::UTF_8)
    }

    /// Map a Windows codepage number to a codec.
    ///
    /// Codepage 437 has no decoder of its own here; windows-1252 shares its
    /// ASCII range, which is all the parsed tools print.
    pub fn for_codepage(codepage: u32) -> Option<Self> {
        let encoding = match codepage {
            65001 => encoding_rs::UTF_8,
            936 => encoding_rs::GBK,
            54936 => encoding_rs::GB18030,
            950 => encoding_rs::BIG5,
            932 => encoding_rs::SHIFT_JIS,
            949 => encoding_rs::EUC_KR,
            866 => encoding_rs::IBM866,
            1251 => encoding_rs::WINDOWS_1251,
            437 | 1252 => encoding_rs::WINDOWS_1252,
            _ => return None,
        };
        Some(Self(encoding))
    }

    /// Canonical codec name.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Decode one raw output line, dropping the trailing line terminator.
    ///
    /// Malformed sequences are replaced rather than rejected.
    pub fn decode_line(&self, bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        let (text, _had_errors) = self.0.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Extract the codepage number: the first run of digits in the output.
///
/// ```text
/// Active code page: 65001
/// 活动代码页: 936
/// ```
pub fn parse_codepage<S: AsRef<str>>(lines: &[S]) -> Option<u32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"\d+").unwrap());

    lines
        .iter()
        .find_map(|line| digits.find(line.as_ref()))
        .and_then(|m| m.as_str().parse().ok())
}

/// Detects the console encoding once and remembers it.
///
/// The detector owns its cache, so one instance is created at startup and
/// passed to whatever needs the encoding.
pub struct EncodingDetector {
    commands: SystemCommands,
    probe_timeout: Duration,
    detected: OnceCell<TextEncoding>,
}

impl EncodingDetector {
    pub fn new(commands: SystemCommands) -> Self {
        Self {
            commands,
            probe_timeout: PROBE_TIMEOUT,
            detected: OnceCell::new(),
        }
    }

    /// Detect the console encoding. Never fails.
    ///
    /// `runner` must decode with [`TextEncoding::platform_default`]: the
    /// probe output cannot be decoded with the encoding being detected.
    /// Only the first call probes; later calls return the same value.
    pub async fn detect<R: CommandRunner>(&self, runner: &R) -> TextEncoding {
        *self
            .detected
            .get_or_init(|| self.probe(runner))
            .await
    }

    async fn probe<R: CommandRunner>(&self, runner: &R) -> TextEncoding {
        let fallback = TextEncoding::platform_default();

        let Some(spec) = self.commands.codepage_probe() else {
            debug!(encoding = fallback.name(), "No console codepage on this platform");
            return fallback;
        };

        let output = match runner.execute(&spec, self.probe_timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Codepage probe failed, using platform default");
                return fallback;
            }
        };

        let Some(codepage) = parse_codepage(&output.lines) else {
            warn!(output = ?output.lines, "No codepage in probe output, using platform default");
            return fallback;
        };

        match TextEncoding::for_codepage(codepage) {
            Some(encoding) => {
                debug!(codepage, encoding = encoding.name(), "Detected console encoding");
                encoding
            }
            None => {
                warn!(codepage, "Unknown codepage, using platform default");
                fallback
            }
        }
    }
}

impl Default for EncodingDetector {
    fn default() -> Self {
        Self::new(SystemCommands::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use crate::testing::{Reply, ScriptedRunner};

    #[test]
    fn test_parse_codepage() {
        assert_eq!(parse_codepage(&["Active code page: 65001"]), Some(65001));
        assert_eq!(parse_codepage(&["活动代码页: 936"]), Some(936));
        assert_eq!(parse_codepage(&["", "Page de codes active : 850."]), Some(850));
        assert_eq!(parse_codepage(&["no digits here"]), None);
        let empty: [&str; 0] = [];
        assert_eq!(parse_codepage(&empty), None);
    }

    #[test]
    fn test_codepage_table() {
        assert_eq!(TextEncoding::for_codepage(65001).unwrap().name(), "UTF-8");
        assert_eq!(TextEncoding::for_codepage(936).unwrap().name(), "GBK");
        assert_eq!(TextEncoding::for_codepage(950).unwrap().name(), "Big5");
        assert_eq!(TextEncoding::for_codepage(1252).unwrap().name(), "windows-1252");
        assert_eq!(TextEncoding::for_codepage(437).unwrap().name(), "windows-1252");
        assert!(TextEncoding::for_codepage(12345).is_none());
    }

    #[test]
    fn test_decode_line_strips_terminator() {
        let utf8 = TextEncoding::platform_default();
        assert_eq!(utf8.decode_line(b"LISTENING 12\r\n"), "LISTENING 12");
        assert_eq!(utf8.decode_line(b"tail"), "tail");

        // "监听" in GBK
        let gbk = TextEncoding::for_codepage(936).unwrap();
        assert_eq!(gbk.decode_line(&[0xBC, 0xE0, 0xCC, 0xFD, b'\n']), "监听");
    }

    #[tokio::test]
    async fn test_detect_maps_probe_output() {
        let runner = ScriptedRunner::new().on("cmd.exe", [Reply::lines(0, ["Active code page: 936"])]);
        let detector = EncodingDetector::new(SystemCommands::new(Platform::Windows));

        assert_eq!(detector.detect(&runner).await.name(), "GBK");
    }

    #[tokio::test]
    async fn test_detect_is_memoized() {
        let runner = ScriptedRunner::new().on(
            "cmd.exe",
            [
                Reply::lines(0, ["Active code page: 65001"]),
                Reply::lines(0, ["Active code page: 936"]),
            ],
        );
        let detector = EncodingDetector::new(SystemCommands::new(Platform::Windows));

        let first = detector.detect(&runner).await;
        let second = detector.detect(&runner).await;

        assert_eq!(first.name(), "UTF-8");
        assert_eq!(first, second);
        assert_eq!(runner.count("cmd.exe"), 1);
    }

    #[tokio::test]
    async fn test_detect_falls_back() {
        let fallback = TextEncoding::platform_default();

        let runner = ScriptedRunner::new().on("cmd.exe", [Reply::Timeout]);
        let detector = EncodingDetector::new(SystemCommands::new(Platform::Windows));
        assert_eq!(detector.detect(&runner).await, fallback);

        let runner = ScriptedRunner::new().on("cmd.exe", [Reply::lines(0, ["Active code page: 12345"])]);
        let detector = EncodingDetector::new(SystemCommands::new(Platform::Windows));
        assert_eq!(detector.detect(&runner).await, fallback);

        let runner = ScriptedRunner::new().on("cmd.exe", [Reply::lines(1, Vec::<String>::new())]);
        let detector = EncodingDetector::new(SystemCommands::new(Platform::Windows));
        assert_eq!(detector.detect(&runner).await, fallback);
    }

    #[tokio::test]
    async fn test_detect_skips_probe_off_windows() {
        let runner = ScriptedRunner::new();
        let detector = EncodingDetector::new(SystemCommands::new(Platform::Linux));

        assert_eq!(detector.detect(&runner).await, TextEncoding::platform_default());
        assert!(runner.calls().is_empty());
    }
}
