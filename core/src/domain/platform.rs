//! Host platform and the output dialects that depend on it.

use serde::{Deserialize, Serialize};

use super::listing::ListingFormat;

/// Operating system family the system commands are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Output dialect of this platform's network listing command.
    pub fn listing_format(self) -> ListingFormat {
        match self {
            Platform::Windows => ListingFormat::Netstat,
            Platform::Linux => ListingFormat::Ss,
            Platform::MacOs => ListingFormat::Lsof,
        }
    }

    /// Only the Windows console has a codepage that must be probed.
    pub fn has_console_codepage(self) -> bool {
        self == Platform::Windows
    }

    /// Extract a process name from the name lookup command output.
    ///
    /// Windows (`tasklist /FO CSV /NH`):
    /// ```text
    /// "node.exe","5432","Console","1","45,000 K"
    /// INFO: No tasks are running which match the specified criteria.
    /// ```
    ///
    /// Unix (`ps -p PID -o comm=`): the name on the first line.
    pub fn parse_process_name<S: AsRef<str>>(self, lines: &[S]) -> Option<String> {
        match self {
            Platform::Windows => {
                let line = lines.first()?.as_ref().trim();
                if line.to_lowercase().contains("info:") || !line.starts_with('"') {
                    return None;
                }
                parse_csv_line(line)
                    .first()
                    .filter(|name| !name.is_empty())
                    .map(|name| name.to_string())
            }
            Platform::Linux | Platform::MacOs => lines
                .iter()
                .map(|line| line.as_ref().trim())
                .find(|line| !line.is_empty())
                .map(str::to_string),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
            Platform::MacOs => write!(f, "macos"),
        }
    }
}

/// Parse a CSV line, handling quoted fields.
fn parse_csv_line(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut field_start: Option<usize> = None;

    for (i, c) in line.char_indices() {
        match c {
            '"' if in_quotes => {
                // End of quoted field
                if let Some(start) = field_start {
                    fields.push(&line[start..i]);
                }
                field_start = None;
                in_quotes = false;
            }
            '"' => {
                in_quotes = true;
                field_start = Some(i + 1);
            }
            ',' if !in_quotes => {
                if let Some(start) = field_start.take() {
                    fields.push(&line[start..i]);
                }
            }
            _ => {
                if field_start.is_none() && !in_quotes {
                    field_start = Some(i);
                }
            }
        }
    }

    if let Some(start) = field_start {
        if !in_quotes {
            fields.push(&line[start..]);
        }
    }

    fields
}
