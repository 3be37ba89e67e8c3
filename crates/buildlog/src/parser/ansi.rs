//! Terminal escape stripping and line normalization
//!
//! `docker build` decorates its progress output with colors and cursor
//! movement when attached to a terminal, and remote builders relay those
//! bytes unchanged. Every raw line passes through here before classification.

use std::borrow::Cow;

/// Strip ANSI escape codes from bytes
///
/// Handles:
/// - CSI sequences: `\x1b[...m`, `\x1b[2K`, cursor movement
/// - OSC sequences: `\x1b]...` terminated by BEL or `ESC \`
/// - Fe sequences: ESC followed by a single byte in 0x40-0x5F
///
/// Returns Cow::Borrowed if no codes were found (Zero Allocation),
/// or Cow::Owned if stripping occurred.
pub fn strip_ansi_codes(input: &[u8]) -> Cow<'_, [u8]> {
    if !input.contains(&0x1b) {
        return Cow::Borrowed(input);
    }

    let mut output = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if input[i] != 0x1b {
            output.push(input[i]);
            i += 1;
            continue;
        }

        // Lone trailing ESC byte (incomplete escape sequence)
        if i + 1 >= input.len() {
            break;
        }

        match input[i + 1] {
            // CSI: parameters and intermediates, then a final byte in 0x40-0x7E
            b'[' => {
                i += 2;
                while i < input.len() {
                    let b = input[i];
                    i += 1;
                    if (0x40..=0x7E).contains(&b) {
                        break;
                    }
                }
            }
            // OSC: runs until BEL or ST
            b']' => {
                i += 2;
                while i < input.len() {
                    if input[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if input[i] == 0x1b && i + 1 < input.len() && input[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            0x40..=0x5F => i += 2,
            _ => {
                output.push(input[i]);
                i += 1;
            }
        }
    }

    Cow::Owned(output)
}

/// Normalize one raw output line.
///
/// Strips escape codes, decodes lossily (build output may carry arbitrary
/// bytes from the commands it runs), and trims surrounding whitespace.
/// Returns `None` for lines that are empty after normalization; callers skip
/// those entirely.
pub fn normalize_line(raw: &[u8]) -> Option<String> {
    let stripped = strip_ansi_codes(raw);
    let text = String::from_utf8_lossy(&stripped);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
