//! Minimal SRT cue parsing and serialization.
//!
//! Only the structure needed for translation: cue index, the timing line
//! (carried through verbatim), and the text lines.

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtCue {
    pub index: u32,
    /// The `00:00:01,000 --> 00:00:04,000` line, untouched.
    pub timing: String,
    pub lines: Vec<String>,
}

impl SrtCue {
    /// The cue text joined into a single line for translation.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// Parses SRT content into cues. Tolerant of CRLF line endings, BOMs and
/// blank-line runs; blocks without a timing line are skipped.
pub fn parse_srt(content: &str) -> Vec<SrtCue> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();

    for block in content.replace("\r\n", "\n").split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());

        let index_line = match lines.next() {
            Some(line) => line.trim(),
            None => continue,
        };
        let index: u32 = match index_line.parse() {
            Ok(i) => i,
            Err(_) => continue,
        };

        let timing = match lines.next() {
            Some(line) if line.contains("-->") => line.trim().to_string(),
            _ => continue,
        };

        let text: Vec<String> = lines.map(|l| l.to_string()).collect();
        cues.push(SrtCue {
            index,
            timing,
            lines: text,
        });
    }

    cues
}

/// Serializes cues back into SRT content.
pub fn format_srt(cues: &[SrtCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&cue.index.to_string());
        out.push('\n');
        out.push_str(&cue.timing);
        out.push('\n');
        for line in &cue.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
