//! Stream demultiplexer.
//!
//! The debugger's stdout/stderr carry ordinary interactive text with
//! structured packets spliced in, framed on both sides by [`PACKET_TAG`].
//! Chunks arrive with arbitrary boundaries: a boundary may bisect the
//! sentinel itself, a packet payload, or a multi-byte character. The
//! demultiplexer keeps a small carry buffer of bytes it cannot yet commit
//! to either channel. Display text is flushed on every push; payload text
//! is retained until its closing sentinel arrives and is never shown.

use tracing::warn;

/// Sentinel framing a packet: appears immediately before and after the payload.
pub const PACKET_TAG: &str = "##!@";

const TAG: &[u8] = PACKET_TAG.as_bytes();

/// Output of one [`StreamDemux::push`] call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Demuxed {
    /// Interactive text, with `\n` re-emitted as `\n\r` for the terminal.
    pub display: String,
    /// Fully-assembled packet payloads, in stream order.
    pub packets: Vec<String>,
}

/// Incremental splitter of the combined output stream.
#[derive(Debug, Default)]
pub struct StreamDemux {
    /// Whether the scanner is between an opening and closing sentinel.
    in_packet: bool,
    /// Payload bytes accumulated so far while in a packet.
    packet_buf: Vec<u8>,
    /// Trailing bytes withheld from the previous chunk: a possible sentinel
    /// prefix or an incomplete UTF-8 sequence.
    carry: Vec<u8>,
}

impl StreamDemux {
    /// Create a demultiplexer in the normal (display) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a packet has been opened but not yet closed.
    pub fn in_packet(&self) -> bool {
        self.in_packet
    }

    /// Consume the next output chunk, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Demuxed {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);

        let mut out = Demuxed::default();
        let mut offset = 0;
        loop {
            match find_tag(&buf[offset..]) {
                Some(idx) => {
                    let before = &buf[offset..offset + idx];
                    if self.in_packet {
                        let mut payload = std::mem::take(&mut self.packet_buf);
                        payload.extend_from_slice(before);
                        match String::from_utf8(payload) {
                            Ok(s) => out.packets.push(s),
                            Err(e) => warn!("dropping packet with invalid UTF-8: {e}"),
                        }
                        self.in_packet = false;
                    } else {
                        push_display(&mut out.display, before);
                        self.in_packet = true;
                    }
                    offset += idx + TAG.len();
                }
                None => {
                    let rest = &buf[offset..];
                    let hold = hold_len(rest);
                    let (emit, keep) = rest.split_at(rest.len() - hold);
                    if self.in_packet {
                        self.packet_buf.extend_from_slice(emit);
                    } else {
                        push_display(&mut out.display, emit);
                    }
                    self.carry = keep.to_vec();
                    break;
                }
            }
        }
        out
    }
}

/// Find the next full sentinel in `bytes`.
fn find_tag(bytes: &[u8]) -> Option<usize> {
    bytes.windows(TAG.len()).position(|w| w == TAG)
}

/// How many trailing bytes must be withheld until the next chunk.
fn hold_len(bytes: &[u8]) -> usize {
    trailing_tag_prefix_len(bytes).max(incomplete_utf8_suffix_len(bytes))
}

/// Length of the longest proper sentinel prefix that ends `bytes`.
fn trailing_tag_prefix_len(bytes: &[u8]) -> usize {
    let max = (TAG.len() - 1).min(bytes.len());
    for k in (1..=max).rev() {
        if bytes[bytes.len() - k..] == TAG[..k] {
            return k;
        }
    }
    0
}

/// Length of an incomplete UTF-8 sequence that ends `bytes`, or 0.
fn incomplete_utf8_suffix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let start = len.saturating_sub(3);
    for i in (start..len).rev() {
        let b = bytes[i];
        if b < 0x80 {
            return 0;
        }
        if b >= 0xC0 {
            let need = if b >= 0xF0 {
                4
            } else if b >= 0xE0 {
                3
            } else {
                2
            };
            let have = len - i;
            return if have < need { have } else { 0 };
        }
        // continuation byte, keep scanning back
    }
    0
}

/// Append display bytes, translating each line feed to `\n\r`.
fn push_display(out: &mut String, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    for ch in String::from_utf8_lossy(bytes).chars() {
        out.push(ch);
        if ch == '\n' {
            out.push('\r');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `chunks` through a fresh demultiplexer and concatenate outputs.
    fn run(chunks: &[&[u8]]) -> Demuxed {
        let mut demux = StreamDemux::new();
        let mut total = Demuxed::default();
        for chunk in chunks {
            let out = demux.push(chunk);
            total.display.push_str(&out.display);
            total.packets.extend(out.packets);
        }
        total
    }

    const STOP_PACKET: &str = r#"{"functionName":"handleStopEvent","args":{}}"#;

    #[test]
    fn plain_text_passes_through() {
        let out = run(&[b"(gdb) "]);
        assert_eq!(out.display, "(gdb) ");
        assert!(out.packets.is_empty());
    }

    #[test]
    fn newlines_translated_to_newline_carriage_return() {
        let out = run(&[b"one\ntwo\nthree"]);
        assert_eq!(out.display, "one\n\rtwo\n\rthree");
    }

    #[test]
    fn trailing_newline_translated() {
        let out = run(&[b"done\n"]);
        assert_eq!(out.display, "done\n\r");
    }

    #[test]
    fn packet_in_single_chunk() {
        let stream = format!("before##!@{STOP_PACKET}##!@after");
        let out = run(&[stream.as_bytes()]);
        assert_eq!(out.display, "beforeafter");
        assert_eq!(out.packets, vec![STOP_PACKET.to_string()]);
    }

    #[test]
    fn sentinel_split_across_chunks() {
        // Scenario: the opening sentinel is bisected, and the payload
        // continues into the second chunk.
        let tail = format!("@{STOP_PACKET}##!@post");
        let out = run(&[b"pre ##!", tail.as_bytes()]);
        assert_eq!(out.display, "pre post");
        assert_eq!(out.packets, vec![STOP_PACKET.to_string()]);
    }

    #[test]
    fn payload_split_across_chunks() {
        let stream = format!("##!@{STOP_PACKET}##!@");
        let bytes = stream.as_bytes();
        let out = run(&[&bytes[..10], &bytes[10..30], &bytes[30..]]);
        assert_eq!(out.display, "");
        assert_eq!(out.packets, vec![STOP_PACKET.to_string()]);
    }

    #[test]
    fn multiple_packets_in_one_chunk() {
        let stream = format!("a##!@{STOP_PACKET}##!@b##!@{STOP_PACKET}##!@c\n");
        let out = run(&[stream.as_bytes()]);
        assert_eq!(out.display, "abc\n\r");
        assert_eq!(out.packets.len(), 2);
    }

    #[test]
    fn chunking_invariance() {
        // The same stream must demultiplex identically for every 2-way
        // split and for the fully byte-at-a-time chunking.
        let stream = format!("hello\n##!@{STOP_PACKET}##!@world##!@{STOP_PACKET}##!@\n");
        let bytes = stream.as_bytes();
        let reference = run(&[bytes]);
        assert_eq!(reference.packets.len(), 2);

        for split in 0..=bytes.len() {
            let out = run(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(out, reference, "split at {split}");
        }

        let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(run(&single_bytes), reference);
    }

    #[test]
    fn tag_prefix_in_display_text_is_preserved() {
        // "##" that never completes a sentinel must still be displayed.
        let out = run(&[b"a##", b"b"]);
        assert_eq!(out.display, "a##b");
    }

    #[test]
    fn tag_prefix_before_real_tag() {
        let stream = format!("##!##!@{STOP_PACKET}##!@");
        let out = run(&[stream.as_bytes()]);
        assert_eq!(out.display, "##!");
        assert_eq!(out.packets.len(), 1);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "värde\n".as_bytes();
        // Split inside the two-byte 'ä'.
        let out = run(&[&text[..2], &text[2..]]);
        assert_eq!(out.display, "värde\n\r");
    }

    #[test]
    fn empty_payload_yields_empty_packet_string() {
        let out = run(&[b"##!@##!@"]);
        assert_eq!(out.packets, vec![String::new()]);
    }

    #[test]
    fn invalid_utf8_payload_dropped() {
        let out = run(&[b"##!@\xff\xfe##!@ok"]);
        assert!(out.packets.is_empty());
        assert_eq!(out.display, "ok");
    }

    #[test]
    fn partial_payload_never_displayed() {
        let mut demux = StreamDemux::new();
        let out = demux.push(b"##!@{\"functionName\":");
        assert_eq!(out.display, "");
        assert!(out.packets.is_empty());
        assert!(demux.in_packet());
    }

    #[test]
    fn display_resumes_after_packet_on_same_chunk() {
        let stream = format!("##!@{STOP_PACKET}##!@tail\nnext");
        let out = run(&[stream.as_bytes()]);
        assert_eq!(out.display, "tail\n\rnext");
    }
}
