//! Streaming decoder for the artifact container format: a tar of tars
//! (ustar headers, 512-byte blocks) describing a version document, an
//! ordered payload type list, per-payload metadata, and the binary
//! payload bundles themselves.
//!
//! The decoder is incremental by construction: `ArtifactParser::feed` can
//! be called with byte chunks of any size — one byte at a time or the
//! whole artifact at once — and produces the identical callback sequence
//! either way. However large the chunk passed to `feed`, it is folded into
//! the internal buffer one block at a time, so the buffer never holds more
//! than two header blocks' worth of input at the point any callback runs,
//! not just once `feed` itself returns.

mod header;
mod path;

pub use header::BLOCK_SIZE;

use header::{blocks_for_size, parse_header};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("header block is missing the ustar magic bytes")]
    BadMagic,
    #[error("malformed {0} header field")]
    BadHeaderField(String),
    #[error("malformed json in {0}: {1}")]
    MalformedJson(String, #[source] serde_json::Error),
    #[error("version document rejected: expected format \"mender\" version 3, got {0:?}")]
    VersionRejected(VersionDocument),
    #[error("header-info is missing its payloads array")]
    MissingPayloadsArray,
    #[error("payload index {0} is out of range")]
    PayloadIndexOutOfRange(usize),
    #[error("payload callback failed: {0}")]
    CallbackFailed(String),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VersionDocument {
    format: String,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct HeaderInfoDocument {
    payloads: Vec<HeaderInfoPayload>,
}

#[derive(Debug, Deserialize)]
struct HeaderInfoPayload {
    #[serde(rename = "type")]
    type_name: String,
}

/// One entry of the ordered payload type list declared by `header.tar/header-info`,
/// enriched in place as each payload's `meta-data` entry is parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadEntry {
    pub type_name: String,
    pub meta_data: Option<serde_json::Value>,
}

/// Receives the decoder's callbacks as payload bytes stream past. A caller
/// composes this with a `mender-flash::FlashWriter` (or a test double) to
/// react to begin/chunk events; returning `Err` aborts the parse.
pub trait PayloadSink {
    /// Invoked once per `data/<N>.tar` with `filename=None` (the "begin"
    /// signal — a zero-length bundle produces only this call), then
    /// repeatedly with `filename=Some(name)` for each 512-byte block of
    /// the bundle's inner file, in order.
    #[allow(clippy::too_many_arguments)]
    fn on_payload_chunk(
        &mut self,
        type_name: &str,
        meta_data: Option<&serde_json::Value>,
        filename: Option<&str>,
        total_size: u64,
        chunk: Option<&[u8]>,
        absolute_offset: u64,
        chunk_length: usize,
    ) -> Result<(), String>;
}

/// Result of one `feed` call: either the parser consumed everything it
/// could and is waiting on more bytes, or it just observed the top-level
/// stream's end-of-tar marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    NeedMoreInput,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    AwaitingHeader,
    ConsumingBody,
}

#[derive(Debug, Clone, PartialEq)]
enum BodyKind {
    Version,
    HeaderInfo,
    MetaData(usize),
    PayloadChunk(usize, String),
    Skip,
}

struct CurrentBody {
    size: u64,
    index: u64,
    kind: BodyKind,
}

/// The incremental tar-of-tars decoder. See the module documentation for
/// the streaming contract.
pub struct ArtifactParser {
    buffer: Vec<u8>,
    state: ParserState,
    current_path: String,
    current: Option<CurrentBody>,
    accumulator: Vec<u8>,
    payloads: Vec<PayloadEntry>,
    finished: bool,
}

impl Default for ArtifactParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(2 * BLOCK_SIZE),
            state: ParserState::AwaitingHeader,
            current_path: String::new(),
            current: None,
            accumulator: Vec::new(),
            payloads: Vec::new(),
            finished: false,
        }
    }

    /// The ordered, progressively-enriched payload type/metadata table
    /// declared by `header.tar`.
    pub fn payloads(&self) -> &[PayloadEntry] {
        &self.payloads
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds the next chunk of artifact bytes to the decoder, dispatching
    /// every callback that becomes possible as a result. `chunk` may be any
    /// length: the parser only ever requires one or two header blocks (at
    /// most 1024 bytes) buffered to make progress, so the streaming and
    /// whole-blob-at-once call patterns produce the same callback sequence.
    ///
    /// A large `chunk` is folded into the buffer one block at a time rather
    /// than all at once, draining everything parseable after each block is
    /// appended — this is what keeps the buffer bounded at the point any
    /// callback runs, instead of only once the whole chunk has been queued.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        sink: &mut dyn PayloadSink,
    ) -> ArtifactResult<ParseOutcome> {
        if self.finished {
            return Ok(ParseOutcome::Complete);
        }
        if chunk.is_empty() {
            return self.drain(sink);
        }

        let mut outcome = ParseOutcome::NeedMoreInput;
        for block in chunk.chunks(BLOCK_SIZE) {
            self.buffer.extend_from_slice(block);
            outcome = self.drain(sink)?;
            if self.finished {
                return Ok(ParseOutcome::Complete);
            }
        }
        Ok(outcome)
    }

    /// Consumes every block the current buffer contents make parseable,
    /// dispatching callbacks along the way, until the buffer no longer
    /// holds enough bytes for the current state to make progress.
    fn drain(&mut self, sink: &mut dyn PayloadSink) -> ArtifactResult<ParseOutcome> {
        loop {
            if self.finished {
                return Ok(ParseOutcome::Complete);
            }

            match self.state {
                ParserState::AwaitingHeader => match self.step_awaiting_header(sink)? {
                    Some(outcome) => return Ok(outcome),
                    None => continue,
                },
                ParserState::ConsumingBody => match self.step_consuming_body(sink)? {
                    Some(outcome) => return Ok(outcome),
                    None => continue,
                },
            }
        }
    }

    fn step_awaiting_header(
        &mut self,
        sink: &mut dyn PayloadSink,
    ) -> ArtifactResult<Option<ParseOutcome>> {
        if self.buffer.len() < BLOCK_SIZE {
            return Ok(Some(ParseOutcome::NeedMoreInput));
        }

        if self.buffer[0] == 0 {
            if self.buffer.len() < 2 * BLOCK_SIZE {
                return Ok(Some(ParseOutcome::NeedMoreInput));
            }
            self.buffer.drain(0..2 * BLOCK_SIZE);
            if self.current_path.is_empty() {
                self.finished = true;
                return Ok(Some(ParseOutcome::Complete));
            }
            self.current_path = path::pop_last_tar_segment(&self.current_path);
            return Ok(None);
        }

        let block: [u8; BLOCK_SIZE] = self.buffer[..BLOCK_SIZE].try_into().unwrap();
        let header = parse_header(&block)?.expect("non-zero name field checked above");
        self.buffer.drain(0..BLOCK_SIZE);

        let full_path = path::join(&self.current_path, &header.name);

        if full_path.ends_with(".tar") {
            if let Some(index) = path::parse_data_tar_container_path(&full_path) {
                self.fire_begin_callback(index, sink)?;
            }
            self.current_path = full_path;
            return Ok(None);
        }

        let kind = self.classify_body(&full_path)?;
        self.current_path = full_path;

        if header.size == 0 {
            self.finalize_body(kind, &[])?;
            return Ok(None);
        }

        self.current = Some(CurrentBody {
            size: header.size,
            index: 0,
            kind,
        });
        self.state = ParserState::ConsumingBody;
        Ok(None)
    }

    fn step_consuming_body(
        &mut self,
        sink: &mut dyn PayloadSink,
    ) -> ArtifactResult<Option<ParseOutcome>> {
        if self.buffer.len() < BLOCK_SIZE {
            return Ok(Some(ParseOutcome::NeedMoreInput));
        }

        let block: [u8; BLOCK_SIZE] = self.buffer[..BLOCK_SIZE].try_into().unwrap();
        self.buffer.drain(0..BLOCK_SIZE);

        let current = self.current.as_mut().expect("consuming body without state");
        let remaining = current.size - current.index;
        let content_len = remaining.min(BLOCK_SIZE as u64) as usize;
        let content = &block[..content_len];

        match &current.kind {
            BodyKind::Version | BodyKind::HeaderInfo | BodyKind::MetaData(_) => {
                self.accumulator.extend_from_slice(content);
            }
            BodyKind::PayloadChunk(index, filename) => {
                let payload = &self.payloads[*index];
                sink.on_payload_chunk(
                    &payload.type_name,
                    payload.meta_data.as_ref(),
                    Some(filename),
                    current.size,
                    Some(content),
                    current.index,
                    content_len,
                )
                .map_err(ArtifactError::CallbackFailed)?;
            }
            BodyKind::Skip => {}
        }

        current.index += content_len as u64;

        if current.index >= current.size {
            let current = self.current.take().expect("body state present");
            let accumulated = std::mem::take(&mut self.accumulator);
            self.finalize_body(current.kind, &accumulated)?;
        }

        Ok(None)
    }

    fn classify_body(&self, full_path: &str) -> ArtifactResult<BodyKind> {
        if full_path == "version" {
            return Ok(BodyKind::Version);
        }
        if full_path == "header.tar/header-info" {
            return Ok(BodyKind::HeaderInfo);
        }
        if let Some(index) = path::parse_header_meta_data_path(full_path) {
            if index >= self.payloads.len() {
                return Err(ArtifactError::PayloadIndexOutOfRange(index));
            }
            return Ok(BodyKind::MetaData(index));
        }
        if let Some((index, inner)) = path::parse_data_tar_inner_path(full_path) {
            if index >= self.payloads.len() {
                return Err(ArtifactError::PayloadIndexOutOfRange(index));
            }
            return Ok(BodyKind::PayloadChunk(index, inner));
        }
        Ok(BodyKind::Skip)
    }

    fn finalize_body(&mut self, kind: BodyKind, body: &[u8]) -> ArtifactResult<()> {
        match kind {
            BodyKind::Version => {
                let document: VersionDocument = serde_json::from_slice(body)
                    .map_err(|e| ArtifactError::MalformedJson("version".to_string(), e))?;
                if document.format != "mender" || document.version != 3 {
                    return Err(ArtifactError::VersionRejected(document));
                }
            }
            BodyKind::HeaderInfo => {
                let document: HeaderInfoDocument = serde_json::from_slice(body)
                    .map_err(|e| ArtifactError::MalformedJson("header-info".to_string(), e))?;
                self.payloads = document
                    .payloads
                    .into_iter()
                    .map(|p| PayloadEntry {
                        type_name: p.type_name,
                        meta_data: None,
                    })
                    .collect();
            }
            BodyKind::MetaData(index) => {
                let meta_data = if body.is_empty() {
                    None
                } else {
                    Some(
                        serde_json::from_slice(body)
                            .map_err(|e| ArtifactError::MalformedJson("meta-data".to_string(), e))?,
                    )
                };
                self.payloads[index].meta_data = meta_data;
            }
            BodyKind::PayloadChunk(_, _) | BodyKind::Skip => {}
        }

        self.current_path = path::trim_to_last_tar_segment(&self.current_path);
        self.state = ParserState::AwaitingHeader;
        Ok(())
    }

    fn fire_begin_callback(
        &self,
        index: usize,
        sink: &mut dyn PayloadSink,
    ) -> ArtifactResult<()> {
        if index >= self.payloads.len() {
            return Err(ArtifactError::PayloadIndexOutOfRange(index));
        }
        let payload = &self.payloads[index];
        sink.on_payload_chunk(
            &payload.type_name,
            payload.meta_data.as_ref(),
            None,
            0,
            None,
            0,
            0,
        )
        .map_err(ArtifactError::CallbackFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordedCall {
        type_name: String,
        meta_data: Option<serde_json::Value>,
        filename: Option<String>,
        total_size: u64,
        chunk: Option<Vec<u8>>,
        absolute_offset: u64,
        chunk_length: usize,
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<RecordedCall>,
        max_buffer_after_call: usize,
    }

    impl PayloadSink for RecordingSink {
        fn on_payload_chunk(
            &mut self,
            type_name: &str,
            meta_data: Option<&serde_json::Value>,
            filename: Option<&str>,
            total_size: u64,
            chunk: Option<&[u8]>,
            absolute_offset: u64,
            chunk_length: usize,
        ) -> Result<(), String> {
            self.calls.push(RecordedCall {
                type_name: type_name.to_string(),
                meta_data: meta_data.cloned(),
                filename: filename.map(str::to_string),
                total_size,
                chunk: chunk.map(|c| c.to_vec()),
                absolute_offset,
                chunk_length,
            });
            Ok(())
        }
    }

    fn ustar_block(name: &str, size: u64) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0..name.len()].copy_from_slice(name.as_bytes());
        let octal = format!("{size:011o}\0");
        block[124..124 + octal.len()].copy_from_slice(octal.as_bytes());
        block[257..262].copy_from_slice(b"ustar");
        block
    }

    fn body_blocks(content: &[u8]) -> Vec<u8> {
        let mut out = content.to_vec();
        let padding = blocks_for_size(content.len() as u64) as usize * BLOCK_SIZE - content.len();
        out.extend(std::iter::repeat(0u8).take(padding));
        out
    }

    fn end_marker() -> Vec<u8> {
        vec![0u8; 2 * BLOCK_SIZE]
    }

    /// Builds a minimal well-formed artifact: a version document, one
    /// "rootfs-image" payload with empty metadata, and a single inner file
    /// inside `data/0000.tar`.
    fn build_minimal_artifact(inner_payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();

        let version_json = br#"{"format":"mender","version":3}"#;
        bytes.extend_from_slice(&ustar_block("version", version_json.len() as u64));
        bytes.extend(body_blocks(version_json));

        bytes.extend_from_slice(&ustar_block("header.tar", 0));

        let header_info_json = br#"{"payloads":[{"type":"rootfs-image"}]}"#;
        bytes.extend_from_slice(&ustar_block(
            "header-info",
            header_info_json.len() as u64,
        ));
        bytes.extend(body_blocks(header_info_json));

        bytes.extend_from_slice(&ustar_block("headers/0000/meta-data", 0));

        bytes.extend(end_marker()); // closes header.tar

        bytes.extend_from_slice(&ustar_block("data/0000.tar", 0));
        bytes.extend_from_slice(&ustar_block(
            "update.ext4",
            inner_payload.len() as u64,
        ));
        bytes.extend(body_blocks(inner_payload));
        bytes.extend(end_marker()); // closes data/0000.tar

        bytes.extend(end_marker()); // closes the top-level archive
        bytes
    }

    #[test]
    fn parses_version_and_payload_table() {
        let artifact = build_minimal_artifact(b"hello world");
        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();

        let outcome = parser.feed(&artifact, &mut sink).unwrap();
        assert_eq!(outcome, ParseOutcome::Complete);
        assert!(parser.is_finished());
        assert_eq!(parser.payloads().len(), 1);
        assert_eq!(parser.payloads()[0].type_name, "rootfs-image");
        assert_eq!(parser.payloads()[0].meta_data, None);
    }

    #[test]
    fn emits_begin_callback_then_chunk_callbacks() {
        let artifact = build_minimal_artifact(b"hello world");
        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        parser.feed(&artifact, &mut sink).unwrap();

        assert_eq!(sink.calls.len(), 2);
        let begin = &sink.calls[0];
        assert_eq!(begin.filename, None);
        assert_eq!(begin.total_size, 0);
        assert_eq!(begin.chunk, None);

        let chunk = &sink.calls[1];
        assert_eq!(chunk.filename.as_deref(), Some("update.ext4"));
        assert_eq!(chunk.total_size, 11);
        assert_eq!(chunk.absolute_offset, 0);
        assert_eq!(chunk.chunk_length, 11);
        assert_eq!(chunk.chunk.as_deref(), Some(b"hello world".as_slice()));
        assert_eq!(chunk.type_name, "rootfs-image");
    }

    #[test]
    fn zero_length_bundle_only_fires_begin_callback() {
        let artifact = build_minimal_artifact(b"");
        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        parser.feed(&artifact, &mut sink).unwrap();

        assert_eq!(sink.calls.len(), 1);
        assert_eq!(sink.calls[0].filename, None);
    }

    #[test]
    fn multi_block_payload_is_chunked_on_512_byte_boundaries() {
        let payload = vec![7u8; 1200];
        let artifact = build_minimal_artifact(&payload);
        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        parser.feed(&artifact, &mut sink).unwrap();

        let chunks: Vec<_> = sink.calls.iter().skip(1).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_length, 512);
        assert_eq!(chunks[1].chunk_length, 512);
        assert_eq!(chunks[2].chunk_length, 176);
        assert_eq!(chunks[0].absolute_offset, 0);
        assert_eq!(chunks[1].absolute_offset, 512);
        assert_eq!(chunks[2].absolute_offset, 1024);
    }

    #[test]
    fn streaming_byte_at_a_time_matches_whole_blob_callback_sequence() {
        let payload = vec![3u8; 1500];
        let artifact = build_minimal_artifact(&payload);

        let mut whole_parser = ArtifactParser::new();
        let mut whole_sink = RecordingSink::default();
        whole_parser.feed(&artifact, &mut whole_sink).unwrap();

        let mut streamed_parser = ArtifactParser::new();
        let mut streamed_sink = RecordingSink::default();
        for byte in &artifact {
            streamed_parser
                .feed(std::slice::from_ref(byte), &mut streamed_sink)
                .unwrap();
        }

        assert_eq!(whole_sink.calls.len(), streamed_sink.calls.len());
        for (a, b) in whole_sink.calls.iter().zip(streamed_sink.calls.iter()) {
            assert_eq!(a.filename, b.filename);
            assert_eq!(a.absolute_offset, b.absolute_offset);
            assert_eq!(a.chunk_length, b.chunk_length);
            assert_eq!(a.chunk, b.chunk);
        }
        assert!(streamed_parser.is_finished());
    }

    #[test]
    fn buffer_never_exceeds_two_blocks_after_a_feed_call() {
        let artifact = build_minimal_artifact(b"some payload bytes here");
        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();

        for window in artifact.chunks(37) {
            parser.feed(window, &mut sink).unwrap();
            assert!(parser.buffer.len() < 2 * BLOCK_SIZE);
        }
    }

    #[test]
    fn meta_data_index_out_of_range_is_fatal() {
        let mut bytes = Vec::new();
        let version_json = br#"{"format":"mender","version":3}"#;
        bytes.extend_from_slice(&ustar_block("version", version_json.len() as u64));
        bytes.extend(body_blocks(version_json));
        bytes.extend_from_slice(&ustar_block("header.tar", 0));
        let header_info_json = br#"{"payloads":[{"type":"rootfs-image"}]}"#;
        bytes.extend_from_slice(&ustar_block(
            "header-info",
            header_info_json.len() as u64,
        ));
        bytes.extend(body_blocks(header_info_json));
        bytes.extend_from_slice(&ustar_block("headers/0007/meta-data", 0));

        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        let result = parser.feed(&bytes, &mut sink);
        assert!(matches!(
            result,
            Err(ArtifactError::PayloadIndexOutOfRange(7))
        ));
    }

    #[test]
    fn mismatched_version_document_is_rejected_before_any_binary_callback() {
        let mut bytes = Vec::new();
        let version_json = br#"{"format":"mender","version":2}"#;
        bytes.extend_from_slice(&ustar_block("version", version_json.len() as u64));
        bytes.extend(body_blocks(version_json));

        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        let result = parser.feed(&bytes, &mut sink);
        assert!(matches!(result, Err(ArtifactError::VersionRejected(_))));
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn header_info_missing_payloads_array_is_fatal() {
        let mut bytes = Vec::new();
        let version_json = br#"{"format":"mender","version":3}"#;
        bytes.extend_from_slice(&ustar_block("version", version_json.len() as u64));
        bytes.extend(body_blocks(version_json));
        bytes.extend_from_slice(&ustar_block("header.tar", 0));
        let bad_header_info = br#"{"not_payloads":[]}"#;
        bytes.extend_from_slice(&ustar_block(
            "header-info",
            bad_header_info.len() as u64,
        ));
        bytes.extend(body_blocks(bad_header_info));

        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        let result = parser.feed(&bytes, &mut sink);
        assert!(result.is_err());
    }

    #[test]
    fn unrecognized_entries_are_skipped_without_callbacks() {
        let mut bytes = Vec::new();
        let version_json = br#"{"format":"mender","version":3}"#;
        bytes.extend_from_slice(&ustar_block("version", version_json.len() as u64));
        bytes.extend(body_blocks(version_json));
        bytes.extend_from_slice(&ustar_block("manifest", 10));
        bytes.extend(body_blocks(b"0123456789"));
        bytes.extend_from_slice(&ustar_block("header.tar", 0));
        let header_info_json = br#"{"payloads":[]}"#;
        bytes.extend_from_slice(&ustar_block(
            "header-info",
            header_info_json.len() as u64,
        ));
        bytes.extend(body_blocks(header_info_json));
        bytes.extend(end_marker());
        bytes.extend(end_marker());

        let mut parser = ArtifactParser::new();
        let mut sink = RecordingSink::default();
        let outcome = parser.feed(&bytes, &mut sink).unwrap();
        assert_eq!(outcome, ParseOutcome::Complete);
        assert!(sink.calls.is_empty());
    }
}
