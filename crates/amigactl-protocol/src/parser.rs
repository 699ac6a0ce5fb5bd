//! Response parser
//!
//! Consumes exactly one response from a [`LineReader`]: the status line,
//! the payload (text lines or `DATA` chunks) and the terminating sentinel.

use std::io::Read;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{DaemonError, ProtocolError, ProtocolResult};
use crate::reader::LineReader;
use crate::response::{Payload, Response, Status};
use crate::stuffing::{unstuff, SENTINEL};

/// One step of a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// `DATA <n>` and its `n` bytes
    Data(Bytes),
    /// `END` followed by the sentinel
    End,
    /// `ERR` in place of `DATA`/`END`, sentinel consumed
    Error(DaemonError),
}

/// Split a status line into verb and info.
pub fn parse_status_line(line: &str) -> ProtocolResult<(Status, String)> {
    if line == "OK" {
        return Ok((Status::Ok, String::new()));
    }
    if line == "ERR" {
        return Ok((Status::Err, String::new()));
    }
    if let Some(info) = line.strip_prefix("OK ") {
        return Ok((Status::Ok, info.to_string()));
    }
    if let Some(info) = line.strip_prefix("ERR ") {
        return Ok((Status::Err, info.to_string()));
    }
    Err(ProtocolError::UnexpectedStatus(line.to_string()))
}

/// Parse a `DATA <n>` header. `None` if the line is not a chunk header.
pub fn parse_chunk_header(line: &str) -> ProtocolResult<Option<usize>> {
    match line.strip_prefix("DATA ") {
        Some(len) => len
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ProtocolError::MalformedChunkHeader(line.to_string())),
        None => Ok(None),
    }
}

/// Read a status line.
pub fn read_status<R: Read>(reader: &mut LineReader<R>) -> ProtocolResult<(Status, String)> {
    let line = reader.read_line()?;
    let (status, info) = parse_status_line(&line)?;
    debug!(status = %status, info = %info, "Received status line");
    Ok((status, info))
}

/// Read payload lines up to and including the sentinel.
pub fn read_lines<R: Read>(reader: &mut LineReader<R>) -> ProtocolResult<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let line = reader.read_line()?;
        if line == SENTINEL {
            return Ok(lines);
        }
        lines.push(unstuff(&line).to_string());
    }
}

/// Consume the sentinel; anything else is a framing violation.
pub fn expect_sentinel<R: Read>(reader: &mut LineReader<R>) -> ProtocolResult<()> {
    let line = reader.read_line()?;
    if line == SENTINEL {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedLine(line))
    }
}

/// Read one step of a chunked transfer.
pub fn read_chunk<R: Read>(reader: &mut LineReader<R>) -> ProtocolResult<Chunk> {
    let line = reader.read_line()?;

    if let Some(len) = parse_chunk_header(&line)? {
        trace!(len, "Reading chunk");
        return reader.read_exact_bytes(len).map(Chunk::Data);
    }

    if line == "END" {
        expect_sentinel(reader)?;
        return Ok(Chunk::End);
    }

    match parse_status_line(&line) {
        Ok((Status::Err, info)) => {
            expect_sentinel(reader)?;
            debug!(info = %info, "Chunked transfer aborted by server");
            Ok(Chunk::Error(DaemonError::from_info(&info)))
        }
        _ => Err(ProtocolError::UnexpectedLine(line)),
    }
}

/// Read a response whose payload is text lines.
pub fn read_response<R: Read>(reader: &mut LineReader<R>) -> ProtocolResult<Response> {
    let (status, info) = read_status(reader)?;
    let lines = read_lines(reader)?;
    Ok(Response {
        status,
        info,
        payload: Payload::Lines(lines),
    })
}

/// Read a response whose payload is `DATA` chunks terminated by `END`.
///
/// An `ERR` status line is followed by the sentinel only. An `ERR` line in
/// place of a chunk turns the whole response into an error response; bytes
/// received before it are kept in the payload.
pub fn read_chunked_response<R: Read>(reader: &mut LineReader<R>) -> ProtocolResult<Response> {
    let (status, info) = read_status(reader)?;

    if status == Status::Err {
        let lines = read_lines(reader)?;
        return Ok(Response {
            status,
            info,
            payload: Payload::Lines(lines),
        });
    }

    let mut data = BytesMut::new();
    loop {
        match read_chunk(reader)? {
            Chunk::Data(chunk) => data.extend_from_slice(&chunk),
            Chunk::End => {
                return Ok(Response {
                    status,
                    info,
                    payload: Payload::Binary(data.freeze()),
                })
            }
            Chunk::Error(err) => {
                return Ok(Response {
                    status: Status::Err,
                    info: format!("{} {}", err.code, err.message),
                    payload: Payload::Binary(data.freeze()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;
    use crate::error::ErrorKind;
    use crate::reader::tests::Trickle;
    use crate::response::put_chunks;
    use std::io::Cursor;

    fn reader(data: &[u8]) -> LineReader<Cursor<Vec<u8>>> {
        LineReader::new(Cursor::new(data.to_vec()), Encoding::Latin1)
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("OK").unwrap(), (Status::Ok, String::new()));
        assert_eq!(parse_status_line("OK 10").unwrap(), (Status::Ok, "10".into()));
        assert_eq!(parse_status_line("OK  two").unwrap(), (Status::Ok, " two".into()));
        assert_eq!(parse_status_line("ERR").unwrap(), (Status::Err, String::new()));
        assert_eq!(
            parse_status_line("ERR 200 Object not found").unwrap(),
            (Status::Err, "200 Object not found".into())
        );
    }

    #[test]
    fn test_reject_bad_status() {
        for line in ["OKAY", "ok", "ERROR 1", "", "DATA 5", "."] {
            assert!(
                matches!(parse_status_line(line), Err(ProtocolError::UnexpectedStatus(_))),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_version_response() {
        let mut r = reader(b"OK\namigactld 0.1.0\n.\n");
        let resp = read_response(&mut r).unwrap();
        assert_eq!(resp, Response::ok("", vec!["amigactld 0.1.0".into()]));
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_error_response() {
        let mut r = reader(b"ERR 100 Unknown command\n.\n");
        let resp = read_response(&mut r).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, 100);
        assert_eq!(err.kind, ErrorKind::CommandSyntax);
        assert_eq!(err.message, "Unknown command");
    }

    #[test]
    fn test_payload_unstuffed_once() {
        let mut r = reader(b"OK\n..\n...x\n..y\n.z\n.\n");
        let resp = read_response(&mut r).unwrap();
        assert_eq!(resp.lines(), [".", "..x", ".y", ".z"].map(String::from));
    }

    #[test]
    fn test_parser_stops_at_sentinel() {
        let mut r = reader(b"OK\n.\nOK 42\n.\n");
        let first = read_response(&mut r).unwrap();
        assert!(first.lines().is_empty());
        assert_eq!(r.buffered(), b"OK 42\n.\n".len());

        let second = read_response(&mut r).unwrap();
        assert_eq!(second.info, "42");
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_missing_sentinel_is_violation() {
        let mut r = reader(b"OK\nline\n");
        assert!(matches!(read_response(&mut r), Err(ProtocolError::ConnectionClosed)));

        let mut r = reader(b"OK\nline\n.");
        assert!(matches!(
            read_response(&mut r),
            Err(ProtocolError::ClosedMidLine { ref partial }) if partial == "."
        ));
    }

    #[test]
    fn test_chunked_response() {
        let mut r = reader(b"OK 11\nDATA 6\nhello DATA 5\nworldEND\n.\n");
        let resp = read_chunked_response(&mut r).unwrap();
        assert_eq!(resp.info, "11");
        assert_eq!(resp.data(), b"hello world");
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_empty_chunked_response() {
        let mut r = reader(b"OK 0\nEND\n.\n");
        let resp = read_chunked_response(&mut r).unwrap();
        assert!(resp.is_ok());
        assert!(resp.data().is_empty());
    }

    #[test]
    fn test_chunked_error_status() {
        let mut r = reader(b"ERR 200 Object not found\n.\n");
        let resp = read_chunked_response(&mut r).unwrap();
        assert_eq!(resp.error_condition().unwrap().kind, ErrorKind::NotFound);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_error_in_place_of_chunk() {
        let mut r = reader(b"OK\nDATA 3\nabcERR 300 Read failed\n.\n");
        let resp = read_chunked_response(&mut r).unwrap();
        let err = resp.error_condition().unwrap();
        assert_eq!(err.code, 300);
        assert_eq!(err.message, "Read failed");
        assert_eq!(resp.data(), b"abc");
    }

    #[test]
    fn test_chunk_bytes_may_look_like_framing() {
        let mut r = reader(b"OK\nDATA 8\n.\nEND\n.\nEND\n.\n");
        let resp = read_chunked_response(&mut r).unwrap();
        assert_eq!(resp.data(), b".\nEND\n.\n");
    }

    #[test]
    fn test_malformed_chunk_header() {
        let mut r = reader(b"OK\nDATA five\n");
        assert!(matches!(
            read_chunked_response(&mut r),
            Err(ProtocolError::MalformedChunkHeader(_))
        ));

        let mut r = reader(b"OK\nDATA -1\n");
        assert!(matches!(
            read_chunked_response(&mut r),
            Err(ProtocolError::MalformedChunkHeader(_))
        ));
    }

    #[test]
    fn test_unexpected_line_in_chunked() {
        let mut r = reader(b"OK\nhello\n.\n");
        assert!(matches!(
            read_chunked_response(&mut r),
            Err(ProtocolError::UnexpectedLine(ref l)) if l == "hello"
        ));
    }

    #[test]
    fn test_end_requires_sentinel() {
        let mut r = reader(b"OK\nEND\nOK\n");
        assert!(matches!(read_chunked_response(&mut r), Err(ProtocolError::UnexpectedLine(_))));
    }

    #[test]
    fn test_chunking_does_not_change_content() {
        let original: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();

        let mut whole = BytesMut::from(&b"OK 4096\n"[..]);
        put_chunks(&mut whole, &original, 4096);
        whole.extend_from_slice(b".\n");

        let mut split = BytesMut::from(&b"OK 4096\n"[..]);
        put_chunks(&mut split, &original, 1);
        split.extend_from_slice(b".\n");

        let whole = read_chunked_response(&mut reader(&whole)).unwrap();
        let mut trickle = LineReader::new(Trickle::new(&split, 7), Encoding::Latin1);
        let split = read_chunked_response(&mut trickle).unwrap();

        assert_eq!(whole.data(), &original[..]);
        assert_eq!(split.data(), &original[..]);
        assert_eq!(trickle.buffered(), 0);
    }

    #[test]
    fn test_multibyte_text_split_across_chunks() {
        let text = "Grüße aus Köln";
        let bytes = text.as_bytes();

        let mut wire = BytesMut::from(&b"OK\n"[..]);
        put_chunks(&mut wire, bytes, 3);
        wire.extend_from_slice(b".\n");

        let resp = read_chunked_response(&mut reader(&wire)).unwrap();
        assert_eq!(std::str::from_utf8(resp.data()).unwrap(), text);
    }

    #[test]
    fn test_encoded_response_round_trip() {
        let original = Response::ok("", vec![".hidden".into(), "visible".into(), ".".into()]);
        let wire = original.encode(Encoding::Latin1).unwrap();
        assert_eq!(read_response(&mut reader(&wire)).unwrap(), original);
    }
}
