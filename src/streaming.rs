//! Parser SSE para las respuestas en streaming del endpoint de chat.
//!
//! Convierte el stream de bytes de `reqwest` en fragmentos de texto
//! (`choices[0].delta.content`). Gestiona líneas partidas entre paquetes y la
//! señal `data: [DONE]`.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use serde::Deserialize;

use crate::error::QueryError;

#[derive(Debug, Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceRaw {
    #[serde(default)]
    delta: Option<DeltaRaw>,
}

#[derive(Debug, Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

enum SseEvent {
    Fragment(String),
    Done,
}

/// Adaptador de bytes SSE a fragmentos de texto.
///
/// Los fragmentos vacíos (deltas sin contenido, comentarios de keep-alive)
/// no se emiten. El stream termina con `[DONE]` o al cerrarse la conexión.
pub struct SseFragmentStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: Vec<u8>,
    finished: bool,
}

impl SseFragmentStream {
    pub fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
            pending: Vec::new(),
            finished: false,
        }
    }

    /// Añade bytes al buffer respetando secuencias UTF-8 partidas entre
    /// paquetes.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), QueryError> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
                Ok(())
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.buffer.push_str(&text);
                self.pending.drain(..valid);
                Ok(())
            }
            Err(e) => Err(QueryError::Parse(format!("UTF-8 inválido en el stream: {e}"))),
        }
    }
}

impl Stream for SseFragmentStream {
    type Item = Result<String, QueryError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            match try_parse_line(&mut this.buffer) {
                Some(Ok(SseEvent::Fragment(text))) => return Poll::Ready(Some(Ok(text))),
                Some(Ok(SseEvent::Done)) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {}
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if let Err(e) = this.push_bytes(&bytes) {
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(QueryError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    if !this.pending.is_empty() {
                        return Poll::Ready(Some(Err(QueryError::Parse(format!(
                            "stream cerrado con una secuencia UTF-8 incompleta ({} bytes)",
                            this.pending.len()
                        )))));
                    }
                    // Última línea sin salto final.
                    if !this.buffer.trim().is_empty() {
                        this.buffer.push('\n');
                        match try_parse_line(&mut this.buffer) {
                            Some(Ok(SseEvent::Fragment(text))) => return Poll::Ready(Some(Ok(text))),
                            Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                            Some(Ok(SseEvent::Done)) | None => {}
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extrae y parsea la siguiente línea `data:` completa del buffer.
/// Devuelve `None` si todavía no hay una línea completa con contenido.
fn try_parse_line(buffer: &mut String) -> Option<Result<SseEvent, QueryError>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        let Some(data) = line.strip_prefix("data:") else {
            // Líneas vacías, comentarios (": OPENROUTER PROCESSING"), event:, id:
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Some(Ok(SseEvent::Done));
        }

        match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => {
                let content = raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta)
                    .and_then(|d| d.content)
                    .unwrap_or_default();
                if content.is_empty() {
                    continue;
                }
                return Some(Ok(SseEvent::Fragment(content)));
            }
            Err(e) => {
                let preview: String = data.chars().take(200).collect();
                return Some(Err(QueryError::Parse(format!(
                    "no se pudo parsear el fragmento: {e} (data: {preview})"
                ))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn sse(packets: &[&str]) -> SseFragmentStream {
        let items: Vec<Result<Bytes, reqwest::Error>> = packets
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        SseFragmentStream::new(futures::stream::iter(items))
    }

    async fn collect(stream: SseFragmentStream) -> Vec<String> {
        stream.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn parses_fragments_until_done() {
        let stream = sse(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" mundo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignorado\"}}]}\n\n",
        ]);
        assert_eq!(collect(stream).await, vec!["Hola", " mundo"]);
    }

    #[tokio::test]
    async fn handles_lines_split_across_packets() {
        let stream = sse(&[
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"Póliza\"}}]}\n",
            "\ndata: [DONE]\n",
        ]);
        assert_eq!(collect(stream).await, vec!["Póliza"]);
    }

    #[tokio::test]
    async fn handles_multibyte_chars_split_across_packets() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"ó\"}}]}\n";
        let bytes = line.as_bytes();
        let cut = line.find('ó').unwrap() + 1;
        let items: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
        ];
        let stream = SseFragmentStream::new(futures::stream::iter(items));
        assert_eq!(collect(stream).await, vec!["ó"]);
    }

    #[tokio::test]
    async fn skips_comments_and_empty_deltas() {
        let stream = sse(&[
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"choices\":[{\"delta\":{}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}",
        ]);
        assert_eq!(collect(stream).await, vec!["ok"]);
    }

    #[tokio::test]
    async fn truncated_last_chunk_is_a_parse_error() {
        let stream = sse(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"cont",
        ]);
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Hola");
        assert!(matches!(items[1], Err(QueryError::Parse(_))));
    }

    #[tokio::test]
    async fn incomplete_utf8_at_close_is_a_parse_error() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n";
        let items: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(line)),
            Ok(Bytes::from_static(&[0xC3])),
        ];
        let items: Vec<_> = SseFragmentStream::new(futures::stream::iter(items))
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(matches!(items[1], Err(QueryError::Parse(_))));
    }

    #[tokio::test]
    async fn malformed_chunk_is_a_parse_error() {
        let mut stream = sse(&["data: {no es json}\n\n"]);
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, QueryError::Parse(_)));
    }
}
