use serde_json::Value;

/// Extracts the text delta from one streamed response chunk.
///
/// Providers disagree on chunk shape, so the adapter is chosen once when the
/// pipeline is configured and reused for every chunk of the stream — the
/// shape is never re-detected per chunk.
pub trait ChunkAdapter: Send + Sync {
    fn extract_text(&self, chunk: &Value) -> Option<String>;
}

/// Wire shape of a provider's streamed chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFormat {
    /// `choices[0].delta.content`
    OpenAi,
    /// top-level `content`
    Gemini,
    /// top-level `text`
    PlainText,
}

pub fn adapter_for(format: ChunkFormat) -> &'static dyn ChunkAdapter {
    match format {
        ChunkFormat::OpenAi => &OpenAiChunkAdapter,
        ChunkFormat::Gemini => &GeminiChunkAdapter,
        ChunkFormat::PlainText => &PlainTextChunkAdapter,
    }
}

pub struct OpenAiChunkAdapter;

impl ChunkAdapter for OpenAiChunkAdapter {
    fn extract_text(&self, chunk: &Value) -> Option<String> {
        let content = chunk
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()?;
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}

pub struct GeminiChunkAdapter;

impl ChunkAdapter for GeminiChunkAdapter {
    fn extract_text(&self, chunk: &Value) -> Option<String> {
        let content = chunk.get("content")?.as_str()?;
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}

pub struct PlainTextChunkAdapter;

impl ChunkAdapter for PlainTextChunkAdapter {
    fn extract_text(&self, chunk: &Value) -> Option<String> {
        let text = chunk.get("text")?.as_str()?;
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
