//! Structural translation over the external transformation engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::TransformEngine;
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::slot::Slot;
use crate::tasks::{require_payload, take_message, Task, TaskCategory};

/// Applies a declarative transformation script to the input document.
///
/// The script and the [`TransformEngine`] are supplied externally; the task
/// forwards the transformed result with id and headers unchanged. Errors:
/// missing input document, or a script the engine cannot apply.
pub struct Translator {
    id: String,
    script: String,
    engine: Arc<dyn TransformEngine>,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl Translator {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        script: impl Into<String>,
        engine: Arc<dyn TransformEngine>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            script: script.into(),
            engine,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for Translator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        let document = require_payload(&self.id, &message)?;
        let transformed = self
            .engine
            .apply(document, &self.script)
            .map_err(|err| EngineError::Transform {
                stage: self.id.clone(),
                message: err.to_string(),
            })?;
        self.output.enqueue(message.transformed(transformed));
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Translator {
    fn category(&self) -> TaskCategory {
        TaskCategory::Transformer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::TransformError;
    use crate::document::Document;
    use crate::message::Message;

    fn renaming_engine() -> Arc<dyn TransformEngine> {
        Arc::new(|doc: &Document, script: &str| -> Result<Document, TransformError> {
            let new_name = script
                .strip_prefix("rename:")
                .ok_or_else(|| TransformError::msg(format!("malformed script '{script}'")))?;
            let mut out = doc.clone();
            out.name = new_name.to_string();
            Ok(out)
        })
    }

    #[tokio::test]
    async fn translator_rewrites_and_preserves_identity() {
        let input = Slot::new("in");
        let output = Slot::new("out");
        let original = Message::new(Document::element("old")).with_header("h", "v");
        let id = original.id.clone();
        input.enqueue(original);

        let translator =
            Translator::new("tr", "rename:new", renaming_engine(), input, Arc::clone(&output));
        translator.execute().await.unwrap();

        let out = output.dequeue().unwrap();
        assert_eq!(out.id, id);
        assert_eq!(out.header("h"), Some("v"));
        assert_eq!(out.payload.unwrap().name, "new");
    }

    #[tokio::test]
    async fn translator_surfaces_malformed_scripts() {
        let input = Slot::new("in");
        input.enqueue(Message::new(Document::element("doc")));
        let translator = Translator::new(
            "tr",
            "garbage",
            renaming_engine(),
            input,
            Slot::new("out"),
        );
        assert!(matches!(
            translator.execute().await.unwrap_err(),
            EngineError::Transform { .. }
        ));
    }

    #[tokio::test]
    async fn translator_requires_a_document() {
        let input = Slot::new("in");
        input.enqueue(Message::empty());
        let translator = Translator::new(
            "tr",
            "rename:x",
            renaming_engine(),
            input,
            Slot::new("out"),
        );
        assert!(matches!(
            translator.execute().await.unwrap_err(),
            EngineError::MissingDocument { .. }
        ));
    }
}
