//! Scripted in-process backend for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Completion, CompletionRequest, GenerationBackend, GenerationError};

/// What a scripted backend saw for one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub label: String,
    pub system: String,
    pub text: String,
    pub image_count: usize,
    pub schema_typed: bool,
}

type Handler = dyn Fn(&RecordedCall) -> Result<String, GenerationError> + Send + Sync;

pub struct ScriptedBackend {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new(
        handler: impl Fn(&RecordedCall) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<Completion, GenerationError> {
        let call = RecordedCall {
            label: request.label.to_string(),
            system: request.system.to_string(),
            text: request.prompt.text_content(),
            image_count: request.prompt.image_count(),
            schema_typed: request.schema.is_some(),
        };
        self.calls.lock().unwrap().push(call.clone());
        let text = (self.handler)(&call)?;
        Ok(Completion { text, usage: None })
    }
}
